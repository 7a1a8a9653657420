//! Linux ptrace implementation of the tracing capability.
//!
//! All raw syscall wiring lives here so the rest of the engine stays
//! platform-agnostic behind [`TraceApi`](super::TraceApi).

use std::io;

use super::TraceApi;

/// Ptrace-backed [`TraceApi`].
pub struct PtraceApi;
impl PtraceApi {
	pub fn new() -> Self {
		PtraceApi
	}

	unsafe fn wait_for_stop(pid: libc::pid_t) -> io::Result<()> {
		let mut status = 0;
		let waitpid_res = libc::waitpid(pid, &mut status, 0);
		if waitpid_res == -1 {
			return Err(io::Error::last_os_error());
		}
		debug_assert_eq!(waitpid_res, pid);

		if !libc::WIFSTOPPED(status) {
			return Err(io::Error::new(
				io::ErrorKind::Other,
				format!("process {} did not stop after attach", pid)
			));
		}

		Ok(())
	}
}
impl Default for PtraceApi {
	fn default() -> Self {
		Self::new()
	}
}
impl TraceApi for PtraceApi {
	fn is_alive(&self, pid: libc::pid_t) -> bool {
		std::path::Path::new(&format!("/proc/{}", pid)).exists()
	}

	fn attach(&mut self, pid: libc::pid_t) -> io::Result<()> {
		unsafe {
			if libc::ptrace(libc::PTRACE_ATTACH, pid, 0, 0) != 0 {
				return Err(io::Error::last_os_error());
			}

			Self::wait_for_stop(pid)
		}
	}

	fn detach(&mut self, pid: libc::pid_t) -> io::Result<()> {
		unsafe {
			if libc::ptrace(libc::PTRACE_DETACH, pid, 0, 0) != 0 {
				return Err(io::Error::last_os_error());
			}
		}

		Ok(())
	}

	fn peek(&mut self, pid: libc::pid_t, addr: usize) -> io::Result<usize> {
		unsafe {
			// PEEKDATA returns the word in the syscall result, so -1 is a
			// valid word. errno must be cleared beforehand to tell them
			// apart.
			*libc::__errno_location() = 0;

			let word = libc::ptrace(libc::PTRACE_PEEKDATA, pid, addr, 0);
			if word == -1 {
				let err = io::Error::last_os_error();
				if err.raw_os_error().unwrap_or(0) != 0 {
					return Err(err);
				}
			}

			Ok(word as usize)
		}
	}
}
