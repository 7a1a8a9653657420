//! Exclusive trace attachment lifecycle.
//!
//! [`TraceApi`] is the capability seam over the platform tracing primitive;
//! [`TraceSession`] owns the attach state and guarantees it is released on
//! every exit path, including drop.

use std::io;

use thiserror::Error;

pub mod ptrace;

/// Capability over the OS tracing primitive.
///
/// `attach` includes the implicit wait for the target to reach a stopped
/// state. `peek` reads one native word and must distinguish a real error
/// from a word whose bits happen to look like an error sentinel.
pub trait TraceApi {
	fn is_alive(&self, pid: libc::pid_t) -> bool;

	fn attach(&mut self, pid: libc::pid_t) -> io::Result<()>;

	fn detach(&mut self, pid: libc::pid_t) -> io::Result<()>;

	fn peek(&mut self, pid: libc::pid_t, addr: usize) -> io::Result<usize>;
}

#[derive(Debug, Error)]
pub enum AttachError {
	#[error("process {0} does not exist")]
	NoSuchProcess(libc::pid_t),
	#[error("could not attach to process {pid}")]
	Attach {
		pid: libc::pid_t,
		#[source]
		source: io::Error
	}
}
impl AttachError {
	/// Whether the failure was a permission problem rather than e.g. the
	/// target vanishing.
	pub fn is_permission_denied(&self) -> bool {
		match self {
			AttachError::Attach { source, .. } => {
				source.kind() == io::ErrorKind::PermissionDenied
			}
			AttachError::NoSuchProcess(_) => false
		}
	}
}

#[derive(Debug, Error)]
#[error("could not detach from process {pid}")]
pub struct DetachError {
	pub pid: libc::pid_t,
	#[source]
	pub source: io::Error
}

#[derive(Debug, Error)]
pub enum PeekError {
	#[error("no process is attached")]
	NotAttached,
	#[error("could not read word at {addr:#x}")]
	Peek {
		addr: usize,
		#[source]
		source: io::Error
	}
}

/// Owns the at-most-one trace attachment of this controller.
///
/// The session is reusable across targets: attaching while attached to a
/// different pid detaches from the old target first. Dropping an attached
/// session detaches best-effort.
pub struct TraceSession<A: TraceApi> {
	api: A,
	attached: Option<libc::pid_t>
}
impl<A: TraceApi> TraceSession<A> {
	pub fn new(api: A) -> Self {
		TraceSession {
			api,
			attached: None
		}
	}

	pub fn attached_pid(&self) -> Option<libc::pid_t> {
		self.attached
	}

	pub fn is_attached(&self) -> bool {
		self.attached.is_some()
	}

	/// Attaches to `pid` and waits for it to stop.
	///
	/// Fails fast if the pid is not a live process. Attaching to the pid the
	/// session already holds is a no-op success. Attaching while holding a
	/// different pid detaches from it first, so at most one attachment ever
	/// exists.
	pub fn attach(&mut self, pid: libc::pid_t) -> Result<(), AttachError> {
		if !self.api.is_alive(pid) {
			return Err(AttachError::NoSuchProcess(pid));
		}

		if self.attached == Some(pid) {
			return Ok(());
		}

		if self.is_attached() {
			if let Err(err) = self.detach() {
				log::warn!("{}", err);
			}
		}

		self.api
			.attach(pid)
			.map_err(|source| AttachError::Attach { pid, source })?;
		self.attached = Some(pid);

		log::debug!("attached to process {}", pid);
		Ok(())
	}

	/// Detaches from the current target.
	///
	/// No-op success when already detached. The session transitions to
	/// detached even when the syscall fails: detach cannot be meaningfully
	/// retried, and a stale attachment record would be worse than a lost
	/// error.
	pub fn detach(&mut self) -> Result<(), DetachError> {
		let pid = match self.attached.take() {
			None => return Ok(()),
			Some(pid) => pid
		};

		self.api
			.detach(pid)
			.map_err(|source| DetachError { pid, source })?;

		log::debug!("detached from process {}", pid);
		Ok(())
	}

	/// Reads one native word from the attached target.
	pub fn peek_word(&mut self, addr: usize) -> Result<usize, PeekError> {
		let pid = self.attached.ok_or(PeekError::NotAttached)?;

		self.api
			.peek(pid, addr)
			.map_err(|source| PeekError::Peek { addr, source })
	}
}
impl<A: TraceApi> Drop for TraceSession<A> {
	fn drop(&mut self) {
		if let Err(err) = self.detach() {
			log::warn!("{}", err);
		}
	}
}

#[derive(Debug, Error)]
#[error("tracing processes requires root privileges (effective uid {euid})")]
pub struct PrivilegeError {
	pub euid: libc::uid_t
}

/// Preflight for the ability to attach at all.
///
/// Reported once before any scanning begins; an unprivileged run would fail
/// identically on every target.
pub fn require_tracing_privilege() -> Result<(), PrivilegeError> {
	let euid = unsafe { libc::geteuid() };
	if euid != 0 {
		return Err(PrivilegeError { euid });
	}

	Ok(())
}

#[cfg(test)]
pub(crate) mod mock {
	use std::{
		cell::RefCell,
		io,
		rc::Rc
	};

	use super::TraceApi;

	/// Records the call sequence and serves peeks from a repeating byte
	/// pattern, optionally failing after a set number of peeks.
	pub struct MockTraceApi {
		pub calls: Rc<RefCell<Vec<String>>>,
		pub memory: Vec<u8>,
		pub peeks_before_failure: Option<usize>,
		pub fail_detach: bool,
		peeks: usize
	}
	impl MockTraceApi {
		pub fn new(memory: Vec<u8>) -> Self {
			MockTraceApi {
				calls: Rc::new(RefCell::new(Vec::new())),
				memory,
				peeks_before_failure: None,
				fail_detach: false,
				peeks: 0
			}
		}
	}
	impl TraceApi for MockTraceApi {
		fn is_alive(&self, _pid: libc::pid_t) -> bool {
			true
		}

		fn attach(&mut self, pid: libc::pid_t) -> io::Result<()> {
			self.calls.borrow_mut().push(format!("attach {}", pid));
			Ok(())
		}

		fn detach(&mut self, pid: libc::pid_t) -> io::Result<()> {
			self.calls.borrow_mut().push(format!("detach {}", pid));
			if self.fail_detach {
				return Err(io::Error::from_raw_os_error(libc::ESRCH));
			}
			Ok(())
		}

		fn peek(&mut self, _pid: libc::pid_t, addr: usize) -> io::Result<usize> {
			if let Some(limit) = self.peeks_before_failure {
				if self.peeks >= limit {
					return Err(io::Error::from_raw_os_error(libc::EIO));
				}
			}
			self.peeks += 1;

			let mut bytes = [0u8; std::mem::size_of::<usize>()];
			for (i, byte) in bytes.iter_mut().enumerate() {
				*byte = self.memory[(addr + i) % self.memory.len()];
			}

			Ok(usize::from_le_bytes(bytes))
		}
	}
}
