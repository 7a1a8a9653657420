//! Process discovery and name lookup over procfs.

use std::{fs, path::PathBuf};

/// Checks whether `pid` is a live process.
pub fn pid_exists(pid: libc::pid_t) -> bool {
	PathBuf::from(format!("/proc/{}", pid)).exists()
}

/// Enumerates all pids on the system, in ascending order.
pub fn enumerate() -> Vec<libc::pid_t> {
	let mut pids = Vec::new();

	let entries = match fs::read_dir("/proc") {
		Ok(entries) => entries,
		Err(err) => {
			log::error!("could not enumerate processes: {}", err);
			return pids;
		}
	};

	for entry in entries.flatten() {
		if let Some(pid) = entry
			.file_name()
			.to_str()
			.and_then(|name| name.parse::<libc::pid_t>().ok())
		{
			pids.push(pid);
		}
	}

	pids.sort_unstable();
	pids
}

/// Finds pids whose command line, short process name or executable basename
/// contains `name` (case-insensitive substring).
///
/// Processes that vanish or deny access mid-lookup are silently skipped.
pub fn find_by_name(name: &str) -> Vec<libc::pid_t> {
	let name = name.to_lowercase();
	let mut matching = Vec::new();

	for pid in enumerate() {
		if cmdline(pid)
			.map(|cmdline| cmdline.to_lowercase().contains(&name))
			.unwrap_or(false)
		{
			matching.push(pid);
			continue;
		}

		if fs::read_to_string(format!("/proc/{}/comm", pid))
			.map(|comm| comm.trim().to_lowercase().contains(&name))
			.unwrap_or(false)
		{
			matching.push(pid);
			continue;
		}

		let exe_matches = fs::read_link(format!("/proc/{}/exe", pid))
			.ok()
			.and_then(|exe| {
				exe.file_name()
					.map(|base| base.to_string_lossy().to_lowercase().contains(&name))
			})
			.unwrap_or(false);
		if exe_matches {
			matching.push(pid);
		}
	}

	matching
}

/// Best-effort process metadata used for match context labels.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
	pub pid: libc::pid_t,
	pub cmdline: String,
	pub exe: String
}
impl ProcessInfo {
	pub fn query(pid: libc::pid_t) -> Self {
		ProcessInfo {
			pid,
			cmdline: cmdline(pid).unwrap_or_default(),
			exe: fs::read_link(format!("/proc/{}/exe", pid))
				.map(|exe| exe.to_string_lossy().into_owned())
				.unwrap_or_default()
		}
	}

	/// The context string attached to match records for this process.
	pub fn context_label(&self) -> String {
		if self.cmdline.is_empty() {
			self.pid.to_string()
		} else {
			format!("{} ({})", self.pid, self.cmdline)
		}
	}
}

fn cmdline(pid: libc::pid_t) -> Option<String> {
	let raw = fs::read(format!("/proc/{}/cmdline", pid)).ok()?;
	let text = raw
		.split(|&byte| byte == 0)
		.filter(|part| !part.is_empty())
		.map(|part| String::from_utf8_lossy(part).into_owned())
		.collect::<Vec<_>>()
		.join(" ");

	if text.is_empty() {
		None
	} else {
		Some(text)
	}
}

#[cfg(test)]
mod test {
	use super::{enumerate, find_by_name, pid_exists, ProcessInfo};

	#[test]
	fn test_pid_exists() {
		let own = std::process::id() as libc::pid_t;
		assert!(pid_exists(own));
		assert!(!pid_exists(0));
	}

	#[test]
	fn test_enumerate_contains_self() {
		let own = std::process::id() as libc::pid_t;
		let pids = enumerate();

		assert!(pids.contains(&own));
		let mut sorted = pids.clone();
		sorted.sort_unstable();
		assert_eq!(pids, sorted);
	}

	#[test]
	fn test_find_by_name_matches_self() {
		// the test binary's own exe basename always contains "memsieve"
		let own = std::process::id() as libc::pid_t;
		assert!(find_by_name("memsieve").contains(&own));
		assert!(find_by_name("MEMSIEVE").contains(&own));
	}

	#[test]
	fn test_context_label() {
		let info = ProcessInfo {
			pid: 42,
			cmdline: "sshd -D".to_string(),
			exe: "/usr/sbin/sshd".to_string()
		};
		assert_eq!(info.context_label(), "42 (sshd -D)");

		let bare = ProcessInfo {
			pid: 42,
			cmdline: String::new(),
			exe: String::new()
		};
		assert_eq!(bare.context_label(), "42");
	}
}
