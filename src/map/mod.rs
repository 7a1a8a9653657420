//! Catalog of a process's mapped memory regions.
//!
//! Parses the line-oriented `/proc/<pid>/maps` description into an ordered
//! list of [`MemoryRegion`]s. An unreadable or absent map file is a soft
//! condition yielding an empty catalog, and individual malformed lines are
//! skipped without aborting the parse.

use std::{fs, path::PathBuf};

use thiserror::Error;

mod region;

pub use region::{MemoryRegion, RegionPermissions};

#[derive(Debug, Error)]
pub enum RegionParseError {
	#[error("mapped range has invalid format")]
	InvalidRange,
	#[error("mapped range is empty or reversed")]
	EmptyRange,
	#[error("permissions have invalid format")]
	InvalidPerms,
	#[error("offset has invalid format")]
	InvalidOffset,
	#[error("device has invalid format")]
	InvalidDevice,
	#[error("inode has invalid format")]
	InvalidInode,

	#[error("could not parse numeric field")]
	ParseInt(#[from] std::num::ParseIntError)
}

/// Ordered regions of one process, in map-file order.
pub struct RegionCatalog {
	pid: libc::pid_t,
	regions: Vec<MemoryRegion>
}
impl RegionCatalog {
	pub fn maps_path(pid: libc::pid_t) -> PathBuf {
		format!("/proc/{}/maps", pid).into()
	}

	/// Loads the region catalog of `pid`.
	///
	/// Only regions with read permission are retained. Never fails: an
	/// unreadable map description produces an empty catalog.
	pub fn load(pid: libc::pid_t) -> Self {
		let buffer = match fs::read_to_string(Self::maps_path(pid)) {
			Ok(buffer) => buffer,
			Err(err) => {
				log::debug!("could not read memory map of process {}: {}", pid, err);
				return RegionCatalog {
					pid,
					regions: Vec::new()
				};
			}
		};

		let mut regions = Vec::new();
		for line in buffer.lines() {
			match Self::parse_map_line(line) {
				Ok(region) => {
					if region.permissions.read() {
						regions.push(region);
					}
				}
				Err(err) => {
					log::debug!("skipping malformed map line of process {}: {}", pid, err);
				}
			}
		}

		if regions.is_empty() {
			log::debug!("no readable memory regions found for process {}", pid);
		}

		RegionCatalog { pid, regions }
	}

	pub fn pid(&self) -> libc::pid_t {
		self.pid
	}

	pub fn regions(&self) -> &[MemoryRegion] {
		&self.regions
	}

	fn parse_permissions(string: &str) -> Result<RegionPermissions, RegionParseError> {
		let mut chars = string.trim().chars();

		let read = match chars.next() {
			Some('r') => true,
			Some('-') => false,
			_ => return Err(RegionParseError::InvalidPerms)
		};

		let write = match chars.next() {
			Some('w') => true,
			Some('-') => false,
			_ => return Err(RegionParseError::InvalidPerms)
		};

		let exec = match chars.next() {
			Some('x') => true,
			Some('-') => false,
			_ => return Err(RegionParseError::InvalidPerms)
		};

		let shared = match chars.next() {
			Some('s') => true,
			Some('p') => false,
			_ => return Err(RegionParseError::InvalidPerms)
		};

		Ok(RegionPermissions::new(read, write, exec, shared))
	}

	/// Decomposes one map line.
	///
	/// Format: `<start>-<end> <perms> <offset> <dev> <inode> [path]` with
	/// hexadecimal addresses and offset. The path is the trimmed remainder
	/// of the line and may itself contain spaces.
	fn parse_map_line(line: &str) -> Result<MemoryRegion, RegionParseError> {
		let mut split = line.splitn(6, ' ');

		let mut range_split = split
			.next()
			.ok_or(RegionParseError::InvalidRange)?
			.split('-');
		let start = usize::from_str_radix(
			range_split.next().ok_or(RegionParseError::InvalidRange)?,
			16
		)?;
		let end = usize::from_str_radix(
			range_split.next().ok_or(RegionParseError::InvalidRange)?,
			16
		)?;
		if start >= end {
			return Err(RegionParseError::EmptyRange);
		}

		let permissions =
			Self::parse_permissions(split.next().ok_or(RegionParseError::InvalidPerms)?)?;

		let offset = u64::from_str_radix(split.next().ok_or(RegionParseError::InvalidOffset)?, 16)?;

		let device = split
			.next()
			.ok_or(RegionParseError::InvalidDevice)?
			.to_string();

		let inode = split
			.next()
			.ok_or(RegionParseError::InvalidInode)?
			.parse::<u64>()?;

		let path = split.next().map(str::trim).unwrap_or("").to_string();

		Ok(MemoryRegion {
			start,
			end,
			permissions,
			offset,
			device,
			inode,
			path
		})
	}
}

#[cfg(test)]
mod test {
	use super::{MemoryRegion, RegionCatalog, RegionPermissions};

	#[test]
	fn test_parse_map_line() {
		let line = "00400000-00401000 r-xp 00000000 00:00 0 /bin/true";

		let region = RegionCatalog::parse_map_line(line).unwrap();
		assert_eq!(
			region,
			MemoryRegion {
				start: 0x400000,
				end: 0x401000,
				permissions: RegionPermissions::new(true, false, true, false),
				offset: 0,
				device: "00:00".to_string(),
				inode: 0,
				path: "/bin/true".to_string()
			}
		);
		assert!(region.start < region.end);
		assert!(region.permissions.read());
	}

	#[test]
	fn test_parse_map_line_pathless() {
		let line = "7f3a00000000-7f3a00021000 rw-p 00000000 00:00 0";

		let region = RegionCatalog::parse_map_line(line).unwrap();
		assert_eq!(region.path, "");
		assert_eq!(region.size(), 0x21000);
	}

	#[test]
	fn test_parse_map_line_path_with_spaces() {
		let line =
			"7f3a00000000-7f3a00001000 r--p 00000000 08:01 123456      /opt/My App/lib.so";

		let region = RegionCatalog::parse_map_line(line).unwrap();
		assert_eq!(region.path, "/opt/My App/lib.so");
		assert_eq!(region.inode, 123456);
	}

	#[test]
	fn test_parse_map_line_malformed() {
		RegionCatalog::parse_map_line("").unwrap_err();
		RegionCatalog::parse_map_line("garbage").unwrap_err();
		RegionCatalog::parse_map_line("00400000-00401000").unwrap_err();
		RegionCatalog::parse_map_line("00400000-00401000 rqxp 0 00:00 0").unwrap_err();
		RegionCatalog::parse_map_line("zzz-00401000 r-xp 0 00:00 0").unwrap_err();
		// empty and reversed ranges violate the start < end invariant
		RegionCatalog::parse_map_line("00401000-00401000 r-xp 0 00:00 0").unwrap_err();
		RegionCatalog::parse_map_line("00402000-00401000 r-xp 0 00:00 0").unwrap_err();
	}

	#[test]
	fn test_load_own_maps() {
		let catalog = RegionCatalog::load(std::process::id() as libc::pid_t);

		assert!(!catalog.regions().is_empty());
		for region in catalog.regions() {
			assert!(region.start < region.end);
			assert!(region.permissions.read());
		}
	}

	#[test]
	fn test_load_missing_process() {
		// pid 0 has no procfs entry
		let catalog = RegionCatalog::load(0);
		assert!(catalog.regions().is_empty());
	}
}
