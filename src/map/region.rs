use std::fmt;

/// Permissions of a mapped memory region.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegionPermissions {
	bits: u8
}
impl RegionPermissions {
	pub const MASK_EXEC: u8 = 1 << 2;
	pub const MASK_READ: u8 = 1 << 0;
	pub const MASK_SHARE: u8 = 1 << 3;
	pub const MASK_WRITE: u8 = 1 << 1;

	pub const fn new(read: bool, write: bool, exec: bool, shared: bool) -> Self {
		RegionPermissions {
			bits: (read as u8 * Self::MASK_READ)
				| (write as u8 * Self::MASK_WRITE)
				| (exec as u8 * Self::MASK_EXEC)
				| (shared as u8 * Self::MASK_SHARE)
		}
	}

	pub const fn read(&self) -> bool {
		self.bits & Self::MASK_READ != 0
	}

	pub const fn write(&self) -> bool {
		self.bits & Self::MASK_WRITE != 0
	}

	pub const fn exec(&self) -> bool {
		self.bits & Self::MASK_EXEC != 0
	}

	pub const fn shared(&self) -> bool {
		self.bits & Self::MASK_SHARE != 0
	}
}
impl fmt::Display for RegionPermissions {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"{}{}{}{}",
			if self.read() { 'r' } else { '-' },
			if self.write() { 'w' } else { '-' },
			if self.exec() { 'x' } else { '-' },
			if self.shared() { 's' } else { 'p' }
		)
	}
}

/// One contiguous mapped range of a process's address space.
///
/// Parsed from one line of the process map description. Invariant:
/// `start < end`, enforced at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
	pub start: usize,
	pub end: usize,
	pub permissions: RegionPermissions,
	pub offset: u64,
	pub device: String,
	pub inode: u64,
	/// Backing path or pseudo-path (`[heap]`, `[stack]`, ...), empty for
	/// anonymous mappings without a label.
	pub path: String
}
impl MemoryRegion {
	pub const fn size(&self) -> usize {
		self.end - self.start
	}
}
impl fmt::Display for MemoryRegion {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(
			f,
			"{:x}-{:x} {} {}",
			self.start, self.end, self.permissions, self.path
		)
	}
}

#[cfg(test)]
mod test {
	use super::RegionPermissions;

	#[test]
	fn test_permissions_display() {
		assert_eq!(
			RegionPermissions::new(true, false, true, false).to_string(),
			"r-xp"
		);
		assert_eq!(
			RegionPermissions::new(true, true, false, true).to_string(),
			"rw-s"
		);
	}
}
