//! Region selection policy.

use crate::map::MemoryRegion;

/// Regions smaller than this are not worth the syscall overhead.
pub const MIN_REGION_SIZE: usize = 100;
/// Regions larger than this are skipped unless a full scan is requested.
pub const MAX_REGION_SIZE: usize = 50 * 1024 * 1024;

/// Decides whether a region is worth reading.
///
/// Pure and total: no side effects, defined for every region. Without
/// `allow_full_scan` only heap, stack and anonymous mappings pass, and the
/// large-region ceiling applies.
pub fn is_scannable(region: &MemoryRegion, allow_full_scan: bool) -> bool {
	if !region.permissions.read() {
		return false;
	}

	let size = region.size();
	if size < MIN_REGION_SIZE {
		return false;
	}

	if size > MAX_REGION_SIZE && !allow_full_scan {
		return false;
	}

	if !allow_full_scan {
		let path = region.path.to_lowercase();
		return path.contains("heap") || path.contains("stack") || path.contains("[anon");
	}

	true
}

#[cfg(test)]
mod test {
	use super::{is_scannable, MAX_REGION_SIZE, MIN_REGION_SIZE};
	use crate::map::{MemoryRegion, RegionPermissions};

	fn region(size: usize, perms: RegionPermissions, path: &str) -> MemoryRegion {
		MemoryRegion {
			start: 0x1000,
			end: 0x1000 + size,
			permissions: perms,
			offset: 0,
			device: "00:00".to_string(),
			inode: 0,
			path: path.to_string()
		}
	}

	const READ: RegionPermissions = RegionPermissions::new(true, false, false, false);
	const NONE: RegionPermissions = RegionPermissions::new(false, false, false, false);

	#[test]
	fn test_rejects_unreadable() {
		assert!(!is_scannable(&region(4096, NONE, "[heap]"), false));
		assert!(!is_scannable(&region(4096, NONE, "[heap]"), true));
	}

	#[test]
	fn test_rejects_tiny() {
		assert!(!is_scannable(&region(MIN_REGION_SIZE - 1, READ, "[heap]"), false));
		assert!(!is_scannable(&region(99, READ, "[heap]"), true));
		assert!(is_scannable(&region(100, READ, "[heap]"), false));
	}

	#[test]
	fn test_rejects_oversized_unless_full_scan() {
		assert!(!is_scannable(
			&region(MAX_REGION_SIZE + 1, READ, "[heap]"),
			false
		));
		assert!(is_scannable(&region(MAX_REGION_SIZE + 1, READ, "[heap]"), true));
	}

	#[test]
	fn test_path_policy() {
		assert!(is_scannable(&region(4096, READ, "[heap]"), false));
		assert!(is_scannable(&region(4096, READ, "[stack]"), false));
		assert!(is_scannable(&region(4096, READ, "[anon:libc_malloc]"), false));
		assert!(is_scannable(&region(4096, READ, "[STACK]"), false));

		// file-backed regions only pass under a full scan
		assert!(!is_scannable(&region(4096, READ, "/bin/true"), false));
		assert!(is_scannable(&region(4096, READ, "/bin/true"), true));
		assert!(!is_scannable(&region(4096, READ, ""), false));
		assert!(is_scannable(&region(4096, READ, ""), true));
	}
}
