//! Run configuration consumed by the orchestrator.

use std::path::PathBuf;

/// Which processes a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
	/// Every process on the system (minus kernel-pid heuristics and self).
	All,
	/// An explicit set of process ids.
	Pids(Vec<libc::pid_t>),
	/// Processes whose command line, short name or executable basename
	/// contains this substring (case-insensitive).
	Name(String)
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
	/// Echo every soft skip instead of aggregating them into the summary.
	pub verbose: bool,
	/// Scan all readable regions instead of only heap/stack/anonymous
	/// mappings, and lift the large-region ceiling.
	pub scan_all_regions: bool,
	pub target: TargetSelection,
	/// Pattern file to load. `None` falls back to the default location,
	/// materializing the built-in set there if needed.
	pub pattern_file: Option<PathBuf>,
	/// Label matches with the target's command line, not just its pid.
	pub show_process_info: bool
}
impl Default for ScanConfig {
	fn default() -> Self {
		ScanConfig {
			verbose: false,
			scan_all_regions: false,
			target: TargetSelection::All,
			pattern_file: None,
			show_process_info: false
		}
	}
}
