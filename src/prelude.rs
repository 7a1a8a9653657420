pub use crate::{
	config::{ScanConfig, TargetSelection},
	filter::is_scannable,
	map::{MemoryRegion, RegionCatalog, RegionPermissions},
	pattern::{MatchRecord, PatternSet},
	read::RegionReader,
	scan::{BatchSummary, ScanOrchestrator},
	trace::{ptrace::PtraceApi, TraceApi, TraceSession}
};
