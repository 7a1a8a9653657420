//! Scan orchestration across regions and processes.
//!
//! Sequences catalog, filter, attach, chunked read and match per target and
//! isolates failures so one bad process never aborts a batch. Every path
//! that attaches also detaches before moving on, including cancellation.
//!
//! Large regions are matched in independent 1 MiB windows; a fragment that
//! straddles two windows is not detected. This mirrors the reader's
//! chunking and is a deliberate recall tradeoff.

use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc
};

use thiserror::Error;

use crate::{
	config::{ScanConfig, TargetSelection},
	filter::is_scannable,
	map::{MemoryRegion, RegionCatalog},
	pattern::{MatchRecord, PatternSet},
	process::{self, ProcessInfo},
	read::{RegionReader, CHUNK_BYTES},
	trace::{AttachError, TraceApi, TraceSession}
};

/// Pids below this are skipped as likely kernel threads unless verbose
/// diagnostics are requested.
pub const KERNEL_PID_FLOOR: libc::pid_t = 10;

/// Windows shorter than this are not worth matching.
const MIN_WINDOW_BYTES: usize = 4;

#[derive(Debug, Error)]
pub enum ScanError {
	#[error("scan interrupted by user")]
	Interrupted,
	#[error("no processes found matching name: {0}")]
	NoMatch(String)
}

#[derive(Debug, Error)]
pub enum ProcessScanError {
	#[error("scan interrupted by user")]
	Interrupted,
	#[error(transparent)]
	Attach(#[from] AttachError)
}

/// Running counters for one invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
	pub regions_scanned: usize,
	pub matches_found: usize
}

/// Aggregated outcome of one batch of targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchSummary {
	pub attempted: usize,
	pub succeeded: usize,
	pub skipped_kernel: usize,
	pub permission_denied: usize
}

/// Drives the scan of one or many processes.
///
/// Exclusively owns the single [`TraceSession`], so the at-most-one
/// attachment invariant holds by construction.
pub struct ScanOrchestrator<A: TraceApi> {
	config: ScanConfig,
	session: TraceSession<A>,
	patterns: PatternSet,
	stats: ScanStats,
	cancel: Arc<AtomicBool>
}
impl<A: TraceApi> ScanOrchestrator<A> {
	pub fn new(config: ScanConfig, api: A, patterns: PatternSet) -> Self {
		ScanOrchestrator {
			config,
			session: TraceSession::new(api),
			patterns,
			stats: ScanStats::default(),
			cancel: Arc::new(AtomicBool::new(false))
		}
	}

	/// Flag that requests cancellation when set.
	///
	/// Checked between processes and between regions; tripping it unwinds
	/// through a detach of any open attachment.
	pub fn cancel_flag(&self) -> Arc<AtomicBool> {
		self.cancel.clone()
	}

	/// Replaces the cancellation flag, e.g. with one a signal handler owns.
	pub fn use_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
		self.cancel = flag;
	}

	fn cancelled(&self) -> bool {
		self.cancel.load(Ordering::SeqCst)
	}

	pub fn stats(&self) -> &ScanStats {
		&self.stats
	}

	pub fn session(&self) -> &TraceSession<A> {
		&self.session
	}

	pub fn results(&self) -> Vec<MatchRecord> {
		self.patterns.results()
	}

	pub fn result_count(&self) -> usize {
		self.patterns.result_count()
	}

	/// Runs the batch selected by the configuration.
	pub fn run(&mut self) -> Result<BatchSummary, ScanError> {
		match self.config.target.clone() {
			TargetSelection::All => self.scan_all(),
			TargetSelection::Pids(pids) => self.scan_pids(&pids),
			TargetSelection::Name(name) => self.scan_by_name(&name)
		}
	}

	/// Scans an explicit set of pids, in the given order.
	pub fn scan_pids(&mut self, pids: &[libc::pid_t]) -> Result<BatchSummary, ScanError> {
		let own_pid = std::process::id() as libc::pid_t;
		let mut summary = BatchSummary::default();

		for &pid in pids {
			if pid == own_pid {
				continue;
			}
			if self.cancelled() {
				log::info!("scan interrupted by user");
				return Err(ScanError::Interrupted);
			}

			summary.attempted += 1;
			self.attempt(pid, &mut summary)?;
		}

		self.log_summary(&summary);
		Ok(summary)
	}

	/// Scans every process whose name matches `name`.
	pub fn scan_by_name(&mut self, name: &str) -> Result<BatchSummary, ScanError> {
		let pids = process::find_by_name(name);
		if pids.is_empty() {
			return Err(ScanError::NoMatch(name.to_string()));
		}

		log::info!("found {} processes matching name: {}", pids.len(), name);
		self.scan_pids(&pids)
	}

	/// Scans all processes on the system.
	///
	/// Very low pids are skipped as a kernel-process heuristic unless
	/// verbose diagnostics are requested; the orchestrator's own process is
	/// always excluded.
	pub fn scan_all(&mut self) -> Result<BatchSummary, ScanError> {
		let pids = process::enumerate();
		log::info!("found {} processes", pids.len());

		let own_pid = std::process::id() as libc::pid_t;
		let mut summary = BatchSummary::default();

		for pid in pids {
			if pid == own_pid {
				continue;
			}
			if pid < KERNEL_PID_FLOOR && !self.config.verbose {
				summary.skipped_kernel += 1;
				continue;
			}
			if self.cancelled() {
				log::info!("scan interrupted by user");
				return Err(ScanError::Interrupted);
			}

			summary.attempted += 1;
			self.attempt(pid, &mut summary)?;
		}

		self.log_summary(&summary);
		Ok(summary)
	}

	fn attempt(&mut self, pid: libc::pid_t, summary: &mut BatchSummary) -> Result<(), ScanError> {
		match self.scan_process(pid) {
			Ok(true) => summary.succeeded += 1,
			Ok(false) => (),
			Err(ProcessScanError::Interrupted) => {
				log::info!("scan interrupted by user");
				return Err(ScanError::Interrupted);
			}
			Err(ProcessScanError::Attach(err)) => {
				if err.is_permission_denied() {
					summary.permission_denied += 1;
				}
				log::debug!("could not scan process {}: {}", pid, err);
			}
		}

		Ok(())
	}

	/// Scans one process end to end.
	///
	/// Returns `Ok(true)` only when at least one region was actually read.
	/// Whatever happens after a successful attach, the session is detached
	/// before this returns.
	pub fn scan_process(&mut self, pid: libc::pid_t) -> Result<bool, ProcessScanError> {
		let context = if self.config.show_process_info {
			let info = ProcessInfo::query(pid);
			log::info!("scanning process {} ({})", pid, info.cmdline);
			info.context_label()
		} else {
			log::debug!("scanning process {}", pid);
			pid.to_string()
		};

		let catalog = RegionCatalog::load(pid);
		if catalog.regions().is_empty() {
			log::debug!("no readable memory regions found for process {}", pid);
			return Ok(false);
		}
		log::debug!(
			"found {} memory regions in process {}",
			catalog.regions().len(),
			pid
		);

		let worklist = catalog
			.regions()
			.iter()
			.filter(|region| is_scannable(region, self.config.scan_all_regions))
			.cloned()
			.collect::<Vec<_>>();
		if worklist.is_empty() {
			log::debug!("no scannable memory regions found in process {}", pid);
			return Ok(false);
		}

		self.session.attach(pid)?;

		let result = self.scan_regions(pid, &worklist, &context);

		// always detach, whatever the region loop did
		if let Err(err) = self.session.detach() {
			log::warn!("{}", err);
		}

		result
	}

	fn scan_regions(
		&mut self,
		pid: libc::pid_t,
		worklist: &[MemoryRegion],
		context: &str
	) -> Result<bool, ProcessScanError> {
		let mut regions_read = 0;

		for (index, region) in worklist.iter().enumerate() {
			if self.cancelled() {
				return Err(ProcessScanError::Interrupted);
			}

			if self.scan_region(region, context) {
				regions_read += 1;
			}
			self.stats.regions_scanned += 1;

			if (index + 1) % 5 == 0 {
				log::debug!(
					"scanned {}/{} regions in process {}",
					index + 1,
					worklist.len(),
					pid
				);
			}
		}

		log::debug!(
			"scanned {} memory regions in process {}",
			worklist.len(),
			pid
		);
		Ok(regions_read > 0)
	}

	/// Reads and matches one region, splitting it into windows where it
	/// exceeds the chunk threshold.
	fn scan_region(&mut self, region: &MemoryRegion, context: &str) -> bool {
		log::debug!("scanning region {} ({} bytes)", region, region.size());

		let mut read_any = false;
		let mut window_start = region.start;
		while window_start < region.end {
			let window_end = region.end.min(window_start + CHUNK_BYTES);
			if self.scan_window(window_start, window_end, context) {
				read_any = true;
			}
			window_start = window_end;
		}

		let total = self.patterns.result_count();
		if total > self.stats.matches_found {
			log::info!("found {} matches so far", total);
			self.stats.matches_found = total;
		}

		read_any
	}

	fn scan_window(&mut self, start: usize, end: usize, context: &str) -> bool {
		let data = match RegionReader::new(&mut self.session).read_region(start, end) {
			Some(data) => data,
			None => return false
		};
		if data.len() < MIN_WINDOW_BYTES {
			return false;
		}

		let text = printable_text(&data);
		self.patterns.search(&text, context);

		true
	}

	fn log_summary(&self, summary: &BatchSummary) {
		log::info!(
			"successfully scanned {} out of {} attempted processes",
			summary.succeeded,
			summary.attempted
		);
		if summary.skipped_kernel > 0 {
			log::debug!("skipped {} low pid (kernel) processes", summary.skipped_kernel);
		}
		if summary.permission_denied > 0 {
			log::debug!(
				"encountered {} permission errors",
				summary.permission_denied
			);
		}
	}
}

/// Keeps only printable ASCII, which is all the text patterns can match.
fn printable_text(data: &[u8]) -> String {
	data.iter()
		.copied()
		.filter(|byte| (32..=126).contains(byte))
		.map(char::from)
		.collect()
}
