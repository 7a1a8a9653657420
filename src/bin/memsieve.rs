use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc
};

use anyhow::Context;
use clap::Parser;
use once_cell::sync::Lazy;

use memsieve::prelude::*;

/// Scans live process memory for sensitive data patterns.
#[derive(Parser, Debug)]
#[command(name = "memsieve", version, about)]
struct Args {
	/// Enable verbose output
	#[arg(short, long)]
	verbose: bool,

	/// Comma-separated process ids to target
	#[arg(short, long, value_delimiter = ',', conflicts_with = "name")]
	pid: Vec<libc::pid_t>,

	/// Process name to target (can match multiple processes)
	#[arg(short = 'm', long)]
	name: Option<String>,

	/// Scan all memory regions, not just heap/stack/anonymous mappings
	#[arg(short, long)]
	all_memory: bool,

	/// File containing `name:regex` patterns
	#[arg(short, long)]
	regex_file: Option<std::path::PathBuf>,

	/// Label matches with process command lines
	#[arg(short = 'i', long)]
	show_info: bool
}
impl Args {
	fn into_config(self) -> ScanConfig {
		let target = if !self.pid.is_empty() {
			TargetSelection::Pids(self.pid)
		} else if let Some(name) = self.name {
			TargetSelection::Name(name)
		} else {
			TargetSelection::All
		};

		ScanConfig {
			verbose: self.verbose,
			scan_all_regions: self.all_memory,
			target,
			pattern_file: self.regex_file,
			show_process_info: self.show_info
		}
	}
}

static CANCEL: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));

extern "C" fn on_sigint(_signal: libc::c_int) {
	CANCEL.store(true, Ordering::SeqCst);
}

fn print_results(results: &[MatchRecord]) {
	if results.is_empty() {
		return;
	}

	println!();
	for record in results {
		println!("[{}] {} <- {}", record.pattern, record.matched, record.context);
	}
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	env_logger::Builder::from_default_env()
		.filter_level(if args.verbose {
			log::LevelFilter::Debug
		} else {
			log::LevelFilter::Info
		})
		.init();

	memsieve::trace::require_tracing_privilege()
		.context("cannot scan process memory without tracing privileges")?;

	let config = args.into_config();
	log::debug!("{:?}", config);

	let patterns = PatternSet::load(config.pattern_file.as_deref())
		.context("could not load patterns")?;
	log::info!("loaded {} patterns", patterns.pattern_count());

	let mut orchestrator = ScanOrchestrator::new(config, PtraceApi::new(), patterns);

	// bridge SIGINT into the cancellation flag so open attachments unwind
	// through detach before the process exits
	orchestrator.use_cancel_flag(CANCEL.clone());
	unsafe {
		libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
	}

	let outcome = orchestrator.run();

	let results = orchestrator.results();
	print_results(&results);
	println!("\nScan complete. Results: {}", orchestrator.result_count());

	match outcome {
		Ok(_) | Err(memsieve::scan::ScanError::Interrupted) => Ok(()),
		Err(err) => Err(err.into())
	}
}
