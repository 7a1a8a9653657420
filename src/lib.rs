//! Live process memory scanner for sensitive data patterns.
//!
//! This library attaches to running processes with ptrace, walks their mapped
//! memory regions, extracts readable bytes in bounded chunks and runs the
//! decoded text through a set of named regex patterns with per-pattern
//! deduplication.
//!
//! The central correctness property is that a trace attachment is never
//! leaked: every path out of a per-process scan, including errors and
//! cancellation, detaches before moving on.

pub mod config;
pub mod filter;
pub mod map;
pub mod pattern;
pub mod process;
pub mod read;
pub mod scan;
pub mod trace;

pub mod prelude;
