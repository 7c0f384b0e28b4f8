use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};

/// Read and extract BRZ game-world archives.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
	#[command(subcommand)]
	pub action: Action,

	/// Verbosity level: -v for warnings, -vv for info, -vvv for debug, -vvvv for trace.
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	pub verbose: u8,

	/// Write logs to this file (or, if a directory, a timestamped file within it) instead of stderr.
	#[arg(
		long,
		global = true,
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
	/// List the direct children of a folder in the archive.
	Ls(crate::ls::LsArgs),

	/// Extract a single file from the archive to a destination path.
	Extract(crate::extract::ExtractArgs),

	/// Unpack the entire archive tree to a destination directory.
	Dump(crate::dump::DumpArgs),
}
