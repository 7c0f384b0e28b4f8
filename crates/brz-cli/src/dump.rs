use std::path::PathBuf;

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use tracing::info;

#[derive(Debug, Clone, Parser)]
pub struct DumpArgs {
	/// Archive file.
	#[arg(
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub archive: PathBuf,

	/// Destination directory on the host filesystem.
	#[arg(
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub destination: PathBuf,
}

pub(crate) fn dump(args: DumpArgs) -> miette::Result<()> {
	info!(path=?args.archive, "open archive");
	let file = std::fs::File::open(&args.archive).into_diagnostic()?;
	let archive = brz::archive::read_archive(file)?;

	info!(destination=?args.destination, "dump tree");
	archive.dump(&args.destination)?;

	Ok(())
}
