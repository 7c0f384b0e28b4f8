use std::{
	fs::{create_dir_all, File},
	io::Write,
	path::PathBuf,
};

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use tracing::info;

#[derive(Debug, Clone, Parser)]
pub struct ExtractArgs {
	/// Archive file.
	#[arg(
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub archive: PathBuf,

	/// File to extract, within the archive.
	pub path: String,

	/// Destination file on the host filesystem.
	#[arg(
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub destination: PathBuf,
}

pub(crate) fn extract(args: ExtractArgs) -> miette::Result<()> {
	info!(path=?args.archive, "open archive");
	let file = File::open(&args.archive).into_diagnostic()?;
	let mut archive = brz::archive::read_archive(file)?;

	info!(path = %args.path, "extract file");
	let content = archive.open(&args.path, brz::archive::OpenMode::Read)?;

	if let Some(dir) = args.destination.parent() {
		create_dir_all(dir).into_diagnostic()?;
	}
	let mut out = File::create(&args.destination).into_diagnostic()?;
	out.write_all(content).into_diagnostic()?;

	Ok(())
}
