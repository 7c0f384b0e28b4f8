use std::{fs::File, path::PathBuf};

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use tracing::info;

#[derive(Debug, Clone, Parser)]
pub struct LsArgs {
	/// Archive file.
	#[arg(
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
	)]
	pub archive: PathBuf,

	/// Folder to list, within the archive.
	#[arg(default_value = "/")]
	pub path: String,

	/// Indicate folders with a trailing '/'.
	#[arg(long)]
	pub decorate: bool,
}

pub(crate) fn ls(args: LsArgs) -> miette::Result<()> {
	info!(path=?args.archive, "open archive");
	let file = File::open(&args.archive).into_diagnostic()?;
	let archive = brz::archive::read_archive(file)?;

	info!(folder = %args.path, "list children");
	for name in archive.ls(&args.path)? {
		print!("{name}");
		if args.decorate {
			let child = if args.path.ends_with('/') {
				format!("{}{name}", args.path)
			} else {
				format!("{}/{name}", args.path)
			};
			if archive.is_folder(&child)? {
				print!("/");
			}
		}
		println!();
	}

	Ok(())
}
