//! Error types for the archive reader, schema registry, and schema-directed decoder.

use std::borrow::Cow;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Convenience return type.
pub type Result<T> = std::result::Result<T, Error>;

/// Combined return error type for every fallible operation in this crate.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
	/// I/O error reading from the byte source.
	#[error(transparent)]
	Io(#[from] std::io::Error),

	/// Zstandard decompression error.
	#[error(transparent)]
	Compression(#[from] brz_support::compression::Error),

	/// A structural, format-level, or logic-level error.
	#[error("{kind}: {message}")]
	Brz {
		/// Error kind.
		kind: ErrorKind,
		/// Human-readable detail.
		message: Cow<'static, str>,
	},

	/// A structural error anchored to a byte offset in the archive, rendered with a hex snippet.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Source(#[from] SourceError),
}

impl Error {
	/// Build an error from a kind with its default message.
	pub fn new(kind: ErrorKind) -> Self {
		let message = kind.default_message();
		Self::Brz { kind, message }
	}

	/// Build an error from a kind with a specific message.
	pub fn with_message(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
		Self::Brz {
			kind,
			message: message.into(),
		}
	}

	/// Build an error anchored to a byte offset in `source`, with a hex snippet of the bytes
	/// around it.
	pub fn at(
		kind: ErrorKind,
		message: impl Into<Cow<'static, str>>,
		source: &[u8],
		at_byte: usize,
		context: usize,
	) -> Self {
		Self::Source(SourceError::from_source(kind, source, at_byte, context).with_message(message))
	}

	/// The [`ErrorKind`] of this error, if it is not a plain I/O or compression error.
	pub fn kind(&self) -> Option<ErrorKind> {
		match self {
			Self::Brz { kind, .. } => Some(*kind),
			Self::Source(err) => Some(err.kind),
			_ => None,
		}
	}
}

/// A structural error with a byte offset into the archive and a rendered hex snippet around it.
#[derive(Error, Diagnostic, Debug)]
#[error("{kind}: {message}")]
pub struct SourceError {
	/// Error kind.
	pub kind: ErrorKind,

	/// Human-readable detail.
	pub message: Cow<'static, str>,

	/// Byte offset of the error, in the rendered snippet.
	#[label("here")]
	pub at: SourceSpan,

	/// Hex dump of the bytes surrounding the error.
	#[source_code]
	pub snippet: String,
}

impl SourceError {
	/// New error with a hex snippet taken as-is and an offset within it.
	pub fn new(kind: ErrorKind, snippet: &[u8], at_byte: usize) -> Self {
		Self {
			kind,
			message: kind.default_message(),
			snippet: format!("{snippet:02x?}"),
			at: SourceSpan::from((
				(at_byte * 2) + 1, // to account for [
				2,                 // always 2 bytes for the hex value
			)),
		}
	}

	/// New error with a hex snippet extracted from a larger byte source, `context` bytes either
	/// side of `at_byte`.
	pub fn from_source(kind: ErrorKind, source: &[u8], at_byte: usize, context: usize) -> Self {
		let start = at_byte.saturating_sub(context);
		let end = at_byte.saturating_add(context).min(source.len());
		Self::new(kind, &source[start..end], at_byte.saturating_sub(start))
	}

	/// Change the error message.
	pub fn with_message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
		self.message = message.into();
		self
	}
}

/// Error taxonomy (see the crate-level error handling design).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
	/// Structural violation: bad magic, unknown method, out-of-range index, duplicate name,
	/// tag/type mismatch.
	Format,
	/// Unknown archive format version.
	Version,
	/// A declared length or hash did not match what was actually decoded.
	Decompression,
	/// Re-registration of an already-registered enum or struct name.
	Duplicate,
	/// A path does not resolve to any node in the directory tree.
	FileNotFound,
	/// A path that was expected to address a folder addresses a file instead.
	NotAFolder,
	/// A path that was expected to address a file addresses a folder instead.
	IsAFolder,
	/// A schema- or decode-level logic error: missing root struct, unknown enum value,
	/// disallowed map key type.
	Value,
}

impl ErrorKind {
	/// The default message for this kind, used when no more specific detail is available.
	pub fn default_message(self) -> Cow<'static, str> {
		match self {
			Self::Format => Cow::Borrowed("format error"),
			Self::Version => Cow::Borrowed("unsupported format version"),
			Self::Decompression => Cow::Borrowed("decompression error"),
			Self::Duplicate => Cow::Borrowed("duplicate registration"),
			Self::FileNotFound => Cow::Borrowed("file not found"),
			Self::NotAFolder => Cow::Borrowed("not a folder"),
			Self::IsAFolder => Cow::Borrowed("is a folder"),
			Self::Value => Cow::Borrowed("value error"),
		}
	}
}

impl std::fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Format => "format-error",
			Self::Version => "version-error",
			Self::Decompression => "decompression-error",
			Self::Duplicate => "duplicate-error",
			Self::FileNotFound => "file-not-found",
			Self::NotAFolder => "not-a-folder",
			Self::IsAFolder => "is-a-folder",
			Self::Value => "value-error",
		};
		f.write_str(name)
	}
}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Self {
		Self::new(kind)
	}
}
