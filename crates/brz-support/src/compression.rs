//! Compression adapter: decompress a buffer under a named method.

use thiserror::Error;
use tracing::instrument;

/// Compression methods understood by a BRZ archive.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CompressionMethod {
	/// No compression: the stored bytes are the payload.
	None = 0,
	/// Zstandard compression.
	Zstd = 1,
}

impl CompressionMethod {
	/// Map a wire byte to a [`CompressionMethod`].
	pub fn from_wire(byte: u8) -> Option<Self> {
		match byte {
			0 => Some(Self::None),
			1 => Some(Self::Zstd),
			_ => None,
		}
	}
}

/// Errors from [`decompress`].
#[derive(Debug, Error)]
pub enum Error {
	/// The Zstandard decoder failed.
	#[error("zstd decompression failed: {0}")]
	Zstd(#[source] std::io::Error),
}

/// Decompress `compressed` under `method`, bounding the output to at most `expected_len` bytes.
///
/// For [`CompressionMethod::None`] the output is a copy of the input. For
/// [`CompressionMethod::Zstd`] a Zstandard decoder is invoked with `expected_len` as its output
/// capacity hint.
#[instrument(level = "debug", skip(compressed))]
pub fn decompress(
	method: CompressionMethod,
	compressed: &[u8],
	expected_len: usize,
) -> Result<Vec<u8>, Error> {
	match method {
		CompressionMethod::None => Ok(compressed.to_vec()),
		CompressionMethod::Zstd => {
			zstd::bulk::decompress(compressed, expected_len).map_err(Error::Zstd)
		}
	}
}
