//! Exact-length reads over a byte source.
//!
//! BRZ is read in full rather than streamed lazily, but both the archive container and the
//! schema-directed decoder need "read exactly N bytes or fail" semantics rather than the partial
//! reads `std::io::Read::read` allows.

use std::io::{self, Read};

use thiserror::Error;

/// A short read where an exact byte count was required.
#[derive(Debug, Error)]
#[error("unexpected end of stream: wanted {wanted} byte(s), got {got}")]
pub struct UnexpectedEof {
	/// Number of bytes the caller asked for.
	pub wanted: usize,
	/// Number of bytes actually available.
	pub got: usize,
}

/// Read exactly `len` bytes from `reader`, or fail with [`UnexpectedEof`].
///
/// Short reads (including a zero-byte read before `len` bytes are collected) are treated as
/// end-of-stream, matching the source implementation's `read(n)` + length-check idiom.
pub fn read_exact_vec<R: Read + ?Sized>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
	let mut buf = vec![0u8; len];
	let mut filled = 0;
	while filled < len {
		let n = reader.read(&mut buf[filled..])?;
		if n == 0 {
			return Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				UnexpectedEof {
					wanted: len,
					got: filled,
				},
			));
		}
		filled += n;
	}
	Ok(buf)
}

/// Read a fixed-size array from `reader`, or fail with [`UnexpectedEof`].
pub fn read_exact_array<R: Read + ?Sized, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
	let mut buf = [0u8; N];
	reader.read_exact(&mut buf).map_err(|e| {
		if e.kind() == io::ErrorKind::UnexpectedEof {
			io::Error::new(
				io::ErrorKind::UnexpectedEof,
				UnexpectedEof { wanted: N, got: 0 },
			)
		} else {
			e
		}
	})?;
	Ok(buf)
}
