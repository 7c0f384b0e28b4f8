//! BRZ archive header.
//!
//! The header identifies the file as a BRZ archive, names the compression method and length of
//! the compressed index, and carries the index's expected digest.

use std::io::Read;

use brz_support::compression::CompressionMethod;
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, instrument};

use crate::{
	constants::{BRZ_FORMAT_VERSION, BRZ_MAGIC, DIGEST_LEN},
	error::{Error, ErrorKind, Result},
};

/// BRZ archive header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
	/// Format version. Currently always [`BRZ_FORMAT_VERSION`].
	pub version: u8,
	/// Compression method used for the index.
	pub index_compression: CompressionMethod,
	/// Declared decompressed length of the index, in bytes.
	pub index_decompressed_len: i32,
	/// Declared compressed length of the index, in bytes.
	pub index_compressed_len: i32,
	/// Expected BLAKE3-256 digest of the decompressed index.
	pub index_hash: [u8; DIGEST_LEN],
}

/// Read and validate a [`Header`] from the start of an archive.
///
/// Bytes are accumulated into `seen` as they're read, so a validation failure anywhere in the
/// fixed-layout header can be reported with a hex snippet of everything read up to that point.
#[instrument(level = "debug", skip(reader))]
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<Header> {
	let mut seen = Vec::with_capacity(13 + DIGEST_LEN);

	let mut magic = [0u8; 3];
	reader.read_exact(&mut magic)?;
	seen.extend_from_slice(&magic);
	if magic != BRZ_MAGIC {
		return Err(Error::at(
			ErrorKind::Format,
			format!("invalid magic bytes {magic:?}, expected {BRZ_MAGIC:?}"),
			&seen,
			0,
			8,
		));
	}

	let version_offset = seen.len();
	let version = reader.read_u8()?;
	seen.push(version);
	if version != BRZ_FORMAT_VERSION {
		return Err(Error::at(
			ErrorKind::Version,
			format!("version {version} is not supported (supports: {BRZ_FORMAT_VERSION})"),
			&seen,
			version_offset,
			8,
		));
	}

	let method_offset = seen.len();
	let method_byte = reader.read_u8()?;
	seen.push(method_byte);
	let index_compression = CompressionMethod::from_wire(method_byte).ok_or_else(|| {
		Error::at(
			ErrorKind::Format,
			format!("unsupported compression method {method_byte}"),
			&seen,
			method_offset,
			8,
		)
	})?;

	let declen_offset = seen.len();
	let index_decompressed_len = reader.read_i32::<LittleEndian>()?;
	seen.extend_from_slice(&index_decompressed_len.to_le_bytes());
	if index_decompressed_len < 0 {
		return Err(Error::at(
			ErrorKind::Format,
			format!("index decompressed length is negative ({index_decompressed_len})"),
			&seen,
			declen_offset,
			8,
		));
	}

	let clen_offset = seen.len();
	let index_compressed_len = reader.read_i32::<LittleEndian>()?;
	seen.extend_from_slice(&index_compressed_len.to_le_bytes());
	if index_compressed_len < 0 {
		return Err(Error::at(
			ErrorKind::Format,
			format!("index compressed length is negative ({index_compressed_len})"),
			&seen,
			clen_offset,
			8,
		));
	}

	let mut index_hash = [0u8; DIGEST_LEN];
	reader.read_exact(&mut index_hash)?;

	let header = Header {
		version,
		index_compression,
		index_decompressed_len,
		index_compressed_len,
		index_hash,
	};
	debug!(?header, "read BRZ header");
	Ok(header)
}
