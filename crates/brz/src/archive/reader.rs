//! Top-level archive reader: header, index, blobs, directory tree.

use std::{io::Read, path::Path};

use brz_support::{compression, hash, io::read_exact_vec};
use tracing::{debug, instrument};

use super::{
	directory::{self, OpenMode, Tree},
	header::{self, Header},
	index::{self, BlobEntry, Index},
};
use crate::error::{Error, ErrorKind, Result};

/// A fully-read BRZ archive: header, index, and reconstructed directory tree.
///
/// Archives are built once by [`read_archive`] and are immutable thereafter.
#[derive(Clone, Debug)]
pub struct Archive {
	/// The archive header.
	pub header: Header,
	/// The parsed index.
	pub index: Index,
	tree: Tree,
}

impl Archive {
	/// List the names of the direct children of the folder at `path`.
	pub fn ls(&self, path: &str) -> Result<Vec<String>> {
		self.tree.ls(path)
	}

	/// Returns `true` if `path` resolves to any node in the tree.
	pub fn exists(&self, path: &str) -> bool {
		self.tree.exists(path)
	}

	/// Returns `true` if `path` resolves to a folder.
	pub fn is_folder(&self, path: &str) -> Result<bool> {
		self.tree.is_folder(path)
	}

	/// Borrow the content bytes of the file at `path`.
	///
	/// In [`OpenMode::Write`], a nonexistent leaf is created as an empty in-memory file under its
	/// existing parent folder; the archive this [`Archive`] was read from is never modified.
	pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<&[u8]> {
		self.tree.open(path, mode)
	}

	/// Breadth-first walk that materializes the tree under `destination` on the host filesystem.
	pub fn dump(&self, destination: &Path) -> Result<()> {
		self.tree.dump(destination)
	}

	/// Decode the file at `path` as a schema-directed `.mps` document against `registry`.
	///
	/// `root_struct_name` selects the root struct as in [`crate::decode::unpack`]; `None` infers
	/// it from the most recently registered struct ending in `SoA`.
	pub fn decode(
		&mut self,
		path: &str,
		registry: &crate::schema::SchemaRegistry,
		root_struct_name: Option<&str>,
	) -> Result<crate::decode::Document> {
		let bytes = self.open(path, OpenMode::Read)?;
		crate::decode::unpack(bytes, registry, root_struct_name)
	}
}

/// Decompress `compressed` under `method` and verify it against `expected_hash`.
///
/// The digest is always computed over the **decompressed** payload, per the resolution of the
/// hash-domain ambiguity documented for this format: for the `none` method this is identical to
/// hashing the stored bytes, since no transformation occurred.
fn verify_and_decompress(
	method: compression::CompressionMethod,
	compressed: &[u8],
	expected_len: usize,
	expected_hash: &[u8; crate::constants::DIGEST_LEN],
) -> Result<Vec<u8>> {
	let decompressed = compression::decompress(method, compressed, expected_len)?;
	if !hash::verify(&decompressed, expected_hash) {
		return Err(Error::with_message(
			ErrorKind::Decompression,
			"file hash mismatch",
		));
	}
	if decompressed.len() != expected_len {
		return Err(Error::with_message(
			ErrorKind::Decompression,
			format!(
				"decompresses to {} bytes, but expected {}",
				decompressed.len(),
				expected_len
			),
		));
	}
	Ok(decompressed)
}

fn read_blob(source: &mut impl Read, blob: &BlobEntry, index: usize) -> Result<Vec<u8>> {
	let compressed = read_exact_vec(source, blob.compressed_len as usize)?;
	verify_and_decompress(
		blob.method,
		&compressed,
		blob.decompressed_len as usize,
		&blob.hash,
	)
	.map_err(|e| match e {
		Error::Brz { kind, message } => Error::Brz {
			kind,
			message: format!("blob {index}: {message}").into(),
		},
		other => other,
	})
}

/// Parse a BRZ archive in full: header, index, every blob, and the reconstructed directory tree.
#[instrument(level = "debug", skip(source))]
pub fn read_archive<R: Read>(mut source: R) -> Result<Archive> {
	let header = header::read_header(&mut source)?;

	let index_compressed = read_exact_vec(&mut source, header.index_compressed_len as usize)?;
	let index_decompressed = verify_and_decompress(
		header.index_compression,
		&index_compressed,
		header.index_decompressed_len as usize,
		&header.index_hash,
	)?;

	let parsed_index = index::parse_index(&index_decompressed)?;
	debug!(
		folders = parsed_index.folders.len(),
		files = parsed_index.files.len(),
		blobs = parsed_index.blobs.len(),
		"parsed index"
	);

	let mut blobs = Vec::with_capacity(parsed_index.blobs.len());
	for (i, blob) in parsed_index.blobs.iter().enumerate() {
		blobs.push(read_blob(&mut source, blob, i)?);
	}

	let tree = directory::build(&parsed_index, &index_decompressed, &blobs)?;

	Ok(Archive {
		header,
		index: parsed_index,
		tree,
	})
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use byteorder::{LittleEndian, WriteBytesExt};

	use super::*;

	fn write_header(
		out: &mut Vec<u8>,
		method: u8,
		index_bytes: &[u8],
		declen: i32,
	) -> [u8; 32] {
		let hash = *blake3::hash(index_bytes).as_bytes();
		out.extend_from_slice(b"BRZ");
		out.push(0); // version
		out.push(method);
		out.write_i32::<LittleEndian>(declen).unwrap();
		out.write_i32::<LittleEndian>(index_bytes.len() as i32)
			.unwrap();
		out.extend_from_slice(&hash);
		hash
	}

	#[test]
	fn minimal_archive_has_empty_root() {
		let mut index_bytes = Vec::new();
		index_bytes.write_i32::<LittleEndian>(0).unwrap(); // folder_count
		index_bytes.write_i32::<LittleEndian>(0).unwrap(); // file_count
		index_bytes.write_i32::<LittleEndian>(0).unwrap(); // blob_count

		let mut bytes = Vec::new();
		write_header(&mut bytes, 0, &index_bytes, index_bytes.len() as i32);
		bytes.extend_from_slice(&index_bytes);

		let archive = read_archive(Cursor::new(bytes)).unwrap();
		assert_eq!(archive.ls("/").unwrap(), Vec::<String>::new());
	}

	#[test]
	fn one_file_archive_round_trips_content() {
		let mut index_bytes = Vec::new();
		index_bytes.write_i32::<LittleEndian>(1).unwrap(); // folder_count
		index_bytes.write_i32::<LittleEndian>(1).unwrap(); // file_count
		index_bytes.write_i32::<LittleEndian>(1).unwrap(); // blob_count

		// folders: parent, name_len, name
		index_bytes.write_i32::<LittleEndian>(-1).unwrap();
		index_bytes.write_u16::<LittleEndian>(1).unwrap();
		index_bytes.extend_from_slice(b"A");

		// files: parent, content, name_len, name
		index_bytes.write_i32::<LittleEndian>(0).unwrap();
		index_bytes.write_i32::<LittleEndian>(0).unwrap();
		index_bytes.write_u16::<LittleEndian>(5).unwrap();
		index_bytes.extend_from_slice(b"B.txt");

		// blobs: method, declen, clen, hash
		let content = b"hi".to_vec();
		let content_hash = *blake3::hash(&content).as_bytes();
		index_bytes.push(0);
		index_bytes
			.write_i32::<LittleEndian>(content.len() as i32)
			.unwrap();
		index_bytes
			.write_i32::<LittleEndian>(content.len() as i32)
			.unwrap();
		index_bytes.extend_from_slice(&content_hash);

		let mut bytes = Vec::new();
		write_header(&mut bytes, 0, &index_bytes, index_bytes.len() as i32);
		bytes.extend_from_slice(&index_bytes);
		bytes.extend_from_slice(&content);

		let mut archive = read_archive(Cursor::new(bytes)).unwrap();
		assert_eq!(archive.open("/A/B.txt", OpenMode::Read).unwrap(), b"hi");
	}

	#[test]
	fn corrupted_blob_hash_is_a_decompression_error() {
		let mut index_bytes = Vec::new();
		index_bytes.write_i32::<LittleEndian>(1).unwrap();
		index_bytes.write_i32::<LittleEndian>(1).unwrap();
		index_bytes.write_i32::<LittleEndian>(1).unwrap();

		index_bytes.write_i32::<LittleEndian>(-1).unwrap();
		index_bytes.write_u16::<LittleEndian>(1).unwrap();
		index_bytes.extend_from_slice(b"A");

		index_bytes.write_i32::<LittleEndian>(0).unwrap();
		index_bytes.write_i32::<LittleEndian>(0).unwrap();
		index_bytes.write_u16::<LittleEndian>(5).unwrap();
		index_bytes.extend_from_slice(b"B.txt");

		let content = b"hi".to_vec();
		let content_hash = *blake3::hash(&content).as_bytes();
		index_bytes.push(0);
		index_bytes
			.write_i32::<LittleEndian>(content.len() as i32)
			.unwrap();
		index_bytes
			.write_i32::<LittleEndian>(content.len() as i32)
			.unwrap();
		index_bytes.extend_from_slice(&content_hash);

		let mut bytes = Vec::new();
		write_header(&mut bytes, 0, &index_bytes, index_bytes.len() as i32);
		bytes.extend_from_slice(&index_bytes);
		let mut corrupted_content = content.clone();
		corrupted_content[0] ^= 0xff;
		bytes.extend_from_slice(&corrupted_content);

		let err = read_archive(Cursor::new(bytes)).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Decompression));
	}
}
