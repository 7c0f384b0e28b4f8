//! BRZ archive index: the directory description and blob table.

use std::io::Read;

use brz_support::compression::CompressionMethod;
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{instrument, trace};

use crate::{
	constants::DIGEST_LEN,
	error::{Error, ErrorKind, Result},
};

/// A folder entry as it appears in the index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FolderEntry {
	/// Name of this folder (no path separators).
	pub name: String,
	/// Parent folder index, or `-1` for the synthetic root.
	pub parent: i32,
	/// Byte offset of the `parent` field in the decompressed index, for diagnostics.
	pub parent_offset: usize,
}

/// A file entry as it appears in the index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileEntry {
	/// Name of this file (no path separators).
	pub name: String,
	/// Parent folder index, or `-1` for the synthetic root.
	pub parent: i32,
	/// Byte offset of the `parent` field in the decompressed index, for diagnostics.
	pub parent_offset: usize,
	/// Index into the blob table for this file's content.
	pub content: i32,
	/// Byte offset of the `content` field in the decompressed index, for diagnostics.
	pub content_offset: usize,
}

/// A blob entry as it appears in the index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlobEntry {
	/// Compression method the blob is stored under.
	pub method: CompressionMethod,
	/// Declared decompressed length, in bytes.
	pub decompressed_len: i32,
	/// Declared compressed length, in bytes.
	pub compressed_len: i32,
	/// Expected BLAKE3-256 digest of the decompressed blob.
	pub hash: [u8; DIGEST_LEN],
	/// Byte offset of this blob entry in the decompressed index, for diagnostics.
	pub offset: usize,
}

/// The parsed, decompressed archive index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Index {
	/// Folder entries, in declared order.
	pub folders: Vec<FolderEntry>,
	/// File entries, in declared order.
	pub files: Vec<FileEntry>,
	/// Blob entries, in declared order.
	pub blobs: Vec<BlobEntry>,
}

fn read_i32<R: Read + ?Sized>(reader: &mut R) -> Result<i32> {
	Ok(reader.read_i32::<LittleEndian>()?)
}

fn read_u16<R: Read + ?Sized>(reader: &mut R) -> Result<u16> {
	Ok(reader.read_u16::<LittleEndian>()?)
}

fn read_name<R: Read + ?Sized>(reader: &mut R, len: u16) -> Result<String> {
	let mut buf = vec![0u8; len as usize];
	reader.read_exact(&mut buf)?;
	String::from_utf8(buf)
		.map_err(|e| Error::with_message(ErrorKind::Format, format!("name is not valid UTF-8: {e}")))
}

/// Byte offset already consumed out of `bytes` by `reader`, a suffix slice of it.
fn offset_of(bytes: &[u8], reader: &[u8]) -> usize {
	bytes.len() - reader.len()
}

/// Parse a decompressed index buffer.
#[instrument(level = "debug", skip(bytes))]
pub fn parse_index(bytes: &[u8]) -> Result<Index> {
	let mut reader = bytes;

	let folder_count = read_i32(&mut reader)?;
	let file_count = read_i32(&mut reader)?;
	let blob_count = read_i32(&mut reader)?;
	trace!(folder_count, file_count, blob_count, "index counts");

	let folder_count = non_negative(bytes, folder_count, 0, "folder_count")?;
	let file_count = non_negative(bytes, file_count, 4, "file_count")?;
	let blob_count = non_negative(bytes, blob_count, 8, "blob_count")?;

	let folder_parent_offsets_and_values = (0..folder_count)
		.map(|_| {
			let offset = offset_of(bytes, reader);
			read_i32(&mut reader).map(|parent| (parent, offset))
		})
		.collect::<Result<Vec<_>>>()?;
	let folder_name_lens = (0..folder_count)
		.map(|_| read_u16(&mut reader))
		.collect::<Result<Vec<_>>>()?;
	let folders = folder_parent_offsets_and_values
		.into_iter()
		.zip(folder_name_lens)
		.map(|((parent, parent_offset), len)| {
			read_name(&mut reader, len).map(|name| FolderEntry {
				name,
				parent,
				parent_offset,
			})
		})
		.collect::<Result<Vec<_>>>()?;

	let file_parent_offsets_and_values = (0..file_count)
		.map(|_| {
			let offset = offset_of(bytes, reader);
			read_i32(&mut reader).map(|parent| (parent, offset))
		})
		.collect::<Result<Vec<_>>>()?;
	let file_content_offsets_and_values = (0..file_count)
		.map(|_| {
			let offset = offset_of(bytes, reader);
			read_i32(&mut reader).map(|content| (content, offset))
		})
		.collect::<Result<Vec<_>>>()?;
	let file_name_lens = (0..file_count)
		.map(|_| read_u16(&mut reader))
		.collect::<Result<Vec<_>>>()?;
	let files = file_parent_offsets_and_values
		.into_iter()
		.zip(file_content_offsets_and_values)
		.zip(file_name_lens)
		.map(|(((parent, parent_offset), (content, content_offset)), len)| {
			read_name(&mut reader, len).map(|name| FileEntry {
				name,
				parent,
				parent_offset,
				content,
				content_offset,
			})
		})
		.collect::<Result<Vec<_>>>()?;

	let mut blobs = Vec::with_capacity(blob_count);
	for _ in 0..blob_count {
		let offset = offset_of(bytes, reader);
		let method_byte = reader.read_u8()?;
		let method = CompressionMethod::from_wire(method_byte).ok_or_else(|| {
			Error::at(
				ErrorKind::Format,
				format!("unsupported blob compression method {method_byte}"),
				bytes,
				offset,
				8,
			)
		})?;
		let decompressed_len = read_i32(&mut reader)?;
		let compressed_len = read_i32(&mut reader)?;
		let mut hash = [0u8; DIGEST_LEN];
		reader.read_exact(&mut hash)?;
		blobs.push(BlobEntry {
			method,
			decompressed_len,
			compressed_len,
			hash,
			offset,
		});
	}

	Ok(Index {
		folders,
		files,
		blobs,
	})
}

fn non_negative(bytes: &[u8], n: i32, offset: usize, field: &'static str) -> Result<usize> {
	usize::try_from(n).map_err(|_| {
		Error::at(
			ErrorKind::Format,
			format!("{field} is negative ({n})"),
			bytes,
			offset,
			8,
		)
	})
}
