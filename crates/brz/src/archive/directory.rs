//! In-memory directory tree: folders and files, addressed by `/`-separated path.
//!
//! Nodes are stored in two flat arenas (one for folders, one for files) rather than as an
//! owned tree of boxed nodes with back-pointers to parents — this sidesteps the two-phase
//! "build by index, then resolve to references" dance the wire format's parent-index encoding
//! would otherwise force onto an owned-tree representation.

use std::{
	collections::VecDeque,
	path::{Path, PathBuf},
};

use indexmap::IndexMap;
use tracing::instrument;

use super::index::Index;
use crate::error::{Error, ErrorKind, Result};

/// Arena index of the synthetic root folder. Always `0`.
const ROOT: usize = 0;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Entry {
	Folder(usize),
	File(usize),
}

#[derive(Clone, Debug)]
struct FolderNode {
	name: String,
	parent: Option<usize>,
	children: IndexMap<String, Entry>,
}

#[derive(Clone, Debug)]
struct FileNode {
	name: String,
	parent: usize,
	content: Vec<u8>,
}

/// Where a path resolved to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Located {
	Folder(usize),
	File(usize),
}

/// How [`Tree::open`] should treat a path that doesn't already exist.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenMode {
	/// The leaf must already exist; a missing leaf is a `FileNotFound` error.
	Read,
	/// A missing leaf is created as an empty file under its existing parent folder, in memory
	/// only. The parent must already exist and be a folder.
	Write,
}

/// The in-memory directory tree of a BRZ archive.
#[derive(Clone, Debug)]
pub struct Tree {
	folders: Vec<FolderNode>,
	files: Vec<FileNode>,
}

impl Tree {
	/// Split a path into its non-empty components, stripping leading/trailing `/`.
	fn split(path: &str) -> Vec<&str> {
		path.split('/').filter(|c| !c.is_empty()).collect()
	}

	/// The parent path of `path` (everything but the last component).
	pub fn dirname(path: &str) -> String {
		let mut parts = Self::split(path);
		parts.pop();
		parts.join("/")
	}

	/// The last component of `path`, or an empty string if `path` is the root.
	pub fn basename(path: &str) -> String {
		Self::split(path).last().copied().unwrap_or("").to_string()
	}

	fn locate(&self, path: &str) -> Result<Located> {
		let mut current = Located::Folder(ROOT);
		for name in Self::split(path) {
			let folder_idx = match current {
				Located::Folder(idx) => idx,
				Located::File(_) => return Err(Error::new(ErrorKind::FileNotFound)),
			};
			match self.folders[folder_idx].children.get(name) {
				Some(Entry::Folder(idx)) => current = Located::Folder(*idx),
				Some(Entry::File(idx)) => current = Located::File(*idx),
				None => return Err(Error::new(ErrorKind::FileNotFound)),
			}
		}
		Ok(current)
	}

	/// Returns `true` if `path` resolves to any node.
	pub fn exists(&self, path: &str) -> bool {
		self.locate(path).is_ok()
	}

	/// Returns `true` if `path` resolves to a folder.
	pub fn is_folder(&self, path: &str) -> Result<bool> {
		Ok(matches!(self.locate(path)?, Located::Folder(_)))
	}

	/// List the names of the direct children of the folder at `path`.
	pub fn ls(&self, path: &str) -> Result<Vec<String>> {
		match self.locate(path)? {
			Located::Folder(idx) => Ok(self.folders[idx].children.keys().cloned().collect()),
			Located::File(_) => Err(Error::new(ErrorKind::NotAFolder)),
		}
	}

	/// Borrow the content bytes of the file at `path`.
	///
	/// In [`OpenMode::Write`], a leaf that does not already exist is created as an empty file
	/// under its existing parent folder. The new leaf lives only in this in-memory tree; nothing
	/// is ever written back to the archive the tree was built from.
	pub fn open(&mut self, path: &str, mode: OpenMode) -> Result<&[u8]> {
		let idx = match self.locate(path) {
			Ok(Located::File(idx)) => idx,
			Ok(Located::Folder(_)) => return Err(Error::new(ErrorKind::IsAFolder)),
			Err(err) if mode == OpenMode::Write && err.kind() == Some(ErrorKind::FileNotFound) => {
				self.create_leaf(path)?
			}
			Err(err) => return Err(err),
		};
		Ok(&self.files[idx].content)
	}

	/// Create a new empty file at `path`, whose parent must already exist and be a folder.
	fn create_leaf(&mut self, path: &str) -> Result<usize> {
		let parent_idx = match self.locate(&Self::dirname(path))? {
			Located::Folder(idx) => idx,
			Located::File(_) => return Err(Error::new(ErrorKind::NotAFolder)),
		};
		let name = Self::basename(path);
		let idx = self.files.len();
		self.files.push(FileNode {
			name: name.clone(),
			parent: parent_idx,
			content: Vec::new(),
		});
		self.folders[parent_idx].children.insert(name, Entry::File(idx));
		Ok(idx)
	}

	/// Breadth-first walk that materializes the tree under `destination` on the host filesystem.
	///
	/// `destination` must not already exist.
	pub fn dump(&self, destination: &Path) -> Result<()> {
		if destination.exists() {
			return Err(Error::with_message(
				ErrorKind::Format,
				format!("dump destination {} already exists", destination.display()),
			));
		}
		std::fs::create_dir(destination)?;

		let mut queue: VecDeque<(usize, PathBuf)> = VecDeque::new();
		queue.push_back((ROOT, PathBuf::new()));
		while let Some((folder_idx, rel)) = queue.pop_front() {
			for (name, entry) in &self.folders[folder_idx].children {
				let child_rel = rel.join(name);
				match *entry {
					Entry::Folder(idx) => {
						std::fs::create_dir(destination.join(&child_rel))?;
						queue.push_back((idx, child_rel));
					}
					Entry::File(idx) => {
						std::fs::write(destination.join(&child_rel), &self.files[idx].content)?;
					}
				}
			}
		}
		Ok(())
	}
}

fn resolve_parent(bytes: &[u8], raw: i32, offset: usize, folder_count: usize) -> Result<usize> {
	if raw == -1 {
		Ok(ROOT)
	} else if raw < 0 || raw as usize >= folder_count {
		Err(Error::at(
			ErrorKind::Format,
			format!("parent index {raw} does not resolve to a folder (have {folder_count})"),
			bytes,
			offset,
			8,
		))
	} else {
		// real folders sit at arena index (wire index + 1); index 0 is the synthetic root
		Ok(raw as usize + 1)
	}
}

fn insert_child(
	bytes: &[u8],
	folders: &mut [FolderNode],
	parent_idx: usize,
	name: String,
	name_offset: usize,
	entry: Entry,
) -> Result<()> {
	if folders[parent_idx].children.contains_key(&name) {
		return Err(Error::at(
			ErrorKind::Format,
			format!("folder already has a child named \"{name}\""),
			bytes,
			name_offset,
			8,
		));
	}
	folders[parent_idx].children.insert(name, entry);
	Ok(())
}

/// Reconstruct a [`Tree`] from a parsed index, the raw decompressed index bytes (for
/// diagnostics), and the already-decompressed blob bodies.
#[instrument(level = "debug", skip(index, bytes, blobs))]
pub(crate) fn build(index: &Index, bytes: &[u8], blobs: &[Vec<u8>]) -> Result<Tree> {
	let folder_count = index.folders.len();

	let mut folders = Vec::with_capacity(folder_count + 1);
	folders.push(FolderNode {
		name: String::new(),
		parent: None,
		children: IndexMap::new(),
	});
	for folder in &index.folders {
		folders.push(FolderNode {
			name: folder.name.clone(),
			parent: None,
			children: IndexMap::new(),
		});
	}

	let mut files = Vec::with_capacity(index.files.len());
	for file in &index.files {
		let content_idx = usize::try_from(file.content).ok().filter(|i| *i < blobs.len());
		let Some(content_idx) = content_idx else {
			return Err(Error::at(
				ErrorKind::Format,
				format!(
					"file \"{}\" points to nonexistent blob {}",
					file.name, file.content
				),
				bytes,
				file.content_offset,
				8,
			));
		};
		files.push(FileNode {
			name: file.name.clone(),
			parent: ROOT,
			content: blobs[content_idx].clone(),
		});
	}

	for (i, folder) in index.folders.iter().enumerate() {
		let parent_idx = resolve_parent(bytes, folder.parent, folder.parent_offset, folder_count)?;
		let arena_idx = i + 1;
		folders[arena_idx].parent = Some(parent_idx);
		let name = folders[arena_idx].name.clone();
		insert_child(
			bytes,
			&mut folders,
			parent_idx,
			name,
			folder.parent_offset,
			Entry::Folder(arena_idx),
		)?;
	}

	for (i, file) in index.files.iter().enumerate() {
		let parent_idx = resolve_parent(bytes, file.parent, file.parent_offset, folder_count)?;
		files[i].parent = parent_idx;
		let name = files[i].name.clone();
		insert_child(
			bytes,
			&mut folders,
			parent_idx,
			name,
			file.parent_offset,
			Entry::File(i),
		)?;
	}

	Ok(Tree { folders, files })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::archive::index::{BlobEntry, FileEntry, FolderEntry};
	use brz_support::compression::CompressionMethod;

	fn sample_index() -> Index {
		Index {
			folders: vec![FolderEntry {
				name: "A".into(),
				parent: -1,
				parent_offset: 0,
			}],
			files: vec![FileEntry {
				name: "B.txt".into(),
				parent: 0,
				parent_offset: 0,
				content: 0,
				content_offset: 0,
			}],
			blobs: vec![BlobEntry {
				method: CompressionMethod::None,
				decompressed_len: 2,
				compressed_len: 2,
				hash: [0; 32],
				offset: 0,
			}],
		}
	}

	#[test]
	fn builds_and_navigates() {
		let index = sample_index();
		let mut tree = build(&index, &[], &[b"hi".to_vec()]).unwrap();
		assert_eq!(tree.ls("/").unwrap(), vec!["A".to_string()]);
		assert_eq!(tree.ls("/A").unwrap(), vec!["B.txt".to_string()]);
		assert!(tree.is_folder("/A").unwrap());
		assert!(!tree.is_folder("/A/B.txt").unwrap());
		assert_eq!(tree.open("/A/B.txt", OpenMode::Read).unwrap(), b"hi");
		assert!(tree.exists("A/B.txt"));
		assert!(!tree.exists("/nope"));
	}

	#[test]
	fn opening_a_folder_as_a_file_is_an_error() {
		let mut tree = build(&sample_index(), &[], &[b"hi".to_vec()]).unwrap();
		let err = tree.open("/A", OpenMode::Read).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::IsAFolder));
	}

	#[test]
	fn opening_nonexistent_file_for_read_is_file_not_found() {
		let mut tree = build(&sample_index(), &[], &[b"hi".to_vec()]).unwrap();
		let err = tree.open("/A/nope.txt", OpenMode::Read).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::FileNotFound));
	}

	#[test]
	fn opening_nonexistent_file_for_write_creates_an_empty_leaf() {
		let mut tree = build(&sample_index(), &[], &[b"hi".to_vec()]).unwrap();
		assert_eq!(tree.open("/A/new.txt", OpenMode::Write).unwrap(), b"");
		assert!(tree.exists("/A/new.txt"));
		assert_eq!(
			tree.ls("/A").unwrap(),
			vec!["B.txt".to_string(), "new.txt".to_string()]
		);
	}

	#[test]
	fn opening_for_write_under_a_nonexistent_parent_is_file_not_found() {
		let mut tree = build(&sample_index(), &[], &[b"hi".to_vec()]).unwrap();
		let err = tree.open("/nope/new.txt", OpenMode::Write).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::FileNotFound));
	}

	#[test]
	fn opening_for_write_under_a_file_parent_is_not_a_folder() {
		let mut tree = build(&sample_index(), &[], &[b"hi".to_vec()]).unwrap();
		let err = tree.open("/A/B.txt/new.txt", OpenMode::Write).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::NotAFolder));
	}

	#[test]
	fn ls_on_a_file_is_an_error() {
		let tree = build(&sample_index(), &[], &[b"hi".to_vec()]).unwrap();
		let err = tree.ls("/A/B.txt").unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::NotAFolder));
	}

	#[test]
	fn duplicate_child_is_a_format_error() {
		let mut index = sample_index();
		index.files.push(FileEntry {
			name: "B.txt".into(),
			parent: 0,
			parent_offset: 0,
			content: 0,
			content_offset: 0,
		});
		let err = build(&index, &[], &[b"hi".to_vec()]).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Format));
	}

	#[test]
	fn dirname_and_basename() {
		assert_eq!(Tree::dirname("/A/B.txt"), "A");
		assert_eq!(Tree::basename("/A/B.txt"), "B.txt");
		assert_eq!(Tree::dirname("/A"), "");
		assert_eq!(Tree::basename("/"), "");
	}
}
