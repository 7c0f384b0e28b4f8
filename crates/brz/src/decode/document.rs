//! The dynamically typed tree produced by schema-directed decoding.

use indexmap::IndexMap;

use crate::error::{Error, ErrorKind, Result};

/// A schema-directed document: leaves are primitives, branches are ordered maps or lists.
///
/// Struct fields and associative maps both decode to [`Document::Map`] — structurally, a struct
/// is just a map whose keys are known ahead of time from the schema rather than the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum Document {
	Bool(bool),
	Int(i64),
	UInt(u64),
	Float(f64),
	Str(String),
	/// A resolved enum member name.
	Symbol(String),
	List(Vec<Document>),
	Map(IndexMap<DocKey, Document>),
}

impl Document {
	pub fn as_map(&self) -> Option<&IndexMap<DocKey, Document>> {
		match self {
			Self::Map(m) => Some(m),
			_ => None,
		}
	}

	pub fn as_list(&self) -> Option<&[Document]> {
		match self {
			Self::List(items) => Some(items),
			_ => None,
		}
	}

	/// Look up a struct field or map entry by a string key.
	pub fn get(&self, key: &str) -> Option<&Document> {
		self.as_map()?.get(&DocKey::Str(key.to_string()))
	}
}

/// A primitive value usable as a map key.
///
/// Floats are keyed by bit pattern so that the type can derive `Eq`/`Hash`; this only matters for
/// maps whose declared key type is `f32`/`f64`, which schemas rarely use but the format does not
/// forbid.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocKey {
	Bool(bool),
	Int(i64),
	UInt(u64),
	FloatBits(u64),
	Str(String),
	Symbol(String),
}

impl DocKey {
	pub(crate) fn from_document(doc: Document) -> Result<Self> {
		Ok(match doc {
			Document::Bool(b) => Self::Bool(b),
			Document::Int(i) => Self::Int(i),
			Document::UInt(u) => Self::UInt(u),
			Document::Float(f) => Self::FloatBits(f.to_bits()),
			Document::Str(s) => Self::Str(s),
			Document::Symbol(s) => Self::Symbol(s),
			Document::List(_) | Document::Map(_) => {
				return Err(Error::with_message(
					ErrorKind::Value,
					"map key must decode to a primitive value",
				))
			}
		})
	}
}
