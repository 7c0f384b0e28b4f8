//! A small recursive MessagePack value parser, used only to parse `.schema` documents.
//!
//! The data (`.mps`) documents that pair with a schema are *not* parsed with this: their bytes
//! are only interpretable schema-directed, field by field, which is what [`crate::decode`] does.
//! A `.schema` document, by contrast, is ordinary self-describing MessagePack, so it can be
//! parsed generically — on top of the same [`crate::tagstream`] tag reader rather than a second,
//! separate msgpack implementation.

use std::io::Read;

use crate::{
	error::{Error, ErrorKind, Result},
	tagstream::{self, Tag},
};

/// A generically parsed MessagePack value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Nil,
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	Bin(Vec<u8>),
	Array(Vec<Value>),
	Map(Vec<(Value, Value)>),
}

impl Value {
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Self::Array(items) => Some(items),
			_ => None,
		}
	}

	pub fn as_map(&self) -> Option<&[(Value, Value)]> {
		match self {
			Self::Map(entries) => Some(entries),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(*i),
			_ => None,
		}
	}
}

fn read_payload<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
	let mut buf = vec![0u8; len];
	reader.read_exact(&mut buf)?;
	Ok(buf)
}

fn read_str<R: Read + ?Sized>(reader: &mut R, len: u32) -> Result<String> {
	let buf = read_payload(reader, len as usize)?;
	String::from_utf8(buf)
		.map_err(|e| Error::with_message(ErrorKind::Format, format!("string is not valid UTF-8: {e}")))
}

/// Parse one value from `reader`, recursively.
pub fn read_value<R: Read + ?Sized>(reader: &mut R) -> Result<Value> {
	let tag = tagstream::read_next(reader)?;
	Ok(match tag {
		Tag::Nil => Value::Nil,
		Tag::False => Value::Bool(false),
		Tag::True => Value::Bool(true),
		Tag::PosFixInt(v) => Value::Int(i64::from(v)),
		Tag::NegFixInt(v) => Value::Int(i64::from(v)),
		Tag::Uint8(v) => Value::Int(i64::from(v)),
		Tag::Uint16(v) => Value::Int(i64::from(v)),
		Tag::Uint32(v) => Value::Int(i64::from(v)),
		Tag::Uint64(v) => i64::try_from(v)
			.map(Value::Int)
			.map_err(|_| Error::with_message(ErrorKind::Format, "integer too large to represent"))?,
		Tag::Int8(v) => Value::Int(i64::from(v)),
		Tag::Int16(v) => Value::Int(i64::from(v)),
		Tag::Int32(v) => Value::Int(i64::from(v)),
		Tag::Int64(v) => Value::Int(v),
		Tag::Float32(v) => Value::Float(f64::from(v)),
		Tag::Float64(v) => Value::Float(v),
		Tag::FixStr(len) | Tag::Str8(len) | Tag::Str16(len) | Tag::Str32(len) => {
			Value::Str(read_str(reader, len)?)
		}
		Tag::Bin8(len) | Tag::Bin16(len) | Tag::Bin32(len) => {
			Value::Bin(read_payload(reader, len as usize)?)
		}
		Tag::FixArray(count) | Tag::Array16(count) | Tag::Array32(count) => {
			let mut items = Vec::with_capacity(count as usize);
			for _ in 0..count {
				items.push(read_value(reader)?);
			}
			Value::Array(items)
		}
		Tag::FixMap(count) | Tag::Map16(count) | Tag::Map32(count) => {
			let mut entries = Vec::with_capacity(count as usize);
			for _ in 0..count {
				let key = read_value(reader)?;
				let value = read_value(reader)?;
				entries.push((key, value));
			}
			Value::Map(entries)
		}
		other => {
			return Err(Error::with_message(
				ErrorKind::Format,
				format!("unsupported tag \"{}\" in schema document", other.name()),
			))
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_nested_array_of_ints() {
		let mut bytes: &[u8] = &[0x92, 0x01, 0x02];
		let value = read_value(&mut bytes).unwrap();
		assert_eq!(value, Value::Array(vec![Value::Int(1), Value::Int(2)]));
	}

	#[test]
	fn reads_map_with_string_keys() {
		let mut bytes: &[u8] = &[0x81, 0xa1, b'a', 0x00];
		let value = read_value(&mut bytes).unwrap();
		assert_eq!(
			value,
			Value::Map(vec![(Value::Str("a".into()), Value::Int(0))])
		);
	}

	#[test]
	fn ext_tag_is_unsupported() {
		let mut bytes: &[u8] = &[0xd4, 0x01, 0xff];
		let err = read_value(&mut bytes).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Format));
	}
}
