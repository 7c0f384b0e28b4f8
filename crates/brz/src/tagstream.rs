//! A MessagePack-compatible low-level tag reader.
//!
//! Unlike a full MessagePack decoder, this only reads a tag's *identity* and its immediately
//! trailing fixed-size header fields (lengths, small embedded values) — never the variable
//! payload that follows a length-prefixed tag (string bytes, binary bytes, or the N further tags
//! of an array/map). The schema-directed decoder needs the exact tag that was used, not just a
//! decoded value, so it can cross-check it against a declared field type.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, ErrorKind, Result};

/// The underlying value domain a [`Tag`] belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TagKind {
	/// No value.
	Nil,
	/// `true` or `false`.
	Bool,
	/// Signed or unsigned integer.
	Int,
	/// IEEE-754 float.
	Float,
	/// UTF-8 string.
	Str,
	/// Raw binary buffer.
	Bin,
	/// Sequence of further tags.
	List,
	/// Sequence of further key/value tag pairs.
	Map,
	/// Extension type (application-defined, type id + bytes).
	Ext,
}

/// A single MessagePack control tag and its trailing header fields.
///
/// Variants that carry a count or length (`FixStr`, `Bin8`, `Array16`, `Map32`, ...) carry it
/// widened to `u32` regardless of the wire width, since the decoder only ever needs to compare it
/// or use it as a count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tag {
	/// `0xxxxxxx`: small positive integer embedded in the tag byte.
	PosFixInt(u8),
	/// `111xxxxx`: small negative integer embedded in the tag byte (sign-extended).
	NegFixInt(i8),
	/// `1000xxxx`: map with embedded entry count.
	FixMap(u32),
	/// `1001xxxx`: array with embedded element count.
	FixArray(u32),
	/// `101xxxxx`: string with embedded byte length.
	FixStr(u32),
	/// `0xc0`.
	Nil,
	/// `0xc2`.
	False,
	/// `0xc3`.
	True,
	/// `0xc4`/`0xc5`/`0xc6`: binary buffer, length follows as u8/u16/u32.
	Bin8(u32),
	Bin16(u32),
	Bin32(u32),
	/// `0xc7`/`0xc8`/`0xc9`: extension, length + type id follow.
	Ext8(u32, i8),
	Ext16(u32, i8),
	Ext32(u32, i8),
	/// `0xca`/`0xcb`.
	Float32(f32),
	Float64(f64),
	/// `0xcc..0xcf`.
	Uint8(u8),
	Uint16(u16),
	Uint32(u32),
	Uint64(u64),
	/// `0xd0..0xd3`.
	Int8(i8),
	Int16(i16),
	Int32(i32),
	Int64(i64),
	/// `0xd4..0xd8`: fixed-length extension, only a type id follows.
	FixExt1(i8),
	FixExt2(i8),
	FixExt4(i8),
	FixExt8(i8),
	FixExt16(i8),
	/// `0xd9`/`0xda`/`0xdb`: string, length follows as u8/u16/u32.
	Str8(u32),
	Str16(u32),
	Str32(u32),
	/// `0xdc`/`0xdd`: array, count follows as u16/u32.
	Array16(u32),
	Array32(u32),
	/// `0xde`/`0xdf`: map, count follows as u16/u32.
	Map16(u32),
	Map32(u32),
}

impl Tag {
	/// The tag's name, as used in the primitive compatibility table.
	pub fn name(&self) -> &'static str {
		match self {
			Self::PosFixInt(_) => "+fixint",
			Self::NegFixInt(_) => "-fixint",
			Self::FixMap(_) => "fixmap",
			Self::FixArray(_) => "fixarray",
			Self::FixStr(_) => "fixstr",
			Self::Nil => "nil",
			Self::False => "false",
			Self::True => "true",
			Self::Bin8(_) => "bin8",
			Self::Bin16(_) => "bin16",
			Self::Bin32(_) => "bin32",
			Self::Ext8(..) => "ext8",
			Self::Ext16(..) => "ext16",
			Self::Ext32(..) => "ext32",
			Self::Float32(_) => "float32",
			Self::Float64(_) => "float64",
			Self::Uint8(_) => "uint8",
			Self::Uint16(_) => "uint16",
			Self::Uint32(_) => "uint32",
			Self::Uint64(_) => "uint64",
			Self::Int8(_) => "int8",
			Self::Int16(_) => "int16",
			Self::Int32(_) => "int32",
			Self::Int64(_) => "int64",
			Self::FixExt1(_) => "fixext1",
			Self::FixExt2(_) => "fixext2",
			Self::FixExt4(_) => "fixext4",
			Self::FixExt8(_) => "fixext8",
			Self::FixExt16(_) => "fixext16",
			Self::Str8(_) => "str8",
			Self::Str16(_) => "str16",
			Self::Str32(_) => "str32",
			Self::Array16(_) => "array16",
			Self::Array32(_) => "array32",
			Self::Map16(_) => "map16",
			Self::Map32(_) => "map32",
		}
	}

	/// The underlying value domain of this tag.
	pub fn kind(&self) -> TagKind {
		match self {
			Self::PosFixInt(_)
			| Self::NegFixInt(_)
			| Self::Uint8(_)
			| Self::Uint16(_)
			| Self::Uint32(_)
			| Self::Uint64(_)
			| Self::Int8(_)
			| Self::Int16(_)
			| Self::Int32(_)
			| Self::Int64(_) => TagKind::Int,
			Self::FixMap(_) | Self::Map16(_) | Self::Map32(_) => TagKind::Map,
			Self::FixArray(_) | Self::Array16(_) | Self::Array32(_) => TagKind::List,
			Self::FixStr(_) | Self::Str8(_) | Self::Str16(_) | Self::Str32(_) => TagKind::Str,
			Self::Nil => TagKind::Nil,
			Self::False | Self::True => TagKind::Bool,
			Self::Bin8(_) | Self::Bin16(_) | Self::Bin32(_) => TagKind::Bin,
			Self::Ext8(..)
			| Self::Ext16(..)
			| Self::Ext32(..)
			| Self::FixExt1(_)
			| Self::FixExt2(_)
			| Self::FixExt4(_)
			| Self::FixExt8(_)
			| Self::FixExt16(_) => TagKind::Ext,
			Self::Float32(_) | Self::Float64(_) => TagKind::Float,
		}
	}

	/// The declared length/count for a bin, str, list, or map tag.
	///
	/// `None` for all other tags.
	pub fn len(&self) -> Option<u32> {
		match *self {
			Self::FixMap(n)
			| Self::FixArray(n)
			| Self::FixStr(n)
			| Self::Bin8(n)
			| Self::Bin16(n)
			| Self::Bin32(n)
			| Self::Str8(n)
			| Self::Str16(n)
			| Self::Str32(n)
			| Self::Array16(n)
			| Self::Array32(n)
			| Self::Map16(n)
			| Self::Map32(n) => Some(n),
			_ => None,
		}
	}
}

/// Read the next tag from `reader`.
///
/// Advances the cursor past the tag byte and its fixed-size trailing header fields only; any
/// variable-length payload (string bytes, binary bytes, further tags of an array/map) is left for
/// the caller to read.
pub fn read_next<R: Read + ?Sized>(reader: &mut R) -> Result<Tag> {
	let byte = reader.read_u8()?;
	Ok(match byte {
		b if b & 0b1000_0000 == 0 => Tag::PosFixInt(b),
		b if b & 0b1110_0000 == 0b1110_0000 => Tag::NegFixInt(b as i8),
		b if b & 0b1111_0000 == 0b1000_0000 => Tag::FixMap(u32::from(b & 0b0000_1111)),
		b if b & 0b1111_0000 == 0b1001_0000 => Tag::FixArray(u32::from(b & 0b0000_1111)),
		b if b & 0b1110_0000 == 0b1010_0000 => Tag::FixStr(u32::from(b & 0b0001_1111)),
		0xc0 => Tag::Nil,
		0xc2 => Tag::False,
		0xc3 => Tag::True,
		0xc4 => Tag::Bin8(u32::from(reader.read_u8()?)),
		0xc5 => Tag::Bin16(u32::from(reader.read_u16::<BigEndian>()?)),
		0xc6 => Tag::Bin32(reader.read_u32::<BigEndian>()?),
		0xc7 => Tag::Ext8(u32::from(reader.read_u8()?), reader.read_i8()?),
		0xc8 => Tag::Ext16(
			u32::from(reader.read_u16::<BigEndian>()?),
			reader.read_i8()?,
		),
		0xc9 => Tag::Ext32(reader.read_u32::<BigEndian>()?, reader.read_i8()?),
		0xca => Tag::Float32(reader.read_f32::<BigEndian>()?),
		0xcb => Tag::Float64(reader.read_f64::<BigEndian>()?),
		0xcc => Tag::Uint8(reader.read_u8()?),
		0xcd => Tag::Uint16(reader.read_u16::<BigEndian>()?),
		0xce => Tag::Uint32(reader.read_u32::<BigEndian>()?),
		0xcf => Tag::Uint64(reader.read_u64::<BigEndian>()?),
		0xd0 => Tag::Int8(reader.read_i8()?),
		0xd1 => Tag::Int16(reader.read_i16::<BigEndian>()?),
		0xd2 => Tag::Int32(reader.read_i32::<BigEndian>()?),
		0xd3 => Tag::Int64(reader.read_i64::<BigEndian>()?),
		0xd4 => Tag::FixExt1(reader.read_i8()?),
		0xd5 => Tag::FixExt2(reader.read_i8()?),
		0xd6 => Tag::FixExt4(reader.read_i8()?),
		0xd7 => Tag::FixExt8(reader.read_i8()?),
		0xd8 => Tag::FixExt16(reader.read_i8()?),
		0xd9 => Tag::Str8(u32::from(reader.read_u8()?)),
		0xda => Tag::Str16(u32::from(reader.read_u16::<BigEndian>()?)),
		0xdb => Tag::Str32(reader.read_u32::<BigEndian>()?),
		0xdc => Tag::Array16(u32::from(reader.read_u16::<BigEndian>()?)),
		0xdd => Tag::Array32(reader.read_u32::<BigEndian>()?),
		0xde => Tag::Map16(u32::from(reader.read_u16::<BigEndian>()?)),
		0xdf => Tag::Map32(reader.read_u32::<BigEndian>()?),
		unknown => {
			return Err(Error::at(
				ErrorKind::Format,
				format!("unknown msgpack tag 0x{unknown:02x}"),
				&[unknown],
				0,
				8,
			))
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_pos_fixint() {
		let mut bytes: &[u8] = &[0x05];
		assert_eq!(read_next(&mut bytes).unwrap(), Tag::PosFixInt(5));
	}

	#[test]
	fn reads_neg_fixint() {
		let mut bytes: &[u8] = &[0xff];
		let tag = read_next(&mut bytes).unwrap();
		assert_eq!(tag, Tag::NegFixInt(-1));
	}

	#[test]
	fn reads_fixstr_header_without_payload() {
		let mut bytes: &[u8] = &[0xa3, b'h', b'i', b'!'];
		let tag = read_next(&mut bytes).unwrap();
		assert_eq!(tag, Tag::FixStr(3));
		assert_eq!(tag.len(), Some(3));
		// payload bytes are still in the reader
		assert_eq!(bytes, b"hi!");
	}

	#[test]
	fn reads_bin8_header_without_payload() {
		let mut bytes: &[u8] = &[0xc4, 0x02, 0xaa, 0xbb];
		let tag = read_next(&mut bytes).unwrap();
		assert_eq!(tag, Tag::Bin8(2));
		assert_eq!(bytes, &[0xaa, 0xbb]);
	}

	#[test]
	fn reads_uint16_big_endian() {
		let mut bytes: &[u8] = &[0xcd, 0x01, 0x00];
		assert_eq!(read_next(&mut bytes).unwrap(), Tag::Uint16(256));
	}

	#[test]
	fn unknown_byte_is_format_error() {
		let mut bytes: &[u8] = &[0xc1];
		let err = read_next(&mut bytes).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Format));
	}

	#[test]
	fn array_and_map_kinds() {
		assert_eq!(Tag::FixArray(3).kind(), TagKind::List);
		assert_eq!(Tag::Map16(1).kind(), TagKind::Map);
		assert_eq!(Tag::True.kind(), TagKind::Bool);
	}
}
