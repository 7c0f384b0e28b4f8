//! Schema-directed decoding of a `.mps` tag stream into a [`Document`] tree.
//!
//! The source drives this traversal with a work queue that has directives inserted at its front,
//! which is an implementation detail of achieving declared-order depth-first emission — the
//! same order falls out of direct recursion, which is what this does instead.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use tracing::{instrument, trace};

use super::document::{DocKey, Document};
use crate::{
	error::{Error, ErrorKind, Result},
	schema::{flat_width, primitive_compat, PropertyDescriptor, SchemaRegistry, StructDef, TypeDomain},
	tagstream::{self, Tag, TagKind},
};

/// Decode a `.mps` tag stream against `registry`, starting from the named or inferred root
/// struct.
///
/// If `root_struct_name` is `None`, the most recently registered struct whose name ends in `SoA`
/// is used.
#[instrument(level = "debug", skip(source, registry))]
pub fn unpack<R: Read>(
	mut source: R,
	registry: &SchemaRegistry,
	root_struct_name: Option<&str>,
) -> Result<Document> {
	let struct_def = match root_struct_name {
		Some(name) => registry.struct_def(name).ok_or_else(|| {
			Error::with_message(ErrorKind::Value, format!("root struct \"{name}\" not registered"))
		})?,
		None => {
			let name = registry.most_recent_soa_struct().ok_or_else(|| {
				Error::with_message(
					ErrorKind::Value,
					"could not find a root struct registered with a name ending in \"SoA\"",
				)
			})?;
			registry
				.struct_def(name)
				.expect("most_recent_soa_struct only returns registered names")
		}
	};
	decode_struct(&mut source, registry, struct_def)
}

fn decode_struct<R: Read + ?Sized>(
	reader: &mut R,
	registry: &SchemaRegistry,
	struct_def: &StructDef,
) -> Result<Document> {
	let mut map = IndexMap::with_capacity(struct_def.fields.len());
	for (name, descriptor) in &struct_def.fields {
		trace!(field = %name, "decoding struct field");
		let value = decode_property(reader, registry, descriptor)?;
		map.insert(DocKey::Str(name.clone()), value);
	}
	Ok(Document::Map(map))
}

fn decode_property<R: Read + ?Sized>(
	reader: &mut R,
	registry: &SchemaRegistry,
	descriptor: &PropertyDescriptor,
) -> Result<Document> {
	match descriptor {
		PropertyDescriptor::Value(type_name) => decode_value(reader, registry, type_name),
		PropertyDescriptor::Array(type_name, true) => decode_flat_array(reader, registry, type_name),
		PropertyDescriptor::Array(type_name, false) => decode_array(reader, registry, type_name),
		PropertyDescriptor::Map(key_type, value_type) => {
			decode_map(reader, registry, key_type, value_type)
		}
	}
}

fn decode_value<R: Read + ?Sized>(
	reader: &mut R,
	registry: &SchemaRegistry,
	type_name: &str,
) -> Result<Document> {
	match registry.resolve(type_name) {
		Some(TypeDomain::Builtin) => decode_builtin_value(reader, type_name),
		Some(TypeDomain::Enum(def)) => {
			let tag = tagstream::read_next(reader)?;
			if def.is_bool() {
				let value = tag_as_bool(&tag).ok_or_else(|| {
					Error::with_message(
						ErrorKind::Format,
						format!("enum \"{type_name}\" expected a bool tag, got \"{}\"", tag.name()),
					)
				})?;
				let name = def.name_for_bool(value).ok_or_else(|| {
					Error::with_message(
						ErrorKind::Value,
						format!("no member of enum \"{type_name}\" has value {value}"),
					)
				})?;
				Ok(Document::Symbol(name.to_string()))
			} else {
				let value = tag_as_i64(&tag).ok_or_else(|| {
					Error::with_message(
						ErrorKind::Format,
						format!("enum \"{type_name}\" expected an int tag, got \"{}\"", tag.name()),
					)
				})?;
				let name = def.name_for_int(value).ok_or_else(|| {
					Error::with_message(
						ErrorKind::Value,
						format!("no member of enum \"{type_name}\" has value {value}"),
					)
				})?;
				Ok(Document::Symbol(name.to_string()))
			}
		}
		Some(TypeDomain::Struct(def)) => decode_struct(reader, registry, def),
		None => Err(Error::with_message(
			ErrorKind::Value,
			format!("unknown or unregistered type \"{type_name}\""),
		)),
	}
}

fn decode_builtin_value<R: Read + ?Sized>(reader: &mut R, type_name: &str) -> Result<Document> {
	let tag = tagstream::read_next(reader)?;
	let permitted = primitive_compat(type_name)
		.ok_or_else(|| Error::with_message(ErrorKind::Value, format!("unknown primitive type \"{type_name}\"")))?;
	if !permitted.contains(&tag.name()) {
		return Err(Error::with_message(
			ErrorKind::Format,
			format!(
				"expected a tag compatible with \"{type_name}\", got \"{}\"",
				tag.name()
			),
		));
	}

	if type_name == "str" {
		let len = tag.len().expect("str-kind tags always carry a length");
		let mut buf = vec![0u8; len as usize];
		reader.read_exact(&mut buf)?;
		let s = String::from_utf8(buf)
			.map_err(|e| Error::with_message(ErrorKind::Format, format!("string is not valid UTF-8: {e}")))?;
		return Ok(Document::Str(s));
	}

	builtin_tag_to_document(&tag, type_name)
}

fn builtin_tag_to_document(tag: &Tag, type_name: &str) -> Result<Document> {
	let unrepresentable = || {
		Error::with_message(
			ErrorKind::Format,
			format!("tag \"{}\" could not be read as a \"{type_name}\" value", tag.name()),
		)
	};
	Ok(match type_name {
		"bool" => Document::Bool(tag_as_bool(tag).ok_or_else(unrepresentable)?),
		"u8" | "u16" | "u32" | "u64" => Document::UInt(tag_as_u64(tag).ok_or_else(unrepresentable)?),
		"i8" | "i16" | "i32" | "i64" | "object" | "class" => {
			Document::Int(tag_as_i64(tag).ok_or_else(unrepresentable)?)
		}
		"f32" | "f64" => Document::Float(tag_as_f64(tag).ok_or_else(unrepresentable)?),
		_ => return Err(unrepresentable()),
	})
}

fn tag_as_bool(tag: &Tag) -> Option<bool> {
	match tag {
		Tag::False => Some(false),
		Tag::True => Some(true),
		_ => None,
	}
}

fn tag_as_u64(tag: &Tag) -> Option<u64> {
	match *tag {
		Tag::PosFixInt(v) => Some(u64::from(v)),
		Tag::Uint8(v) => Some(u64::from(v)),
		Tag::Uint16(v) => Some(u64::from(v)),
		Tag::Uint32(v) => Some(u64::from(v)),
		Tag::Uint64(v) => Some(v),
		_ => None,
	}
}

fn tag_as_i64(tag: &Tag) -> Option<i64> {
	match *tag {
		Tag::PosFixInt(v) => Some(i64::from(v)),
		Tag::NegFixInt(v) => Some(i64::from(v)),
		Tag::Uint8(v) => Some(i64::from(v)),
		Tag::Uint16(v) => Some(i64::from(v)),
		Tag::Uint32(v) => Some(i64::from(v)),
		Tag::Int8(v) => Some(i64::from(v)),
		Tag::Int16(v) => Some(i64::from(v)),
		Tag::Int32(v) => Some(i64::from(v)),
		Tag::Int64(v) => Some(v),
		_ => None,
	}
}

fn tag_as_f64(tag: &Tag) -> Option<f64> {
	match *tag {
		Tag::PosFixInt(v) => Some(f64::from(v)),
		Tag::NegFixInt(v) => Some(f64::from(v)),
		Tag::Uint8(v) => Some(f64::from(v)),
		Tag::Uint16(v) => Some(f64::from(v)),
		Tag::Uint32(v) => Some(f64::from(v)),
		Tag::Int8(v) => Some(f64::from(v)),
		Tag::Int16(v) => Some(f64::from(v)),
		Tag::Int32(v) => Some(f64::from(v)),
		Tag::Float32(v) => Some(f64::from(v)),
		Tag::Float64(v) => Some(v),
		_ => None,
	}
}

fn decode_array<R: Read + ?Sized>(
	reader: &mut R,
	registry: &SchemaRegistry,
	item_type: &str,
) -> Result<Document> {
	let tag = tagstream::read_next(reader)?;
	if tag.kind() != TagKind::List {
		return Err(Error::with_message(
			ErrorKind::Format,
			format!("expected an array tag, got \"{}\"", tag.name()),
		));
	}
	let count = tag.len().expect("list-kind tags always carry a count");
	let mut items = Vec::with_capacity(count as usize);
	for _ in 0..count {
		items.push(decode_value(reader, registry, item_type)?);
	}
	Ok(Document::List(items))
}

fn decode_map<R: Read + ?Sized>(
	reader: &mut R,
	registry: &SchemaRegistry,
	key_type: &str,
	value_type: &str,
) -> Result<Document> {
	let tag = tagstream::read_next(reader)?;
	if tag.kind() != TagKind::Map {
		return Err(Error::with_message(
			ErrorKind::Format,
			format!("expected a map tag, got \"{}\"", tag.name()),
		));
	}
	let count = tag.len().expect("map-kind tags always carry a count");
	let mut map = IndexMap::with_capacity(count as usize);
	for _ in 0..count {
		let key_doc = decode_value(reader, registry, key_type)?;
		let key = DocKey::from_document(key_doc)?;
		let value_doc = decode_value(reader, registry, value_type)?;
		map.insert(key, value_doc);
	}
	Ok(Document::Map(map))
}

fn decode_flat_array<R: Read + ?Sized>(
	reader: &mut R,
	registry: &SchemaRegistry,
	item_type: &str,
) -> Result<Document> {
	let tag = tagstream::read_next(reader)?;
	if tag.kind() != TagKind::Bin {
		return Err(Error::with_message(
			ErrorKind::Format,
			format!("expected a flat array's bin tag, got \"{}\"", tag.name()),
		));
	}
	let byte_len = tag.len().expect("bin-kind tags always carry a length") as usize;
	let stride = flat_element_width(registry, item_type)?;
	if stride == 0 || byte_len % stride != 0 {
		return Err(Error::with_message(
			ErrorKind::Format,
			format!(
				"flat array of {byte_len} bytes is not evenly divisible by element stride {stride}"
			),
		));
	}
	let count = byte_len / stride;

	let mut payload = vec![0u8; byte_len];
	reader.read_exact(&mut payload)?;
	let mut cursor = payload.as_slice();

	let mut items = Vec::with_capacity(count);
	for _ in 0..count {
		items.push(decode_flat_element(&mut cursor, registry, item_type)?);
	}
	Ok(Document::List(items))
}

/// Byte width of `type_name` when packed as a flat array element.
///
/// Enum fields are always 8 bytes (unsigned 64-bit), regardless of the enum's declared member
/// type — reproducing the quirk of the system this format comes from.
fn flat_element_width(registry: &SchemaRegistry, type_name: &str) -> Result<usize> {
	match registry.resolve(type_name) {
		Some(TypeDomain::Enum(_)) => Ok(8),
		Some(TypeDomain::Builtin) => flat_width(type_name).ok_or_else(|| {
			Error::with_message(
				ErrorKind::Format,
				format!("type \"{type_name}\" is not valid in a flat array"),
			)
		}),
		Some(TypeDomain::Struct(def)) => {
			let mut total = 0;
			for (field_name, descriptor) in &def.fields {
				match descriptor {
					PropertyDescriptor::Value(t) => total += flat_element_width(registry, t)?,
					_ => {
						return Err(Error::with_message(
							ErrorKind::Format,
							format!(
								"struct \"{type_name}.{field_name}\" used as a flat array element must be fully flat"
							),
						))
					}
				}
			}
			Ok(total)
		}
		None => Err(Error::with_message(
			ErrorKind::Value,
			format!("unknown or unregistered type \"{type_name}\""),
		)),
	}
}

/// Read one flat-array element from `cursor`, raw — enum elements are *not* resolved to their
/// symbolic name here, matching the source's flat-array behavior.
fn decode_flat_element(
	cursor: &mut &[u8],
	registry: &SchemaRegistry,
	type_name: &str,
) -> Result<Document> {
	match registry.resolve(type_name) {
		Some(TypeDomain::Enum(_)) => Ok(Document::UInt(cursor.read_u64::<LittleEndian>()?)),
		Some(TypeDomain::Builtin) => decode_flat_scalar(cursor, type_name),
		Some(TypeDomain::Struct(def)) => {
			let mut map = IndexMap::with_capacity(def.fields.len());
			for (field_name, descriptor) in &def.fields {
				let field_type = match descriptor {
					PropertyDescriptor::Value(t) => t,
					_ => {
						return Err(Error::with_message(
							ErrorKind::Format,
							format!("struct field \"{field_name}\" used as a flat element must be a plain value"),
						))
					}
				};
				let value = decode_flat_element(cursor, registry, field_type)?;
				map.insert(DocKey::Str(field_name.clone()), value);
			}
			Ok(Document::Map(map))
		}
		None => Err(Error::with_message(
			ErrorKind::Value,
			format!("unknown or unregistered type \"{type_name}\""),
		)),
	}
}

fn decode_flat_scalar(cursor: &mut &[u8], type_name: &str) -> Result<Document> {
	Ok(match type_name {
		"bool" => Document::Bool(cursor.read_u8()? != 0),
		"u8" => Document::UInt(u64::from(cursor.read_u8()?)),
		"u16" => Document::UInt(u64::from(cursor.read_u16::<LittleEndian>()?)),
		"u32" => Document::UInt(u64::from(cursor.read_u32::<LittleEndian>()?)),
		"u64" => Document::UInt(cursor.read_u64::<LittleEndian>()?),
		"i8" => Document::Int(i64::from(cursor.read_i8()?)),
		"i16" => Document::Int(i64::from(cursor.read_i16::<LittleEndian>()?)),
		"i32" | "object" | "class" => Document::Int(i64::from(cursor.read_i32::<LittleEndian>()?)),
		"i64" => Document::Int(cursor.read_i64::<LittleEndian>()?),
		"f32" => Document::Float(f64::from(cursor.read_f32::<LittleEndian>()?)),
		"f64" => Document::Float(cursor.read_f64::<LittleEndian>()?),
		_ => {
			return Err(Error::with_message(
				ErrorKind::Format,
				format!("type \"{type_name}\" is not valid in a flat array"),
			))
		}
	})
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use indexmap::indexmap;

	use super::*;
	use crate::schema::EnumValue;

	fn registry_for_scenario_4() -> SchemaRegistry {
		let mut registry = SchemaRegistry::new();
		registry
			.register_enum(
				"E",
				indexmap! { "X".to_string() => EnumValue::Int(0), "Y".to_string() => EnumValue::Int(1) },
			)
			.unwrap();
		registry
			.register_struct(
				"RootSoA",
				indexmap! {
					"n".to_string() => PropertyDescriptor::Value("u16".to_string()),
					"xs".to_string() => PropertyDescriptor::Array("u16".to_string(), true),
					"e".to_string() => PropertyDescriptor::Value("E".to_string()),
				},
			)
			.unwrap();
		registry
	}

	#[test]
	fn scenario_4_schema_decode() {
		let registry = registry_for_scenario_4();
		let bytes: &[u8] = &[
			0xcd, 0x00, 0x03, // uint16 3
			0xc4, 0x06, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, // bin8 len=6, LE u16 1,2,3
			0x01, // +fixint 1 -> E::Y
		];
		let doc = unpack(Cursor::new(bytes), &registry, None).unwrap();
		let map = doc.as_map().unwrap();
		assert_eq!(map.get(&DocKey::Str("n".into())), Some(&Document::UInt(3)));
		assert_eq!(
			map.get(&DocKey::Str("xs".into())),
			Some(&Document::List(vec![
				Document::UInt(1),
				Document::UInt(2),
				Document::UInt(3)
			]))
		);
		assert_eq!(
			map.get(&DocKey::Str("e".into())),
			Some(&Document::Symbol("Y".into()))
		);
	}

	#[test]
	fn scenario_5_map_decode() {
		let mut registry = SchemaRegistry::new();
		registry
			.register_struct(
				"CfgSoA",
				indexmap! {
					"m".to_string() => PropertyDescriptor::Map("str".to_string(), "u8".to_string()),
				},
			)
			.unwrap();
		let bytes: &[u8] = &[
			0x82, // fixmap 2
			0xa1, b'a', 0x01, // "a": 1
			0xa1, b'b', 0x02, // "b": 2
		];
		let doc = unpack(Cursor::new(bytes), &registry, None).unwrap();
		let m = doc.get("m").unwrap().as_map().unwrap();
		assert_eq!(m.get(&DocKey::Str("a".into())), Some(&Document::UInt(1)));
		assert_eq!(m.get(&DocKey::Str("b".into())), Some(&Document::UInt(2)));
	}

	#[test]
	fn incompatible_tag_is_a_format_error() {
		let mut registry = SchemaRegistry::new();
		registry
			.register_struct(
				"RootSoA",
				indexmap! { "n".to_string() => PropertyDescriptor::Value("u8".to_string()) },
			)
			.unwrap();
		let bytes: &[u8] = &[0xa1, b'x']; // fixstr, not an int
		let err = unpack(Cursor::new(bytes), &registry, None).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Format));
	}

	#[test]
	fn unknown_enum_value_is_a_value_error() {
		let mut registry = SchemaRegistry::new();
		registry
			.register_enum("E", indexmap! { "X".to_string() => EnumValue::Int(0) })
			.unwrap();
		registry
			.register_struct(
				"RootSoA",
				indexmap! { "e".to_string() => PropertyDescriptor::Value("E".to_string()) },
			)
			.unwrap();
		let bytes: &[u8] = &[0x05]; // +fixint 5, not in enum
		let err = unpack(Cursor::new(bytes), &registry, None).unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Value));
	}

	#[test]
	fn explicit_root_struct_name_is_honored() {
		let mut registry = SchemaRegistry::new();
		registry
			.register_struct(
				"Other",
				indexmap! { "n".to_string() => PropertyDescriptor::Value("u8".to_string()) },
			)
			.unwrap();
		let bytes: &[u8] = &[0x07];
		let doc = unpack(Cursor::new(bytes), &registry, Some("Other")).unwrap();
		assert_eq!(doc.get("n"), Some(&Document::UInt(7)));
	}
}
