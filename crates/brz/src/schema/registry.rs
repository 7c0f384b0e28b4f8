//! Enum and struct registration, and `.schema` document import.

use indexmap::IndexMap;
use tracing::{debug, instrument};

use super::value::{read_value, Value};
use crate::error::{Error, ErrorKind, Result};

/// The primitive value held by one enum member.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnumValue {
	Bool(bool),
	Int(i64),
}

/// A registered enum: an ordered name → value table, all values sharing one primitive type.
#[derive(Clone, Debug)]
pub struct EnumDef {
	pub members: IndexMap<String, EnumValue>,
}

impl EnumDef {
	/// Find the symbolic name whose value equals `wire_value`, comparing as integers.
	pub fn name_for_int(&self, wire_value: i64) -> Option<&str> {
		self.members.iter().find_map(|(name, value)| match value {
			EnumValue::Int(v) if *v == wire_value => Some(name.as_str()),
			EnumValue::Bool(b) if i64::from(*b) == wire_value => Some(name.as_str()),
			_ => None,
		})
	}

	/// Find the symbolic name whose value equals `wire_value`.
	pub fn name_for_bool(&self, wire_value: bool) -> Option<&str> {
		self.members.iter().find_map(|(name, value)| match value {
			EnumValue::Bool(b) if *b == wire_value => Some(name.as_str()),
			_ => None,
		})
	}

	/// Whether this enum's members hold `bool` or `int` values.
	pub fn is_bool(&self) -> bool {
		matches!(self.members.values().next(), Some(EnumValue::Bool(_)))
	}
}

/// One struct field's declared shape.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyDescriptor {
	/// A single value of the named type.
	Value(String),
	/// A variable-length sequence of the named item type; `flat` if packed as one byte buffer.
	Array(String, bool),
	/// An associative container from key-type to value-type.
	Map(String, String),
}

/// A registered struct: an ordered field name → descriptor table.
#[derive(Clone, Debug)]
pub struct StructDef {
	pub fields: IndexMap<String, PropertyDescriptor>,
}

/// The domain a type name resolves to.
pub(crate) enum TypeDomain<'a> {
	Builtin,
	Enum(&'a EnumDef),
	Struct(&'a StructDef),
}

const BUILTIN_TYPES: &[&str] = &[
	"bool", "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64", "str", "object",
	"class",
];

/// Permitted tag names for a builtin primitive type, in declaration order, mirroring the source
/// system's compatibility table exactly (notably: `f32`/`f64` admit signed small ints too, not
/// just unsigned ones, which a literal reading of the summary table in isolation might miss).
pub(crate) fn primitive_compat(type_name: &str) -> Option<&'static [&'static str]> {
	Some(match type_name {
		"bool" => &["true", "false"],
		"u8" => &["+fixint", "uint8"],
		"u16" => &["+fixint", "uint8", "uint16"],
		"u32" => &["+fixint", "uint8", "uint16", "uint32"],
		"u64" => &["+fixint", "uint8", "uint16", "uint32", "uint64"],
		"i8" => &["+fixint", "-fixint", "int8", "uint8"],
		"i16" => &["+fixint", "-fixint", "int8", "uint8", "int16", "uint16"],
		"i32" => &[
			"+fixint", "-fixint", "int8", "uint8", "int16", "uint16", "int32", "uint32",
		],
		"i64" => &[
			"+fixint", "-fixint", "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64",
		],
		"f32" => &["+fixint", "-fixint", "int8", "int16", "uint8", "uint16", "float32"],
		"f64" => &[
			"+fixint", "-fixint", "int8", "int16", "int32", "uint8", "uint16", "uint32", "float32",
			"float64",
		],
		"str" => &["fixstr", "str8", "str16", "str32"],
		"object" | "class" => &[
			"+fixint", "-fixint", "int8", "uint8", "int16", "uint16", "int32", "uint32",
		],
		_ => return None,
	})
}

/// The fixed little-endian byte width of a builtin primitive when packed into a flat array.
///
/// `None` for `str`, which cannot appear in a flat array.
pub(crate) fn flat_width(type_name: &str) -> Option<usize> {
	Some(match type_name {
		"bool" | "u8" | "i8" => 1,
		"u16" | "i16" => 2,
		"u32" | "i32" | "f32" | "object" | "class" => 4,
		"u64" | "i64" | "f64" => 8,
		_ => return None,
	})
}

/// Accumulates enum and struct definitions parsed from one or more `.schema` documents.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
	enums: IndexMap<String, EnumDef>,
	structs: IndexMap<String, StructDef>,
}

impl SchemaRegistry {
	/// A registry with nothing registered yet.
	pub fn new() -> Self {
		Self::default()
	}

	/// Resolve a type name to the enum or struct definition it names, if it has been registered.
	pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
		self.enums.get(name)
	}

	/// Resolve a type name to the struct definition it names, if it has been registered.
	pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
		self.structs.get(name)
	}

	pub(crate) fn resolve(&self, type_name: &str) -> Option<TypeDomain<'_>> {
		if BUILTIN_TYPES.contains(&type_name) {
			Some(TypeDomain::Builtin)
		} else if let Some(def) = self.enums.get(type_name) {
			Some(TypeDomain::Enum(def))
		} else if let Some(def) = self.structs.get(type_name) {
			Some(TypeDomain::Struct(def))
		} else {
			None
		}
	}

	/// The most recently registered struct whose name ends in `SoA`.
	pub(crate) fn most_recent_soa_struct(&self) -> Option<&str> {
		self.structs
			.keys()
			.rev()
			.find(|name| name.ends_with("SoA"))
			.map(String::as_str)
	}

	/// Register a new enum. Member values must be pairwise distinct and share one primitive type.
	pub fn register_enum(
		&mut self,
		name: impl Into<String>,
		members: IndexMap<String, EnumValue>,
	) -> Result<()> {
		let name = name.into();
		if self.enums.contains_key(&name) {
			return Err(Error::with_message(
				ErrorKind::Duplicate,
				format!("enum \"{name}\" has already been registered"),
			));
		}
		if members.is_empty() {
			return Err(Error::with_message(
				ErrorKind::Value,
				format!("enum \"{name}\" has no values"),
			));
		}

		let is_bool_kind = matches!(members.values().next(), Some(EnumValue::Bool(_)));
		let mut seen = Vec::with_capacity(members.len());
		for (member_name, value) in &members {
			match (is_bool_kind, value) {
				(true, EnumValue::Bool(_)) | (false, EnumValue::Int(_)) => {}
				_ => {
					return Err(Error::with_message(
						ErrorKind::Value,
						format!(
							"enum \"{name}\" mixes value types at member \"{member_name}\""
						),
					))
				}
			}
			if seen.contains(value) {
				return Err(Error::with_message(
					ErrorKind::Value,
					format!("enum \"{name}.{member_name}\" value is already in use"),
				));
			}
			seen.push(*value);
		}

		debug!(%name, members = members.len(), "registered enum");
		self.enums.insert(name, EnumDef { members });
		Ok(())
	}

	/// Register a new struct. Every field's declared type must already resolve.
	pub fn register_struct(
		&mut self,
		name: impl Into<String>,
		fields: IndexMap<String, PropertyDescriptor>,
	) -> Result<()> {
		let name = name.into();
		if self.structs.contains_key(&name) {
			return Err(Error::with_message(
				ErrorKind::Duplicate,
				format!("struct \"{name}\" has already been registered"),
			));
		}
		if fields.is_empty() {
			return Err(Error::with_message(
				ErrorKind::Value,
				format!("struct \"{name}\" has no properties"),
			));
		}

		for (field_name, descriptor) in &fields {
			let referenced = match descriptor {
				PropertyDescriptor::Value(t) | PropertyDescriptor::Array(t, _) => vec![t.as_str()],
				PropertyDescriptor::Map(k, v) => vec![k.as_str(), v.as_str()],
			};
			for type_name in referenced {
				if self.resolve(type_name).is_none() {
					return Err(Error::with_message(
						ErrorKind::Value,
						format!(
							"struct \"{name}.{field_name}\": unknown or unregistered type \"{type_name}\""
						),
					));
				}
			}
			if let PropertyDescriptor::Map(key_type, _) = descriptor {
				let disallowed = matches!(key_type.as_str(), "object" | "class")
					|| self.structs.contains_key(key_type);
				if disallowed {
					return Err(Error::with_message(
						ErrorKind::Value,
						format!(
							"struct \"{name}.{field_name}\": key type \"{key_type}\" cannot be used as a map key"
						),
					));
				}
			}
		}

		debug!(%name, fields = fields.len(), "registered struct");
		self.structs.insert(name, StructDef { fields });
		Ok(())
	}

	/// Parse a `.schema` document and register everything it defines.
	///
	/// The root must be a 2-element array `[enums, structs]`, each a map from name to definition.
	#[instrument(level = "debug", skip(self, bytes))]
	pub fn import_schema(&mut self, bytes: &[u8]) -> Result<()> {
		let mut cursor = bytes;
		let root = read_value(&mut cursor)?;
		let items = root.as_array().ok_or_else(|| {
			Error::with_message(ErrorKind::Value, "schema root must be an array")
		})?;
		if items.len() != 2 {
			return Err(Error::with_message(
				ErrorKind::Value,
				format!("schema root must have 2 children (enums, structs), got {}", items.len()),
			));
		}

		let enums = items[0]
			.as_map()
			.ok_or_else(|| Error::with_message(ErrorKind::Value, "schema enums section must be a map"))?;
		let structs = items[1]
			.as_map()
			.ok_or_else(|| Error::with_message(ErrorKind::Value, "schema structs section must be a map"))?;

		for (name, definition) in enums {
			let name = name
				.as_str()
				.ok_or_else(|| Error::with_message(ErrorKind::Value, "enum name must be a string"))?
				.to_string();
			let members = parse_enum_members(&name, definition)?;
			self.register_enum(name, members)?;
		}

		for (name, definition) in structs {
			let name = name
				.as_str()
				.ok_or_else(|| Error::with_message(ErrorKind::Value, "struct name must be a string"))?
				.to_string();
			let fields = parse_struct_fields(&name, definition)?;
			self.register_struct(name, fields)?;
		}

		Ok(())
	}
}

fn parse_enum_members(name: &str, definition: &Value) -> Result<IndexMap<String, EnumValue>> {
	let entries = definition.as_map().ok_or_else(|| {
		Error::with_message(ErrorKind::Value, format!("enum \"{name}\" must be a map"))
	})?;
	let mut members = IndexMap::with_capacity(entries.len());
	for (member_name, value) in entries {
		let member_name = member_name.as_str().ok_or_else(|| {
			Error::with_message(ErrorKind::Value, format!("enum \"{name}\" member name must be a string"))
		})?;
		let value = if let Some(b) = value.as_bool() {
			EnumValue::Bool(b)
		} else if let Some(i) = value.as_int() {
			EnumValue::Int(i)
		} else {
			return Err(Error::with_message(
				ErrorKind::Value,
				format!("enum \"{name}.{member_name}\" value must be a bool or int"),
			));
		};
		members.insert(member_name.to_string(), value);
	}
	Ok(members)
}

fn parse_struct_fields(
	name: &str,
	definition: &Value,
) -> Result<IndexMap<String, PropertyDescriptor>> {
	let entries = definition.as_map().ok_or_else(|| {
		Error::with_message(ErrorKind::Value, format!("struct \"{name}\" must be a map"))
	})?;
	let mut fields = IndexMap::with_capacity(entries.len());
	for (field_name, value) in entries {
		let field_name = field_name.as_str().ok_or_else(|| {
			Error::with_message(ErrorKind::Value, format!("struct \"{name}\" field name must be a string"))
		})?;
		let descriptor = parse_property_descriptor(name, field_name, value)?;
		fields.insert(field_name.to_string(), descriptor);
	}
	Ok(fields)
}

fn parse_property_descriptor(
	struct_name: &str,
	field_name: &str,
	value: &Value,
) -> Result<PropertyDescriptor> {
	if let Some(type_name) = value.as_str() {
		return Ok(PropertyDescriptor::Value(type_name.to_string()));
	}

	if let Some(items) = value.as_array() {
		if items.is_empty() || items.len() > 2 {
			return Err(Error::with_message(
				ErrorKind::Value,
				format!(
					"struct \"{struct_name}.{field_name}\": array descriptor must have 1 or 2 elements"
				),
			));
		}
		let item_type = items[0].as_str().ok_or_else(|| {
			Error::with_message(
				ErrorKind::Value,
				format!("struct \"{struct_name}.{field_name}\": array item type must be a string"),
			)
		})?;
		let flat = if items.len() == 2 {
			if items[1] != Value::Nil {
				return Err(Error::with_message(
					ErrorKind::Value,
					format!(
						"struct \"{struct_name}.{field_name}\": array's 2nd element must be nil"
					),
				));
			}
			true
		} else {
			false
		};
		return Ok(PropertyDescriptor::Array(item_type.to_string(), flat));
	}

	if let Some(entries) = value.as_map() {
		if entries.len() != 1 {
			return Err(Error::with_message(
				ErrorKind::Value,
				format!(
					"struct \"{struct_name}.{field_name}\": map descriptor must have exactly 1 entry"
				),
			));
		}
		let (key, value) = &entries[0];
		let key_type = key.as_str().ok_or_else(|| {
			Error::with_message(
				ErrorKind::Value,
				format!("struct \"{struct_name}.{field_name}\": map key type must be a string"),
			)
		})?;
		let value_type = value.as_str().ok_or_else(|| {
			Error::with_message(
				ErrorKind::Value,
				format!("struct \"{struct_name}.{field_name}\": map value type must be a string"),
			)
		})?;
		return Ok(PropertyDescriptor::Map(
			key_type.to_string(),
			value_type.to_string(),
		));
	}

	Err(Error::with_message(
		ErrorKind::Value,
		format!(
			"struct \"{struct_name}.{field_name}\": property must be a string, array, or map"
		),
	))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn enum_members(pairs: &[(&str, EnumValue)]) -> IndexMap<String, EnumValue> {
		pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
	}

	fn struct_fields(pairs: &[(&str, PropertyDescriptor)]) -> IndexMap<String, PropertyDescriptor> {
		pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
	}

	#[test]
	fn registers_enum_and_resolves_name() {
		let mut registry = SchemaRegistry::new();
		registry
			.register_enum("E", enum_members(&[("X", EnumValue::Int(0)), ("Y", EnumValue::Int(1))]))
			.unwrap();
		let def = registry.enum_def("E").unwrap();
		assert_eq!(def.name_for_int(1), Some("Y"));
		assert_eq!(def.name_for_int(5), None);
	}

	#[test]
	fn duplicate_enum_is_an_error() {
		let mut registry = SchemaRegistry::new();
		registry
			.register_enum("E", enum_members(&[("X", EnumValue::Int(0))]))
			.unwrap();
		let err = registry
			.register_enum("E", enum_members(&[("Y", EnumValue::Int(1))]))
			.unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Duplicate));
	}

	#[test]
	fn mixed_type_enum_is_rejected() {
		let mut registry = SchemaRegistry::new();
		let err = registry
			.register_enum(
				"E",
				enum_members(&[("X", EnumValue::Bool(true)), ("Y", EnumValue::Int(1))]),
			)
			.unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Value));
	}

	#[test]
	fn struct_with_unknown_field_type_is_rejected() {
		let mut registry = SchemaRegistry::new();
		let err = registry
			.register_struct(
				"S",
				struct_fields(&[("x", PropertyDescriptor::Value("nope".into()))]),
			)
			.unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Value));
	}

	#[test]
	fn map_with_object_key_type_is_rejected() {
		let mut registry = SchemaRegistry::new();
		let err = registry
			.register_struct(
				"S",
				struct_fields(&[(
					"m",
					PropertyDescriptor::Map("object".into(), "u8".into()),
				)]),
			)
			.unwrap_err();
		assert_eq!(err.kind(), Some(ErrorKind::Value));
	}

	#[test]
	fn most_recent_soa_is_last_matching() {
		let mut registry = SchemaRegistry::new();
		registry
			.register_struct("Inner", struct_fields(&[("x", PropertyDescriptor::Value("u8".into()))]))
			.unwrap();
		registry
			.register_struct("FirstSoA", struct_fields(&[("x", PropertyDescriptor::Value("u8".into()))]))
			.unwrap();
		registry
			.register_struct("SecondSoA", struct_fields(&[("x", PropertyDescriptor::Value("u8".into()))]))
			.unwrap();
		assert_eq!(registry.most_recent_soa_struct(), Some("SecondSoA"));
	}

	#[test]
	fn import_schema_round_trips_minimal_document() {
		// [{"E": {"X": 0, "Y": 1}}, {"S": {"n": "u8"}}]
		let bytes: &[u8] = &[
			0x92, // fixarray 2
			0x81, b'\xa1', b'E', // fixmap 1, "E"
			0x82, b'\xa1', b'X', 0x00, b'\xa1', b'Y', 0x01, // fixmap 2: X:0, Y:1
			0x81, b'\xa1', b'S', // fixmap 1, "S"
			0x81, b'\xa1', b'n', b'\xa2', b'u', b'8', // fixmap 1: n: "u8"
		];
		let mut registry = SchemaRegistry::new();
		registry.import_schema(bytes).unwrap();
		assert!(registry.enum_def("E").is_some());
		assert!(registry.struct_def("S").is_some());
	}
}
