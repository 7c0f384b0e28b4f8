//! Schema registry: parses `.schema` MessagePack documents into enum and struct tables.

mod registry;
pub mod value;

pub use registry::{EnumDef, EnumValue, PropertyDescriptor, SchemaRegistry, StructDef};
pub(crate) use registry::{flat_width, primitive_compat, TypeDomain};
