//! Schema-directed decoding of `.mps` data documents into a dynamic [`Document`] tree.

mod decoder;
mod document;

pub use decoder::unpack;
pub use document::{DocKey, Document};
