/// Magic bytes at the start of every BRZ archive.
pub const BRZ_MAGIC: [u8; 3] = *b"BRZ";

/// The only format version understood by this crate.
pub const BRZ_FORMAT_VERSION: u8 = 0;

/// Length in bytes of a stored content digest (BLAKE3-256).
pub const DIGEST_LEN: usize = brz_support::hash::DIGEST_LEN;
