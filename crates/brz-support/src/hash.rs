//! Hash verifier: BLAKE3-256 of a buffer, checked against an expected digest.

/// Length in bytes of a BRZ content digest.
pub const DIGEST_LEN: usize = 32;

/// Compute the BLAKE3-256 digest of `data`.
pub fn digest(data: &[u8]) -> [u8; DIGEST_LEN] {
	*blake3::hash(data).as_bytes()
}

/// Returns `true` if `data`'s BLAKE3-256 digest equals `expected`.
pub fn verify(data: &[u8], expected: &[u8; DIGEST_LEN]) -> bool {
	&digest(data) == expected
}
