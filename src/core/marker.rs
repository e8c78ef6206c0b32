//! Ciphertext marker convention.
//!
//! A stored string is ciphertext iff it ends with [`CIPHERTEXT_MARKER`] and has
//! a non-empty body before it. Everything else (including null, the empty
//! string and the bare marker itself) is plaintext.
//!
//! Limitation: a plaintext that ends with the marker after a non-empty prefix
//! is indistinguishable from ciphertext. Loading such a value fails with a
//! decryption error instead of being passed through.

use crate::core::constants::CIPHERTEXT_MARKER;

/// Whether `value` carries the ciphertext marker.
pub fn is_sealed(value: &str) -> bool {
    unseal(value).is_some()
}

/// Append the marker to raw ciphertext.
pub fn seal(ciphertext: &str) -> String {
    let mut sealed = String::with_capacity(ciphertext.len() + CIPHERTEXT_MARKER.len());
    sealed.push_str(ciphertext);
    sealed.push_str(CIPHERTEXT_MARKER);
    sealed
}

/// Strip the marker, returning the raw ciphertext body.
///
/// Returns `None` when `value` is not sealed.
pub fn unseal(value: &str) -> Option<&str> {
    value
        .strip_suffix(CIPHERTEXT_MARKER)
        .filter(|body| !body.is_empty())
}

/// Null and empty values are never encrypted or decrypted.
pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}
