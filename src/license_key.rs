//! License key generation and format checks.
//!
//! Keys are 16 characters from a restricted alphabet, grouped into four
//! hyphen-separated segments of four: `XXXX-XXXX-XXXX-XXXX`.
//!
//! The alphabet drops characters that are easy to misread when a key is
//! typed from a receipt or an e-mail: `I`, `O`, `0` and `1`.
//!
//! # Example
//!
//! ```
//! use keysmith::license_key::{generate_license_key, is_valid_key_format};
//!
//! let key = generate_license_key();
//! assert!(is_valid_key_format(&key));
//! assert_eq!(key.len(), 19);
//! ```

use rand::Rng;

/// Character set for license key generation.
pub const LICENSE_KEY_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of hyphen-separated segments in a key.
pub const KEY_SEGMENTS: usize = 4;

/// Characters per segment.
pub const KEY_SEGMENT_LENGTH: usize = 4;

/// Generate a single segment of random characters.
fn generate_segment<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..LICENSE_KEY_CHARSET.len());
            LICENSE_KEY_CHARSET[idx] as char
        })
        .collect()
}

/// Generate a license key using the given random source.
pub fn generate_license_key_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let segments: Vec<String> = (0..KEY_SEGMENTS)
        .map(|_| generate_segment(rng, KEY_SEGMENT_LENGTH))
        .collect();

    segments.join("-")
}

/// Generate a license key from the thread-local random source.
///
/// Uniqueness is not checked here; the store's primary key rejects
/// a colliding insert.
pub fn generate_license_key() -> String {
    generate_license_key_with(&mut rand::rng())
}

/// Check that a key has four segments of four characters from the charset.
pub fn is_valid_key_format(key: &str) -> bool {
    let segments: Vec<&str> = key.split('-').collect();
    if segments.len() != KEY_SEGMENTS {
        return false;
    }

    segments.iter().all(|segment| {
        segment.len() == KEY_SEGMENT_LENGTH
            && segment.bytes().all(|b| LICENSE_KEY_CHARSET.contains(&b))
    })
}
