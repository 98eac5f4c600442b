use rand::Rng;

use crate::{CoreError, CoreResult};

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const RESERVATION_CODE_LEN: usize = 8;
pub const BARCODE_LEN: usize = 12;
/// Shortest code accepted by public lookups.
pub const MIN_LOOKUP_LEN: usize = 8;
/// Attempts before a code collision is reported as an internal error.
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Random upper-case base-36 string drawn from the thread-local CSPRNG.
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn reservation_code() -> String {
    generate_code(RESERVATION_CODE_LEN)
}

pub fn barcode() -> String {
    generate_code(BARCODE_LEN)
}

/// Trims and upper-cases a user supplied reservation code or barcode,
/// rejecting anything shorter than `min_len` or outside the code alphabet.
pub fn normalize_lookup_code(raw: &str, min_len: usize) -> CoreResult<String> {
    let code = raw.trim().to_uppercase();
    if code.len() < min_len {
        return Err(CoreError::Validation(format!(
            "code must have at least {} characters",
            min_len
        )));
    }
    if !code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
        return Err(CoreError::Validation(
            "code may only contain letters and digits".to_string(),
        ));
    }
    Ok(code)
}
