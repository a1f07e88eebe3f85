//! Main code numeral codec.
//!
//! # Responsibility
//! - Map a 3-letter main code (`AAA`..`ZZZ`) to its rank and back.
//! - Normalize user/persisted code text to canonical uppercase form.
//!
//! # Invariants
//! - Rank order equals alphabetic order: `AAA -> 0`, `AAB -> 1`,
//!   `ZZZ -> 17575`.
//! - `decode(encode(c)) == normalize_code(c)` and `encode(decode(r)) == r`.
//! - Functions here are pure and need no synchronization.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Numeral base; one digit per letter `A..Z`.
pub const BASE: u16 = 26;
/// Number of letters in every main code.
pub const CODE_LEN: usize = 3;
/// Highest valid rank (`ZZZ`), i.e. `26^3 - 1`.
pub const MAX_RANK: u16 = BASE * BASE * BASE - 1;
/// Last code in the pool.
pub const LAST_CODE: &str = "ZZZ";

/// Codec failure.
///
/// Both variants point at a defect upstream (bad input reaching the core or
/// corrupt persisted data), not at an expected runtime condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    /// Input is not exactly three letters `A-Z` after trim + uppercase.
    Format(String),
    /// Rank is outside `[0, MAX_RANK]`.
    Range(i64),
}

impl Display for CodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(value) => write!(
                f,
                "invalid main code `{value}`: expected {CODE_LEN} letters A-Z"
            ),
            Self::Range(rank) => write!(
                f,
                "main code rank {rank} is out of range 0..={MAX_RANK}"
            ),
        }
    }
}

impl Error for CodeError {}

/// Returns the canonical (trimmed, uppercase) form of a valid code.
pub fn normalize_code(code: &str) -> Result<String, CodeError> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != CODE_LEN || !normalized.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(CodeError::Format(code.to_string()));
    }
    Ok(normalized)
}

/// Converts a 3-letter code into its base-26 rank.
///
/// Leading/trailing whitespace is ignored and lowercase letters are accepted.
pub fn encode(code: &str) -> Result<u16, CodeError> {
    let normalized = normalize_code(code)?;
    Ok(normalized
        .bytes()
        .fold(0u16, |rank, letter| rank * BASE + u16::from(letter - b'A')))
}

/// Converts a rank back to its 3-letter code.
///
/// Accepts any signed integer so out-of-range arithmetic in callers is
/// reported as `CodeError::Range` instead of wrapping.
pub fn decode(rank: i64) -> Result<String, CodeError> {
    if !(0..=i64::from(MAX_RANK)).contains(&rank) {
        return Err(CodeError::Range(rank));
    }

    let mut remaining = rank as u16;
    let mut letters = [b'A'; CODE_LEN];
    for slot in letters.iter_mut().rev() {
        *slot = b'A' + (remaining % BASE) as u8;
        remaining /= BASE;
    }

    Ok(letters.iter().map(|&b| char::from(b)).collect())
}

/// Returns whether `code` is already in canonical form.
pub fn is_canonical(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| b.is_ascii_uppercase())
}
