//! Fractional sort-key allocation.
//!
//! Keys are strings over [`SORT_KEY_DIGITS`] (base 62, ASCII ordered) read as
//! the digits of a fraction in `[0, 1)`. A new key between `lower` and `upper`
//! is built digit by digit:
//!
//! - equal digits are copied and the walk continues;
//! - digits one apart leave no room at this position, so the lower digit is
//!   copied and the upper bound opens up (any suffix now stays below `upper`);
//! - digits further apart yield their midpoint, which ends the key.
//!
//! A missing lower bound reads as digit 0 everywhere; a missing (or opened)
//! upper bound reads as one past the largest digit. Every generated key ends
//! in a midpoint digit, which is never 0, so there is always room below any
//! generated key and no existing key ever has to be rewritten.

use thiserror::Error;

use crate::constants::{FIRST_SORT_KEY, SORT_KEY_DIGITS};

const BASE: u8 = SORT_KEY_DIGITS.len() as u8;

/// Sort-key allocation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SortKeyError {
    /// Key contains a byte outside the digit alphabet
    #[error("invalid sort key {0:?}")]
    InvalidKey(String),

    /// Bounds are not strictly ordered
    #[error("sort key bounds out of order: {lower:?} >= {upper:?}")]
    OutOfOrder {
        /// Lower bound
        lower: String,
        /// Upper bound
        upper: String,
    },

    /// Nothing sorts below the upper bound (it is empty or all zero digits)
    #[error("no sort key fits below {0:?}")]
    NoRoom(String),
}

fn digit_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'Z' => Some(byte - b'A' + 10),
        b'a'..=b'z' => Some(byte - b'a' + 36),
        _ => None,
    }
}

fn digits(key: &str) -> Result<Vec<u8>, SortKeyError> {
    key.bytes()
        .map(digit_value)
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| SortKeyError::InvalidKey(key.to_string()))
}

/// Check that `key` only uses the sort-key alphabet
pub fn validate_key(key: &str) -> Result<(), SortKeyError> {
    if key.is_empty() {
        return Err(SortKeyError::InvalidKey(key.to_string()));
    }
    digits(key).map(|_| ())
}

/// Key for the first child of an empty sibling list
pub fn first_key() -> String {
    FIRST_SORT_KEY.to_string()
}

/// Allocate a key strictly between `lower` and `upper`.
///
/// `None` stands for the open end on that side.
pub fn key_between(lower: Option<&str>, upper: Option<&str>) -> Result<String, SortKeyError> {
    let lo = match lower {
        Some(key) => digits(key)?,
        None => Vec::new(),
    };
    let hi = match upper {
        Some(key) => Some(digits(key)?),
        None => None,
    };

    if let (Some(l), Some(u)) = (lower, upper) {
        if l >= u {
            return Err(SortKeyError::OutOfOrder {
                lower: l.to_string(),
                upper: u.to_string(),
            });
        }
    }

    let mut out = Vec::with_capacity(lo.len().max(hi.as_ref().map_or(0, Vec::len)) + 1);
    let mut upper_open = hi.is_none();
    let mut i = 0;
    loop {
        let lo_d = lo.get(i).copied().unwrap_or(0);
        let hi_d = if upper_open {
            BASE
        } else {
            match hi.as_ref().and_then(|h| h.get(i)) {
                Some(d) => *d,
                // The walk matched all of `upper` without finding room:
                // `upper` is empty or a run of zero digits.
                None => return Err(SortKeyError::NoRoom(upper.unwrap_or_default().to_string())),
            }
        };

        if hi_d > lo_d + 1 {
            out.push(SORT_KEY_DIGITS[usize::from((lo_d + hi_d) / 2)]);
            break;
        }
        out.push(SORT_KEY_DIGITS[usize::from(lo_d)]);
        if hi_d == lo_d + 1 {
            upper_open = true;
        }
        i += 1;
    }

    // The alphabet is ASCII, so the bytes are valid UTF-8.
    Ok(out.into_iter().map(char::from).collect())
}

/// Key sorting after `key`, with the upper end open
pub fn key_after(key: &str) -> Result<String, SortKeyError> {
    key_between(Some(key), None)
}

/// Key sorting before `key`
pub fn key_before(key: &str) -> Result<String, SortKeyError> {
    key_between(None, Some(key))
}
