//! Small validation helpers shared across the engine.

use once_cell::sync::Lazy;
use regex::Regex;

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-f]{40}$").unwrap());
static MATCH_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0x[0-9a-f]{64}$").unwrap());

/// Whether `s` is a canonical (lowercase) chain address.
pub fn is_valid_address(s: &str) -> bool {
    ADDRESS_RE.is_match(s)
}

/// Whether `s` is a canonical (lowercase) 32-byte match identifier.
pub fn is_valid_match_id(s: &str) -> bool {
    MATCH_ID_RE.is_match(s)
}
