//! Inbound text canonicalization
//!
//! Every comparison the state machine makes (keywords, document codes,
//! echo detection) runs on the output of [`normalize`].

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Sentinel returned for the transient "typing..." indicator some clients
/// deliver as a message.
pub const TYPING_INDICATOR: &str = "escribiendo";

/// Punctuation kept besides ASCII letters, digits and whitespace.
const ALLOWED_PUNCTUATION: &[char] = &['_'];

/// Canonicalize free text: fold accents, drop emoji and symbols, lowercase,
/// collapse whitespace.
pub fn normalize(raw: &str) -> String {
    let folded: String = raw
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| {
            c.is_ascii_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(c)
        })
        .map(|c| c.to_ascii_lowercase())
        .collect();

    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.contains(TYPING_INDICATOR) {
        return TYPING_INDICATOR.to_string();
    }
    collapsed
}

/// First whitespace-separated token of an already normalized string.
pub fn first_token(normalized: &str) -> Option<&str> {
    normalized.split_whitespace().next()
}

/// True when the normalized text is a non-empty run of ASCII digits.
pub fn is_all_digits(normalized: &str) -> bool {
    !normalized.is_empty() && normalized.bytes().all(|b| b.is_ascii_digit())
}
