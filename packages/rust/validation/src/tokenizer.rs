//! Acronym-preserving tokenizer shared by keyword extraction and validation.
//!
//! Runs of alphanumeric characters form tokens. A token carrying two or more
//! upper-case letters is treated as an acronym and upper-cased; every other
//! token is lower-cased. Both sides of a keyword comparison go through this
//! function, so `TCP` in a question meets `TCP` from the source text while
//! `Network` and `network` collapse to the same token.

/// Split `text` into normalized tokens. Never yields punctuation.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.push(normalize_token(&current));
            current.clear();
        }
    }
    if !current.is_empty() {
        tokens.push(normalize_token(&current));
    }

    tokens
}

/// Upper-case acronyms, lower-case everything else.
pub fn normalize_token(token: &str) -> String {
    if is_acronymish(token) {
        token.to_uppercase()
    } else {
        token.to_lowercase()
    }
}

/// Two or more upper-case letters.
pub fn is_acronymish(token: &str) -> bool {
    token.chars().filter(|c| c.is_uppercase()).take(2).count() >= 2
}

/// True when the token has cased letters and none of them are lower-case.
pub(crate) fn is_upper_cased(token: &str) -> bool {
    token.chars().any(char::is_uppercase) && !token.chars().any(char::is_lowercase)
}
