//! # Term Forms
//!
//! Terms cross the store boundary in a *bare* form, where a typed literal is
//! written `"value"^^http://example.org/type`. Inside the store the datatype
//! is bracketed, `"value"^^<http://example.org/type>`, which is the form the
//! dictionary keys on. The conversions here are lossless and idempotent.

use crate::primitives::MAX_TERM_LENGTH;
use crate::{Role, StoreError};
use std::borrow::Cow;

/// Split a literal into its quoted lexical part and the suffix after it.
///
/// Returns `None` if `term` is not a well-formed literal.
fn split_literal(term: &str) -> Option<(&str, &str)> {
    if !term.starts_with('"') {
        return None;
    }
    let close = term.rfind('"')?;
    if close == 0 {
        return None;
    }
    Some(term.split_at(close + 1))
}

/// Check if a serialized term is a literal.
#[must_use]
pub fn is_literal(term: &str) -> bool {
    term.starts_with('"')
}

/// Convert a bare term to the bracketed internal form.
///
/// Terms that are not typed literals, and typed literals that are already
/// bracketed, are returned unchanged.
#[must_use]
pub fn to_bracketed(term: &str) -> Cow<'_, str> {
    match split_literal(term) {
        Some((lexical, suffix)) => match suffix.strip_prefix("^^") {
            Some(datatype) if !is_bracketed(datatype) && !datatype.is_empty() => {
                Cow::Owned(format!("{lexical}^^<{datatype}>"))
            }
            _ => Cow::Borrowed(term),
        },
        None => Cow::Borrowed(term),
    }
}

/// Convert a bracketed internal term back to the bare form.
///
/// Terms without a bracketed datatype are returned unchanged.
#[must_use]
pub fn to_bare(term: &str) -> Cow<'_, str> {
    match split_literal(term) {
        Some((lexical, suffix)) => match suffix.strip_prefix("^^") {
            Some(datatype) if is_bracketed(datatype) => Cow::Owned(format!(
                "{lexical}^^{}",
                &datatype[1..datatype.len() - 1]
            )),
            _ => Cow::Borrowed(term),
        },
        None => Cow::Borrowed(term),
    }
}

fn is_bracketed(datatype: &str) -> bool {
    datatype.len() >= 2 && datatype.starts_with('<') && datatype.ends_with('>')
}

/// Validate a serialized term for use in `role`.
///
/// Rejects empty and oversized terms, literals without a closing quote or
/// with a dangling `@`/`^^` suffix, and literals outside the object
/// position.
pub fn validate_term(term: &str, role: Role) -> Result<(), StoreError> {
    if term.is_empty() {
        return Err(StoreError::InvalidArgument(format!(
            "missing {} term",
            role.name()
        )));
    }
    if term.len() > MAX_TERM_LENGTH {
        return Err(StoreError::InvalidArgument(format!(
            "{} term exceeds {} bytes",
            role.name(),
            MAX_TERM_LENGTH
        )));
    }
    if !is_literal(term) {
        return Ok(());
    }
    if role != Role::Object {
        return Err(StoreError::InvalidArgument(format!(
            "literal {} not allowed as {}",
            term,
            role.name()
        )));
    }
    let Some((_, suffix)) = split_literal(term) else {
        return Err(StoreError::InvalidArgument(format!(
            "unterminated literal: {}",
            term
        )));
    };
    let well_formed = if suffix.is_empty() {
        true
    } else if let Some(language) = suffix.strip_prefix('@') {
        !language.is_empty() && !language.contains(char::is_whitespace)
    } else if let Some(datatype) = suffix.strip_prefix("^^") {
        let datatype = datatype
            .strip_prefix('<')
            .and_then(|d| d.strip_suffix('>'))
            .unwrap_or(datatype);
        !datatype.is_empty() && !datatype.contains(char::is_whitespace)
    } else {
        false
    };
    if well_formed {
        Ok(())
    } else {
        Err(StoreError::InvalidArgument(format!(
            "malformed literal: {}",
            term
        )))
    }
}

// =============================================================================
// TESTS
// =============================================================================
