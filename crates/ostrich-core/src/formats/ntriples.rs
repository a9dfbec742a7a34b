//! # N-Triples Lines
//!
//! A minimal line reader for N-Triples input and the matching writer.
//!
//! Parsed terms come out in the bare boundary form: IRIs without angle
//! brackets, typed literals as `"v"^^datatype`. The writer goes the other
//! way, so `format_triple(parse_line(l))` reproduces a canonical line.

use crate::formats::literal;
use crate::{PatchElement, StoreError, TermTriple};

// =============================================================================
// READING
// =============================================================================

/// Parse one N-Triples line.
///
/// Blank lines and comment lines yield `Ok(None)`. `line_number` is only
/// used in error messages.
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<TermTriple>, StoreError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    Cursor { rest: trimmed }
        .statement()
        .map(Some)
        .map_err(|reason| StoreError::InvalidArgument(format!("line {}: {}", line_number, reason)))
}

/// Parse one patch line: an N-Triples statement prefixed with `+` or `-`.
pub fn parse_delta_line(
    line: &str,
    line_number: usize,
) -> Result<Option<PatchElement>, StoreError> {
    let trimmed = line.trim_start();
    let (addition, statement) = if let Some(rest) = trimmed.strip_prefix('+') {
        (true, rest)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (false, rest)
    } else if trimmed.trim().is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    } else {
        return Err(StoreError::InvalidArgument(format!(
            "line {}: expected '+' or '-' before the triple",
            line_number
        )));
    };
    Ok(parse_line(statement, line_number)?.map(|triple| PatchElement { triple, addition }))
}

/// Convert one written term to the bare form.
///
/// Accepts IRIs with or without angle brackets and literals with a
/// bracketed or bare datatype.
#[must_use]
pub fn parse_term(token: &str) -> String {
    let token = token.trim();
    if let Some(iri) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return iri.to_string();
    }
    literal::to_bare(token).into_owned()
}

struct Cursor<'a> {
    rest: &'a str,
}

impl Cursor<'_> {
    fn statement(&mut self) -> Result<TermTriple, String> {
        let subject = self.term()?;
        let predicate = self.term()?;
        let object = self.term()?;
        self.end()?;
        Ok(TermTriple::new(subject, predicate, object))
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn term(&mut self) -> Result<String, String> {
        self.skip_whitespace();
        let rest = self.rest;
        if let Some(body) = rest.strip_prefix('<') {
            let end = body.find('>').ok_or("unterminated IRI")?;
            self.rest = &body[end + 1..];
            return Ok(body[..end].to_string());
        }
        if rest.starts_with("_:") {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            if end <= 2 {
                return Err("empty blank node label".to_string());
            }
            self.rest = &rest[end..];
            return Ok(rest[..end].to_string());
        }
        if rest.starts_with('"') {
            return self.literal();
        }
        Err(format!(
            "unexpected input at '{}'",
            rest.chars().take(16).collect::<String>()
        ))
    }

    fn literal(&mut self) -> Result<String, String> {
        let rest = self.rest;
        let bytes = rest.as_bytes();
        let mut escaped = false;
        let mut close = None;
        for (i, &b) in bytes.iter().enumerate().skip(1) {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                close = Some(i);
                break;
            }
        }
        let close = close.ok_or("unterminated literal")?;
        let lexical = &rest[..=close];
        let after = &rest[close + 1..];

        if let Some(tail) = after.strip_prefix("^^") {
            let body = tail.strip_prefix('<').ok_or("datatype must be an IRI")?;
            let end = body.find('>').ok_or("unterminated datatype IRI")?;
            if end == 0 {
                return Err("empty datatype IRI".to_string());
            }
            self.rest = &body[end + 1..];
            return Ok(format!("{}^^{}", lexical, &body[..end]));
        }
        if let Some(tail) = after.strip_prefix('@') {
            let end = tail
                .find(|c: char| c.is_whitespace() || c == '.')
                .unwrap_or(tail.len());
            if end == 0 {
                return Err("empty language tag".to_string());
            }
            self.rest = &tail[end..];
            return Ok(format!("{}@{}", lexical, &tail[..end]));
        }
        self.rest = after;
        Ok(lexical.to_string())
    }

    fn end(&mut self) -> Result<(), String> {
        self.skip_whitespace();
        let rest = self.rest.strip_prefix('.').ok_or("missing terminating '.'")?;
        let rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with('#') {
            Ok(())
        } else {
            Err("trailing input after '.'".to_string())
        }
    }
}

// =============================================================================
// WRITING
// =============================================================================

/// Write a bare term in N-Triples syntax.
#[must_use]
pub fn format_term(term: &str) -> String {
    if literal::is_literal(term) {
        literal::to_bracketed(term).into_owned()
    } else if term.starts_with("_:") {
        term.to_string()
    } else {
        format!("<{}>", term)
    }
}

/// Write a triple as an N-Triples statement, including the final `.`.
#[must_use]
pub fn format_triple(triple: &TermTriple) -> String {
    format!(
        "{} {} {} .",
        format_term(&triple.subject),
        format_term(&triple.predicate),
        format_term(&triple.object)
    )
}

// =============================================================================
// TESTS
// =============================================================================
