//! # Formats
//!
//! Pure transformations between the store and text or bytes. No I/O here;
//! reading files is the importer's and the binary's job.
//!
//! - `literal`: bare and bracketed term forms, term validation
//! - `ntriples`: N-Triples line reader and writer
//! - `block`: compressed snapshot blocks

pub mod block;
pub mod literal;
pub mod ntriples;

pub use block::{decode_block, encode_block};
pub use literal::{to_bare, to_bracketed, validate_term};
pub use ntriples::{format_term, format_triple, parse_delta_line, parse_line, parse_term};
