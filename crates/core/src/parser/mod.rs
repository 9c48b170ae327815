//! PDF parsing modules.
//!
//! - `lexer`: tokenizer over a random-access byte slice
//! - `pdf_parser`: recursive-descent object parser

pub mod lexer;
pub mod pdf_parser;

pub use lexer::{Keyword, Lexer, Token};
pub use pdf_parser::{
    IndirectBody, IndirectObject, PDFParser, ParsedValue, parse_object_from_bytes,
};
