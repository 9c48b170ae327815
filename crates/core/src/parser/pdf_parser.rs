//! PDF object parser - turns tokens into [`PDFObject`] values.
//!
//! Recursive descent with an explicit nesting bound. Stream bodies are not
//! read here: the parser stops at the first content byte and reports where
//! it is, because the declared `/Length` may be an indirect reference that
//! cannot be resolved during this pass.

use super::lexer::{Keyword, Lexer, Token};
use crate::error::{PdfError, Result};
use crate::model::{Dictionary, PDFObjRef, PDFObject};

/// Default nesting bound for arrays and dictionaries.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// One step of `read_next_value`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Object(PDFObject),
    /// `]` seen where a value was expected
    EndOfArray,
    /// `>>` seen where a value was expected
    EndOfDict,
}

/// Body of an indirect object as laid out in the file.
#[derive(Debug, Clone, PartialEq)]
pub enum IndirectBody {
    Value(PDFObject),
    /// Stream dictionary plus the offset of its first content byte.
    Stream { dict: Dictionary, data_start: usize },
}

/// `N G obj <body>` parsed from a byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub objid: u32,
    pub genno: u16,
    pub body: IndirectBody,
}

/// PDF Parser - parses PDF object syntax
///
/// Uses [`Lexer`] for tokenization and builds PDF objects, handling
/// indirect references (`num num R`) by speculative reads that rewind the
/// lexer when the pattern does not complete.
pub struct PDFParser<'a> {
    lexer: Lexer<'a>,
    depth: usize,
    max_depth: usize,
}

impl<'a> PDFParser<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self::at(data, 0)
    }

    /// Parser positioned at `pos`.
    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self {
            lexer: Lexer::at(data, pos),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub const fn tell(&self) -> usize {
        self.lexer.tell()
    }

    pub const fn set_pos(&mut self, pos: usize) {
        self.lexer.set_pos(pos);
    }

    /// Get remaining unparsed data.
    pub fn remaining(&self) -> &'a [u8] {
        self.lexer.remaining()
    }

    pub const fn lexer_mut(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    /// Read one value, or a closing delimiter marker. `Ok(None)` at end of
    /// input.
    pub fn read_next_value(&mut self) -> Result<Option<ParsedValue>> {
        let Some(next) = self.lexer.next_token() else {
            return Ok(None);
        };
        let (pos, token) = next?;
        self.token_to_value(pos, token).map(Some)
    }

    /// Parse next PDF object. Closing delimiters and end of input are errors.
    pub fn parse_object(&mut self) -> Result<PDFObject> {
        match self.read_next_value()? {
            Some(ParsedValue::Object(obj)) => Ok(obj),
            Some(ParsedValue::EndOfArray | ParsedValue::EndOfDict) => {
                Err(PdfError::SyntaxError(format!(
                    "unexpected closing delimiter at {}",
                    self.lexer.token_pos()
                )))
            }
            None => Err(PdfError::UnexpectedEof),
        }
    }

    fn token_to_value(&mut self, pos: usize, token: Token) -> Result<ParsedValue> {
        let obj = match token {
            Token::Int(n) => self.maybe_reference(n),
            Token::Real(n) => PDFObject::Real(n),
            Token::Bool(b) => PDFObject::Bool(b),
            Token::Name(s) => PDFObject::Name(s),
            Token::String(s) => PDFObject::String(s),
            Token::Keyword(Keyword::Null) => PDFObject::Null,
            Token::Keyword(Keyword::ArrayStart) => self.parse_array(pos)?,
            Token::Keyword(Keyword::DictStart) => PDFObject::Dict(self.parse_dict(pos)?),
            Token::Keyword(Keyword::ArrayEnd) => return Ok(ParsedValue::EndOfArray),
            Token::Keyword(Keyword::DictEnd) => return Ok(ParsedValue::EndOfDict),
            Token::Keyword(kw) => {
                return Err(PdfError::TokenError {
                    pos,
                    msg: format!(
                        "unexpected keyword: {}",
                        String::from_utf8_lossy(kw.as_bytes())
                    ),
                });
            }
        };
        Ok(ParsedValue::Object(obj))
    }

    /// `n` may start `n g R`; rewind if it does not.
    fn maybe_reference(&mut self, n: i64) -> PDFObject {
        let saved = self.lexer.tell();
        if let (Ok(objid), Some(Ok((_, Token::Int(g))))) = (u32::try_from(n), self.lexer.next_token())
            && let Ok(genno) = u16::try_from(g)
            && let Some(Ok((_, Token::Keyword(Keyword::R)))) = self.lexer.next_token()
        {
            return PDFObject::Ref(PDFObjRef::new(objid, genno));
        }
        self.lexer.set_pos(saved);
        PDFObject::Int(n)
    }

    fn enter(&mut self, pos: usize) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(PdfError::SyntaxError(format!(
                "nesting deeper than {} at {pos}",
                self.max_depth
            )));
        }
        self.depth += 1;
        Ok(())
    }

    /// Parse array contents until ]
    fn parse_array(&mut self, pos: usize) -> Result<PDFObject> {
        self.enter(pos)?;
        let mut arr = Vec::new();
        let result = loop {
            match self.read_next_value() {
                Ok(Some(ParsedValue::Object(obj))) => arr.push(obj),
                Ok(Some(ParsedValue::EndOfArray)) => break Ok(PDFObject::Array(arr)),
                Ok(Some(ParsedValue::EndOfDict)) => {
                    break Err(PdfError::SyntaxError(format!(
                        "'>>' inside array starting at {pos}"
                    )));
                }
                Ok(None) => break Err(PdfError::UnexpectedEof),
                Err(e) => break Err(e),
            }
        };
        self.depth -= 1;
        result
    }

    /// Parse dict contents until >>
    fn parse_dict(&mut self, pos: usize) -> Result<Dictionary> {
        self.enter(pos)?;
        let result = self.parse_dict_entries(pos);
        self.depth -= 1;
        result
    }

    fn parse_dict_entries(&mut self, pos: usize) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let (key_pos, token) = self
                .lexer
                .next_token()
                .ok_or(PdfError::UnexpectedEof)??;
            let key = match token {
                Token::Keyword(Keyword::DictEnd) => return Ok(dict),
                Token::Name(name) => name,
                _ => {
                    return Err(PdfError::TokenError {
                        pos: key_pos,
                        msg: format!("expected name as dict key in dict starting at {pos}"),
                    });
                }
            };
            match self.read_next_value()? {
                Some(ParsedValue::Object(value)) => {
                    dict.insert(key, value);
                }
                // `/Key >>`: the key has no value
                Some(ParsedValue::EndOfDict) => {
                    dict.insert(key, PDFObject::Null);
                    return Ok(dict);
                }
                Some(ParsedValue::EndOfArray) => {
                    return Err(PdfError::SyntaxError(format!(
                        "']' inside dict starting at {pos}"
                    )));
                }
                None => return Err(PdfError::UnexpectedEof),
            }
        }
    }

    /// Read `N G obj` at the current position.
    pub fn parse_indirect_header(&mut self) -> Result<(u32, u16)> {
        let start = self.lexer.tell();
        let malformed = |msg: &str| PdfError::SyntaxError(format!("{msg} at {start}"));
        let objid = match self.lexer.expect_token()? {
            Token::Int(n) => u32::try_from(n).map_err(|_| malformed("bad object number"))?,
            _ => return Err(malformed("expected object number")),
        };
        let genno = match self.lexer.expect_token()? {
            Token::Int(n) => u16::try_from(n).map_err(|_| malformed("bad generation"))?,
            _ => return Err(malformed("expected generation")),
        };
        match self.lexer.expect_token()? {
            Token::Keyword(Keyword::Obj) => Ok((objid, genno)),
            _ => Err(malformed("missing 'obj' keyword")),
        }
    }

    /// Parse a complete indirect object starting at the current position.
    ///
    /// For a stream the cursor is left on the first content byte, after
    /// exactly one EOL following the `stream` keyword.
    pub fn parse_indirect_object(&mut self) -> Result<IndirectObject> {
        let (objid, genno) = self.parse_indirect_header()?;
        let value = self.parse_object()?;

        let after_value = self.lexer.tell();
        match (value, self.lexer.next_token()) {
            (PDFObject::Dict(dict), Some(Ok((_, Token::Keyword(Keyword::Stream))))) => {
                let data_start = self.skip_stream_eol();
                self.lexer.set_pos(data_start);
                Ok(IndirectObject {
                    objid,
                    genno,
                    body: IndirectBody::Stream { dict, data_start },
                })
            }
            (value, _) => {
                // `endobj` is optional in damaged files; leave it unconsumed
                self.lexer.set_pos(after_value);
                Ok(IndirectObject {
                    objid,
                    genno,
                    body: IndirectBody::Value(value),
                })
            }
        }
    }

    /// Position of the first stream byte: one CRLF, LF or CR after the
    /// `stream` keyword. Trailing spaces before the EOL are tolerated.
    fn skip_stream_eol(&self) -> usize {
        let data = self.lexer.data();
        let mut pos = self.lexer.tell();
        let mut eol = pos;
        while matches!(data.get(eol), Some(b' ' | b'\t')) {
            eol += 1;
        }
        match (data.get(eol), data.get(eol + 1)) {
            (Some(b'\r'), Some(b'\n')) => pos = eol + 2,
            (Some(b'\n' | b'\r'), _) => pos = eol + 1,
            _ => {}
        }
        pos
    }
}

/// Parse a single object from a byte slice.
pub fn parse_object_from_bytes(data: &[u8]) -> Result<PDFObject> {
    PDFParser::new(data).parse_object()
}
