use crate::error::{AnnotationError, Result};
use serde::de::IgnoredAny;
use std::collections::BTreeMap;

/// Absolute byte range of one value token within a document string, plus the
/// JSON Pointer identifying it. Quoted strings exclude the surrounding
/// quote characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRange {
    pub start: usize,
    pub end: usize,
    pub pointer: String,
}

/// Byte ranges of every value in a specific document string, keyed by path
/// segment and mirroring the shape of the annotation tree. The root spans
/// the whole document. Not reusable across document strings.
#[derive(Debug, Default)]
pub struct SourceRangeTree {
    pub(crate) ranges: Vec<SourceRange>,
    pub(crate) children: BTreeMap<String, SourceRangeTree>,
}

impl SourceRangeTree {
    /// The range recorded for this node's own value. A document that
    /// repeats an object key records one range per occurrence; the last one
    /// wins, matching how repeated keys overwrite during parsing.
    #[must_use]
    pub fn range(&self) -> Option<&SourceRange> {
        self.ranges.last()
    }

    /// Child subtree for a single path segment
    #[must_use]
    pub fn child(&self, segment: &str) -> Option<&SourceRangeTree> {
        self.children.get(segment)
    }

    fn insert(&mut self, segments: &[String], range: SourceRange) {
        let mut node = self;
        for segment in segments {
            node = node.children.entry(segment.clone()).or_default();
        }
        node.ranges.push(range);
    }
}

/// Scan a JSON document and record the byte range of every value, keyed by
/// structural path.
///
/// The document is validated with `serde_json` first; the scanner itself
/// only tracks token boundaries. Fails with
/// [`AnnotationError::InvalidDocument`] when the text is not valid JSON.
pub fn locate(text: &str) -> Result<SourceRangeTree> {
    serde_json::from_str::<IgnoredAny>(text)?;

    let mut tree = SourceRangeTree::default();
    let mut scanner = Scanner {
        text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    scanner.skip_ws();
    let mut path = Vec::new();
    scanner.value(&mut path, &mut tree)?;
    scanner.skip_ws();
    if scanner.pos != scanner.bytes.len() {
        return Err(AnnotationError::InvalidSyntax {
            offset: scanner.pos,
        });
    }
    Ok(tree)
}

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn unexpected(&self) -> AnnotationError {
        AnnotationError::InvalidSyntax { offset: self.pos }
    }

    /// Parse one value, recording its token range (quotes excluded for
    /// strings) at the current path.
    fn value(&mut self, path: &mut Vec<String>, tree: &mut SourceRangeTree) -> Result<()> {
        let start = self.pos;
        match self.peek().ok_or_else(|| self.unexpected())? {
            b'{' => self.object(path, tree)?,
            b'[' => self.array(path, tree)?,
            b'"' => {
                self.string_token()?;
            }
            b't' => self.literal(b"true")?,
            b'f' => self.literal(b"false")?,
            b'n' => self.literal(b"null")?,
            b'-' | b'0'..=b'9' => self.number()?,
            _ => return Err(self.unexpected()),
        }
        let end = self.pos;

        let (start, end) = if self.bytes[start] == b'"' {
            (start + 1, end - 1)
        } else {
            (start, end)
        };
        tree.insert(
            path,
            SourceRange {
                start,
                end,
                pointer: pointer_of(path),
            },
        );
        Ok(())
    }

    fn object(&mut self, path: &mut Vec<String>, tree: &mut SourceRangeTree) -> Result<()> {
        self.expect(b'{')?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(());
        }
        loop {
            self.skip_ws();
            let key = self.key()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            path.push(key);
            self.value(path, tree)?;
            path.pop();
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn array(&mut self, path: &mut Vec<String>, tree: &mut SourceRangeTree) -> Result<()> {
        self.expect(b'[')?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(());
        }
        let mut index = 0usize;
        loop {
            self.skip_ws();
            path.push(index.to_string());
            self.value(path, tree)?;
            path.pop();
            index += 1;
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    /// Scan a string token, returning its byte range including the quotes
    fn string_token(&mut self) -> Result<(usize, usize)> {
        let start = self.pos;
        self.expect(b'"')?;
        while let Some(byte) = self.peek() {
            self.pos += 1;
            match byte {
                b'"' => return Ok((start, self.pos)),
                b'\\' => self.pos += 1, // skip the escaped byte
                _ => {}
            }
        }
        Err(self.unexpected())
    }

    /// Parse an object key, decoding escapes via `serde_json`
    fn key(&mut self) -> Result<String> {
        let (start, end) = self.string_token()?;
        Ok(serde_json::from_str(&self.text[start..end])?)
    }

    fn literal(&mut self, literal: &[u8]) -> Result<()> {
        if self.bytes[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn number(&mut self) -> Result<()> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
        ) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.unexpected());
        }
        Ok(())
    }
}

fn pointer_of(segments: &[String]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        // JSON Pointer token escape (~0, ~1)
        out.push_str(&segment.replace('~', "~0").replace('/', "~1"));
    }
    out
}
