use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::{Result, SourceError};

/// Owned view of one XML event.
pub(crate) enum Token {
    Start(BytesStart<'static>),
    Empty(BytesStart<'static>),
    End,
    Text(String),
    Eof,
}

/// Forward-only cursor over a quick-xml reader that hands out owned tokens,
/// so element readers can recurse without holding on to the event buffer.
pub(crate) struct XmlCursor<R> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> XmlCursor<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::with_capacity(8192),
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            self.buf.clear();
            let token = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => Token::Start(e.into_owned()),
                Event::Empty(e) => Token::Empty(e.into_owned()),
                Event::End(_) => Token::End,
                Event::Text(e) => Token::Text(e.unescape()?.into_owned()),
                Event::CData(e) => Token::Text(String::from_utf8_lossy(&e).into_owned()),
                Event::Eof => Token::Eof,
                _ => continue,
            };
            return Ok(token);
        }
    }

    /// Collect the text content of `element`, whose start tag was just read.
    /// Nested markup is ignored; its text is kept.
    pub fn read_text(&mut self, element: &BytesStart) -> Result<String> {
        let mut text = String::new();
        let mut depth = 0usize;
        loop {
            match self.next_token()? {
                Token::Text(t) => text.push_str(&t),
                Token::Start(_) => depth += 1,
                Token::End if depth == 0 => return Ok(text),
                Token::End => depth -= 1,
                Token::Empty(_) => {}
                Token::Eof => return Err(SourceError::UnexpectedEof(local_name(element))),
            }
        }
    }

    /// Skip everything up to and including the end tag of `element`.
    /// Also valid from anywhere inside it, as long as no element of the
    /// same name is nested.
    pub fn skip(&mut self, element: &BytesStart) -> Result<()> {
        let end = element.name().as_ref().to_vec();
        self.buf.clear();
        self.reader.read_to_end_into(QName(&end), &mut self.buf)?;
        Ok(())
    }
}

pub(crate) fn local_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Unescaped value of an attribute, keyed by its qualified name (`xml:lang`).
pub(crate) fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>> {
    match element.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(cursor: &mut XmlCursor<&[u8]>) -> BytesStart<'static> {
        loop {
            match cursor.next_token().unwrap() {
                Token::Start(e) => return e,
                Token::Eof => panic!("no start tag"),
                _ => {}
            }
        }
    }

    #[test]
    fn text_with_entities_and_cdata() {
        let xml = "<text>a &amp; b<![CDATA[ <raw> ]]>c</text>";
        let mut cursor = XmlCursor::new(xml.as_bytes());
        let e = start(&mut cursor);
        assert_eq!(cursor.read_text(&e).unwrap(), "a & b <raw> c");
    }

    #[test]
    fn tokens_in_document_order() {
        let mut cursor = XmlCursor::new("<a x=\"1\"><b/>t</a>".as_bytes());
        assert!(matches!(cursor.next_token().unwrap(), Token::Start(ref e) if local_name(e) == "a"));
        assert!(matches!(cursor.next_token().unwrap(), Token::Empty(ref e) if local_name(e) == "b"));
        assert!(matches!(cursor.next_token().unwrap(), Token::Text(ref t) if t == "t"));
        assert!(matches!(cursor.next_token().unwrap(), Token::End));
        assert!(matches!(cursor.next_token().unwrap(), Token::Eof));
    }

    #[test]
    fn skip_nested_element() {
        let xml = "<root><skip><a><b/></a>text</skip><keep>yes</keep></root>";
        let mut cursor = XmlCursor::new(xml.as_bytes());
        let _root = start(&mut cursor);
        let skip = start(&mut cursor);
        cursor.skip(&skip).unwrap();
        let keep = start(&mut cursor);
        assert_eq!(local_name(&keep), "keep");
        assert_eq!(cursor.read_text(&keep).unwrap(), "yes");
    }

    #[test]
    fn truncated_text_is_an_error() {
        let mut cursor = XmlCursor::new("<title>Half".as_bytes());
        let e = start(&mut cursor);
        assert!(matches!(
            cursor.read_text(&e),
            Err(SourceError::UnexpectedEof(name)) if name == "title"
        ));
    }

    #[test]
    fn reads_attributes() {
        let mut cursor = XmlCursor::new(r#"<redirect title="A &amp; B" />"#.as_bytes());
        match cursor.next_token().unwrap() {
            Token::Empty(e) => {
                assert_eq!(attribute(&e, "title").unwrap().as_deref(), Some("A & B"));
                assert_eq!(attribute(&e, "missing").unwrap(), None);
            }
            _ => panic!("expected empty element"),
        }
    }
}
