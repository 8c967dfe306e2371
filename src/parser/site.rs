use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::LazyLock;

use quick_xml::events::BytesStart;
use regex::Regex;
use tracing::{debug, warn};

use super::cursor::{attribute, local_name, Token, XmlCursor};
use crate::error::{Result, SourceError};

static SCHEMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"export-(\d+\.\d+)/?$").unwrap());

/// Schema versions whose page/revision layout this parser has been checked against.
const KNOWN_SCHEMAS: &[&str] = &[
    "0.3", "0.4", "0.5", "0.6", "0.7", "0.8", "0.9", "0.10", "0.11",
];

/// Metadata found ahead of the first page: root attributes plus `<siteinfo>`.
#[derive(Debug, Clone, Default)]
pub struct SiteInfo {
    pub schema_version: Option<String>,
    /// Raw `xml:lang` of the root element.
    pub language: Option<String>,
    pub sitename: Option<String>,
    pub dbname: Option<String>,
    pub base: Option<String>,
    pub generator: Option<String>,
    pub case: Option<String>,
    /// Namespace names keyed by code, as declared by the export.
    pub namespaces: BTreeMap<i32, String>,
}

impl SiteInfo {
    pub fn namespace_name(&self, code: i32) -> Option<&str> {
        self.namespaces.get(&code).map(String::as_str)
    }

    pub(crate) fn read_root(&mut self, root: &BytesStart) -> Result<()> {
        self.language = attribute(root, "xml:lang")?;
        self.schema_version = match attribute(root, "version")? {
            Some(v) => Some(v),
            None => attribute(root, "xmlns")?
                .and_then(|ns| SCHEMA_RE.captures(&ns).map(|c| c[1].to_string())),
        };

        match self.schema_version.as_deref() {
            Some(v) if KNOWN_SCHEMAS.contains(&v) => {
                debug!(schema = v, "Reading export");
            }
            Some(v) => warn!(schema = v, "Unknown export schema version, reading anyway"),
            None => debug!("Export declares no schema version"),
        }
        Ok(())
    }

    pub(crate) fn read_siteinfo<R: BufRead>(
        &mut self,
        cursor: &mut XmlCursor<R>,
        siteinfo: &BytesStart,
    ) -> Result<()> {
        loop {
            match cursor.next_token()? {
                Token::Start(e) => match e.local_name().as_ref() {
                    b"sitename" => self.sitename = Some(cursor.read_text(&e)?),
                    b"dbname" => self.dbname = Some(cursor.read_text(&e)?),
                    b"base" => self.base = Some(cursor.read_text(&e)?),
                    b"generator" => self.generator = Some(cursor.read_text(&e)?),
                    b"case" => self.case = Some(cursor.read_text(&e)?),
                    b"namespaces" => self.read_namespaces(cursor, &e)?,
                    _ => cursor.skip(&e)?,
                },
                Token::End => return Ok(()),
                Token::Eof => {
                    return Err(SourceError::UnexpectedEof(local_name(siteinfo)))
                }
                Token::Empty(_) | Token::Text(_) => {}
            }
        }
    }

    fn read_namespaces<R: BufRead>(
        &mut self,
        cursor: &mut XmlCursor<R>,
        namespaces: &BytesStart,
    ) -> Result<()> {
        loop {
            match cursor.next_token()? {
                Token::Start(e) => {
                    let key = attribute(&e, "key")?;
                    let name = cursor.read_text(&e)?;
                    if let Some(code) = key.and_then(|k| k.trim().parse().ok()) {
                        self.namespaces.insert(code, name);
                    }
                }
                Token::Empty(e) => {
                    if let Some(code) = attribute(&e, "key")?.and_then(|k| k.trim().parse().ok()) {
                        self.namespaces.insert(code, String::new());
                    }
                }
                Token::End => return Ok(()),
                Token::Eof => {
                    return Err(SourceError::UnexpectedEof(local_name(namespaces)))
                }
                Token::Text(_) => {}
            }
        }
    }
}
