use std::io::BufRead;

use quick_xml::events::BytesStart;
use tracing::warn;

use super::cursor::{attribute, local_name, Token, XmlCursor};
use super::site::SiteInfo;
use crate::error::{Result, SourceError};
use crate::language::Language;
use crate::page::{Contributor, PageRecord};
use crate::title::{Title, TitleFilter, NS_MAIN};

/// What a page reader needs from the surrounding parser.
pub(crate) struct PageContext<'a> {
    pub language: &'a Language,
    pub filter: &'a TitleFilter,
    pub site: &'a SiteInfo,
}

/// Page header fields, collected before the first revision.
#[derive(Default)]
struct PageHead {
    raw_title: Option<String>,
    ns: Option<i32>,
    id: Option<String>,
    redirect: Option<String>,
}

struct Revision {
    id: String,
    timestamp: String,
    contributor: Contributor,
    text: String,
    format: Option<String>,
}

/// Read one `<page>` whose start tag was just consumed.
///
/// Returns `Ok(None)` when the title is rejected by the filter or cannot be
/// parsed; the rest of the page is then skipped unread.
pub(crate) fn read_page<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    page: &BytesStart,
    ctx: &PageContext,
) -> Result<Option<PageRecord>> {
    let mut head = PageHead::default();
    let mut title: Option<Title> = None;
    let mut latest: Option<Revision> = None;

    loop {
        match cursor.next_token()? {
            Token::Start(e) => match e.local_name().as_ref() {
                b"title" => head.raw_title = Some(cursor.read_text(&e)?),
                b"ns" => head.ns = cursor.read_text(&e)?.trim().parse().ok(),
                b"id" => head.id = Some(cursor.read_text(&e)?.trim().to_string()),
                b"redirect" => {
                    head.redirect = attribute(&e, "title")?;
                    cursor.skip(&e)?;
                }
                b"revision" => {
                    if title.is_none() {
                        match accept(&head, ctx)? {
                            Some(t) => title = Some(t),
                            None => {
                                cursor.skip(page)?;
                                return Ok(None);
                            }
                        }
                    }
                    latest = Some(read_revision(cursor, &e)?);
                }
                _ => cursor.skip(&e)?,
            },
            Token::Empty(e) => {
                if e.local_name().as_ref() == b"redirect" {
                    head.redirect = attribute(&e, "title")?;
                }
            }
            Token::End => break,
            Token::Text(_) => {}
            Token::Eof => return Err(SourceError::UnexpectedEof(local_name(page))),
        }
    }

    let title = match title {
        Some(t) => t,
        // No revision seen: still honour the filter before reporting it.
        None => match accept(&head, ctx)? {
            Some(t) => t,
            None => return Ok(None),
        },
    };
    let context = || format!("page {:?}", title.full_title());
    let page_id = head.id.ok_or_else(|| SourceError::MissingElement {
        element: "id",
        context: context(),
    })?;
    let revision = latest.ok_or_else(|| SourceError::MissingElement {
        element: "revision",
        context: context(),
    })?;
    let redirect = head.redirect.and_then(|raw| {
        Title::parse(&raw, ctx.language)
            .map_err(|e| warn!(page = %title, target = %raw, error = %e, "Dropping unparseable redirect target"))
            .ok()
    });

    Ok(Some(PageRecord {
        title,
        redirect,
        page_id,
        revision_id: revision.id,
        timestamp: revision.timestamp,
        contributor_id: revision.contributor.id,
        contributor_name: revision.contributor.name,
        source_text: revision.text,
        format: revision.format,
    }))
}

/// Resolve the page title and run the filter on it.
fn accept(head: &PageHead, ctx: &PageContext) -> Result<Option<Title>> {
    let raw = head
        .raw_title
        .as_deref()
        .ok_or_else(|| SourceError::MissingElement {
            element: "title",
            context: format!("page id {:?}", head.id.as_deref().unwrap_or("?")),
        })?;

    let title = match Title::parse(raw, ctx.language) {
        Ok(t) => t,
        Err(e) => {
            warn!(title = raw, error = %e, "Skipping page with unparseable title");
            return Ok(None);
        }
    };
    let title = match head.ns {
        Some(ns) if ns != title.namespace() => match reconcile(raw, ns, ctx) {
            Some(t) => {
                warn!(title = raw, found = title.namespace(), expected = ns, "Namespace mismatch, using <ns>");
                t
            }
            None => return Ok(None),
        },
        _ => title,
    };

    Ok((ctx.filter)(&title).then_some(title))
}

/// Rebuild a title in the namespace given by `<ns>`, stripping the prefix
/// when it matches that namespace's declared or localized name.
fn reconcile(raw: &str, ns: i32, ctx: &PageContext) -> Option<Title> {
    let local = if ns == NS_MAIN {
        raw
    } else {
        let names = [ctx.site.namespace_name(ns), ctx.language.namespace_name(ns)];
        raw.split_once(':')
            .filter(|(prefix, _)| {
                let prefix = prefix.trim().replace('_', " ");
                names
                    .iter()
                    .flatten()
                    .any(|name| name.eq_ignore_ascii_case(&prefix))
            })
            .map(|(_, rest)| rest)
            .unwrap_or(raw)
    };

    Title::in_namespace(ns, local, ctx.language)
        .map_err(|e| warn!(title = raw, error = %e, "Skipping page with unparseable title"))
        .ok()
}

fn read_revision<R: BufRead>(cursor: &mut XmlCursor<R>, revision: &BytesStart) -> Result<Revision> {
    let mut id = None;
    let mut timestamp = None;
    let mut contributor = None;
    let mut text = None;
    let mut format = None;

    loop {
        match cursor.next_token()? {
            Token::Start(e) => match e.local_name().as_ref() {
                b"id" => id = Some(cursor.read_text(&e)?.trim().to_string()),
                b"timestamp" => timestamp = Some(cursor.read_text(&e)?.trim().to_string()),
                b"contributor" => contributor = Some(read_contributor(cursor, &e)?),
                b"text" => text = Some(cursor.read_text(&e)?),
                b"format" => format = Some(cursor.read_text(&e)?.trim().to_string()),
                _ => cursor.skip(&e)?,
            },
            // <text deleted="deleted"/>, <contributor deleted="deleted"/>, <minor/>
            Token::Empty(_) => {}
            Token::End => break,
            Token::Text(_) => {}
            Token::Eof => return Err(SourceError::UnexpectedEof(local_name(revision))),
        }
    }

    let id = id.ok_or_else(|| SourceError::MissingElement {
        element: "id",
        context: "revision".to_string(),
    })?;
    let timestamp = timestamp.ok_or_else(|| SourceError::MissingElement {
        element: "timestamp",
        context: format!("revision {id}"),
    })?;

    Ok(Revision {
        id,
        timestamp,
        contributor: contributor.unwrap_or_else(|| Contributor::anonymous(String::new())),
        text: text.unwrap_or_default(),
        format,
    })
}

fn read_contributor<R: BufRead>(
    cursor: &mut XmlCursor<R>,
    contributor: &BytesStart,
) -> Result<Contributor> {
    let mut id = None;
    let mut username = None;
    let mut ip = None;

    loop {
        match cursor.next_token()? {
            Token::Start(e) => match e.local_name().as_ref() {
                b"id" => id = Some(cursor.read_text(&e)?),
                b"username" => username = Some(cursor.read_text(&e)?),
                b"ip" => ip = Some(cursor.read_text(&e)?.trim().to_string()),
                _ => cursor.skip(&e)?,
            },
            Token::End => break,
            Token::Empty(_) | Token::Text(_) => {}
            Token::Eof => return Err(SourceError::UnexpectedEof(local_name(contributor))),
        }
    }

    Ok(Contributor::resolve(id, username, ip))
}
