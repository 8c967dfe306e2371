pub(crate) mod cursor;
mod elements;
pub mod site;

use std::io::BufRead;

use tracing::{debug, warn};

use crate::error::{Result, SourceError};
use crate::language::Language;
use crate::page::PageRecord;
use crate::title::TitleFilter;
use cursor::{Token, XmlCursor};
use elements::{read_page, PageContext};
pub use site::SiteInfo;

/// Why a pull-mode stream stopped yielding records.
#[derive(Debug)]
pub enum Termination {
    Exhausted,
    /// Scanning hit malformed or unreadable input. Pull mode reports this as
    /// a plain end of stream; callers can inspect it here.
    Failed(SourceError),
}

enum Lookahead {
    Empty,
    Ready(PageRecord),
    Done(Termination),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Fresh,
    Push,
    Pull,
}

/// Streaming parser for one page export.
///
/// One forward scan backs two consumption modes, exclusive per instance:
/// push ([`run`](Self::run)) and pull
/// ([`has_next_page`](Self::has_next_page) / [`next_page`](Self::next_page)).
/// Pull mode keeps exactly one record of lookahead.
pub struct DumpParser<R> {
    cursor: XmlCursor<R>,
    explicit_language: bool,
    language: Language,
    filter: TitleFilter,
    site: SiteInfo,
    mode: Mode,
    lookahead: Lookahead,
}

impl<R: BufRead> DumpParser<R> {
    /// `language: None` takes the language from the root `xml:lang`, else the fallback.
    pub fn new(reader: R, language: Option<Language>, filter: TitleFilter) -> Self {
        Self {
            cursor: XmlCursor::new(reader),
            explicit_language: language.is_some(),
            language: language.unwrap_or_default(),
            filter,
            site: SiteInfo::default(),
            mode: Mode::Fresh,
            lookahead: Lookahead::Empty,
        }
    }

    /// Language titles are resolved with. Settles once the root element is read.
    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn site_info(&self) -> &SiteInfo {
        &self.site
    }

    /// Push mode: scan the whole stream, calling `f` once per accepted page
    /// in document order. Stops at the first error.
    pub fn run<F: FnMut(PageRecord)>(&mut self, mut f: F) -> Result<usize> {
        match self.mode {
            Mode::Pull => return Err(SourceError::ModeConflict("pull")),
            Mode::Fresh | Mode::Push => self.mode = Mode::Push,
        }

        let mut count = 0;
        while let Some(page) = self.scan_next()? {
            f(page);
            count += 1;
        }
        debug!(pages = count, "Dump scan finished");
        Ok(count)
    }

    /// Enter pull mode without consuming anything.
    pub fn prepare_iteration(&mut self) -> Result<()> {
        match self.mode {
            Mode::Push => Err(SourceError::ModeConflict("push")),
            Mode::Fresh | Mode::Pull => {
                self.mode = Mode::Pull;
                Ok(())
            }
        }
    }

    /// Whether another accepted page is available, scanning ahead if needed.
    /// A scan error ends the stream: this returns `false` and the error is
    /// kept in [`termination`](Self::termination).
    pub fn has_next_page(&mut self) -> bool {
        if self.prepare_iteration().is_err() {
            return false;
        }
        if let Lookahead::Empty = self.lookahead {
            self.lookahead = match self.scan_next() {
                Ok(Some(page)) => Lookahead::Ready(page),
                Ok(None) => Lookahead::Done(Termination::Exhausted),
                Err(e) => {
                    warn!(error = %e, "Stopping page iteration on malformed input");
                    Lookahead::Done(Termination::Failed(e))
                }
            };
        }
        matches!(self.lookahead, Lookahead::Ready(_))
    }

    /// Take the next accepted page. `None` once the stream has ended,
    /// whether by exhaustion or by error.
    pub fn next_page(&mut self) -> Option<PageRecord> {
        if !self.has_next_page() {
            return None;
        }
        match std::mem::replace(&mut self.lookahead, Lookahead::Empty) {
            Lookahead::Ready(page) => Some(page),
            other => {
                self.lookahead = other;
                None
            }
        }
    }

    /// How pull mode ended, once it has.
    pub fn termination(&self) -> Option<&Termination> {
        match &self.lookahead {
            Lookahead::Done(t) => Some(t),
            _ => None,
        }
    }

    /// Advance to the next accepted page, or `None` at end of input.
    fn scan_next(&mut self) -> Result<Option<PageRecord>> {
        loop {
            match self.cursor.next_token()? {
                Token::Start(e) => match e.local_name().as_ref() {
                    b"mediawiki" => self.enter_root(&e)?,
                    b"siteinfo" => self.site.read_siteinfo(&mut self.cursor, &e)?,
                    b"page" => {
                        let ctx = PageContext {
                            language: &self.language,
                            filter: &self.filter,
                            site: &self.site,
                        };
                        if let Some(page) = read_page(&mut self.cursor, &e, &ctx)? {
                            return Ok(Some(page));
                        }
                    }
                    // Wrapper elements are descended into, not skipped.
                    _ => {}
                },
                Token::Eof => return Ok(None),
                Token::Empty(_) | Token::End | Token::Text(_) => {}
            }
        }
    }

    fn enter_root(&mut self, root: &quick_xml::events::BytesStart) -> Result<()> {
        self.site.read_root(root)?;
        if !self.explicit_language {
            self.language = Language::from_tag_or_fallback(self.site.language.as_deref());
            debug!(language = %self.language, "Using export language");
        }
        Ok(())
    }
}
