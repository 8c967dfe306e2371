use tracing::{debug, warn};

use super::Source;
use crate::error::{Result, SourceError};
use crate::language::Language;
use crate::page::{Contributor, PageRecord};
use crate::title::{Title, TitleFilter};
use crate::tree::Element;

/// Attributes checked, in order, for a harvested batch's language.
const LANGUAGE_ATTRS: [&str; 2] = ["lang", "xml:lang"];

/// Source over a document already held in memory.
///
/// Every `page` element below the root is read, at any depth. Redirect
/// targets are not extracted here; records always carry `redirect: None`.
pub struct TreeSource {
    root: Element,
    language: Language,
    filter: TitleFilter,
}

impl TreeSource {
    pub fn new(root: Element, language: Language, filter: TitleFilter) -> Self {
        Self {
            root,
            language,
            filter,
        }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Accepted pages in document order. Malformed pages are logged and skipped.
    pub fn pages(&self) -> impl Iterator<Item = PageRecord> + '_ {
        self.root
            .descendants_named("page")
            .into_iter()
            .filter_map(move |page| match self.extract(page) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed page in tree");
                    None
                }
            })
    }

    fn extract(&self, page: &Element) -> Result<Option<PageRecord>> {
        let raw = page
            .child_text("title")
            .ok_or_else(|| missing("title", "page"))?;
        let title = match Title::parse(&raw, &self.language) {
            Ok(title) => title,
            Err(e) => {
                warn!(title = %raw, error = %e, "Skipping page with unparseable title");
                return Ok(None);
            }
        };
        if !(self.filter)(&title) {
            return Ok(None);
        }

        let page_id = page
            .child_text("id")
            .ok_or_else(|| missing("id", &raw))?;
        let revision = page
            .children_named("revision")
            .last()
            .ok_or_else(|| missing("revision", &raw))?;
        let revision_id = revision
            .child_text("id")
            .ok_or_else(|| missing("revision/id", &raw))?;
        let timestamp = revision
            .child_text("timestamp")
            .ok_or_else(|| missing("revision/timestamp", &raw))?;

        let contributor = match revision.child("contributor") {
            Some(c) => Contributor::resolve(c.child_text("id"), c.child_text("username"), c.child_text("ip")),
            None => Contributor::anonymous(String::new()),
        };

        Ok(Some(PageRecord {
            title,
            redirect: None,
            page_id,
            revision_id,
            timestamp,
            contributor_id: contributor.id,
            contributor_name: contributor.name,
            source_text: revision.child("text").map(Element::text).unwrap_or_default(),
            format: revision.child_text("format"),
        }))
    }
}

fn missing(element: &'static str, context: &str) -> SourceError {
    SourceError::MissingElement {
        element,
        context: context.to_string(),
    }
}

impl Source for TreeSource {
    fn for_each_page(&self, sink: &(dyn Fn(PageRecord) + Sync)) -> Result<()> {
        let mut count = 0usize;
        for page in self.pages() {
            sink(page);
            count += 1;
        }
        debug!(pages = count, language = self.language.code(), "Tree traversal finished");
        Ok(())
    }
}

/// One harvested update batch. The root's `lang` (or `xml:lang`) attribute
/// picks the language; absent, empty or invalid tags fall back to the default.
pub struct HarvestedBatchSource {
    inner: TreeSource,
}

impl HarvestedBatchSource {
    pub fn new(root: Element, filter: TitleFilter) -> Self {
        let tag = LANGUAGE_ATTRS
            .iter()
            .find_map(|key| root.attr(key))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let language = match tag {
            Some(t) => Language::new(t).unwrap_or_else(|e| {
                warn!(tag = t, error = %e, "Invalid batch language, using fallback");
                Language::fallback()
            }),
            None => {
                debug!("Batch has no language tag, using fallback");
                Language::fallback()
            }
        };
        Self {
            inner: TreeSource::new(root, language, filter),
        }
    }

    pub fn language(&self) -> &Language {
        self.inner.language()
    }

    pub fn pages(&self) -> impl Iterator<Item = PageRecord> + '_ {
        self.inner.pages()
    }
}

impl Source for HarvestedBatchSource {
    fn for_each_page(&self, sink: &(dyn Fn(PageRecord) + Sync)) -> Result<()> {
        self.inner.for_each_page(sink)
    }
}
