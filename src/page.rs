use crate::title::Title;

/// Contributor id used for edits made without an account.
pub const ANONYMOUS_ID: &str = "0";

/// One page at its selected revision, as handed to the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub title: Title,
    /// Target of a redirect page. Never set by tree-based sources.
    pub redirect: Option<Title>,
    pub page_id: String,
    pub revision_id: String,
    /// Revision time exactly as written in the export (ISO-8601 in practice).
    pub timestamp: String,
    pub contributor_id: String,
    /// Username, or the IP address when `contributor_id` is `"0"`.
    pub contributor_name: String,
    pub source_text: String,
    /// Content format tag such as `text/x-wiki`; absent before schema 0.6.
    pub format: Option<String>,
}

impl PageRecord {
    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    pub fn is_anonymous_edit(&self) -> bool {
        self.contributor_id == ANONYMOUS_ID
    }
}

/// Normalized contributor block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub id: String,
    pub name: String,
}

impl Contributor {
    /// Apply the anonymous rule: no id (or id `0`) means an IP edit, and the
    /// name becomes the IP text.
    pub fn resolve(id: Option<String>, username: Option<String>, ip: Option<String>) -> Self {
        match id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            Some(id) if id != ANONYMOUS_ID => Self {
                id,
                name: username.unwrap_or_default(),
            },
            _ => Self::anonymous(ip.unwrap_or_default()),
        }
    }

    pub fn anonymous(ip: String) -> Self {
        Self {
            id: ANONYMOUS_ID.to_string(),
            name: ip,
        }
    }
}
