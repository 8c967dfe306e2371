use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::language::Language;

pub const NS_MAIN: i32 = 0;
pub const NS_TALK: i32 = 1;
pub const NS_USER: i32 = 2;
pub const NS_FILE: i32 = 6;
pub const NS_TEMPLATE: i32 = 10;
pub const NS_CATEGORY: i32 = 14;

const ILLEGAL_CHARS: &[char] = &['<', '>', '[', ']', '{', '}', '|'];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TitleError {
    #[error("Empty title")]
    Empty,
    #[error("Title {0:?} has an empty name after its namespace prefix")]
    EmptyLocalName(String),
    #[error("Title {title:?} contains illegal character {ch:?}")]
    IllegalCharacter { title: String, ch: char },
}

/// A page identity: namespace code plus the normalized name inside it,
/// resolved against one language's namespace names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Title {
    namespace: i32,
    decoded: String,
    language: Language,
}

impl Title {
    /// Resolve a raw title such as `Kategorie:Berlin` or `talk:foo_bar`.
    pub fn parse(raw: &str, language: &Language) -> Result<Self, TitleError> {
        let cleaned = clean(raw)?;
        if let Some((prefix, rest)) = cleaned.split_once(':') {
            if let Some(code) = language.namespace_code(prefix) {
                let local = rest.trim();
                if local.is_empty() {
                    return Err(TitleError::EmptyLocalName(cleaned.clone()));
                }
                return Ok(Self::from_parts(code, local, language));
            }
        }
        Ok(Self::from_parts(NS_MAIN, &cleaned, language))
    }

    /// Build a title whose namespace is already known; `local` is the name
    /// without any namespace prefix.
    pub fn in_namespace(namespace: i32, local: &str, language: &Language) -> Result<Self, TitleError> {
        let cleaned = clean(local)?;
        Ok(Self::from_parts(namespace, &cleaned, language))
    }

    fn from_parts(namespace: i32, local: &str, language: &Language) -> Self {
        Self {
            namespace,
            decoded: capitalize_first(local),
            language: language.clone(),
        }
    }

    pub fn namespace(&self) -> i32 {
        self.namespace
    }

    /// Name inside the namespace, with spaces.
    pub fn decoded(&self) -> &str {
        &self.decoded
    }

    /// Name inside the namespace, URL style (`_` for spaces).
    pub fn encoded(&self) -> String {
        self.decoded.replace(' ', "_")
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Title with its localized namespace prefix, e.g. `Kategorie:Berlin`.
    pub fn full_title(&self) -> String {
        if self.namespace == NS_MAIN {
            return self.decoded.clone();
        }
        match self.language.namespace_name(self.namespace) {
            Some(name) => format!("{}:{}", name, self.decoded),
            None => format!("{{ns{}}}:{}", self.namespace, self.decoded),
        }
    }

    pub fn is_category(&self) -> bool {
        self.namespace == NS_CATEGORY
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_title())
    }
}

/// Accept predicate run on every resolved page title.
pub type TitleFilter = Arc<dyn Fn(&Title) -> bool + Send + Sync>;

pub fn accept_all() -> TitleFilter {
    Arc::new(|_: &Title| true)
}

/// Accept only titles in the given namespaces.
pub fn namespace_filter(namespaces: &[i32]) -> TitleFilter {
    let allowed: HashSet<i32> = namespaces.iter().copied().collect();
    Arc::new(move |title: &Title| allowed.contains(&title.namespace()))
}

/// Drop a section fragment, unify `_` and whitespace runs, strip one leading colon.
fn clean(raw: &str) -> Result<String, TitleError> {
    let without_fragment = raw.split('#').next().unwrap_or_default();
    let spaced = without_fragment.replace('_', " ");
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.strip_prefix(':').unwrap_or(&collapsed).trim();

    if trimmed.is_empty() {
        return Err(TitleError::Empty);
    }
    if let Some(ch) = trimmed
        .chars()
        .find(|c| ILLEGAL_CHARS.contains(c) || c.is_control())
    {
        return Err(TitleError::IllegalCharacter {
            title: trimmed.to_string(),
            ch,
        });
    }
    Ok(trimmed.to_string())
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
