use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]{1,11}(-[a-z0-9]+)*$").unwrap());

pub const FALLBACK_CODE: &str = "en";

/// Namespace names every wiki understands, regardless of content language.
const CANONICAL: &[(i32, &str)] = &[
    (-2, "Media"),
    (-1, "Special"),
    (1, "Talk"),
    (2, "User"),
    (3, "User talk"),
    (4, "Project"),
    (5, "Project talk"),
    (6, "File"),
    (6, "Image"),
    (7, "File talk"),
    (8, "MediaWiki"),
    (9, "MediaWiki talk"),
    (10, "Template"),
    (11, "Template talk"),
    (12, "Help"),
    (13, "Help talk"),
    (14, "Category"),
    (15, "Category talk"),
];

const LOCAL_EN: &[(i32, &str)] = &[(4, "Wikipedia"), (5, "Wikipedia talk")];

const LOCAL_DE: &[(i32, &str)] = &[
    (-2, "Medium"),
    (-1, "Spezial"),
    (1, "Diskussion"),
    (2, "Benutzer"),
    (3, "Benutzer Diskussion"),
    (4, "Wikipedia"),
    (5, "Wikipedia Diskussion"),
    (6, "Datei"),
    (7, "Datei Diskussion"),
    (9, "MediaWiki Diskussion"),
    (10, "Vorlage"),
    (11, "Vorlage Diskussion"),
    (12, "Hilfe"),
    (13, "Hilfe Diskussion"),
    (14, "Kategorie"),
    (15, "Kategorie Diskussion"),
];

const LOCAL_FR: &[(i32, &str)] = &[
    (-2, "Média"),
    (-1, "Spécial"),
    (1, "Discussion"),
    (2, "Utilisateur"),
    (3, "Discussion utilisateur"),
    (4, "Wikipédia"),
    (5, "Discussion Wikipédia"),
    (6, "Fichier"),
    (7, "Discussion fichier"),
    (9, "Discussion MediaWiki"),
    (10, "Modèle"),
    (11, "Discussion modèle"),
    (12, "Aide"),
    (13, "Discussion aide"),
    (14, "Catégorie"),
    (15, "Discussion catégorie"),
];

static LOCAL_NAMES: LazyLock<HashMap<&'static str, &'static [(i32, &'static str)]>> =
    LazyLock::new(|| HashMap::from([("en", LOCAL_EN), ("de", LOCAL_DE), ("fr", LOCAL_FR)]));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LanguageError {
    #[error("Invalid language code: {0:?}")]
    InvalidCode(String),
}

/// Language of a wiki edition, identified by its wiki code (`en`, `de`, `simple`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Language {
    code: String,
}

impl Language {
    pub fn new(code: &str) -> Result<Self, LanguageError> {
        let code = code.trim().to_lowercase();
        if !CODE_RE.is_match(&code) {
            return Err(LanguageError::InvalidCode(code));
        }
        Ok(Self { code })
    }

    /// Language used when neither the caller nor the input names one.
    pub fn fallback() -> Self {
        Self {
            code: FALLBACK_CODE.to_string(),
        }
    }

    /// Parse an optional language tag, falling back on absent, empty or invalid input.
    pub fn from_tag_or_fallback(tag: Option<&str>) -> Self {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) => Self::new(t).unwrap_or_else(|_| Self::fallback()),
            None => Self::fallback(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Resolve a title prefix to a namespace code. Local names are tried
    /// before canonical ones; matching ignores case and `_`/space differences.
    pub fn namespace_code(&self, prefix: &str) -> Option<i32> {
        let wanted = normalize_prefix(prefix);
        self.local_names()
            .iter()
            .chain(CANONICAL)
            .find(|(_, name)| normalize_prefix(name) == wanted)
            .map(|(code, _)| *code)
    }

    /// Display name of a namespace in this language.
    pub fn namespace_name(&self, code: i32) -> Option<&'static str> {
        if code == 0 {
            return Some("");
        }
        self.local_names()
            .iter()
            .chain(CANONICAL)
            .find(|(c, _)| *c == code)
            .map(|(_, name)| *name)
    }

    fn local_names(&self) -> &'static [(i32, &'static str)] {
        LOCAL_NAMES.get(self.code.as_str()).copied().unwrap_or(&[])
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::fallback()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

fn normalize_prefix(name: &str) -> String {
    name.trim().replace('_', " ").to_lowercase()
}
