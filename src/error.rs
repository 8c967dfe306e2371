use thiserror::Error;

use crate::language::LanguageError;

/// Errors raised while opening or scanning an export.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A page or revision lacks a field every record needs.
    #[error("Missing <{element}> in {context}")]
    MissingElement {
        element: &'static str,
        context: String,
    },

    #[error("Unexpected end of input inside <{0}>")]
    UnexpectedEof(String),

    /// Push and pull consumption were mixed on one parser.
    #[error("Parser already consumed in {0} mode")]
    ModeConflict(&'static str),

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Language(#[from] LanguageError),
}

impl From<quick_xml::events::attributes::AttrError> for SourceError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        SourceError::Xml(e.into())
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
