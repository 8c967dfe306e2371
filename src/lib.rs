//! Turns encyclopedia exports into one stream of page records.
//!
//! Streamed dump files (plain, `.bz2`, `.gz`), in-memory trees and harvested
//! update batches all end up behind [`source::Source`].

pub mod error;
pub mod language;
pub mod page;
pub mod parser;
pub mod settings;
pub mod source;
pub mod title;
pub mod tree;

pub use error::{Result, SourceError};
pub use language::Language;
pub use page::PageRecord;
pub use parser::{DumpParser, SiteInfo, Termination};
pub use source::{Source, SourceOptions};
pub use title::{Title, TitleFilter};
