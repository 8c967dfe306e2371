//! Page sources: one abstraction over streamed dump files, in-memory trees
//! and harvested update batches.

pub mod input;
pub mod multi;
pub mod reader;
pub mod tree;

use std::path::Path;

use crate::error::Result;
use crate::language::Language;
use crate::page::PageRecord;
use crate::title::{accept_all, TitleFilter};
use crate::tree::Element;

pub use input::{bytes_reader, file_reader, BoxedReader, ReaderFactory};
pub use multi::{FanOutReport, MultiReaderSource, TaskFailure};
pub use reader::{PageIter, ReaderSource};
pub use tree::{HarvestedBatchSource, TreeSource};

/// Anything that can feed page records to a sink.
///
/// The sink may be called from several threads at once (multi-reader
/// sources), so it must be `Sync`.
pub trait Source: Send + Sync {
    fn for_each_page(&self, sink: &(dyn Fn(PageRecord) + Sync)) -> Result<()>;
}

/// Caller choices shared by every source variant.
#[derive(Clone)]
pub struct SourceOptions {
    /// Language used to resolve titles. `None` lets dump sources take it from
    /// the export's `xml:lang`.
    pub language: Option<Language>,
    pub filter: TitleFilter,
    /// Upper bound on fan-out workers. `None` or `0` means one per core.
    pub threads: Option<usize>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            language: None,
            filter: accept_all(),
            threads: None,
        }
    }
}

impl SourceOptions {
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_filter(mut self, filter: TitleFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Stream-backed source picked by the factory.
pub enum DumpSource {
    Single(ReaderSource),
    Multi(MultiReaderSource),
}

impl Source for DumpSource {
    fn for_each_page(&self, sink: &(dyn Fn(PageRecord) + Sync)) -> Result<()> {
        match self {
            DumpSource::Single(s) => s.for_each_page(sink),
            DumpSource::Multi(m) => m.for_each_page(sink),
        }
    }
}

pub fn from_reader(open: ReaderFactory, options: &SourceOptions) -> ReaderSource {
    ReaderSource::new(open, options)
}

/// One reader stays single-threaded; more go to the fan-out pool.
pub fn from_readers(mut readers: Vec<ReaderFactory>, options: &SourceOptions) -> DumpSource {
    if readers.len() == 1 {
        if let Some(open) = readers.pop() {
            return DumpSource::Single(ReaderSource::new(open, options));
        }
    }
    DumpSource::Multi(MultiReaderSource::new(readers, options))
}

pub fn from_file(path: impl AsRef<Path>, options: &SourceOptions) -> ReaderSource {
    ReaderSource::new(file_reader(path), options)
}

pub fn from_files<P: AsRef<Path>>(paths: &[P], options: &SourceOptions) -> DumpSource {
    from_readers(paths.iter().map(file_reader).collect(), options)
}

/// Trees carry no language of their own; the fallback applies when the
/// caller gives none.
pub fn from_tree(root: Element, options: &SourceOptions) -> TreeSource {
    let language = options.language.clone().unwrap_or_else(Language::fallback);
    TreeSource::new(root, language, options.filter.clone())
}

/// The batch's root attribute decides the language; `options.language` is
/// not consulted.
pub fn from_harvested_batch(root: Element, options: &SourceOptions) -> HarvestedBatchSource {
    HarvestedBatchSource::new(root, options.filter.clone())
}
