use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use super::input::ReaderFactory;
use super::{Source, SourceOptions};
use crate::error::{Result, SourceError};
use crate::language::Language;
use crate::page::PageRecord;
use crate::parser::DumpParser;
use crate::title::TitleFilter;

/// A reader whose parse task failed.
#[derive(Debug)]
pub struct TaskFailure {
    /// Position of the reader in the source's list.
    pub index: usize,
    pub error: SourceError,
}

/// Outcome of one fan-out traversal.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// Records handed to the sink, failed readers included up to their failure.
    pub pages: usize,
    pub failures: Vec<TaskFailure>,
}

impl FanOutReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Parses many exports at once, one pool task per reader.
///
/// Records from different readers interleave freely; each reader's own
/// records keep document order. The sink is called from worker threads.
pub struct MultiReaderSource {
    readers: Vec<ReaderFactory>,
    language: Option<Language>,
    filter: TitleFilter,
    threads: Option<usize>,
}

impl MultiReaderSource {
    pub fn new(readers: Vec<ReaderFactory>, options: &SourceOptions) -> Self {
        Self {
            readers,
            language: options.language.clone(),
            filter: options.filter.clone(),
            threads: options.threads,
        }
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    fn pool_size(&self) -> usize {
        self.threads.filter(|n| *n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Traverse every reader and report which ones failed.
    ///
    /// A pool is built for this call and torn down before it returns; all
    /// tasks have finished by then. A failing reader never stops the others.
    pub fn try_for_each_page(&self, sink: &(dyn Fn(PageRecord) + Sync)) -> Result<FanOutReport> {
        let threads = self.pool_size();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("dump-worker-{}", i))
            .build()?;
        debug!(threads, readers = self.readers.len(), "Starting fan-out");

        let pages = AtomicUsize::new(0);
        let failures: Vec<TaskFailure> = pool.install(|| {
            self.readers
                .par_iter()
                .enumerate()
                .filter_map(|(index, open)| {
                    let counted = |page: PageRecord| {
                        pages.fetch_add(1, Ordering::Relaxed);
                        sink(page);
                    };
                    match self.parse_one(open, counted) {
                        Ok(n) => {
                            debug!(reader = index, pages = n, "Reader finished");
                            None
                        }
                        Err(error) => {
                            warn!(reader = index, error = %error, "Reader task failed");
                            Some(TaskFailure { index, error })
                        }
                    }
                })
                .collect()
        });

        let report = FanOutReport {
            pages: pages.into_inner(),
            failures,
        };
        info!(
            readers = self.readers.len(),
            pages = report.pages,
            failed = report.failures.len(),
            "Fan-out finished"
        );
        Ok(report)
    }

    fn parse_one<F: FnMut(PageRecord)>(&self, open: &ReaderFactory, f: F) -> Result<usize> {
        let reader = open()?;
        let mut parser = DumpParser::new(reader, self.language.clone(), self.filter.clone());
        parser.run(f)
    }
}

impl Source for MultiReaderSource {
    /// Per-reader failures are logged and otherwise dropped; use
    /// [`MultiReaderSource::try_for_each_page`] to see them.
    fn for_each_page(&self, sink: &(dyn Fn(PageRecord) + Sync)) -> Result<()> {
        self.try_for_each_page(sink).map(|_| ())
    }
}
