use tracing::debug;

use super::input::{BoxedReader, ReaderFactory};
use super::{Source, SourceOptions};
use crate::error::Result;
use crate::language::Language;
use crate::page::PageRecord;
use crate::parser::{DumpParser, SiteInfo, Termination};
use crate::title::TitleFilter;

/// Source over a single export stream.
pub struct ReaderSource {
    open: ReaderFactory,
    language: Option<Language>,
    filter: TitleFilter,
}

impl ReaderSource {
    pub fn new(open: ReaderFactory, options: &SourceOptions) -> Self {
        Self {
            open,
            language: options.language.clone(),
            filter: options.filter.clone(),
        }
    }

    /// Push traversal. Opens the reader, feeds every accepted page to `f`
    /// and releases the reader before returning, on success or error.
    pub fn traverse<F: FnMut(PageRecord)>(&self, f: F) -> Result<usize> {
        let reader = (self.open)()?;
        let mut parser = DumpParser::new(reader, self.language.clone(), self.filter.clone());
        parser.run(f)
    }

    /// Pull iterator. The reader is opened right here, not on the first
    /// `next()`, and stays open until the iterator is closed or dropped.
    pub fn pages(&self) -> Result<PageIter> {
        let reader = (self.open)()?;
        let mut parser = DumpParser::new(reader, self.language.clone(), self.filter.clone());
        parser.prepare_iteration()?;
        Ok(PageIter {
            parser: Some(parser),
        })
    }

    /// Scoped pull: lend a fresh iterator to `f` and release it afterwards.
    pub fn with_pages<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PageIter) -> T,
    {
        let mut pages = self.pages()?;
        let out = f(&mut pages);
        pages.close();
        Ok(out)
    }
}

impl Source for ReaderSource {
    fn for_each_page(&self, sink: &(dyn Fn(PageRecord) + Sync)) -> Result<()> {
        self.traverse(sink).map(|_| ())
    }
}

/// Pull-mode view of one open export.
pub struct PageIter {
    parser: Option<DumpParser<BoxedReader>>,
}

impl PageIter {
    /// Release the reader. Further `next()` calls return `None`.
    pub fn close(&mut self) {
        if self.parser.take().is_some() {
            debug!("Page iterator closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.parser.is_some()
    }

    /// Why iteration stopped, if it has. `None` after `close()`.
    pub fn termination(&self) -> Option<&Termination> {
        self.parser.as_ref().and_then(DumpParser::termination)
    }

    pub fn site_info(&self) -> Option<&SiteInfo> {
        self.parser.as_ref().map(DumpParser::site_info)
    }
}

impl Iterator for PageIter {
    type Item = PageRecord;

    fn next(&mut self) -> Option<PageRecord> {
        let parser = self.parser.as_mut()?;
        if parser.has_next_page() {
            parser.next_page()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::input::{bytes_reader, BoxedReader};
    use std::io::{self, BufRead, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.xml", name)).unwrap()
    }

    /// Reader that counts how many instances are alive.
    struct Tracked {
        inner: io::Cursor<Vec<u8>>,
        open: Arc<AtomicUsize>,
    }

    impl Read for Tracked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl BufRead for Tracked {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            self.inner.fill_buf()
        }
        fn consume(&mut self, amt: usize) {
            self.inner.consume(amt)
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn tracked(xml: String, open: Arc<AtomicUsize>) -> ReaderFactory {
        Arc::new(move || -> io::Result<BoxedReader> {
            open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Tracked {
                inner: io::Cursor::new(xml.clone().into_bytes()),
                open: Arc::clone(&open),
            }))
        })
    }

    #[test]
    fn push_and_pull_agree() {
        let source = ReaderSource::new(bytes_reader(fixture("mixed")), &SourceOptions::default());
        let mut pushed = Vec::new();
        let count = source.traverse(|p| pushed.push(p)).unwrap();
        let pulled: Vec<_> = source.pages().unwrap().collect();
        assert_eq!(count, 5);
        assert_eq!(pushed, pulled);
    }

    #[test]
    fn push_releases_reader_on_success_and_failure() {
        let open = Arc::new(AtomicUsize::new(0));

        let good = ReaderSource::new(tracked(fixture("two_pages"), open.clone()), &SourceOptions::default());
        assert_eq!(good.traverse(|_| {}).unwrap(), 2);
        assert_eq!(open.load(Ordering::SeqCst), 0);

        let bad = ReaderSource::new(tracked(fixture("malformed"), open.clone()), &SourceOptions::default());
        assert!(bad.traverse(|_| {}).is_err());
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pull_opens_eagerly() {
        let open = Arc::new(AtomicUsize::new(0));
        let source = ReaderSource::new(tracked(fixture("two_pages"), open.clone()), &SourceOptions::default());

        let mut pages = source.pages().unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 1);
        assert!(pages.is_open());

        pages.close();
        assert_eq!(open.load(Ordering::SeqCst), 0);
        assert!(pages.next().is_none());

        let dropped = source.pages().unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 1);
        drop(dropped);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scoped_pull_supports_early_exit() {
        let open = Arc::new(AtomicUsize::new(0));
        let source = ReaderSource::new(tracked(fixture("mixed"), open.clone()), &SourceOptions::default());

        let first = source
            .with_pages(|pages| pages.next().map(|p| p.page_id))
            .unwrap();
        assert_eq!(first.as_deref(), Some("10"));
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pull_hides_errors_push_reports_them() {
        let source = ReaderSource::new(bytes_reader(fixture("malformed")), &SourceOptions::default());

        let (count, failed) = source
            .with_pages(|pages| {
                let count = pages.by_ref().count();
                (count, matches!(pages.termination(), Some(Termination::Failed(_))))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert!(failed);

        assert!(source.traverse(|_| {}).is_err());
    }

    #[test]
    fn open_error_propagates() {
        let failing: ReaderFactory = Arc::new(|| -> io::Result<BoxedReader> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
        });
        let source = ReaderSource::new(failing, &SourceOptions::default());
        assert!(source.traverse(|_| {}).is_err());
        assert!(source.pages().is_err());
    }

    #[test]
    fn works_through_trait_object() {
        let source: Box<dyn Source> =
            Box::new(ReaderSource::new(bytes_reader(fixture("two_pages")), &SourceOptions::default()));
        let names = Mutex::new(Vec::new());
        source
            .for_each_page(&|p| names.lock().unwrap().push(p.contributor_name))
            .unwrap();
        assert_eq!(*names.lock().unwrap(), vec!["Alice", "10.0.0.1"]);
    }
}
