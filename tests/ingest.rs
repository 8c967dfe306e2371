use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use tempfile::TempDir;

use wiki_ingest::source::{self, DumpSource, Source, SourceOptions};
use wiki_ingest::title::{namespace_filter, NS_CATEGORY, NS_MAIN};
use wiki_ingest::tree::Element;
use wiki_ingest::{Language, Termination};

fn fixture(name: &str) -> String {
    fs::read_to_string(Path::new("tests/fixtures").join(name)).unwrap()
}

fn write_plain(dir: &TempDir, name: &str, xml: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, xml).unwrap();
    path
}

fn write_bz2(dir: &TempDir, name: &str, xml: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut enc = BzEncoder::new(File::create(&path).unwrap(), bzip2::Compression::best());
    enc.write_all(xml.as_bytes()).unwrap();
    enc.finish().unwrap();
    path
}

fn write_gz(dir: &TempDir, name: &str, xml: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut enc = GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
    enc.write_all(xml.as_bytes()).unwrap();
    enc.finish().unwrap();
    path
}

fn titles(source: &dyn Source) -> Vec<String> {
    let seen = Mutex::new(Vec::new());
    source
        .for_each_page(&|p| seen.lock().unwrap().push(p.title.full_title()))
        .unwrap();
    let mut seen = seen.into_inner().unwrap();
    seen.sort();
    seen
}

#[test]
fn compressed_dumps_match_plain() {
    let dir = TempDir::new().unwrap();
    let xml = fixture("mixed.xml");
    let plain = write_plain(&dir, "dump.xml", &xml);
    let bz2 = write_bz2(&dir, "dump.xml.bz2", &xml);
    let gz = write_gz(&dir, "dump.xml.gz", &xml);

    let opts = SourceOptions::default();
    let expected = titles(&source::from_file(&plain, &opts));
    assert_eq!(expected.len(), 5);
    assert_eq!(titles(&source::from_file(&bz2, &opts)), expected);
    assert_eq!(titles(&source::from_file(&gz, &opts)), expected);
}

#[test]
fn files_fan_out_through_factory() {
    let dir = TempDir::new().unwrap();
    let paths = vec![
        write_plain(&dir, "a.xml", &fixture("two_pages.xml")),
        write_bz2(&dir, "b.xml.bz2", &fixture("mixed.xml")),
        write_plain(&dir, "c.xml", &fixture("malformed.xml")),
    ];

    let source = source::from_files(&paths, &SourceOptions::default().with_threads(2));
    let DumpSource::Multi(multi) = &source else {
        panic!("three files should fan out");
    };

    let calls = AtomicUsize::new(0);
    let report = multi
        .try_for_each_page(&|_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    // 2 + 5 + 1 record before the malformed page
    assert_eq!(calls.load(Ordering::SeqCst), 8);
    assert_eq!(report.pages, 8);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);

    // the default entry point stays quiet about it
    assert!(source.for_each_page(&|_| {}).is_ok());
}

#[test]
fn missing_file_is_a_task_failure_in_fan_out() {
    let dir = TempDir::new().unwrap();
    let paths = vec![
        write_plain(&dir, "a.xml", &fixture("two_pages.xml")),
        dir.path().join("gone.xml"),
    ];
    let DumpSource::Multi(multi) = source::from_files(&paths, &SourceOptions::default()) else {
        panic!("two files should fan out");
    };
    let report = multi.try_for_each_page(&|_| {}).unwrap();
    assert_eq!(report.pages, 2);
    assert_eq!(report.failures[0].index, 1);
}

#[test]
fn single_file_push_surfaces_errors() {
    let dir = TempDir::new().unwrap();
    let path = write_plain(&dir, "bad.xml", &fixture("malformed.xml"));
    let source = source::from_files(&[path], &SourceOptions::default());
    assert!(matches!(source, DumpSource::Single(_)));
    assert!(source.for_each_page(&|_| {}).is_err());
}

#[test]
fn pull_from_bz2_with_early_exit() {
    let dir = TempDir::new().unwrap();
    let path = write_bz2(&dir, "dump.xml.bz2", &fixture("mixed.xml"));
    let source = source::from_file(&path, &SourceOptions::default());

    let first_two: Vec<_> = source
        .with_pages(|pages| pages.take(2).map(|p| p.page_id).collect())
        .unwrap();
    assert_eq!(first_two, vec!["10", "11"]);

    let (count, termination) = source
        .with_pages(|pages| {
            let n = pages.by_ref().count();
            (n, matches!(pages.termination(), Some(Termination::Exhausted)))
        })
        .unwrap();
    assert_eq!(count, 5);
    assert!(termination);
}

#[test]
fn namespace_filter_and_language_override() {
    let dir = TempDir::new().unwrap();
    let path = write_plain(&dir, "dump.xml", &fixture("mixed.xml"));

    let opts = SourceOptions::default().with_filter(namespace_filter(&[NS_CATEGORY]));
    let seen = titles(&source::from_file(&path, &opts));
    assert_eq!(seen, vec!["Category:Cities"]);

    let opts = SourceOptions::default()
        .with_language(Language::new("en").unwrap())
        .with_filter(namespace_filter(&[NS_MAIN]));
    let seen = titles(&source::from_file(&path, &opts));
    assert!(seen.iter().all(|t| !t.starts_with("Category:") && !t.starts_with("Talk:")));
}

#[test]
fn harvested_batch_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write_gz(&dir, "batch.xml.gz", &fixture("harvest_de.xml"));

    let reader = source::input::open_file(&path).unwrap();
    let root = Element::parse_reader(reader).unwrap();
    let batch = source::from_harvested_batch(root, &SourceOptions::default());
    assert_eq!(batch.language().code(), "de");

    let pages: Vec<_> = batch.pages().collect();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].page_id, "42");
    assert!(pages[0].redirect.is_none());
    assert_eq!(pages[0].title.full_title(), "Diskussion:Foo");
}
