use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::warn;

use wiki_ingest::settings::IngestSettings;
use wiki_ingest::source::{self, DumpSource, Source, SourceOptions};
use wiki_ingest::title::namespace_filter;
use wiki_ingest::tree::Element;
use wiki_ingest::{Language, PageRecord, Termination};

#[derive(Parser)]
#[command(name = "wiki_ingest", about = "Page records from wiki XML exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count pages across one or more dump files (.xml, .xml.bz2, .xml.gz)
    Count {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the first pages of a dump as JSON lines
    List {
        file: PathBuf,
        /// Max pages to print
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the pages of a harvested update batch as JSON lines (--lang is
    /// ignored, the batch's own language tag decides)
    Harvest {
        file: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Language code used to resolve titles (default: from the input)
    #[arg(long)]
    lang: Option<String>,
    /// Only keep pages in these namespaces (repeatable)
    #[arg(long = "ns")]
    namespaces: Vec<i32>,
    /// Worker threads for multi-file runs (default: one per core)
    #[arg(long)]
    threads: Option<usize>,
}

impl CommonArgs {
    /// Flags win over `WIKI_INGEST_*` settings.
    fn options(&self) -> anyhow::Result<SourceOptions> {
        let settings = IngestSettings::load().context("Invalid WIKI_INGEST_* settings")?;
        let mut options = settings.to_options().context("Invalid WIKI_INGEST_* settings")?;
        if let Some(code) = &self.lang {
            options = options.with_language(Language::new(code)?);
        }
        if !self.namespaces.is_empty() {
            options = options.with_filter(namespace_filter(&self.namespaces));
        }
        if let Some(threads) = self.threads {
            options = options.with_threads(threads);
        }
        Ok(options)
    }
}

/// One output line per page.
#[derive(Serialize)]
struct PageLine<'a> {
    title: String,
    namespace: i32,
    page_id: &'a str,
    revision_id: &'a str,
    timestamp: &'a str,
    contributor: &'a str,
    anonymous: bool,
    redirect: Option<String>,
    format: Option<&'a str>,
    bytes: usize,
    preview: String,
}

impl<'a> From<&'a PageRecord> for PageLine<'a> {
    fn from(p: &'a PageRecord) -> Self {
        Self {
            title: p.title.full_title(),
            namespace: p.title.namespace(),
            page_id: &p.page_id,
            revision_id: &p.revision_id,
            timestamp: &p.timestamp,
            contributor: &p.contributor_name,
            anonymous: p.is_anonymous_edit(),
            redirect: p.redirect.as_ref().map(|t| t.full_title()),
            format: p.format.as_deref(),
            bytes: p.source_text.len(),
            preview: preview(&p.source_text, 60),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Count { files, common } => count(&files, &common.options()?),
        Commands::List { file, limit, common } => list(file, limit, &common.options()?),
        Commands::Harvest { file, common } => harvest(file, &common.options()?),
    };

    eprintln!("Done in {}", elapsed_label(t0.elapsed()));

    result
}

fn count(files: &[PathBuf], options: &SourceOptions) -> anyhow::Result<()> {
    for f in files {
        anyhow::ensure!(f.exists(), "No such file: {}", f.display());
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} pages ({per_sec})")?);
    pb.enable_steady_tick(Duration::from_millis(120));

    let total = AtomicUsize::new(0);
    let sink = |_: PageRecord| {
        total.fetch_add(1, Ordering::Relaxed);
        pb.inc(1);
    };

    match source::from_files(files, options) {
        DumpSource::Single(single) => {
            let outcome = single.for_each_page(&sink);
            pb.finish_and_clear();
            outcome.with_context(|| format!("Failed to read {}", files[0].display()))?;
        }
        DumpSource::Multi(multi) => {
            let report = multi.try_for_each_page(&sink)?;
            pb.finish_and_clear();
            for failure in &report.failures {
                println!("FAILED {}: {}", files[failure.index].display(), failure.error);
            }
        }
    }

    println!("{} pages in {} file(s)", total.into_inner(), files.len());
    Ok(())
}

fn list(file: PathBuf, limit: usize, options: &SourceOptions) -> anyhow::Result<()> {
    let source = source::from_file(&file, options);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    source
        .with_pages(|pages| -> anyhow::Result<()> {
            for page in pages.by_ref().take(limit) {
                writeln!(out, "{}", serde_json::to_string(&PageLine::from(&page))?)?;
            }
            if let Some(Termination::Failed(e)) = pages.termination() {
                warn!(file = %file.display(), error = %e, "Listing stopped early");
            }
            Ok(())
        })
        .with_context(|| format!("Failed to open {}", file.display()))??;
    Ok(())
}

fn harvest(file: PathBuf, options: &SourceOptions) -> anyhow::Result<()> {
    let reader = source::input::open_file(&file).with_context(|| format!("Failed to open {}", file.display()))?;
    let root = Element::parse_reader(reader).with_context(|| format!("Failed to parse {}", file.display()))?;
    let batch = source::from_harvested_batch(root, options);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut n = 0;
    for page in batch.pages() {
        writeln!(out, "{}", serde_json::to_string(&PageLine::from(&page))?)?;
        n += 1;
    }
    eprintln!("{} pages (language {})", n, batch.language());
    Ok(())
}

/// The wikitext flattened onto one line, cut after `max` characters.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((at, _)) => format!("{}...", &flat[..at]),
        None => flat,
    }
}

/// `850ms`, `12.4s` or `3:07` (minutes:seconds) for longer runs.
fn elapsed_label(d: Duration) -> String {
    match d.as_secs() {
        0 => format!("{}ms", d.as_millis()),
        s if s < 60 => format!("{:.1}s", d.as_secs_f64()),
        s => format!("{}:{:02}", s / 60, s % 60),
    }
}
