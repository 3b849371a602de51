#![allow(unused_must_use)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::{fs::File, io::Write, num::NonZeroUsize};
use tempfile::tempdir;
use textscout::{
    DirectoryScope, FileHandle, MatchCollector, MatchRecord, SearchConfig, SearchPattern,
    SearchResult, SearchScope, SearchStatus, TextSearchEngine,
};

/// Counts matches from any number of threads
#[derive(Default)]
struct CountingCollector {
    matches: AtomicUsize,
}

impl MatchCollector for CountingCollector {
    fn accept_pattern_match(&self, _record: &MatchRecord) -> SearchResult<bool> {
        self.matches.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    fn can_run_in_parallel(&self) -> bool {
        true
    }
}

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> std::io::Result<Vec<FileHandle>> {
    for i in 0..file_count {
        let file_path = dir.path().join(format!("test_{}.txt", i));
        let mut file = File::create(file_path)?;
        for j in 0..lines_per_file {
            writeln!(
                file,
                "Line {} TODO: fix bug {} FIXME: optimize line {} NOTE: important task {}",
                j, j, j, j
            )?;
        }
    }
    Ok(DirectoryScope::new([dir.path()]).evaluate_files_in_scope(&mut SearchStatus::new()))
}

fn create_engine(pattern: &str, threads: usize) -> TextSearchEngine {
    let config = SearchConfig {
        thread_count: NonZeroUsize::new(threads).unwrap(),
        log_level: "warn".to_string(),
        ..SearchConfig::default()
    };
    TextSearchEngine::new(
        Arc::new(CountingCollector::default()),
        SearchPattern::new(pattern).unwrap(),
    )
    .with_config(config)
}

fn bench_patterns(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    let files = create_test_files(&dir, 10, 100)?;

    let patterns = vec![
        "TODO",
        r"TODO:.*\d+",
        r"FIXME:.*bug.*line \d+",
        r"NOTE:.*important.*\d+",
    ];

    let mut group = c.benchmark_group("Patterns");
    for (i, pattern) in patterns.iter().enumerate() {
        let engine = create_engine(pattern, 4);
        group.bench_function(format!("pattern_{}", i), |b| {
            b.iter(|| black_box(engine.search(&files, None)));
        });
    }
    group.finish();
    Ok(())
}

fn bench_file_scaling(c: &mut Criterion) -> std::io::Result<()> {
    let mut group = c.benchmark_group("File Scaling");
    for count in [1, 10, 100, 1000] {
        let dir = tempdir()?;
        let files = create_test_files(&dir, count, 10)?;
        let engine = create_engine("TODO", num_cpus::get());

        group.bench_function(format!("files_{}", count), |b| {
            b.iter(|| black_box(engine.search(&files, None)));
        });
    }
    group.finish();
    Ok(())
}

fn bench_worker_count(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    let files = create_test_files(&dir, 200, 50)?;

    let mut group = c.benchmark_group("Worker Count");
    for threads in [1, 2, 4, 8] {
        let engine = create_engine("FIXME", threads);
        group.bench_function(format!("threads_{}", threads), |b| {
            b.iter(|| black_box(engine.search(&files, None)));
        });
    }
    group.finish();
    Ok(())
}

fn bench_duplicate_replay(c: &mut Criterion) -> std::io::Result<()> {
    let dir = tempdir()?;
    let scanned = create_test_files(&dir, 1, 500)?;
    let location = scanned[0].location().unwrap().to_path_buf();
    let aliases: Vec<_> = (0..100)
        .map(|i| FileHandle::local(format!("/linked/{}/test_0.txt", i), &location))
        .collect();

    let engine = create_engine("TODO", 4);
    c.bench_function("duplicate_replay_100", |b| {
        b.iter(|| black_box(engine.search(&aliases, None)));
    });
    Ok(())
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_patterns, bench_file_scaling, bench_worker_count, bench_duplicate_replay
}

criterion_main!(benches);
