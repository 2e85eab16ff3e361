//! Purpose: Throughput evaluation over one or more sources.
//! Role: Validate inputs, then run sequentially or across a worker pool;
//! time the setup and read phases; reduce per-task byte counts.
//! Invariants: Byte totals are independent of worker count, task order, and
//! scheduling; the first task error aborts the run and discards partials.

use std::path::PathBuf;
use std::time::Duration;

use rayon::prelude::*;

use crate::core::clusters::{discover_clusters, merge_clusters};
use crate::core::columns::resolve_columns;
use crate::core::counter::{self, ByteStats};
use crate::core::error::{Error, ErrorKind};
use crate::core::stopwatch::Stopwatch;

/// Default scheduling hint: aim for about this many read tasks per worker.
pub const DEFAULT_TASKS_PER_WORKER: u32 = 10;

/// What to read: the sources, the collection in each, and the column spec.
/// Immutable for the duration of a run.
#[derive(Clone, Debug)]
pub struct ScanSpec {
    /// Either a single collection name shared by all sources, or one name
    /// per source, positionally.
    pub collections: Vec<String>,
    pub sources: Vec<PathBuf>,
    /// Exact column names, or patterns when `use_patterns` is set.
    pub columns: Vec<String>,
    pub use_patterns: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    /// 0 reads everything on the calling thread; otherwise the requested
    /// worker-pool size.
    pub threads: usize,
    /// Tasks-per-worker hint consumed by the setup phase.
    pub tasks_per_worker: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            tasks_per_worker: DEFAULT_TASKS_PER_WORKER,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RunResult {
    /// Time spent reading and decoding, as seen by the orchestrating thread.
    pub wall_time: Duration,
    pub cpu_time: Duration,
    /// Time spent discovering and merging clusters; zero for sequential runs.
    pub setup_wall_time: Duration,
    pub setup_cpu_time: Duration,
    pub decoded_bytes: u64,
    pub raw_bytes: u64,
    /// Granted worker-pool size; 0 denotes a sequential run.
    pub thread_pool_size: usize,
}

pub fn eval_throughput(spec: &ScanSpec, options: &EngineOptions) -> Result<RunResult, Error> {
    validate(spec, options)?;
    if options.threads == 0 {
        eval_sequential(spec)
    } else {
        eval_parallel(spec, options)
    }
}

fn validate(spec: &ScanSpec, options: &EngineOptions) -> Result<(), Error> {
    if spec.collections.is_empty() {
        return Err(Error::new(ErrorKind::Validation)
            .with_message("provide at least one collection name"));
    }
    if spec.sources.is_empty() {
        return Err(Error::new(ErrorKind::Validation).with_message("provide at least one source"));
    }
    if spec.columns.is_empty() {
        return Err(Error::new(ErrorKind::Validation)
            .with_message("provide at least one column name or pattern"));
    }
    if spec.collections.len() != 1 && spec.collections.len() != spec.sources.len() {
        return Err(Error::new(ErrorKind::Validation).with_message(format!(
            "provide either one collection name or as many as the sources ({} names for {} sources)",
            spec.collections.len(),
            spec.sources.len()
        )));
    }
    if options.tasks_per_worker == 0 {
        return Err(Error::new(ErrorKind::Validation)
            .with_message("tasks-per-worker hint must be at least 1"));
    }
    Ok(())
}

fn collection_for<'spec>(spec: &'spec ScanSpec, source_idx: usize) -> &'spec str {
    if spec.collections.len() > 1 {
        &spec.collections[source_idx]
    } else {
        &spec.collections[0]
    }
}

fn eval_sequential(spec: &ScanSpec) -> Result<RunResult, Error> {
    let mut totals = ByteStats::default();
    let mut sw = Stopwatch::started();
    for (idx, path) in spec.sources.iter().enumerate() {
        let collection = collection_for(spec, idx);
        let columns = resolve_columns(path, collection, &spec.columns, spec.use_patterns)?;
        totals = totals.merge(counter::read_rows(path, collection, &columns, None)?);
    }
    sw.stop();

    Ok(RunResult {
        wall_time: sw.wall_time(),
        cpu_time: sw.cpu_time(),
        setup_wall_time: Duration::ZERO,
        setup_cpu_time: Duration::ZERO,
        decoded_bytes: totals.decoded_bytes,
        raw_bytes: totals.raw_bytes,
        thread_pool_size: 0,
    })
}

fn eval_parallel(spec: &ScanSpec, options: &EngineOptions) -> Result<RunResult, Error> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("could not build worker pool")
                .with_source(err)
        })?;
    let actual_threads = pool.current_num_threads();
    if actual_threads != options.threads {
        tracing::warn!(
            requested = options.threads,
            actual = actual_threads,
            "worker pool size differs from request"
        );
    }

    // Setup phase: discover natural clusters and merge them down to at most
    // ceil(hint * workers / sources) tasks per source.
    let mut setup_sw = Stopwatch::started();
    let max_tasks_per_source =
        (options.tasks_per_worker as usize * actual_threads).div_ceil(spec.sources.len());
    let mut ranges_per_source = Vec::with_capacity(spec.sources.len());
    for (idx, path) in spec.sources.iter().enumerate() {
        let natural = discover_clusters(path, collection_for(spec, idx))?;
        ranges_per_source.push(merge_clusters(natural, max_tasks_per_source));
    }
    setup_sw.stop();
    tracing::debug!(
        sources = spec.sources.len(),
        tasks = ranges_per_source.iter().map(Vec::len).sum::<usize>(),
        max_tasks_per_source,
        "scheduled read tasks"
    );

    // Column resolution sits outside both timed phases.
    let mut columns_per_source = Vec::with_capacity(spec.sources.len());
    for (idx, path) in spec.sources.iter().enumerate() {
        columns_per_source.push(resolve_columns(
            path,
            collection_for(spec, idx),
            &spec.columns,
            spec.use_patterns,
        )?);
    }

    // Execution phase: one task per merged range, fanned out over sources
    // and ranges, folded with an order-independent sum.
    let mut run_sw = Stopwatch::started();
    let totals = pool.install(|| {
        ranges_per_source
            .par_iter()
            .enumerate()
            .map(|(idx, ranges)| {
                let path = &spec.sources[idx];
                let collection = collection_for(spec, idx);
                let columns = &columns_per_source[idx];
                ranges
                    .par_iter()
                    .map(|range| counter::read_rows(path, collection, columns, Some(*range)))
                    .try_reduce(ByteStats::default, |a, b| Ok(a.merge(b)))
            })
            .try_reduce(ByteStats::default, |a, b| Ok(a.merge(b)))
    })?;
    run_sw.stop();

    Ok(RunResult {
        wall_time: run_sw.wall_time(),
        cpu_time: run_sw.cpu_time(),
        setup_wall_time: setup_sw.wall_time(),
        setup_cpu_time: setup_sw.cpu_time(),
        decoded_bytes: totals.decoded_bytes,
        raw_bytes: totals.raw_bytes,
        thread_pool_size: actual_threads,
    })
}
