//! Chunk orchestration with checkpoint/resume.
//!
//! The requested time range is split into fixed-size chunks so memory stays
//! bounded and progress survives interruption. Chunk i streams the padded
//! range `[chunk_start - T, chunk_end + T)` (T = time threshold); omitting
//! the padding would silently drop true matches at chunk boundaries. Each
//! event is attributed to exactly one chunk — the one whose emit window
//! contains the later of its two timestamps — so a chunked run and a
//! single-pass run produce identical aggregates.
//!
//! After every chunk the accumulated pair state is written to a
//! human-inspectable JSON checkpoint. Its presence always means "an
//! interrupted run exists"; it is deleted when the final chunk completes.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregator::{PairAggregator, PairKey, PairReport, PairStats};
use crate::coarse::select_candidates;
use crate::detector::{DetectorCounters, ProximityDetector};
use crate::error::{ProximityError, Result};
use crate::source::{PointSource, RetryPolicy, TripSource};
use crate::DetectorConfig;

/// Persisted progress record for an interrupted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Highest chunk index already attempted; a resumed run continues
    /// after it. Failed attempts are listed in `failed_chunks`.
    pub last_attempted_chunk_index: usize,
    /// Chunks that errored and were skipped, preserved across resume.
    #[serde(default)]
    pub failed_chunks: Vec<usize>,
    /// Unique pairs accumulated so far; must equal `pairs.len()`.
    pub pair_count: usize,
    /// Free-form progress note for operators.
    pub note: String,
    /// Aggregator snapshot so a resumed run continues with identical state.
    pub pairs: Vec<(PairKey, PairStats)>,
}

impl Checkpoint {
    /// Read a checkpoint if one exists. A present-but-inconsistent file is
    /// an error rather than a silent fresh start.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Option<Checkpoint>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&data)?;
        if checkpoint.pair_count != checkpoint.pairs.len() {
            return Err(ProximityError::CorruptCheckpoint {
                path: path.to_path_buf(),
                reason: format!(
                    "pair_count {} does not match {} stored pairs",
                    checkpoint.pair_count,
                    checkpoint.pairs.len()
                ),
            });
        }
        Ok(Some(checkpoint))
    }

    /// Write the checkpoint as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Delete the checkpoint file if present.
    pub fn remove<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Outcome of an orchestrated run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub chunks_total: usize,
    pub chunks_completed: usize,
    /// Indices of chunks that errored and were skipped.
    pub chunks_failed: Vec<usize>,
    /// Last attempted chunk of the interrupted run this one resumed.
    pub resumed_from: Option<usize>,
    /// True when the run stopped on a cancellation signal.
    pub cancelled: bool,
    pub counters: DetectorCounters,
    /// Malformed source records skipped during streaming.
    pub skipped_records: u64,
    /// Invalid trip records skipped by the coarse filter.
    pub trips_skipped: usize,
    pub unique_pairs: usize,
    /// Final ordered result set (count descending, min distance ascending).
    pub results: Vec<PairReport>,
}

/// Split `[start, end)` into consecutive chunks of at most `chunk_size_s`.
pub fn chunk_bounds(start: i64, end: i64, chunk_size_s: i64) -> Vec<(i64, i64)> {
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + chunk_size_s).min(end);
        chunks.push((cursor, next));
        cursor = next;
    }
    chunks
}

/// Orchestrated proximity detection over a point source.
///
/// Single-threaded per chunk: the sliding-window eviction invariant needs
/// strict timestamp order, so point processing within a chunk is inherently
/// sequential. Each chunk owns its grid and window; only the aggregator
/// outlives chunks, via an order-independent merge.
pub struct ProximityRun<S: PointSource> {
    source: S,
    config: DetectorConfig,
    start: i64,
    end: i64,
    checkpoint_path: Option<PathBuf>,
    retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
    vehicles: Option<HashSet<u32>>,
    trips_skipped: usize,
}

impl<S: PointSource> ProximityRun<S> {
    /// Create a run over `[start, end)`. Rejects invalid configuration.
    pub fn new(source: S, config: DetectorConfig, start: i64, end: i64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            start,
            end,
            checkpoint_path: None,
            retry: RetryPolicy::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            vehicles: None,
            trips_skipped: 0,
        })
    }

    /// Persist progress to `path` after every chunk and honor it on resume.
    pub fn with_checkpoint<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.checkpoint_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the source retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Restrict point queries to an explicit vehicle set.
    pub fn with_vehicles(mut self, vehicles: HashSet<u32>) -> Self {
        self.vehicles = Some(vehicles);
        self
    }

    /// Run the coarse trip filter over the whole range and restrict point
    /// queries to the surviving vehicles.
    pub fn with_coarse_filter<T: TripSource>(mut self, trips: &mut T) -> Result<Self> {
        let retry = self.retry;
        let pad = self.config.time_threshold_s;
        let (start, end) = (self.start, self.end);
        let records = retry.run("trip query", || trips.trips_in_range(start - pad, end + pad))?;
        let selection = select_candidates(&records, &self.config);
        info!(
            "coarse filter: {} candidate vehicles from {} trips ({} skipped)",
            selection.vehicles.len(),
            selection.trips_considered,
            selection.trips_skipped
        );
        self.trips_skipped = selection.trips_skipped;
        self.vehicles = Some(selection.vehicles);
        Ok(self)
    }

    /// Shared flag for cooperative, chunk-grained cancellation. Setting it
    /// stops the run after the in-flight chunk's checkpoint is written.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Execute the run and return the merged report.
    pub fn run(&mut self) -> Result<RunReport> {
        let chunks = chunk_bounds(self.start, self.end, self.config.chunk_size_s);
        let mut report = RunReport {
            chunks_total: chunks.len(),
            trips_skipped: self.trips_skipped,
            ..RunReport::default()
        };
        let mut aggregator = PairAggregator::new();
        let mut next_chunk = 0usize;

        if let Some(path) = &self.checkpoint_path {
            if self.config.resume {
                if let Some(checkpoint) = Checkpoint::load(path)? {
                    next_chunk = checkpoint.last_attempted_chunk_index + 1;
                    report.resumed_from = Some(checkpoint.last_attempted_chunk_index);
                    report.chunks_failed = checkpoint.failed_chunks;
                    info!(
                        "resuming after chunk {} with {} known pairs",
                        checkpoint.last_attempted_chunk_index, checkpoint.pair_count
                    );
                    aggregator = PairAggregator::restore(checkpoint.pairs);
                }
            } else if path.exists() {
                warn!("starting fresh, discarding checkpoint {}", path.display());
                Checkpoint::remove(path)?;
            }
        }

        for (index, &(chunk_start, chunk_end)) in chunks.iter().enumerate().skip(next_chunk) {
            if self.cancel.load(Ordering::SeqCst) {
                info!("cancellation requested, stopping before chunk {}", index + 1);
                report.cancelled = true;
                break;
            }

            info!(
                "chunk {}/{}: [{}, {})",
                index + 1,
                chunks.len(),
                chunk_start,
                chunk_end
            );
            match self.run_chunk(chunk_start, chunk_end) {
                Ok((pairs, counters, skipped)) => {
                    aggregator.merge(pairs);
                    report.counters.merge(counters);
                    report.skipped_records += skipped;
                    report.chunks_completed += 1;
                    info!(
                        "chunk {} done: {} events, {} unique pairs so far",
                        index + 1,
                        counters.events,
                        aggregator.len()
                    );
                }
                Err(err @ ProximityError::SourceExhausted { .. }) => return Err(err),
                Err(err) => {
                    // One bad chunk must not discard hours of prior work.
                    error!("chunk {} failed, skipping: {}", index + 1, err);
                    report.chunks_failed.push(index);
                }
            }

            if let Some(path) = &self.checkpoint_path {
                let checkpoint = Checkpoint {
                    last_attempted_chunk_index: index,
                    failed_chunks: report.chunks_failed.clone(),
                    pair_count: aggregator.len(),
                    note: format!(
                        "chunk {}/{} ({:.1}%)",
                        index + 1,
                        chunks.len(),
                        100.0 * (index + 1) as f64 / chunks.len() as f64
                    ),
                    pairs: aggregator.snapshot(),
                };
                checkpoint.save(path)?;
            }
        }

        if !report.cancelled {
            if let Some(path) = &self.checkpoint_path {
                Checkpoint::remove(path)?;
            }
        }

        report.unique_pairs = aggregator.len();
        report.results = aggregator.results();
        Ok(report)
    }

    /// One chunk attempt, wrapped in the retry policy. A retried attempt
    /// restarts the chunk with a fresh detector, so partial work never
    /// double-counts.
    fn run_chunk(
        &mut self,
        chunk_start: i64,
        chunk_end: i64,
    ) -> Result<(PairAggregator, DetectorCounters, u64)> {
        let retry = self.retry;
        retry.run("chunk stream", || {
            Self::process_once(
                &mut self.source,
                self.vehicles.as_ref(),
                &self.config,
                chunk_start,
                chunk_end,
            )
        })
    }

    fn process_once(
        source: &mut S,
        vehicles: Option<&HashSet<u32>>,
        config: &DetectorConfig,
        chunk_start: i64,
        chunk_end: i64,
    ) -> Result<(PairAggregator, DetectorCounters, u64)> {
        let pad = config.time_threshold_s;
        let stream = source.query(chunk_start - pad, chunk_end + pad, vehicles)?;

        let mut detector = ProximityDetector::new(config, chunk_start, chunk_end);
        let mut skipped = 0u64;
        for item in stream {
            match item {
                Ok(point) => detector.process_point(point),
                Err(err) => {
                    skipped += 1;
                    warn!("skipping malformed record: {}", err);
                }
            }
        }

        let (pairs, counters) = detector.finish();
        Ok((pairs, counters, skipped))
    }
}

/// Detect over pre-loaded, time-ordered points with chunks running on
/// rayon workers.
///
/// Chunks are time-disjoint and each worker owns its grid, window, and
/// aggregator; the final merge is the same order-independent reduction a
/// sequential run uses, so results are identical. No checkpointing — this
/// path is for fresh in-memory runs.
#[cfg(feature = "parallel")]
pub fn detect_parallel(
    points: &[crate::GeoPoint],
    config: &DetectorConfig,
    start: i64,
    end: i64,
) -> Result<(PairAggregator, DetectorCounters)> {
    use rayon::prelude::*;

    config.validate()?;
    let pad = config.time_threshold_s;
    let merged = chunk_bounds(start, end, config.chunk_size_s)
        .par_iter()
        .map(|&(chunk_start, chunk_end)| {
            let lo = points.partition_point(|p| p.timestamp < chunk_start - pad);
            let hi = points.partition_point(|p| p.timestamp < chunk_end + pad);
            let mut detector = ProximityDetector::new(config, chunk_start, chunk_end);
            for point in &points[lo..hi] {
                detector.process_point(*point);
            }
            detector.finish()
        })
        .reduce(
            || (PairAggregator::new(), DetectorCounters::default()),
            |(mut pairs, mut counters), (other_pairs, other_counters)| {
                pairs.merge(other_pairs);
                counters.merge(other_counters);
                (pairs, counters)
            },
        );
    Ok(merged)
}
