//! Progress aggregation
//!
//! Normalizes raw engine progress callbacks into [`ProgressSnapshot`]s fit
//! for presentation. The aggregator owns two rules the raw stream does not
//! guarantee: the completion fraction never moves backwards within the
//! download phase, and unknown quantities stay unknown instead of reading
//! as zero.

use crate::engine::{PostProcessUpdate, ProgressStatus, ProgressUpdate};
use crate::types::{ProgressPhase, ProgressSnapshot};

/// Stateful per-job progress normalizer
///
/// One aggregator per job; state resets by constructing a fresh one when
/// the next job starts.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    last_fraction: Option<f64>,
    phase: ProgressPhase,
}

impl ProgressAggregator {
    /// Create an aggregator for a new job.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one raw download callback into a presentable snapshot.
    pub fn observe(&mut self, update: &ProgressUpdate) -> ProgressSnapshot {
        let fraction = match update.status {
            // A finished file pins the fraction; per-fragment trailing
            // callbacks cannot drag it back down.
            ProgressStatus::Finished => Some(1.0),
            ProgressStatus::Downloading => self.clamp(raw_fraction(update)),
        };
        self.last_fraction = fraction.or(self.last_fraction);

        ProgressSnapshot {
            fraction,
            bytes_total: update.total_bytes.or(update.total_bytes_estimate),
            speed_bps: update.speed_bps,
            eta_seconds: update.eta_seconds,
            playlist_position: match (update.playlist_index, update.playlist_count) {
                (Some(index), Some(count)) => Some((index, count)),
                _ => None,
            },
            phase: self.phase,
        }
    }

    /// Fold a post-processing callback into a snapshot. Entering the phase
    /// is one-way; the aggregator never returns to `Downloading`.
    pub fn observe_postprocess(&mut self, _update: &PostProcessUpdate) -> ProgressSnapshot {
        self.phase = ProgressPhase::PostProcessing;
        self.last_fraction = Some(1.0);

        ProgressSnapshot {
            fraction: Some(1.0),
            bytes_total: None,
            speed_bps: None,
            eta_seconds: None,
            playlist_position: None,
            phase: self.phase,
        }
    }

    /// Monotonic clamp: a strictly lower fraction reports the previous
    /// high-water mark instead. Fragmented downloads restart their byte
    /// counters between fragments; the dips are bookkeeping, not lost work.
    fn clamp(&self, fraction: Option<f64>) -> Option<f64> {
        match (fraction, self.last_fraction) {
            (Some(new), Some(prev)) if new < prev => Some(prev),
            (None, prev) => prev,
            (new, _) => new,
        }
    }
}

/// Fraction straight from the byte counters, preferring the exact total
/// over the engine's estimate. `None` when neither is known.
fn raw_fraction(update: &ProgressUpdate) -> Option<f64> {
    let total = update.total_bytes.or(update.total_bytes_estimate)?;
    if total == 0 {
        return None;
    }
    Some((update.downloaded_bytes as f64 / total as f64).clamp(0.0, 1.0))
}
