//! Load hit/miss prediction.
//!
//! Issue asks whether a load will hit the first cache level. Consumers of a load predicted to
//! miss are woken for the miss latency instead of the hit latency, so a load that keeps
//! missing stops triggering latency recoveries. The counter predictor keeps one saturating
//! counter per PC: a hit adds one, a miss subtracts two, and the load is predicted to hit
//! while the counter is at or above the midpoint.

use serde::Serialize;

use crate::config::{HitMissPredictor, PipelineConfig};

/// Counter width of the counter predictor.
const COUNTER_BITS: u32 = 2;
const COUNTER_MAX: u8 = (1 << COUNTER_BITS) - 1;
const THRESHOLD: u8 = COUNTER_MAX.div_ceil(2);

/// Hit/miss predictor counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HitMissStats {
    /// Loads predicted to miss.
    pub predicted_misses: u64,
    /// Loads whose outcome differed from the prediction.
    pub mispredictions: u64,
}

/// Load hit/miss predictor shared by every thread.
#[derive(Clone, Debug)]
pub struct HitMissPred {
    kind: HitMissPredictor,
    mask: usize,
    counters: Vec<u8>,
    stats: HitMissStats,
}

impl HitMissPred {
    /// Creates the predictor selected by the pipeline configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        let entries: usize = match config.hit_miss_predictor {
            HitMissPredictor::AlwaysHit => 0,
            HitMissPredictor::Counter => 1 << config.hit_miss_table_bits,
        };
        Self {
            kind: config.hit_miss_predictor,
            mask: entries.saturating_sub(1),
            counters: vec![THRESHOLD; entries],
            stats: HitMissStats::default(),
        }
    }

    /// Counters.
    pub fn stats(&self) -> HitMissStats {
        self.stats
    }

    fn index(&self, pc: u64, tid: usize) -> usize {
        ((pc >> 2) as usize ^ tid) & self.mask
    }

    /// Predicts whether the load at `pc` of thread `tid` hits.
    pub fn predict(&self, pc: u64, tid: usize) -> bool {
        match self.kind {
            HitMissPredictor::AlwaysHit => true,
            HitMissPredictor::Counter => self.counters[self.index(pc, tid)] >= THRESHOLD,
        }
    }

    /// Records the outcome of a load issued with prediction `predicted`.
    pub fn train(&mut self, pc: u64, tid: usize, predicted: bool, hit: bool) {
        if !predicted {
            self.stats.predicted_misses += 1;
        }
        if predicted != hit {
            self.stats.mispredictions += 1;
        }
        if self.kind == HitMissPredictor::Counter {
            let index = self.index(pc, tid);
            let counter = &mut self.counters[index];
            *counter = if hit {
                (*counter + 1).min(COUNTER_MAX)
            } else {
                counter.saturating_sub(2)
            };
        }
    }
}
