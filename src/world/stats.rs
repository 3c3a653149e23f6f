//! Running performance statistics for chunk generation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::procgen::generator::GeneratorKind;
use crate::render::instancing::InstanceStats;

/// Running min/mean/max/last of a timed operation, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TimingStats {
    pub samples: u64,
    pub last_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    total_ms: f64,
}

impl TimingStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.record_ms(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_ms(&mut self, ms: f64) {
        if self.samples == 0 {
            self.min_ms = ms;
            self.max_ms = ms;
        } else {
            self.min_ms = self.min_ms.min(ms);
            self.max_ms = self.max_ms.max(ms);
        }
        self.samples += 1;
        self.last_ms = ms;
        self.total_ms += ms;
    }

    pub fn mean_ms(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_ms / self.samples as f64
        }
    }
}

impl fmt::Display for TimingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "last {:.2}ms, mean {:.2}ms, min {:.2}ms, max {:.2}ms over {}",
            self.last_ms,
            self.mean_ms(),
            self.min_ms,
            self.max_ms,
            self.samples
        )
    }
}

/// Live object counts across loaded chunks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectTotals {
    pub roads: usize,
    pub buildings: usize,
    pub signs: usize,
    pub vehicles: usize,
}

/// Aggregate snapshot handed to the application.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PerformanceStats {
    pub loaded_chunks: usize,
    pub total_generated: u64,
    pub total_unloaded: u64,
    pub chunk_timing: TimingStats,
    pub stage_timing: BTreeMap<GeneratorKind, TimingStats>,
    pub instances: InstanceStats,
    pub objects: ObjectTotals,
}

impl fmt::Display for PerformanceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunks loaded ({} generated, {} unloaded); {} buildings, {} signs, {} vehicles, {} instances; chunk {}",
            self.loaded_chunks,
            self.total_generated,
            self.total_unloaded,
            self.objects.buildings,
            self.objects.signs,
            self.objects.vehicles,
            self.instances.total_instances,
            self.chunk_timing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_tracks_extremes_and_mean() {
        let mut t = TimingStats::default();
        assert_eq!(t.mean_ms(), 0.0);
        t.record_ms(4.0);
        t.record_ms(2.0);
        t.record(Duration::from_millis(6));
        assert_eq!(t.samples, 3);
        assert_eq!(t.min_ms, 2.0);
        assert_eq!(t.max_ms, 6.0);
        assert_eq!(t.last_ms, 6.0);
        assert!((t.mean_ms() - 4.0).abs() < 1e-9);
    }
}
