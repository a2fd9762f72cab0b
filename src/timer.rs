//! Latency and throughput accumulator.
//!
//! A [`LatencyProbe`] times repeated laps with a monotonic clock and keeps the
//! raw sums needed for average, spread and throughput. Statistics are derived
//! once, on demand, by [`LatencyProbe::gen_stats`].

use std::fmt as StdFmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};

const NANOS_PER_MICRO: f64 = 1_000.0;
const NANOS_PER_SEC: f64 = 1_000_000_000.0;

// ============================================================================
//  ProbeError
// ============================================================================

/// Misuse of a [`LatencyProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// `stop` without a matching `start`.
    NotStarted,

    /// `gen_stats` was already called on this probe.
    StatsAlreadyGenerated,

    /// Combining requires stats on both probes.
    StatsNotGenerated,
}

impl StdFmt::Display for ProbeError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::NotStarted => write!(f, "probe stopped without being started"),
            Self::StatsAlreadyGenerated => write!(f, "stats already generated"),
            Self::StatsNotGenerated => write!(f, "stats should be generated first"),
        }
    }
}

impl std::error::Error for ProbeError {}

// ============================================================================
//  Stats
// ============================================================================

/// Derived numbers of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stats {
    /// Mean lap latency in microseconds.
    pub avg_micros: f64,
    /// Population standard deviation of lap latency in microseconds.
    pub stdev_micros: f64,
    /// Laps per second of measured time.
    pub throughput: f64,
}

// ============================================================================
//  LatencyProbe
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct LatencyProbe {
    started: Option<Instant>,

    laps: u64,
    sum_nanos: u128,
    min_nanos: Option<u64>,
    max_nanos: u64,
    sq_sum_micros: f64,

    stats: Option<Stats>,
}

impl LatencyProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Ends the current lap and records it.
    pub fn stop(&mut self) -> Result<Duration, ProbeError> {
        let started = self.started.take().ok_or(ProbeError::NotStarted)?;
        let lap = started.elapsed();
        self.record(lap);
        Ok(lap)
    }

    /// Records an externally measured lap.
    pub fn record(&mut self, lap: Duration) {
        let nanos = u64::try_from(lap.as_nanos()).unwrap_or(u64::MAX);
        self.laps += 1;
        self.sum_nanos += u128::from(nanos);
        let micros = nanos as f64 / NANOS_PER_MICRO;
        self.sq_sum_micros += micros * micros;
        self.max_nanos = self.max_nanos.max(nanos);
        self.min_nanos = Some(self.min_nanos.map_or(nanos, |m| m.min(nanos)));
    }

    #[inline]
    pub fn laps(&self) -> u64 {
        self.laps
    }

    pub fn min(&self) -> Option<Duration> {
        self.min_nanos.map(Duration::from_nanos)
    }

    pub fn max(&self) -> Option<Duration> {
        (self.laps > 0).then(|| Duration::from_nanos(self.max_nanos))
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(u64::try_from(self.sum_nanos).unwrap_or(u64::MAX))
    }

    pub fn stats(&self) -> Option<&Stats> {
        self.stats.as_ref()
    }

    /// Derives average, deviation and throughput. Allowed once per probe.
    pub fn gen_stats(&mut self) -> Result<&Stats, ProbeError> {
        if self.stats.is_some() {
            return Err(ProbeError::StatsAlreadyGenerated);
        }
        let mut stats = Stats {
            throughput: self.raw_throughput(),
            ..Stats::default()
        };
        self.fill_latency(&mut stats);
        Ok(self.stats.insert(stats))
    }

    /// Folds `other`'s laps into this probe and regenerates the latency
    /// numbers. Throughput is left as is; see [`add_throughput`](Self::add_throughput).
    pub fn combine_latency(&mut self, other: &LatencyProbe) -> Result<(), ProbeError> {
        if self.stats.is_none() || other.stats.is_none() {
            return Err(ProbeError::StatsNotGenerated);
        }
        self.laps += other.laps;
        self.sum_nanos += other.sum_nanos;
        self.sq_sum_micros += other.sq_sum_micros;
        self.max_nanos = self.max_nanos.max(other.max_nanos);
        self.min_nanos = match (self.min_nanos, other.min_nanos) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let mut stats = self.stats.unwrap_or_default();
        self.fill_latency(&mut stats);
        self.stats = Some(stats);
        Ok(())
    }

    /// Adds `other`'s throughput, for probes that ran side by side.
    pub fn add_throughput(&mut self, other: &LatencyProbe) -> Result<(), ProbeError> {
        let (Some(mine), Some(theirs)) = (self.stats.as_mut(), other.stats.as_ref()) else {
            return Err(ProbeError::StatsNotGenerated);
        };
        mine.throughput += theirs.throughput;
        Ok(())
    }

    fn raw_throughput(&self) -> f64 {
        if self.laps == 0 || self.sum_nanos == 0 {
            return 0.0;
        }
        self.laps as f64 / (self.sum_nanos as f64 / NANOS_PER_SEC)
    }

    fn fill_latency(&self, stats: &mut Stats) {
        if self.laps == 0 {
            stats.avg_micros = 0.0;
            stats.stdev_micros = 0.0;
            return;
        }
        let n = self.laps as f64;
        let avg = self.sum_nanos as f64 / NANOS_PER_MICRO / n;
        // Rounding can push a zero variance slightly negative.
        let var = (self.sq_sum_micros / n - avg * avg).max(0.0);
        stats.avg_micros = avg;
        stats.stdev_micros = var.sqrt();
    }

    /// Writes a tab-separated header and one row of numbers. Generates stats
    /// first if needed.
    pub fn print_stats<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "Type\top\tavg(us)\tmin(us)\tmax(us)\tstdev\tnum_iter\ttput"
        )?;
        if self.laps == 0 {
            writeln!(out, "No measured data")?;
            return out.flush();
        }
        if self.stats.is_none() {
            // Cannot fail: stats were just checked to be absent.
            let _ = self.gen_stats();
        }
        let stats = self.stats.unwrap_or_default();
        writeln!(
            out,
            "Numbers\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{}\t{:.3}",
            stats.avg_micros,
            self.min_nanos.unwrap_or(0) as f64 / NANOS_PER_MICRO,
            self.max_nanos as f64 / NANOS_PER_MICRO,
            stats.stdev_micros,
            self.laps,
            stats.throughput,
        )?;
        out.flush()
    }
}
