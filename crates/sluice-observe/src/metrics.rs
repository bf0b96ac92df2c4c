use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Adds `delta` and returns the new value.
    pub fn add(&self, delta: u64) -> u64 {
        self.0
            .fetch_add(delta, Ordering::Relaxed)
            .saturating_add(delta)
    }

    pub fn sub(&self, delta: u64) {
        let mut prev = self.0.load(Ordering::Relaxed);
        loop {
            let next = prev.saturating_sub(delta);
            match self
                .0
                .compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => prev = observed,
            }
        }
    }

    /// Raises the gauge to `value` if it is currently lower (high-water tracking).
    pub fn max(&self, value: u64) {
        let mut prev = self.0.load(Ordering::Relaxed);
        while value > prev {
            match self
                .0
                .compare_exchange_weak(prev, value, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => prev = observed,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct DurationAgg {
    count: AtomicU64,
    total_ns: AtomicU64,
    max_ns: AtomicU64,
}

impl DurationAgg {
    pub fn record(&self, dur: Duration) {
        let ns = dur.as_nanos().min(u64::MAX as u128) as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(ns, Ordering::Relaxed);

        let mut prev = self.max_ns.load(Ordering::Relaxed);
        while ns > prev {
            match self
                .max_ns
                .compare_exchange_weak(prev, ns, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(next) => prev = next,
            }
        }
    }

    pub fn snapshot(&self) -> DurationAggSnapshot {
        DurationAggSnapshot {
            count: self.count.load(Ordering::Relaxed),
            total_ns: self.total_ns.load(Ordering::Relaxed),
            max_ns: self.max_ns.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DurationAggSnapshot {
    pub count: u64,
    pub total_ns: u64,
    pub max_ns: u64,
}

impl DurationAggSnapshot {
    pub fn avg_ns(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ns / self.count
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_add_sub_and_high_water() {
        let g = Gauge::default();
        assert_eq!(g.add(3), 3);
        assert_eq!(g.add(2), 5);
        g.sub(4);
        assert_eq!(g.get(), 1);
        g.sub(9);
        assert_eq!(g.get(), 0, "sub saturates at zero");

        let hw = Gauge::default();
        hw.max(7);
        hw.max(3);
        assert_eq!(hw.get(), 7);
    }

    #[test]
    fn duration_agg_tracks_count_and_max() {
        let agg = DurationAgg::default();
        agg.record(Duration::from_millis(2));
        agg.record(Duration::from_millis(8));
        let snap = agg.snapshot();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.max_ns, 8_000_000);
        assert_eq!(snap.avg_ns(), 5_000_000);
    }
}
