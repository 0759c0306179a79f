//! Seeded sampling service
//!
//! One `StdRng` stream feeds every stochastic decision in a run, so
//! (scenario, seed, config) fully determines the outcome. The derived
//! distributions are built from the uniform stream directly: normal via
//! Box-Muller, exponential via the inverse CDF, weighted choice by
//! cumulative inverse.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform draw in [0, 1).
    pub fn uniform(&mut self) -> f64 {
        self.inner.gen_range(0.0..1.0)
    }

    /// Uniform draw in [lo, hi).
    pub fn uniform_in(&mut self, lo: f64, hi: f64) -> f64 {
        self.inner.gen_range(lo..hi)
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Normal(mean, std) via Box-Muller.
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let u1 = loop {
            let u = self.uniform();
            if u > 0.0 {
                break u;
            }
        };
        let u2 = self.uniform();
        let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
        mean + std * z
    }

    /// Exponential with the given rate (mean 1/rate).
    pub fn exponential(&mut self, rate: f64) -> f64 {
        assert!(rate > 0.0, "exponential rate must be positive");
        -(1.0 - self.uniform()).ln() / rate
    }

    /// Pick one element uniformly.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        assert!(!items.is_empty(), "pick from empty slice");
        let idx = self.inner.gen_range(0..items.len());
        &items[idx]
    }

    /// Weighted choice by cumulative inverse. When all weights are zero
    /// the draw lands on the first item.
    pub fn weighted_choice<'a, T>(&mut self, items: &'a [(T, f64)]) -> &'a T {
        assert!(!items.is_empty(), "weighted choice from empty slice");
        let total: f64 = items.iter().map(|(_, w)| w).sum();
        let r = self.uniform() * total;
        let mut cum = 0.0;
        for (item, w) in items {
            cum += w;
            if r <= cum {
                return item;
            }
        }
        &items[0].0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.uniform(), b.uniform());
        }
    }

    #[test]
    fn test_different_seed_diverges() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(43);
        let same = (0..20).filter(|_| a.uniform() == b.uniform()).count();
        assert!(same < 20);
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = SimRng::new(1);
        for _ in 0..1000 {
            let u = rng.uniform();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_normal_roughly_centered() {
        let mut rng = SimRng::new(7);
        let n = 20_000;
        let mean: f64 = (0..n).map(|_| rng.normal(10.0, 2.0)).sum::<f64>() / n as f64;
        assert!((mean - 10.0).abs() < 0.1, "sample mean {mean}");
    }

    #[test]
    fn test_exponential_positive_with_right_mean() {
        let mut rng = SimRng::new(11);
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let x = rng.exponential(0.5);
            assert!(x >= 0.0);
            sum += x;
        }
        let mean = sum / n as f64;
        assert!((mean - 2.0).abs() < 0.1, "sample mean {mean}");
    }

    #[test]
    fn test_weighted_choice_respects_weights() {
        let mut rng = SimRng::new(3);
        let items = [("rare", 0.05), ("common", 0.95)];
        let rare = (0..10_000)
            .filter(|_| *rng.weighted_choice(&items) == "rare")
            .count();
        assert!(rare > 200 && rare < 900, "rare drawn {rare} times");
    }

    #[test]
    fn test_weighted_choice_all_zero_returns_first() {
        let mut rng = SimRng::new(5);
        let items = [("first", 0.0), ("second", 0.0)];
        for _ in 0..10 {
            assert_eq!(*rng.weighted_choice(&items), "first");
        }
    }
}
