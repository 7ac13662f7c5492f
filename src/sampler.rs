//! Categorical draws from unnormalized weights.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Index picked by a uniform variate `u` in `[0, 1)`.
///
/// Scans the cumulative sum of `weights` and returns the first index whose
/// cumulative sum strictly exceeds `u * total`. Zero-weight entries can
/// therefore never be returned.
pub fn categorical_index(weights: &[f64], u: f64) -> Result<usize> {
    categorical_index_with_total(weights, weights.iter().sum(), u)
}

/// [`categorical_index`] with the sum of `weights` already known.
pub fn categorical_index_with_total(weights: &[f64], total: f64, u: f64) -> Result<usize> {
    if weights.is_empty() || !total.is_finite() || total <= 0.0 {
        return Err(Error::DegenerateDistribution { len: weights.len() });
    }
    let r = u * total;
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w > 0.0 {
            last_positive = i;
        }
        cumulative += w;
        if cumulative > r {
            return Ok(i);
        }
    }
    // rounding left `r` at or above the running sum
    Ok(last_positive)
}

/// Raise every weight to `1 / temperature` in place and return the new total.
///
/// Weights are first scaled by their maximum, so the largest one becomes 1
/// and cold temperatures cannot underflow the whole vector to zero. The
/// distribution is unchanged by the scaling.
pub fn anneal(weights: &mut [f64], temperature: f64) -> f64 {
    if temperature == 1.0 {
        return weights.iter().sum();
    }
    let max = weights
        .iter()
        .copied()
        .filter(|w| w.is_finite())
        .fold(0.0, f64::max);
    if max <= 0.0 {
        return weights.iter().sum();
    }
    let power = temperature.recip();
    weights
        .iter_mut()
        .map(|w| {
            *w = (*w / max).powf(power);
            *w
        })
        .sum()
}

/// Seeded source of categorical draws.
#[derive(Clone, Debug)]
pub struct Sampler {
    rng: StdRng,
}

impl Sampler {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn draw_categorical(&mut self, weights: &[f64]) -> Result<usize> {
        let u: f64 = self.rng.gen();
        categorical_index(weights, u)
    }

    /// Anneal `weights` in place at `temperature`, then draw.
    pub fn draw_annealed(&mut self, weights: &mut [f64], temperature: f64) -> Result<usize> {
        let total = anneal(weights, temperature);
        let u: f64 = self.rng.gen();
        categorical_index_with_total(weights, total, u)
    }

    /// Uniform index in `0..n`; used for random initialisation.
    pub fn uniform_index(&mut self, n: usize) -> usize {
        self.rng.gen_range(0..n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_of_uniform_weights() {
        assert_eq!(categorical_index(&[1.0, 1.0, 1.0, 1.0], 0.5).unwrap(), 2);
        assert_eq!(categorical_index(&[1.0, 1.0, 1.0, 1.0], 0.0).unwrap(), 0);
        assert_eq!(categorical_index(&[1.0, 1.0, 1.0, 1.0], 0.99).unwrap(), 3);
    }

    #[test]
    fn zero_weights_are_skipped() {
        for u in [0.0, 0.25, 0.5, 0.999_999] {
            assert_eq!(categorical_index(&[0.0, 0.0, 5.0], u).unwrap(), 2);
        }
        assert_eq!(categorical_index(&[0.0, 3.0, 0.0], 0.0).unwrap(), 1);
    }

    #[test]
    fn degenerate_weights_fail() {
        assert!(matches!(
            categorical_index(&[0.0, 0.0, 0.0], 0.3),
            Err(Error::DegenerateDistribution { len: 3 })
        ));
        assert!(matches!(
            categorical_index(&[], 0.3),
            Err(Error::DegenerateDistribution { len: 0 })
        ));
        assert!(categorical_index(&[f64::NAN, 1.0], 0.3).is_err());
    }

    #[test]
    fn u_at_one_returns_last_positive() {
        assert_eq!(categorical_index(&[2.0, 2.0, 0.0], 1.0).unwrap(), 1);
    }

    #[test]
    fn annealing_sharpens_and_returns_total() {
        let mut w = vec![1.0, 4.0];
        let total = anneal(&mut w, 0.5);
        assert_eq!(w, vec![0.0625, 1.0]);
        assert_eq!(total, 1.0625);

        let mut flat = vec![1.0, 4.0];
        let total = anneal(&mut flat, 2.0);
        assert_eq!(flat, vec![0.5, 1.0]);
        assert_eq!(total, 1.5);
    }

    #[test]
    fn cold_annealing_of_tiny_weights_stays_drawable() {
        let mut w = vec![1e-9, 3e-9, 2e-9];
        let total = anneal(&mut w, 0.01);
        assert_eq!(w[1], 1.0);
        assert!(total >= 1.0 && total.is_finite());
        // without rescaling every entry underflows to zero at this power
        assert_eq!(3e-9f64.powf(100.0), 0.0);

        let mut sampler = Sampler::seeded(1);
        for _ in 0..20 {
            let mut w = vec![1e-9, 3e-9, 2e-9];
            assert_eq!(sampler.draw_annealed(&mut w, 0.01).unwrap(), 1);
        }
    }

    #[test]
    fn annealing_zero_weights_is_still_degenerate() {
        let mut w = vec![0.0, 0.0];
        assert_eq!(anneal(&mut w, 0.5), 0.0);
        assert!(Sampler::seeded(0).draw_annealed(&mut w, 0.5).is_err());
    }

    #[test]
    fn supplied_total_matches_summed_draw() {
        let weights = [0.5, 0.25, 0.25];
        for u in [0.0, 0.3, 0.6, 0.99] {
            assert_eq!(
                categorical_index_with_total(&weights, 1.0, u).unwrap(),
                categorical_index(&weights, u).unwrap()
            );
        }
        assert!(categorical_index_with_total(&weights, 0.0, 0.5).is_err());
    }

    #[test]
    fn unit_temperature_leaves_weights() {
        let mut w = vec![0.2, 0.3];
        assert_eq!(anneal(&mut w, 1.0), 0.5);
        assert_eq!(w, vec![0.2, 0.3]);
    }

    #[test]
    fn same_seed_same_draws() {
        let weights = [0.1, 0.4, 0.2, 0.3];
        let mut a = Sampler::seeded(7);
        let mut b = Sampler::seeded(7);
        for _ in 0..50 {
            assert_eq!(
                a.draw_categorical(&weights).unwrap(),
                b.draw_categorical(&weights).unwrap()
            );
        }
    }
}
