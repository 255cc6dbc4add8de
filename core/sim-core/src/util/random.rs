use crate::Error;

use rand::Rng;
use rand_distr::{Exp, Normal};
use serde::{Deserialize, Serialize};

/// Underlying continuous shape of a [`BoundedDistribution`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Flat { min: f64, max: f64 },
    Gaussian { mean: f64, sd: f64 },
    Exponential { mean: f64 },
}

impl Shape {
    /// One continuous draw from the shape, unrestricted.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<f64, Error> {
        match *self {
            Shape::Flat { min, max } => {
                if min >= max {
                    return Err(Error::InvalidConfig(format!(
                        "flat distribution needs min < max, got [{min}, {max}]"
                    )));
                }
                Ok(rng.gen_range(min..max))
            }
            Shape::Gaussian { mean, sd } => {
                let normal = Normal::new(mean, sd).map_err(|e| {
                    Error::InvalidConfig(format!("gaussian({mean}, {sd}): {e}"))
                })?;
                Ok(rng.sample(normal))
            }
            Shape::Exponential { mean } => {
                let exp = Exp::new(1.0 / mean).map_err(|e| {
                    Error::InvalidConfig(format!("exponential(mean {mean}): {e}"))
                })?;
                Ok(rng.sample(exp))
            }
        }
    }
}

/// A continuous distribution restricted to the integer range `[1, max]` by
/// rejection sampling. Rejecting out-of-range draws instead of clamping them
/// avoids probability piling up on the boundary values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundedDistribution {
    pub dist: Shape,
    pub max: u32,
}

impl BoundedDistribution {
    /// Attempts before a mismatched shape/max pair is treated as a
    /// configuration error rather than looping forever.
    const RETRY_CAP: u32 = 10_000;

    pub const fn flat(min: f64, max_value: f64, max: u32) -> Self {
        Self {
            dist: Shape::Flat {
                min,
                max: max_value,
            },
            max,
        }
    }

    /// Draws an integer from `[1, max]`, or 0 deterministically when
    /// `max == 0` (no randomness consumed).
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<u32, Error> {
        if self.max == 0 {
            return Ok(0);
        }
        for _ in 0..Self::RETRY_CAP {
            let v = self.dist.draw(rng)?.trunc() as i64;
            if v >= 1 && v <= i64::from(self.max) {
                return Ok(v as u32);
            }
        }
        Err(Error::SampleExhausted {
            distribution: format!("{:?}", self.dist),
            max: self.max,
            attempts: Self::RETRY_CAP,
        })
    }
}
