use std::ops;

macro_rules! scaled_value {
    ($t:ty, $e:expr) => {
        impl From<f64> for $t {
            fn from(v: f64) -> Self {
                Self(v)
            }
        }

        impl $t {
            pub const fn new(v: f64) -> Self {
                Self(v)
            }

            /// The value as a fraction of 1.0.
            pub fn r(&self) -> f64 {
                self.0 / $e
            }

            pub fn min<'a>(&'a self, other: &'a Self) -> &'a Self {
                if self.0 < other.0 {
                    self
                } else {
                    other
                }
            }

            pub fn max<'a>(&'a self, other: &'a Self) -> &'a Self {
                if self.0 > other.0 {
                    self
                } else {
                    other
                }
            }
        }

        impl ops::Add for $t {
            type Output = Self;

            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl ops::Sub for $t {
            type Output = Self;

            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl ops::Mul<f64> for $t {
            type Output = Self;

            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl ops::Div<f64> for $t {
            type Output = Self;

            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl ops::Div for $t {
            type Output = f64;

            fn div(self, rhs: Self) -> Self::Output {
                self.0 / rhs.0
            }
        }
    };
}

/// A value expressed in percent. Isolation policy buckets are matched on
/// this scale while the rest of the model works in fractions, so the unit
/// is kept in the type.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, serde::Serialize, serde::Deserialize)]
pub struct Percentage(pub f64);

/// A value already expressed as a fraction of 1.0.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, serde::Serialize, serde::Deserialize)]
pub struct Proportion(pub f64);

scaled_value!(Percentage, 100.0);
scaled_value!(Proportion, 1.0);

impl Proportion {
    /// Rescale to percent, e.g. for matching against percent-keyed buckets.
    pub fn as_percentage(&self) -> Percentage {
        Percentage(self.0 * 100.0)
    }
}
