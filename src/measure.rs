//! Values that may be numerically undefined for otherwise valid input

use serde::Serialize;
use std::fmt;

/// Why a [`Measure`] carries no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Undefined {
    /// The denominator of a ratio was exactly zero.
    ZeroDenominator { denominator: &'static str },
    /// All reference values were identical.
    ZeroVariance,
    /// Some actual values were exactly zero, so percentage errors divide by zero.
    ZeroActual { count: usize },
    /// Fewer observations than the statistic needs.
    InsufficientSamples { required: usize, available: usize },
    /// Every repeated evaluation failed.
    NoSuccessfulRepetitions,
}

impl fmt::Display for Undefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDenominator { denominator } => write!(f, "{denominator} is zero"),
            Self::ZeroVariance => write!(f, "reference values have zero variance"),
            Self::ZeroActual { count } => write!(f, "{count} actual value(s) are zero"),
            Self::InsufficientSamples {
                required,
                available,
            } => write!(f, "needs {required} samples, got {available}"),
            Self::NoSuccessfulRepetitions => write!(f, "no repetition succeeded"),
        }
    }
}

/// A scalar result that is either defined or explicitly undefined with a reason.
///
/// A defined `0.0` and an undefined value are always distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Defined(f64),
    Undefined(Undefined),
}

impl Measure {
    /// `numerator / denominator`, undefined when the denominator is exactly zero.
    pub fn ratio(numerator: f64, denominator: f64, denominator_name: &'static str) -> Self {
        if denominator == 0.0 {
            Self::Undefined(Undefined::ZeroDenominator {
                denominator: denominator_name,
            })
        } else {
            Self::Defined(numerator / denominator)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }

    pub fn undefined_reason(&self) -> Option<Undefined> {
        match self {
            Self::Defined(_) => None,
            Self::Undefined(reason) => Some(*reason),
        }
    }

    /// Apply `f` to a defined value, propagating the undefined reason otherwise.
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Self::Defined(v) => Self::Defined(f(v)),
            undefined => undefined,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(v) => match f.precision() {
                Some(p) => write!(f, "{:.*}", p, v),
                None => write!(f, "{v}"),
            },
            Self::Undefined(reason) => write!(f, "undefined ({reason})"),
        }
    }
}
