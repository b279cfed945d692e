//! Integral world coordinates and axis value sources.

use std::fmt;
use std::ops::{Range, RangeInclusive};

/// A block position. Ordering is lexicographic on `(x, y, z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    /// East-west axis.
    pub x: i64,
    /// Vertical axis.
    pub y: i64,
    /// North-south axis.
    pub z: i64,
}

impl Coordinate {
    /// Builds a coordinate from integral components.
    #[must_use]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Builds a coordinate by rounding each component half-up.
    #[must_use]
    pub fn rounded(x: f64, y: f64, z: f64) -> Self {
        Self::new(round_half_up(x), round_half_up(y), round_half_up(z))
    }

    /// Renders the coordinate as command arguments: `"(x,y,z) "`.
    #[must_use]
    pub fn command_text(&self) -> String {
        format!("({},{},{}) ", self.x, self.y, self.z)
    }
}

impl From<(i64, i64, i64)> for Coordinate {
    fn from((x, y, z): (i64, i64, i64)) -> Self {
        Self::new(x, y, z)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Rounds to the nearest integer, with halves rounding towards positive
/// infinity (`-0.5` becomes `0`, `2.5` becomes `3`).
#[must_use]
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Values supplied for one axis of a recording call.
///
/// An axis is either a single value or a sequence; recording enumerates the
/// Cartesian product of three axes. Fractional values are rounded half-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis(Vec<i64>);

impl Axis {
    /// Rounded values along this axis, in the order supplied.
    #[must_use]
    pub fn values(&self) -> &[i64] {
        &self.0
    }
}

impl From<i64> for Axis {
    fn from(value: i64) -> Self {
        Self(vec![value])
    }
}

impl From<f64> for Axis {
    fn from(value: f64) -> Self {
        Self(vec![round_half_up(value)])
    }
}

impl From<Range<i64>> for Axis {
    fn from(range: Range<i64>) -> Self {
        Self(range.collect())
    }
}

impl From<RangeInclusive<i64>> for Axis {
    fn from(range: RangeInclusive<i64>) -> Self {
        Self(range.collect())
    }
}

impl From<Vec<i64>> for Axis {
    fn from(values: Vec<i64>) -> Self {
        Self(values)
    }
}

impl From<&[i64]> for Axis {
    fn from(values: &[i64]) -> Self {
        Self(values.to_vec())
    }
}

impl<const N: usize> From<[i64; N]> for Axis {
    fn from(values: [i64; N]) -> Self {
        Self(values.to_vec())
    }
}

impl From<Vec<f64>> for Axis {
    fn from(values: Vec<f64>) -> Self {
        Self(values.into_iter().map(round_half_up).collect())
    }
}

impl From<&[f64]> for Axis {
    fn from(values: &[f64]) -> Self {
        Self(values.iter().copied().map(round_half_up).collect())
    }
}

/// Enumerates the Cartesian product of three axes, x outermost.
pub(crate) fn cartesian(x: &Axis, y: &Axis, z: &Axis) -> impl Iterator<Item = Coordinate> {
    let xs = x.values().to_vec();
    let ys = y.values().to_vec();
    let zs = z.values().to_vec();
    xs.into_iter().flat_map(move |xi| {
        let zs = zs.clone();
        ys.clone()
            .into_iter()
            .flat_map(move |yi| zs.clone().into_iter().map(move |zi| Coordinate::new(xi, yi, zi)))
    })
}
