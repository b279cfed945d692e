//! Greedy box packing of one item's coordinate set.
//!
//! Each round seeds a box at the smallest remaining coordinate and grows it
//! one unit at a time along x, then y, then z, repeating the three attempts
//! until every axis has failed once. An axis that fails is never retried for
//! that box. The packer is deterministic but not optimal.

use std::collections::BTreeSet;
use std::fmt;

use super::coordinate::Coordinate;
use crate::errors::TransmitError;

/// A point or an inclusive axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// A single coordinate.
    Point(Coordinate),
    /// Two opposite corners, in the order given.
    Cuboid(Coordinate, Coordinate),
}

impl Region {
    /// Every coordinate covered by the region, in ascending order.
    ///
    /// Corners may be given in either direction along each axis.
    #[must_use]
    pub fn coordinates(&self) -> Vec<Coordinate> {
        match *self {
            Self::Point(point) => vec![point],
            Self::Cuboid(a, b) => {
                let mut covered = Vec::new();
                for x in a.x.min(b.x)..=a.x.max(b.x) {
                    for y in a.y.min(b.y)..=a.y.max(b.y) {
                        for z in a.z.min(b.z)..=a.z.max(b.z) {
                            covered.push(Coordinate::new(x, y, z));
                        }
                    }
                }
                covered
            }
        }
    }

    /// Number of coordinates covered.
    #[must_use]
    pub fn volume(&self) -> u64 {
        match *self {
            Self::Point(_) => 1,
            Self::Cuboid(a, b) => {
                let span = |from: i64, to: i64| from.abs_diff(to).saturating_add(1);
                span(a.x, b.x)
                    .saturating_mul(span(a.y, b.y))
                    .saturating_mul(span(a.z, b.z))
            }
        }
    }
}

/// Renders the pipe-terminated record used by `set_node_list`.
impl fmt::Display for Region {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point(p) => write!(formatter, "{} {} {}|", p.x, p.y, p.z),
            Self::Cuboid(a, b) => write!(
                formatter,
                "{} {} {} {} {} {}|",
                a.x, a.y, a.z, b.x, b.y, b.z
            ),
        }
    }
}

/// All regions for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemGroup {
    /// Item identifier sent to the server.
    pub item: String,
    /// Regions covering every coordinate recorded with `item`.
    pub regions: Vec<Region>,
}

#[derive(Clone, Copy)]
enum Growth {
    X,
    Y,
    Z,
}

/// Packs a coordinate set into regions.
///
/// The regions are pairwise disjoint and their union is exactly `remaining`.
#[must_use]
pub fn compact_item(mut remaining: BTreeSet<Coordinate>) -> Vec<Region> {
    #[cfg(debug_assertions)]
    let input = remaining.clone();
    let mut regions = Vec::new();
    while let Some(origin) = remaining.first().copied() {
        let far = grow_box(origin, &remaining);
        let region = if far == origin {
            Region::Point(origin)
        } else {
            Region::Cuboid(origin, far)
        };
        for covered in region.coordinates() {
            remaining.remove(&covered);
        }
        regions.push(region);
    }
    #[cfg(debug_assertions)]
    {
        let verdict = verify_partition("", &input, &regions);
        debug_assert!(verdict.is_ok(), "{verdict:?}");
    }
    regions
}

fn grow_box(origin: Coordinate, remaining: &BTreeSet<Coordinate>) -> Coordinate {
    let mut far = origin;
    let mut open = [true; 3];
    while open.iter().any(|axis| *axis) {
        for (slot, growth) in [Growth::X, Growth::Y, Growth::Z].into_iter().enumerate() {
            if !open[slot] {
                continue;
            }
            let candidate = match growth {
                Growth::X => Coordinate::new(far.x + 1, far.y, far.z),
                Growth::Y => Coordinate::new(far.x, far.y + 1, far.z),
                Growth::Z => Coordinate::new(far.x, far.y, far.z + 1),
            };
            if slab_present(origin, far, candidate, growth, remaining) {
                far = candidate;
            } else {
                open[slot] = false;
            }
        }
    }
    far
}

/// Checks the new face that growing from `far` to `candidate` would add.
fn slab_present(
    origin: Coordinate,
    far: Coordinate,
    candidate: Coordinate,
    growth: Growth,
    remaining: &BTreeSet<Coordinate>,
) -> bool {
    let (mut xs, ys, zs) = match growth {
        Growth::X => (candidate.x..=candidate.x, origin.y..=far.y, origin.z..=far.z),
        Growth::Y => (origin.x..=far.x, candidate.y..=candidate.y, origin.z..=far.z),
        Growth::Z => (origin.x..=far.x, origin.y..=far.y, candidate.z..=candidate.z),
    };
    xs.all(|x| {
        ys.clone().all(|y| {
            zs.clone()
                .all(|z| remaining.contains(&Coordinate::new(x, y, z)))
        })
    })
}

/// Confirms that `regions` cover `expected` exactly once each.
///
/// # Errors
///
/// Returns [`TransmitError::CompactionInconsistency`] describing the first
/// overlap, stray coordinate or uncovered coordinate found.
pub fn verify_partition(
    item: &str,
    expected: &BTreeSet<Coordinate>,
    regions: &[Region],
) -> Result<(), TransmitError> {
    let inconsistency = |detail: String| TransmitError::CompactionInconsistency {
        item: item.to_owned(),
        detail,
    };
    let mut seen = BTreeSet::new();
    for region in regions {
        for covered in region.coordinates() {
            if !expected.contains(&covered) {
                return Err(inconsistency(format!("{covered} is not in the input")));
            }
            if !seen.insert(covered) {
                return Err(inconsistency(format!("{covered} is covered twice")));
            }
        }
    }
    if let Some(missing) = expected.difference(&seen).next() {
        return Err(inconsistency(format!("{missing} is not covered")));
    }
    Ok(())
}
