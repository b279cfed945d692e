//! Edit buffering and region compaction.
//!
//! Edits are recorded into an [`EditBuffer`] as individual coordinates and
//! packed per item into [`Region`]s just before transmission.

mod buffer;
mod compact;
mod coordinate;

pub use buffer::EditBuffer;
pub use compact::{ItemGroup, Region, compact_item, verify_partition};
pub use coordinate::{Axis, Coordinate, round_half_up};
