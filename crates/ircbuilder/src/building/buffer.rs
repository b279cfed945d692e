//! Sparse coordinate-to-item edit buffer.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use serde::Serialize;
use tracing::debug;

use super::compact::{ItemGroup, compact_item};
use super::coordinate::{Axis, Coordinate, cartesian};
use crate::commands::CommandChannel;
use crate::errors::{EditError, TransmitError};
use crate::transmit::{TRANSMIT_TARGET, TransmitSummary, send_item_groups};

/// Pending world edits, keyed by coordinate.
///
/// The last item recorded at a coordinate wins, but the coordinate keeps the
/// place in the insertion order it was first recorded at. A buffer can be
/// filled without a session and drained through any [`CommandChannel`]
/// later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    edits: BTreeMap<Coordinate, Edit>,
    next_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    sequence: u64,
    item: String,
}

impl EditBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `item` at every coordinate of the product `x × y × z`.
    ///
    /// Returns the number of coordinates written.
    pub fn record(
        &mut self,
        x: impl Into<Axis>,
        y: impl Into<Axis>,
        z: impl Into<Axis>,
        item: impl Into<String>,
    ) -> usize {
        let item = item.into();
        let mut written = 0;
        for coordinate in cartesian(&x.into(), &y.into(), &z.into()) {
            let sequence = self.next_sequence;
            let edit = self.edits.entry(coordinate).or_insert_with(|| Edit {
                sequence,
                item: String::new(),
            });
            if edit.sequence == sequence {
                self.next_sequence += 1;
            }
            edit.item.clone_from(&item);
            written += 1;
        }
        written
    }

    /// Records a structured item serialised as JSON.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error when `item` cannot be rendered as JSON.
    pub fn record_json<T: Serialize + ?Sized>(
        &mut self,
        x: impl Into<Axis>,
        y: impl Into<Axis>,
        z: impl Into<Axis>,
        item: &T,
    ) -> Result<usize, serde_json::Error> {
        let rendered = serde_json::to_string(item)?;
        Ok(self.record(x, y, z, rendered))
    }

    /// Records `item` throughout the inclusive box between two corners.
    ///
    /// Corners may be given in either order along each axis.
    pub fn record_cuboid(
        &mut self,
        corner_a: impl Into<Coordinate>,
        corner_b: impl Into<Coordinate>,
        item: impl Into<String>,
    ) -> usize {
        let (a, b) = (corner_a.into(), corner_b.into());
        self.record(
            a.x.min(b.x)..=a.x.max(b.x),
            a.y.min(b.y)..=a.y.max(b.y),
            a.z.min(b.z)..=a.z.max(b.z),
            item,
        )
    }

    /// Removes the edits at every coordinate of the product `x × y × z`.
    ///
    /// Nothing is removed unless every coordinate holds an edit.
    ///
    /// # Errors
    ///
    /// Returns [`EditError::NotBuffered`] naming the first absent coordinate.
    pub fn forget(
        &mut self,
        x: impl Into<Axis>,
        y: impl Into<Axis>,
        z: impl Into<Axis>,
    ) -> Result<usize, EditError> {
        let targets: Vec<Coordinate> = cartesian(&x.into(), &y.into(), &z.into()).collect();
        if let Some(coordinate) = targets
            .iter()
            .find(|coordinate| !self.edits.contains_key(coordinate))
        {
            return Err(EditError::NotBuffered {
                coordinate: *coordinate,
            });
        }
        let removed = targets
            .iter()
            .filter(|coordinate| self.edits.remove(coordinate).is_some())
            .count();
        Ok(removed)
    }

    /// Item recorded at `coordinate`, if any.
    #[must_use]
    pub fn get(&self, coordinate: &Coordinate) -> Option<&str> {
        self.edits.get(coordinate).map(|edit| edit.item.as_str())
    }

    /// Number of buffered coordinates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Whether the buffer holds no edits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Discards every buffered edit.
    pub fn clear(&mut self) {
        self.edits.clear();
    }

    /// Groups the buffer by item and packs each group into regions.
    ///
    /// Items appear in the order they were first recorded among the
    /// coordinates still buffered.
    #[must_use]
    pub fn compact(&self) -> Vec<ItemGroup> {
        let mut by_item: BTreeMap<&str, (u64, BTreeSet<Coordinate>)> = BTreeMap::new();
        for (coordinate, edit) in &self.edits {
            let (first_seen, coordinates) = by_item
                .entry(edit.item.as_str())
                .or_insert_with(|| (edit.sequence, BTreeSet::new()));
            *first_seen = (*first_seen).min(edit.sequence);
            coordinates.insert(*coordinate);
        }

        let mut ordered: Vec<_> = by_item.into_iter().collect();
        ordered.sort_by_key(|(_, (first_seen, _))| *first_seen);
        ordered
            .into_iter()
            .map(|(item, (_, coordinates))| ItemGroup {
                item: item.to_owned(),
                regions: compact_item(coordinates),
            })
            .collect()
    }

    /// Drains the buffer and transmits it through `channel`.
    ///
    /// The buffer is empty afterwards even when transmission fails.
    /// Items matching an `end_list` prefix are sent last.
    ///
    /// # Errors
    ///
    /// Returns the first [`TransmitError`] that aborts transmission.
    pub fn send<C: CommandChannel + ?Sized>(
        &mut self,
        channel: &C,
        end_list: &[&str],
        limit: usize,
    ) -> Result<TransmitSummary, TransmitError> {
        let drained = mem::take(self);
        let groups = drained.compact();
        debug!(
            target: TRANSMIT_TARGET,
            coordinates = drained.len(),
            items = groups.len(),
            "sending buffered edits"
        );
        send_item_groups(channel, groups, end_list, limit)
    }
}
