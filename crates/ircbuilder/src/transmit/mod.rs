//! Chunked transmission of compacted edits.
//!
//! Each item's regions are encoded into as few `set_node_list` commands as
//! fit under the length ceiling, sent one at a time, and the replies folded
//! into a [`TransmitSummary`]. A timed-out batch is recorded in the summary
//! and transmission continues; a closed connection aborts it.

mod encode;

use std::fmt;

use tracing::{info, warn};

use crate::building::{ItemGroup, Region};
use crate::commands::CommandChannel;
use crate::errors::{SessionError, TransmitError};

/// Log target for transmission.
pub(crate) const TRANSMIT_TARGET: &str = "ircbuilder::transmit";

const TIMED_OUT: &str = "timed out";

/// Aggregated acknowledgements for one or more transmitted batches.
///
/// Renders as `<items> <count><errors>`: each distinct echoed item followed
/// by a space, the summed count, then ` [reply]` for every reply that was
/// not a count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmitSummary {
    /// Distinct item names echoed by the server, in first-seen order.
    pub items: Vec<String>,
    /// Total nodes the server reported as set.
    pub count: i64,
    /// Replies that could not be parsed, verbatim.
    pub errors: Vec<String>,
}

impl TransmitSummary {
    /// Folds one `<item> <count>` reply into the summary.
    ///
    /// A reply whose count is not an integer, or would overflow the total,
    /// is kept verbatim as an error.
    pub fn absorb(&mut self, reply: &str) {
        let parsed = reply.rsplit_once(' ').and_then(|(item, count)| {
            let total = self.count.checked_add(count.parse::<i64>().ok()?)?;
            Some((item, total))
        });
        match parsed {
            Some((item, total)) => {
                self.count = total;
                self.note_item(item);
            }
            None => self.errors.push(reply.to_owned()),
        }
    }

    /// Combines another summary into this one.
    pub fn merge(&mut self, other: Self) {
        self.count = self.count.saturating_add(other.count);
        for item in &other.items {
            self.note_item(item);
        }
        self.errors.extend(other.errors);
    }

    /// Whether every batch was acknowledged with a count.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn note_item(&mut self, item: &str) {
        if !self.items.iter().any(|seen| seen == item) {
            self.items.push(item.to_owned());
        }
    }
}

impl fmt::Display for TransmitSummary {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            write!(formatter, "{item} ")?;
        }
        write!(formatter, "{}", self.count)?;
        for error in &self.errors {
            write!(formatter, " [{error}]")?;
        }
        Ok(())
    }
}

/// Sends every region for one item as size-bounded `set_node_list` batches.
///
/// # Errors
///
/// Returns [`TransmitError::OversizedRegion`] when a single region cannot fit
/// under `limit`, and [`TransmitError::Session`] when the session fails in a
/// way other than a reply timeout.
pub fn send_node_list<C: CommandChannel + ?Sized>(
    channel: &C,
    item: &str,
    regions: &[Region],
    limit: usize,
) -> Result<TransmitSummary, TransmitError> {
    let commands = encode::plan_batches(item, regions, limit)?;
    let mut summary = TransmitSummary::default();
    for (index, command) in commands.iter().enumerate() {
        match channel.send_command(command) {
            Ok(reply) => summary.absorb(&reply),
            Err(SessionError::Timeout { .. }) => {
                warn!(target: TRANSMIT_TARGET, item, batch = index, "batch reply timed out");
                summary.errors.push(String::from(TIMED_OUT));
            }
            Err(error) => return Err(error.into()),
        }
    }
    info!(
        target: TRANSMIT_TARGET,
        item,
        batches = commands.len(),
        regions = regions.len(),
        summary = %summary,
        "item transmitted"
    );
    Ok(summary)
}

/// Moves items matching each `end_list` prefix to the tail, prefix by prefix.
///
/// Relative order is otherwise preserved, so the last prefix listed is sent
/// last.
#[must_use]
pub fn order_items(groups: Vec<ItemGroup>, end_list: &[&str]) -> Vec<ItemGroup> {
    end_list.iter().fold(groups, |ordered, prefix| {
        let (mut head, tail): (Vec<_>, Vec<_>) = ordered
            .into_iter()
            .partition(|group| !group.item.starts_with(prefix));
        head.extend(tail);
        head
    })
}

/// Orders `groups` by `end_list` and transmits each in turn.
///
/// # Errors
///
/// Stops at the first group whose transmission fails; see [`send_node_list`].
pub fn send_item_groups<C: CommandChannel + ?Sized>(
    channel: &C,
    groups: Vec<ItemGroup>,
    end_list: &[&str],
    limit: usize,
) -> Result<TransmitSummary, TransmitError> {
    let mut total = TransmitSummary::default();
    for group in order_items(groups, end_list) {
        total.merge(send_node_list(channel, &group.item, &group.regions, limit)?);
    }
    Ok(total)
}
