//! Payload encoding and batch planning for `set_node_list`.

use std::io::{self, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use tracing::debug;

use super::TRANSMIT_TARGET;
use crate::building::Region;
use crate::errors::TransmitError;

/// Application command name for region lists.
pub(crate) const SET_NODE_LIST: &str = "set_node_list";

/// Compresses and encodes a batch of regions as one payload token.
///
/// The plain record is `"|"` followed by each region's pipe-terminated text.
pub(crate) fn encode_regions(regions: &[Region]) -> io::Result<String> {
    let mut record = String::from("|");
    for region in regions {
        record.push_str(&region.to_string());
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(record.as_bytes())?;
    let compressed = encoder.finish()?;
    Ok(STANDARD.encode(compressed))
}

/// Command text sent for one encoded batch.
pub(crate) fn batch_command(payload: &str, item: &str) -> String {
    format!("{SET_NODE_LIST} {payload} {item}")
}

/// Splits `regions` into the fewest equal-sized batches whose commands fit
/// within `limit` characters.
///
/// The batch count grows from one until every command fits. Returns the
/// command text for each batch, in region order.
pub(crate) fn plan_batches(
    item: &str,
    regions: &[Region],
    limit: usize,
) -> Result<Vec<String>, TransmitError> {
    if regions.is_empty() {
        return Ok(Vec::new());
    }
    let encode = |batch: &[Region]| {
        encode_regions(batch)
            .map(|payload| batch_command(&payload, item))
            .map_err(|source| TransmitError::Encode {
                item: item.to_owned(),
                source,
            })
    };

    let mut batches = 1;
    loop {
        let size = regions.len().div_ceil(batches);
        let commands = regions
            .chunks(size)
            .map(&encode)
            .collect::<Result<Vec<_>, _>>()?;
        let longest = commands.iter().map(String::len).max().unwrap_or(0);
        debug!(
            target: TRANSMIT_TARGET,
            item,
            batches = commands.len(),
            longest,
            "planned batches"
        );
        if longest <= limit {
            return Ok(commands);
        }
        if size == 1 {
            return Err(TransmitError::OversizedRegion {
                item: item.to_owned(),
                length: longest,
                limit,
            });
        }
        batches += 1;
    }
}
