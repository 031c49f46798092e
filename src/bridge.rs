use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::emoncms::client::{EmonClient, PostError};
use crate::models::status::{sanitize_name, DeviceStatus};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("status message has no senml block")]
    MissingSenml,
    #[error("senml block has no entry list")]
    MissingEntries,
    #[error("senml entry has a value but no name")]
    UnnamedValue,
}

/// Everything needed for one EmonCMS input post.
#[derive(Debug)]
pub struct EmonInput {
    pub node: String,
    pub fulljson: String,
}

/// Outcome of translating one message: either a post to send, or a
/// deliberate drop (already logged at the appropriate level).
#[derive(Debug)]
pub enum Translation {
    Post(EmonInput),
    Skip,
}

/// Converts one raw status message into at most one EmonCMS input post.
///
/// Messages without a hardware config block or device id are not from a
/// supported device and are skipped; readings the device itself flags as
/// failed are skipped quietly. A missing senml block is warned about and
/// then treated as a malformed message.
pub fn translate(topic: &str, payload: &[u8]) -> Result<Translation, BridgeError> {
    let status: DeviceStatus = serde_json::from_slice(payload)?;

    let Some(hwc) = status.hwc else {
        warn!(topic, "No hardware config block in message, ignoring");
        return Ok(Translation::Skip);
    };

    let node = match hwc.deviceid {
        Some(id) if !id.is_empty() => id,
        _ => {
            warn!(topic, "No deviceid in hardware config, ignoring");
            return Ok(Translation::Skip);
        }
    };

    if hwc.error.unwrap_or(false) {
        debug!(topic, node, "Ignoring failed reading");
        return Ok(Translation::Skip);
    }

    let senml = match status.senml {
        Some(senml) => senml,
        None => {
            warn!(topic, node, "No senml block in status message");
            return Err(BridgeError::MissingSenml);
        }
    };
    let entries = senml.entries.ok_or(BridgeError::MissingEntries)?;

    let mut values = Map::new();
    for entry in entries {
        match (entry.name, entry.value) {
            (None, None) => {
                warn!(topic, node, "senml entry without name and value, skipping");
            }
            (Some(name), value) => {
                values.insert(sanitize_name(&name), value.unwrap_or(Value::Null));
            }
            (None, Some(_)) => return Err(BridgeError::UnnamedValue),
        }
    }

    let fulljson = serde_json::to_string(&values)?;
    Ok(Translation::Post(EmonInput { node, fulljson }))
}

/// Translates device stream messages and forwards them to EmonCMS.
pub struct Bridge {
    emon: EmonClient,
}

impl Bridge {
    pub fn new(emon: EmonClient) -> Self {
        Self { emon }
    }

    /// Handles one message from the device stream. Never fails: every error
    /// is logged here so one bad message cannot take the listener down.
    pub async fn handle(&self, topic: &str, payload: &[u8]) {
        let input = match translate(topic, payload) {
            Ok(Translation::Post(input)) => input,
            Ok(Translation::Skip) => return,
            Err(e) => {
                error!(topic, error = %e, "Failed to process device message");
                return;
            }
        };

        info!(node = %input.node, data = %input.fulljson, "Posting readings");
        match self.emon.post_input(&input.node, &input.fulljson).await {
            Ok(()) => {}
            Err(PostError::Api { status, body }) => {
                warn!(status = %status, body = %body, "EmonCMS API failure");
            }
            Err(PostError::Rejected { message }) => {
                warn!(
                    message = message.as_deref().unwrap_or(""),
                    "EmonCMS did not accept the readings"
                );
            }
            Err(e) => {
                error!(error = %e, "Failed to post readings");
            }
        }
    }
}
