//! Steering topic echo: one JSON line per pose

use crate::error::{Result, VisionError};
use crate::transport::{PoseMessage, TopicSubscriber};
use std::io::Write;
use tracing::{debug, info};

/// Write every pose received on `subscriber` to `out` as a JSON line until
/// the topic closes. Returns the number of lines written.
pub async fn write_poses<W: Write>(
    mut subscriber: TopicSubscriber<PoseMessage>,
    mut out: W,
) -> Result<u64> {
    let mut written = 0u64;
    info!("Echoing steering estimates from {}", subscriber.topic());

    while let Some(pose) = subscriber.recv().await {
        let line = serde_json::to_string(&pose)
            .map_err(|e| VisionError::Transport(format!("Failed to encode pose: {}", e)))?;
        writeln!(out, "{}", line)?;
        out.flush()?;
        written += 1;
    }

    debug!("Steering topic {} closed after {} pose(s)", subscriber.topic(), written);
    Ok(written)
}
