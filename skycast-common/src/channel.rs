//! Channel name validation.
//!
//! Channels are hierarchical `/`-separated paths on the message bus, e.g.
//! `home/living/temperature`. Validation happens once at configuration load
//! so the publisher can trust every channel it is handed.

use crate::error::{Error, Result};

/// Check that `channel` is a well-formed publish destination.
///
/// Rejects empty names, wildcard characters (`+`, `#`), and empty path
/// segments (leading, trailing, or doubled `/`).
pub fn validate_channel(channel: &str) -> Result<()> {
    if channel.is_empty() {
        return Err(Error::Channel("channel is empty".to_string()));
    }

    if channel.contains(['+', '#']) {
        return Err(Error::Channel(format!(
            "'{}' contains wildcard characters, which are not valid in a publish destination",
            channel
        )));
    }

    if channel.contains('\0') {
        return Err(Error::Channel(format!(
            "'{}' contains a NUL character",
            channel.escape_debug()
        )));
    }

    if channel.split('/').any(str::is_empty) {
        return Err(Error::Channel(format!(
            "'{}' has an empty segment (leading, trailing, or doubled '/')",
            channel
        )));
    }

    Ok(())
}
