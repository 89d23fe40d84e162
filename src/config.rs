//! Connection settings for [`RconClient`](crate::RconClient).

use crate::packet::MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where and how to connect. Missing fields take their default values.
///
/// # Examples
///
/// ```
/// use mc_rcon::RconConfig;
///
/// let config = RconConfig {
///     host: "mc.example.com".to_string(),
///     ..RconConfig::default()
/// };
/// assert_eq!(config.port, 25575);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RconConfig {
    /// Hostname or address of the server.
    pub host: String,

    /// RCON port.
    pub port: u16,

    /// Seconds to wait for each response. `None` waits forever.
    pub timeout_secs: Option<u64>,

    /// Largest accepted length prefix of a received frame.
    pub max_frame_len: u32,
}

impl RconConfig {
    /// The configured timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for RconConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 25575,
            timeout_secs: None,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}
