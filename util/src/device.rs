//! Coarse device fingerprinting.
//!
//! The identifier only separates browsers/devices well enough to flag a second
//! check-in from the same machine. It is neither unique nor tamper-resistant.

use serde::{Deserialize, Serialize};

pub const DEVICE_ID_PREFIX: &str = "DEV-";

/// Browser and environment signals reported by the check-in client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSignals {
    pub user_agent: String,
    pub language: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u32,
    /// Minutes between UTC and local time as the browser reports it (UTC+2 is `-120`).
    pub timezone_offset_minutes: i32,
    pub hardware_concurrency: Option<u32>,
    pub platform: String,
}

impl EnvironmentSignals {
    fn fingerprint_source(&self) -> String {
        let cpus = self
            .hardware_concurrency
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".into());

        [
            self.user_agent.clone(),
            self.language.clone(),
            format!("{}x{}", self.screen_width, self.screen_height),
            self.color_depth.to_string(),
            self.timezone_offset_minutes.to_string(),
            cpus,
            self.platform.clone(),
        ]
        .join("|")
    }
}

/// 32-bit rolling hash (`h * 31 + unit`) over UTF-16 code units.
fn rolling_hash(source: &str) -> i32 {
    source.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    })
}

/// Renders the signals as `DEV-` followed by 8 uppercase hex digits.
pub fn generate_device_id(signals: &EnvironmentSignals) -> String {
    let hash = i64::from(rolling_hash(&signals.fingerprint_source())).abs();
    format!("{DEVICE_ID_PREFIX}{hash:08X}")
}
