// src/event.rs
use serde::{Deserialize, Serialize};

/// A detected change that warrants a browser reload.
///
/// # Fields
/// - `paths`: Paths relative to the watch root that changed, appeared or disappeared.
/// - `modified`: The watermark after the change, in milliseconds since the Unix epoch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    /// Paths relative to the watch root that changed, appeared or disappeared.
    pub paths: Vec<String>,
    /// The watermark after the change, in milliseconds since the Unix epoch.
    pub modified: u64,
}
