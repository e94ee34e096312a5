//! Configuration for the verification engine.

use std::time::Duration;

/// Configuration for the Rollcall core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Default session TTL when the organizer does not specify one.
    pub default_ttl: Duration,
    /// Default geofence radius in meters.
    pub default_radius_m: f64,
    /// Maximum acceptable location-fix accuracy radius; coarser fixes are
    /// rejected before any distance computation.
    pub min_accuracy_m: f64,
    /// How long after creation recorded outcomes stay correctable.
    pub edit_window: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300), // 5 minutes
            default_radius_m: 500.0,
            min_accuracy_m: 50.0,
            edit_window: Duration::from_secs(48 * 60 * 60), // 48 hours
        }
    }
}
