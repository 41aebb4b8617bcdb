//! Gateway configuration.
//!
//! The reply deadline and pending bound are deliberate, explicit defaults: a
//! peer that never replies costs a table entry only until the deadline, and
//! the table never grows past `max_pending`.

use std::time::Duration;

/// Default reply deadline for forwarded commands and queries.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Default bound on concurrently pending requests.
pub const DEFAULT_MAX_PENDING: usize = 1024;

/// Default interval between deadline sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// Default capacity of the outgoing taps and the writer queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Tuning knobs for one gateway endpoint.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Label for this endpoint in logs ("main", "renderer", ...).
    pub endpoint: String,
    /// Reply deadline applied to every forwarded command and query.
    pub default_deadline: Duration,
    /// Upper bound on concurrently pending requests.
    pub max_pending: usize,
    /// Interval between deadline sweeps.
    pub sweep_interval: Duration,
    /// Capacity of the outgoing taps and the writer queue.
    pub queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "main".to_string(),
            default_deadline: DEFAULT_DEADLINE,
            max_pending: DEFAULT_MAX_PENDING,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl GatewayConfig {
    /// Config for a named endpoint with default tuning.
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Override the reply deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = deadline;
        self
    }

    /// Override the pending-request bound.
    #[must_use]
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Override the deadline sweep interval.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_bounded() {
        let config = GatewayConfig::default();
        assert_eq!(config.default_deadline, Duration::from_secs(30));
        assert_eq!(config.max_pending, 1024);
        assert!(config.sweep_interval < config.default_deadline);
    }

    #[test]
    fn test_builder_overrides() {
        let config = GatewayConfig::for_endpoint("renderer")
            .with_deadline(Duration::from_millis(50))
            .with_max_pending(4);
        assert_eq!(config.endpoint, "renderer");
        assert_eq!(config.default_deadline, Duration::from_millis(50));
        assert_eq!(config.max_pending, 4);
    }
}
