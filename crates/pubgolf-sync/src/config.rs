use std::time::Duration;

/// Minimum spacing between two publishes from one channel.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(100);

/// Largest serialized envelope a channel will accept.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 10 * 1024;

/// A channel with no traffic for this long tears itself down.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// How often the inactivity clock is checked.
pub const DEFAULT_LIVENESS_TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub send_interval: Duration,
    pub max_message_bytes: usize,
    pub inactivity_timeout: Duration,
    pub liveness_tick: Duration,
    /// Deliver a channel's own publications back to it.
    ///
    /// Only visible to code reading [`ChannelEvents`](crate::channel::ChannelEvents) directly.
    /// [`GameController`](crate::controller::GameController) ignores its own envelopes either way.
    pub self_delivery: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_interval: DEFAULT_SEND_INTERVAL,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            liveness_tick: DEFAULT_LIVENESS_TICK,
            self_delivery: false,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    #[must_use]
    pub fn with_max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    #[must_use]
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Values below one millisecond are clamped, tokio panics on a zero period.
    #[must_use]
    pub fn with_liveness_tick(mut self, tick: Duration) -> Self {
        self.liveness_tick = tick.max(Duration::from_millis(1));
        self
    }

    #[must_use]
    pub fn with_self_delivery(mut self, self_delivery: bool) -> Self {
        self.self_delivery = self_delivery;
        self
    }
}
