//! Reconnect-forever loop with jittered exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::OverseerClient;
use crate::handle::OverseerHandle;
use crate::handler::Handler;

/// Connection settings for the Overseer channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket URL of the Overseer's node endpoint.
    pub url: String,
    /// Shared secret presented as a bearer token on connect.
    pub token: String,
    /// Backoff behavior between reconnect attempts.
    pub reconnect: ReconnectConfig,
}

/// Configuration for reconnection backoff.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Calculates the delay for a given attempt number (1-based),
    /// with ±25% jitter to avoid synchronized reconnect storms.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.05);
        Duration::from_secs_f64(with_jitter)
    }
}

/// Runs the channel until cancelled.
///
/// Connects, installs the sender into `handle`, fires the handler's
/// connect hook (which resyncs the Overseer), and waits for the
/// connection to die; then clears the handle and retries with backoff.
/// The attempt counter resets after every successful connect.
pub async fn run_channel<H: Handler>(
    config: ChannelConfig,
    handler: Arc<H>,
    handle: OverseerHandle,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let connect = OverseerClient::connect(&config.url, &config.token, Arc::clone(&handler));
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect => result,
        };

        match connected {
            Ok(client) => {
                attempt = 0;
                info!(url = %config.url, "connected to overseer");

                handle.set(Some(client.sender()));
                handler.on_connected(client.sender()).await;

                let closed = client.closed();
                tokio::select! {
                    _ = cancel.cancelled() => {
                        client.close().await;
                        handle.set(None);
                        break;
                    }
                    _ = closed.cancelled() => {}
                }

                handle.set(None);
                handler.on_disconnected().await;
                warn!("overseer connection lost");
            }
            Err(e) => {
                warn!(url = %config.url, attempt, error = %e, "failed to connect to overseer");
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = config.reconnect.delay_for_attempt(attempt);
        info!(
            attempt,
            delay_secs = format_args!("{:.1}", delay.as_secs_f64()),
            "reconnecting"
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_backoff_progression() {
        let config = ReconnectConfig::default();
        // Base delays: 1s, 2s, 4s, 8s, 16s, 30s (capped), 30s...
        let expected_base = [1.0, 2.0, 4.0, 8.0, 16.0, 30.0, 30.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let delay = config.delay_for_attempt((i + 1) as u32);
            let secs = delay.as_secs_f64();
            let lo = base * 0.74;
            let hi = base * 1.26;
            assert!(
                secs >= lo && secs <= hi,
                "attempt {}: {secs:.3}s not in [{lo:.3}, {hi:.3}]",
                i + 1
            );
        }
    }

    #[test]
    fn delay_never_hits_zero() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
        };
        for attempt in 1..10 {
            assert!(config.delay_for_attempt(attempt) >= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn run_channel_stops_on_cancel() {
        use crate::handler::HandlerFuture;
        use crate::sender::Sender;
        use echo_protocol::envelope::Message;

        struct NoopHandler;
        impl Handler for NoopHandler {
            fn on_connected(&self, _sender: Sender) -> HandlerFuture<'_> {
                Box::pin(async {})
            }
            fn on_expect_upload(&self, _sender: Sender, _msg: Message) -> HandlerFuture<'_> {
                Box::pin(async {})
            }
            fn on_delete(&self, _sender: Sender, _msg: Message) -> HandlerFuture<'_> {
                Box::pin(async {})
            }
        }

        let config = ChannelConfig {
            // Nothing listens here; the loop will fail and back off.
            url: "ws://127.0.0.1:1".into(),
            token: "t".into(),
            reconnect: ReconnectConfig::default(),
        };
        let handle = OverseerHandle::new();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_channel(
            config,
            Arc::new(NoopHandler),
            handle.clone(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("loop should stop on cancel")
            .expect("no panic");
        assert!(!handle.is_connected());
    }
}
