//! Convergence waiting
//!
//! After the replication patch is accepted the hub and, optionally, a
//! verification member are polled until both independently show the target
//! as the ready primary. Every fetch is raced against the deadline and the
//! cancellation token, so a stalled control plane never delays reporting.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::crd::{DocumentDB, is_healthy_phase};

use super::control_plane::ControlPlane;
use super::error::{PromotionError, PromotionResult};

/// Default time to wait for convergence
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default delay between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Timing for a convergence wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Parse a duration such as "500ms", "10s", "10m" or "1h"
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        Some(Duration::from_millis(ms.parse().ok()?))
    } else if let Some(hours) = s.strip_suffix('h') {
        Some(Duration::from_secs(hours.parse::<u64>().ok()?.checked_mul(3600)?))
    } else if let Some(minutes) = s.strip_suffix('m') {
        Some(Duration::from_secs(minutes.parse::<u64>().ok()?.checked_mul(60)?))
    } else if let Some(seconds) = s.strip_suffix('s') {
        Some(Duration::from_secs(seconds.parse().ok()?))
    } else {
        None
    }
}

/// Successful end of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convergence {
    /// Poll cycles performed, including the converging one
    pub polls: u32,
    pub elapsed: Duration,
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// The hub does not yet show the promotion
    HubPending,
    /// The hub does, the verification member does not yet
    SecondaryPending,
    /// The verification member has no copy of the declaration yet
    SecondaryMissing,
    Converged,
}

/// Whether a fetched declaration shows `target` as the ready primary
///
/// A declaration without a reported phase counts on the primary alone.
pub fn is_promotion_observed(db: &DocumentDB, target: &str) -> bool {
    db.designated_primary() == Some(target) && db.phase().is_none_or(is_healthy_phase)
}

/// Run one fetch-and-check cycle against the supplied handles
pub async fn poll_once(
    target: &str,
    hub: &dyn ControlPlane,
    secondary: Option<&dyn ControlPlane>,
    namespace: &str,
    name: &str,
) -> PromotionResult<PollState> {
    match hub.get(namespace, name).await {
        Ok(db) if is_promotion_observed(&db, target) => {}
        Ok(_) => return Ok(PollState::HubPending),
        Err(e) if e.is_not_found() => return Ok(PollState::HubPending),
        Err(source) => {
            return Err(PromotionError::FetchError {
                plane: hub.name().to_string(),
                source,
            });
        }
    }

    let Some(secondary) = secondary else {
        return Ok(PollState::Converged);
    };

    match secondary.get(namespace, name).await {
        Ok(db) if is_promotion_observed(&db, target) => Ok(PollState::Converged),
        Ok(_) => Ok(PollState::SecondaryPending),
        Err(e) if e.is_not_found() => Ok(PollState::SecondaryMissing),
        Err(source) => Err(PromotionError::FetchError {
            plane: secondary.name().to_string(),
            source,
        }),
    }
}

/// Poll until every supplied handle shows `target` as the ready primary
///
/// A zero timeout or poll interval is a `ConfigurationError`.
/// Returns `TimeoutError` once `config.timeout` elapses and `CancelledError`
/// as soon as `cancel` fires. Fetch errors other than "not found" end the
/// wait immediately.
#[instrument(
    skip(hub, secondary, config, cancel),
    fields(hub = %hub.name(), secondary = secondary.map(|s| s.name()).unwrap_or("-"))
)]
pub async fn wait_for_convergence(
    target: &str,
    hub: &dyn ControlPlane,
    secondary: Option<&dyn ControlPlane>,
    namespace: &str,
    name: &str,
    config: &WaitConfig,
    cancel: &CancellationToken,
) -> PromotionResult<Convergence> {
    if config.timeout.is_zero() || config.poll_interval.is_zero() {
        return Err(PromotionError::ConfigurationError(
            "wait timeout and poll interval must be positive".to_string(),
        ));
    }

    let started = Instant::now();
    let deadline = tokio::time::sleep_until(started + config.timeout);
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let timed_out = || PromotionError::TimeoutError {
        timeout: config.timeout,
        target: target.to_string(),
    };
    let cancelled = || PromotionError::CancelledError {
        target: target.to_string(),
    };

    let mut polls = 0u32;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = &mut deadline => return Err(timed_out()),
            _ = ticker.tick() => {}
        }

        polls += 1;
        let state = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            _ = &mut deadline => return Err(timed_out()),
            state = poll_once(target, hub, secondary, namespace, name) => state?,
        };

        if state == PollState::Converged {
            let elapsed = started.elapsed();
            info!(polls, ?elapsed, "Promotion observed on all control planes");
            return Ok(Convergence { polls, elapsed });
        }
        debug!(polls, ?state, "Promotion not yet observed");
    }
}
