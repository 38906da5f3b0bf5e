//! Diff-driven reconciliation loop.
//!
//! [`Reconciler::run`] is the top-level fault boundary of the service:
//!
//! ```text
//! open feed ──► next frame ──► decode ──► per-entity diff ──► dispatch
//!     ▲                                                         │
//!     └──────────── backoff ◄── stream failure / end ◄──────────┘
//! ```
//!
//! Every failure below it is absorbed with the same policy: log, wait the
//! fixed backoff, carry on. Only the cancellation token stops the loop.
//!
//! Entities are reconciled sequentially in registry order, so for a given
//! sequence of snapshots the sequence of device commands is fully
//! determined.

use std::time::Duration;

use panelsync_api::{FeedClient, Frame, PanelClient, TransportConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_BACKOFF, ServiceConfig};
use crate::error::CoreError;
use crate::model::{CounterSnapshot, DeviceCommand, EntityId, PanelState};
use crate::registry::EntityRegistry;
use crate::sink::{CommandSink, PanelSink};
use crate::source::{FeedSource, FrameStream};

// ── Outcomes ─────────────────────────────────────────────────────────

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No `data` field: nothing to reconcile.
    Skipped,
    /// `data` did not decode; the registry was left untouched.
    Malformed,
    /// One outcome per registry entity that was visited, in order.
    Reconciled(Vec<EntityOutcome>),
}

/// What happened to one entity within a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityOutcome {
    pub entity: EntityId,
    pub diff: i128,
    pub action: EntityAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityAction {
    /// Desired state already applied, no command sent.
    Settled,
    /// Command accepted; the registry now records this state.
    Dispatched(PanelState),
    /// Command failed; the previous state is kept so the next tick retries.
    DispatchFailed(PanelState),
    /// Shutdown arrived while the command was in flight.
    Interrupted,
}

enum SessionEnd {
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, strum::Display)]
#[strum(serialize_all = "snake_case")]
enum Stage {
    Stream,
    Decode,
    Dispatch,
}

// ── Failure policy ───────────────────────────────────────────────────

/// Uniform "log + fixed delay + continue" handling.
struct FailurePolicy {
    backoff: Duration,
    cancel: CancellationToken,
}

impl FailurePolicy {
    /// Log `err` and wait out the backoff. `false` if shutdown interrupted
    /// the wait.
    async fn absorb(&self, stage: Stage, err: &CoreError) -> bool {
        match err {
            CoreError::MalformedPayload { reason, payload } => {
                warn!(%stage, %reason, %payload, "discarding undecodable counter payload");
            }
            CoreError::CommandDispatchFailed { entity, reason } => {
                warn!(%stage, %entity, %reason, "panel command failed, will retry on next change");
            }
            _ => warn!(%stage, error = %err, "event stream failed"),
        }
        self.pause().await
    }

    async fn pause(&self) -> bool {
        debug!(
            delay_ms = u64::try_from(self.backoff.as_millis()).unwrap_or(u64::MAX),
            "backing off"
        );
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(self.backoff) => true,
        }
    }
}

// ── Reconciler ───────────────────────────────────────────────────────

/// Drives a [`FeedSource`] and converges a [`CommandSink`] with it.
///
/// Owns the [`EntityRegistry`]; nothing else mutates it.
pub struct Reconciler<F, K> {
    source: F,
    sink: K,
    registry: EntityRegistry,
    policy: FailurePolicy,
}

impl Reconciler<FeedClient, PanelSink> {
    /// Build the live service: HTTP feed, panel controller, registry.
    ///
    /// Fails with [`CoreError::ConfigMissing`] when no entity is configured.
    pub fn from_config(config: ServiceConfig, cancel: CancellationToken) -> Result<Self, CoreError> {
        let registry = EntityRegistry::from_specs(config.entities)?;
        if registry.is_empty() {
            return Err(CoreError::ConfigMissing {
                field: "entities".into(),
            });
        }

        let feed_transport = TransportConfig::streaming(config.feed.connect_timeout);
        let feed = FeedClient::new(config.feed.url, &feed_transport)?
            .with_idle_timeout(config.feed.idle_timeout);

        let device_transport = TransportConfig {
            connect_timeout: config.device.request_timeout,
            request_timeout: Some(config.device.request_timeout),
        };
        let panels = PanelClient::new(
            config.device.base_url,
            config.device.auth_token,
            &device_transport,
        )?
        .with_transition(config.device.transition);

        Ok(
            Self::new(feed, PanelSink::new(panels, config.palette), registry, cancel)
                .with_backoff(config.backoff),
        )
    }
}

impl<F, K> Reconciler<F, K>
where
    F: FeedSource,
    K: CommandSink,
{
    pub fn new(source: F, sink: K, registry: EntityRegistry, cancel: CancellationToken) -> Self {
        Self {
            source,
            sink,
            registry,
            policy: FailurePolicy {
                backoff: DEFAULT_BACKOFF,
                cancel,
            },
        }
    }

    /// Fixed delay applied after every absorbed failure.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.policy.backoff = backoff;
        self
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    // ── Outer loop ───────────────────────────────────────────────────

    /// Run until the cancellation token fires.
    ///
    /// Never returns an error: failed connects, broken or stalled streams
    /// and clean end-of-stream all lead to a backoff and a fresh connection
    /// with the registry carried over.
    pub async fn run(&mut self) {
        info!(
            feed = %self.source.describe(),
            entities = self.registry.len(),
            "reconciliation loop starting"
        );

        let mut session: u64 = 0;
        while !self.policy.cancel.is_cancelled() {
            session += 1;
            let keep_going = match self.run_session().await {
                Ok(SessionEnd::Cancelled) => false,
                Ok(SessionEnd::Ended) => {
                    info!(session, "event stream ended, reconnecting");
                    self.policy.pause().await
                }
                Err(err) => {
                    debug!(session, "session failed");
                    self.policy.absorb(Stage::Stream, &err).await
                }
            };
            if !keep_going {
                break;
            }
        }

        info!("reconciliation loop stopped");
    }

    /// One connection: open, then apply frames until the stream ends.
    async fn run_session(&mut self) -> Result<SessionEnd, CoreError> {
        let opened = tokio::select! {
            biased;
            () = self.policy.cancel.cancelled() => None,
            frames = self.source.open(&self.policy.cancel) => Some(frames),
        };
        let Some(frames) = opened else {
            return Ok(SessionEnd::Cancelled);
        };
        let mut frames = frames?;

        loop {
            let next = tokio::select! {
                biased;
                () = self.policy.cancel.cancelled() => None,
                frame = frames.next_frame() => Some(frame),
            };
            let Some(frame) = next.transpose()? else {
                return Ok(SessionEnd::Cancelled);
            };
            let Some(frame) = frame else {
                return Ok(if self.policy.cancel.is_cancelled() {
                    SessionEnd::Cancelled
                } else {
                    SessionEnd::Ended
                });
            };

            self.apply_frame(&frame).await;
        }
    }

    // ── Per-frame work ───────────────────────────────────────────────

    /// Decode one frame and reconcile every entity against it.
    ///
    /// A frame without `data` is skipped silently. An undecodable payload
    /// is logged with its raw text and followed by the backoff.
    pub async fn apply_frame(&mut self, frame: &Frame) -> FrameOutcome {
        let Some(data) = frame.data.as_deref() else {
            debug!(event = ?frame.event, "frame without data, skipping");
            return FrameOutcome::Skipped;
        };

        let tracked = self.registry.iter().map(|(id, _)| id.as_str());
        match CounterSnapshot::decode(data, tracked) {
            Ok(snapshot) => FrameOutcome::Reconciled(self.reconcile(&snapshot).await),
            Err(err) => {
                self.policy.absorb(Stage::Decode, &err).await;
                FrameOutcome::Malformed
            }
        }
    }

    /// Converge every registry entity with `snapshot`, in registry order.
    ///
    /// One entity's failed command never prevents the next entity from
    /// being processed.
    pub async fn reconcile(&mut self, snapshot: &CounterSnapshot) -> Vec<EntityOutcome> {
        let mut outcomes = Vec::with_capacity(self.registry.len());

        for (id, record) in self.registry.iter_mut() {
            if self.policy.cancel.is_cancelled() {
                break;
            }

            let previous = record.last_count;
            let current = snapshot.count(id.as_str());
            let diff = record.observe(current);
            let desired = PanelState::classify(diff);

            if diff != 0 {
                info!(entity = %id, previous, current, "counter changed");
            }

            let action = if desired == record.last_state {
                EntityAction::Settled
            } else {
                let command = DeviceCommand {
                    entity: id.clone(),
                    target: record.panel_id,
                    desired,
                };
                info!(
                    entity = %id,
                    panel_id = record.panel_id,
                    from = %record.last_state,
                    to = %desired,
                    "setting panel state"
                );

                let sent = tokio::select! {
                    biased;
                    () = self.policy.cancel.cancelled() => None,
                    result = self.sink.dispatch(&command) => Some(result),
                };

                match sent {
                    None => EntityAction::Interrupted,
                    Some(Ok(())) => {
                        record.last_state = desired;
                        EntityAction::Dispatched(desired)
                    }
                    Some(Err(err)) => {
                        self.policy.absorb(Stage::Dispatch, &err).await;
                        EntityAction::DispatchFailed(desired)
                    }
                }
            };

            outcomes.push(EntityOutcome {
                entity: id.clone(),
                diff,
                action,
            });
        }

        outcomes
    }
}

// ── Tests ────────────────────────────────────────────────────────────
