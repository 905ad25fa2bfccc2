//! The per-event pipeline: tag, resolve channel, enrich, persist, react.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::channel_log::ChannelLogSet;
use crate::name_cache::NameCache;
use crate::payload::{self, EventPayload};
use crate::rpc::SlackRpc;
use crate::time_utils::{format_utc_timestamp, parse_event_ts};

/// Emoji added to every archived plain message when reaction mode is on.
pub const REACTION_EMOJI: &str = "floppy_disk";

/// Why an event was dropped before persistence. Skips are expected and are
/// not error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingChannelId,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingChannelId => write!(f, "no channel id"),
        }
    }
}

/// What one invocation of the pipeline did with its event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Event was appended to the channel's log file.
    Logged { channel_id: String },
    /// Event was dropped without a file write.
    Skipped { reason: SkipReason },
}

/// Receives one event of a known type per invocation and decides whether it
/// is loggable, enriches it, persists it, and optionally acknowledges it.
pub struct EventLogger {
    logs: ChannelLogSet,
    names: NameCache,
    react: bool,
}

impl EventLogger {
    pub fn new(logs: ChannelLogSet, react: bool) -> Self {
        Self {
            logs,
            names: NameCache::new(),
            react,
        }
    }

    /// Per-event boundary the transport invokes. Outcomes become log lines;
    /// errors are reported with the event type and raw payload and never
    /// reach the delivery loop.
    pub async fn dispatch(&self, event_type: &str, data: EventPayload, rpc: &dyn SlackRpc) {
        let raw = Value::Object(data.clone());
        match self.handle(event_type, data, rpc).await {
            Ok(EventOutcome::Logged { channel_id }) => {
                debug!(event_type, %channel_id, "event logged");
            }
            Ok(EventOutcome::Skipped { reason }) => {
                warn!(event_type, %reason, "event skipped: {raw}");
            }
            Err(error) => {
                error!(event_type, "event handler failed: {error:#}; payload: {raw}");
            }
        }
    }

    /// Runs the pipeline for one event and reports what happened. Callers
    /// that must not propagate failures go through [`Self::dispatch`].
    pub async fn handle(
        &self,
        event_type: &str,
        mut data: EventPayload,
        rpc: &dyn SlackRpc,
    ) -> Result<EventOutcome> {
        data.insert(
            "event_type_".to_string(),
            Value::String(event_type.to_string()),
        );

        let Some(channel_id) = payload::channel_id(&data).map(str::to_string) else {
            return Ok(EventOutcome::Skipped {
                reason: SkipReason::MissingChannelId,
            });
        };

        self.augment(&mut data, rpc).await?;
        debug!(event_type, %channel_id, "event: {}", serde_json::Value::Object(data.clone()));

        self.logs.append(&channel_id, &data)?;

        if self.react && event_type == "message" && !payload::has_subtype(&data) {
            self.react_to(&channel_id, &data, rpc).await;
        }

        Ok(EventOutcome::Logged { channel_id })
    }

    /// Enriches the payload in place: `ts_` (human-readable UTC time) when
    /// `ts` is present, `user_` (resolved display name) when a user id is
    /// present.
    async fn augment(&self, data: &mut EventPayload, rpc: &dyn SlackRpc) -> Result<()> {
        if let Some(ts_value) = payload::ts(data) {
            let rendered = format_utc_timestamp(ts_seconds(ts_value)?)?;
            data.insert("ts_".to_string(), Value::String(rendered));
        }

        if let Some(user_id) = payload::user_id(data).map(str::to_string) {
            let name = self
                .names
                .resolve(rpc, &user_id)
                .await
                .with_context(|| format!("failed to resolve name for user {user_id}"))?;
            data.insert("user_".to_string(), Value::String(name));
        }

        Ok(())
    }

    /// Reaction failures are logged and otherwise indistinguishable from
    /// success: the event line is already durably appended by this point.
    async fn react_to(&self, channel_id: &str, data: &EventPayload, rpc: &dyn SlackRpc) {
        let Some(timestamp) = payload::ts(data).map(raw_ts_string) else {
            warn!(channel_id, "message event has no ts, skipping reaction");
            return;
        };
        if let Err(error) = rpc.add_reaction(REACTION_EMOJI, channel_id, &timestamp).await {
            warn!(channel_id, "reaction call failed: {error:#}");
        }
    }
}

fn ts_seconds(value: &Value) -> Result<f64> {
    match value {
        Value::String(raw) => parse_event_ts(raw),
        Value::Number(number) => number
            .as_f64()
            .with_context(|| format!("ts value {number} is not representable as f64")),
        other => bail!("unsupported ts value: {other}"),
    }
}

fn raw_ts_string(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}
