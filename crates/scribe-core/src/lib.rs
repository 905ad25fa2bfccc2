//! Transport-agnostic event pipeline for the Scribe archiving bot.
//!
//! Provides the per-event handling pipeline (tag, resolve channel, enrich,
//! persist, react), the per-channel JSON Lines log store, and the user-name
//! memoization cache. The real-time transport lives in `scribe-slack` and
//! invokes [`EventLogger::dispatch`] once per delivered event.

pub mod channel_log;
pub mod logger;
pub mod name_cache;
pub mod payload;
pub mod rpc;
pub mod time_utils;

pub use channel_log::ChannelLogSet;
pub use logger::{EventLogger, EventOutcome, SkipReason, REACTION_EMOJI};
pub use name_cache::NameCache;
pub use payload::EventPayload;
pub use rpc::SlackRpc;
pub use time_utils::{format_utc_timestamp, parse_event_ts};
