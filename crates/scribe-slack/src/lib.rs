//! Slack collaborator for the Scribe archiving bot.
//!
//! Wraps the two halves of the transport: the Web API client (identity and
//! user lookups, reactions) and the RTM websocket runtime that delivers
//! events to the `scribe-core` pipeline.

pub mod api_client;
mod http_helpers;
pub mod rtm;

pub use api_client::{SlackApiClient, DEFAULT_API_BASE};
pub use rtm::{RtmRuntime, SUBSCRIBED_EVENT_TYPES};
