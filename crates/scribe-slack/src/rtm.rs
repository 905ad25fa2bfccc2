//! RTM websocket runtime: connects, reads event frames, and hands each
//! subscribed event to the core pipeline.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

use scribe_core::{EventLogger, EventPayload};

use crate::api_client::SlackApiClient;

/// RTM event types the bot subscribes to. Exact spelling matters; anything
/// else on the socket is ignored.
pub const SUBSCRIBED_EVENT_TYPES: [&str; 16] = [
    "file_change",
    "file_comment_added",
    "file_comment_deleted",
    "file_comment_edited",
    "file_created",
    "file_deleted",
    "file_public",
    "file_shared",
    "file_unshared",
    "member_joined_channel",
    "member_left_channel",
    "message",
    "pin_added",
    "pin_removed",
    "reaction_added",
    "reaction_removed",
];

pub fn is_subscribed(event_type: &str) -> bool {
    SUBSCRIBED_EVENT_TYPES.contains(&event_type)
}

enum SessionEnd {
    Disconnected,
    Interrupted,
}

/// The blocking run loop: connect, deliver events, reconnect on failure,
/// return only on interrupt.
pub struct RtmRuntime {
    client: SlackApiClient,
    logger: EventLogger,
    bot_user_id: OnceCell<String>,
    reconnect_delay: Duration,
}

impl RtmRuntime {
    pub fn new(client: SlackApiClient, logger: EventLogger, reconnect_delay: Duration) -> Self {
        Self {
            client,
            logger,
            bot_user_id: OnceCell::new(),
            reconnect_delay,
        }
    }

    /// Runs until interrupted. Returning `Ok` means the user asked to stop;
    /// transport failures are logged and followed by a reconnect.
    pub async fn run(&self) -> Result<()> {
        loop {
            let socket_url = match self.client.rtm_connect().await {
                Ok(url) => url,
                Err(err) => {
                    error!("failed to open rtm connection: {err:#}");
                    if self.wait_for_reconnect().await {
                        return Ok(());
                    }
                    continue;
                }
            };

            info!("rtm socket connected");
            match self.run_session(&socket_url).await {
                Ok(SessionEnd::Interrupted) => return Ok(()),
                Ok(SessionEnd::Disconnected) => info!("rtm socket closed"),
                Err(err) => error!("rtm session error: {err:#}"),
            }

            if self.wait_for_reconnect().await {
                return Ok(());
            }
        }
    }

    /// Sleeps out the reconnect delay; true means an interrupt arrived.
    async fn wait_for_reconnect(&self) -> bool {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => true,
            _ = tokio::time::sleep(self.reconnect_delay) => false,
        }
    }

    async fn run_session(&self, socket_url: &str) -> Result<SessionEnd> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .context("failed to connect rtm websocket")?;
        let (_sink, mut source) = stream.split();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(SessionEnd::Interrupted);
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(SessionEnd::Disconnected);
                    };
                    let message = message_result.context("failed reading rtm websocket message")?;
                    self.handle_frame(message).await;
                }
            }
        }
    }

    /// One frame in, at most one dispatch out. Frame-level problems are
    /// logged and skipped so the socket keeps draining.
    async fn handle_frame(&self, message: WsMessage) {
        let data = match parse_event_frame(message) {
            Ok(Some(data)) => data,
            Ok(None) => return,
            Err(err) => {
                warn!("ignoring undecodable rtm frame: {err:#}");
                return;
            }
        };

        let Some(event_type) = data.get("type").and_then(Value::as_str).map(str::to_string)
        else {
            // RTM acks and presence pushes have no type we care about.
            return;
        };
        if !is_subscribed(&event_type) {
            debug!(event_type, "unsubscribed event ignored");
            return;
        }

        if let Err(err) = self.bot_user_id().await {
            warn!("failed to resolve bot identity: {err:#}");
        }

        self.logger.dispatch(&event_type, data, &self.client).await;
    }

    /// The bot's own user id, resolved via `auth.test` at most once per
    /// process on the first delivered event.
    async fn bot_user_id(&self) -> Result<&str> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async {
                let id = self.client.resolve_bot_user_id().await?;
                info!(bot_user_id = %id, "resolved bot identity");
                Ok::<_, anyhow::Error>(id)
            })
            .await?;
        Ok(id.as_str())
    }
}

/// Decodes a websocket frame into an event payload. Control frames and
/// non-object payloads yield `None`.
fn parse_event_frame(message: WsMessage) -> Result<Option<EventPayload>> {
    let parsed: Value = match message {
        WsMessage::Text(text) => {
            serde_json::from_str(&text).context("failed to parse rtm event frame")?
        }
        WsMessage::Binary(bytes) => {
            let text = String::from_utf8(bytes.to_vec()).context("invalid utf-8 rtm payload")?;
            serde_json::from_str(&text).context("failed to parse rtm event frame")?
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
            return Ok(None);
        }
    };
    Ok(parsed.as_object().cloned())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    use scribe_core::{ChannelLogSet, EventLogger};

    use super::{is_subscribed, parse_event_frame, RtmRuntime, SUBSCRIBED_EVENT_TYPES};
    use crate::api_client::SlackApiClient;

    fn runtime_at(base_url: &str, root: &std::path::Path, react: bool) -> RtmRuntime {
        let client = SlackApiClient::new(base_url.to_string(), "xoxb-test".to_string(), 3_000, 1, 5)
            .expect("client");
        let logger = EventLogger::new(ChannelLogSet::open(root).expect("logs"), react);
        RtmRuntime::new(client, logger, Duration::from_millis(10))
    }

    #[test]
    fn unit_is_subscribed_covers_the_fixed_event_set() {
        for event_type in SUBSCRIBED_EVENT_TYPES {
            assert!(is_subscribed(event_type), "{event_type} must be subscribed");
        }
        assert!(!is_subscribed("hello"));
        assert!(!is_subscribed("app_mention"));
        assert!(!is_subscribed("user_typing"));
    }

    #[test]
    fn unit_parse_event_frame_decodes_text_and_binary_objects() {
        let text = WsMessage::Text(r#"{"type":"message","channel":"C1"}"#.into());
        let parsed = parse_event_frame(text).expect("parse").expect("payload");
        assert_eq!(parsed["type"], json!("message"));

        let binary = WsMessage::Binary(br#"{"type":"pin_added"}"#.to_vec().into());
        let parsed = parse_event_frame(binary).expect("parse").expect("payload");
        assert_eq!(parsed["type"], json!("pin_added"));
    }

    #[test]
    fn unit_parse_event_frame_ignores_control_frames_and_non_objects() {
        assert!(parse_event_frame(WsMessage::Ping(Vec::new().into()))
            .expect("ping")
            .is_none());
        assert!(parse_event_frame(WsMessage::Pong(Vec::new().into()))
            .expect("pong")
            .is_none());
        assert!(parse_event_frame(WsMessage::Close(None))
            .expect("close")
            .is_none());
        assert!(parse_event_frame(WsMessage::Text("[1,2,3]".into()))
            .expect("array")
            .is_none());
    }

    #[test]
    fn regression_parse_event_frame_reports_malformed_json() {
        assert!(parse_event_frame(WsMessage::Text("{not json".into())).is_err());
    }

    #[tokio::test]
    async fn functional_bot_identity_is_resolved_at_most_once() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200)
                .json_body(json!({"ok": true, "user_id": "UBOT"}));
        });
        let temp = tempdir().expect("tempdir");
        let runtime = runtime_at(&server.base_url(), temp.path(), false);

        assert_eq!(runtime.bot_user_id().await.expect("first"), "UBOT");
        assert_eq!(runtime.bot_user_id().await.expect("second"), "UBOT");
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn functional_concurrent_identity_lookups_share_one_auth_call() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200)
                .json_body(json!({"ok": true, "user_id": "UBOT"}));
        });
        let temp = tempdir().expect("tempdir");
        let runtime =
            std::sync::Arc::new(runtime_at(&server.base_url(), temp.path(), false));

        let handles = (0..8)
            .map(|_| {
                let runtime = std::sync::Arc::clone(&runtime);
                tokio::spawn(async move {
                    runtime.bot_user_id().await.map(str::to_string)
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.await.expect("task").expect("identity"), "UBOT");
        }

        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn functional_subscribed_frame_flows_through_to_the_channel_file() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200)
                .json_body(json!({"ok": true, "user_id": "UBOT"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/users.info");
            then.status(200)
                .json_body(json!({"ok": true, "user": {"name": "alice"}}));
        });
        let temp = tempdir().expect("tempdir");
        let runtime = runtime_at(&server.base_url(), temp.path(), false);

        let frame = WsMessage::Text(
            r#"{"type":"message","channel":"C1","user":"U1","ts":"1000.1","text":"hi"}"#.into(),
        );
        runtime.handle_frame(frame).await;

        let contents = std::fs::read_to_string(temp.path().join("C1")).expect("read");
        let line: serde_json::Value = serde_json::from_str(contents.trim()).expect("json");
        assert_eq!(line["event_type_"], json!("message"));
        assert_eq!(line["user_"], json!("alice"));
        assert_eq!(line["ts_"], json!("1970-01-01 00:16:40"));
    }

    #[tokio::test]
    async fn functional_unsubscribed_frames_write_nothing() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200)
                .json_body(json!({"ok": true, "user_id": "UBOT"}));
        });
        let temp = tempdir().expect("tempdir");
        let runtime = runtime_at(&server.base_url(), temp.path(), false);

        runtime
            .handle_frame(WsMessage::Text(r#"{"type":"hello"}"#.into()))
            .await;
        runtime
            .handle_frame(WsMessage::Text(r#"{"type":"user_typing","channel":"C1"}"#.into()))
            .await;

        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert_eq!(auth.calls(), 0);
    }
}
