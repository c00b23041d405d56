//! POST /v1/chat/completions: streaming pass-through to the upstream model
//! with two server-side rewrites (daily mood injection, summary resume).

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{json, Value};

use super::mood::DailyMood;
use super::AiService;
use crate::state::AppState;

/// Streaming upstream calls get a generous ceiling rather than the short
/// non-streaming timeout; long completions can take minutes.
const STREAM_TIMEOUT_SECS: u64 = 300;

/// SSE event prepended to a rewritten summary response so the client knows
/// the answer is a recap, not a chat turn.
const SUMMARY_PRELUDE: &[u8] = b"data: {\"status\":\"summary\"}\n\n";

struct PreparedRequest {
    body: String,
    summary: bool,
}

/// POST /v1/chat/completions
///
/// The body is forwarded to the configured upstream mostly untouched. Two
/// exceptions:
/// - a two-message body from a (user, character) pair we hold history for is
///   rewritten into a request to summarize that history;
/// - otherwise the character's daily mood is injected into the system prompt.
pub async fn chat_completions(State(state): State<AppState>, body: String) -> Response {
    let prepared = state.ai.prepare_chat_request(body).await;
    state.ai.stream_completion(prepared).await
}

impl AiService {
    async fn prepare_chat_request(&self, original: String) -> PreparedRequest {
        let Ok(mut root) = serde_json::from_str::<Value>(&original) else {
            // Not ours to police; let the upstream produce the error.
            tracing::warn!("unparseable chat request body, forwarding verbatim");
            return PreparedRequest {
                body: original,
                summary: false,
            };
        };

        let user = field_str(&root, "user");
        let character_id = field_str(&root, "character_id");
        let message_count = root
            .get("messages")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);

        // A fresh two-message body (system prompt + one user line) is the
        // client resuming a conversation. If we still hold the previous
        // request, answer with a summary of it instead of a chat turn.
        if message_count == 2 {
            if let (Some(user), Some(character_id)) = (user.as_deref(), character_id.as_deref()) {
                if let Some(history) = self.last_request(user, character_id) {
                    if let Some(body) = self.build_summary_body(&mut root, &history) {
                        tracing::info!(character_id, "rewriting resumed chat into a summary request");
                        return PreparedRequest {
                            body,
                            summary: true,
                        };
                    }
                }
            }
        }

        if let Some(character_id) = character_id.as_deref() {
            if let Some(mood) = self.lookup_or_generate_mood(character_id, &root).await {
                inject_mood(&mut root, &mood);
            }
        }

        let body = serde_json::to_string(&root).unwrap_or(original);
        if let (Some(user), Some(character_id)) = (user.as_deref(), character_id.as_deref()) {
            self.store_last_request(user, character_id, &body);
        }
        PreparedRequest {
            body,
            summary: false,
        }
    }

    /// Replace the message list with a summarization request over the stored
    /// history. Returns None when either body is not shaped as expected.
    fn build_summary_body(&self, root: &mut Value, history: &str) -> Option<String> {
        let transcript = serde_json::from_str::<Value>(history)
            .ok()
            .and_then(|previous| {
                previous
                    .get("messages")
                    .map(|messages| messages.to_string())
            })?;

        let object = root.as_object_mut()?;
        object.insert(
            "messages".to_string(),
            json!([
                {"role": "system", "content": self.config.summary_prompt},
                {"role": "user", "content": transcript},
            ]),
        );
        serde_json::to_string(root).ok()
    }

    async fn lookup_or_generate_mood(&self, character_id: &str, root: &Value) -> Option<DailyMood> {
        if let Some(cached) = self.moods.get(character_id) {
            return Some(cached);
        }
        let settings = first_system_content(root)?;
        let mood = self.generate_mood(&settings).await?;
        tracing::info!(character_id, event = %mood.event, mood = %mood.mood, "generated daily mood");
        self.moods.insert(character_id, mood.clone());
        Some(mood)
    }

    async fn stream_completion(&self, prepared: PreparedRequest) -> Response {
        let Some(key) = self.keys.next() else {
            return proxy_error(StatusCode::BAD_GATEWAY, "no upstream API keys configured");
        };

        let result = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(key)
            .header(header::CONTENT_TYPE, "application/json")
            .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS))
            .body(prepared.body)
            .send()
            .await;
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "upstream chat request failed");
                return proxy_error(StatusCode::BAD_GATEWAY, "upstream request failed");
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, detail, "upstream rejected chat request");
            return proxy_error(
                StatusCode::BAD_GATEWAY,
                format!("upstream error {status}: {detail}"),
            );
        }

        let upstream = response.bytes_stream();
        let body = if prepared.summary {
            let prelude = futures_util::stream::once(async {
                Ok::<Bytes, reqwest::Error>(Bytes::from_static(SUMMARY_PRELUDE))
            });
            Body::from_stream(prelude.chain(upstream))
        } else {
            Body::from_stream(upstream)
        };

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            body,
        )
            .into_response()
    }
}

fn field_str(root: &Value, key: &str) -> Option<String> {
    root.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Content of the leading system message, if the body has one.
fn first_system_content(root: &Value) -> Option<String> {
    let first = root.get("messages")?.as_array()?.first()?;
    if first.get("role")?.as_str()? != "system" {
        return None;
    }
    first.get("content")?.as_str().map(str::to_string)
}

/// Prefix the system prompt with the character's daily event and mood.
fn inject_mood(root: &mut Value, mood: &DailyMood) {
    let Some(first) = root
        .get_mut("messages")
        .and_then(Value::as_array_mut)
        .and_then(|messages| messages.first_mut())
    else {
        return;
    };
    let is_system = first
        .get("role")
        .and_then(Value::as_str)
        .is_some_and(|role| role == "system");
    if !is_system {
        return;
    }
    let Some(content) = first.get("content").and_then(Value::as_str) else {
        return;
    };
    let rewritten = format!(
        "Earlier today: {}. It left me feeling {}.\n\n{}",
        mood.event, mood.mood, content
    );
    if let Some(object) = first.as_object_mut() {
        object.insert("content".to_string(), Value::String(rewritten));
    }
}

fn proxy_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "code": status.as_u16(),
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;

    fn service() -> AiService {
        // Empty key pool keeps every test offline: mood generation bails at
        // the key lookup and nothing reaches the network.
        AiService::new(AiConfig::default())
    }

    fn chat_body(user: &str, character_id: &str, messages: Value) -> String {
        json!({
            "model": "test-model",
            "user": user,
            "character_id": character_id,
            "stream": true,
            "messages": messages,
        })
        .to_string()
    }

    #[tokio::test]
    async fn unparseable_body_is_forwarded_verbatim() {
        let ai = service();
        let prepared = ai.prepare_chat_request("not json {".to_string()).await;
        assert_eq!(prepared.body, "not json {");
        assert!(!prepared.summary);
    }

    #[tokio::test]
    async fn ordinary_request_is_remembered_per_user_and_character() {
        let ai = service();
        let body = chat_body(
            "alice",
            "luna",
            json!([
                {"role": "system", "content": "You are Luna."},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
                {"role": "user", "content": "how are you"},
            ]),
        );

        let prepared = ai.prepare_chat_request(body).await;
        assert!(!prepared.summary);
        assert!(ai.last_request("alice", "luna").is_some());
        assert!(ai.last_request("bob", "luna").is_none());
        assert!(ai.last_request("alice", "rex").is_none());
    }

    #[tokio::test]
    async fn two_message_resume_becomes_summary_request() {
        let ai = service();
        let first = chat_body(
            "alice",
            "luna",
            json!([
                {"role": "system", "content": "You are Luna."},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
                {"role": "user", "content": "tell me about the moon"},
            ]),
        );
        ai.prepare_chat_request(first).await;

        let resume = chat_body(
            "alice",
            "luna",
            json!([
                {"role": "system", "content": "You are Luna."},
                {"role": "user", "content": "hi again"},
            ]),
        );
        let prepared = ai.prepare_chat_request(resume).await;

        assert!(prepared.summary);
        let body: Value = serde_json::from_str(&prepared.body).unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], AiConfig::default().summary_prompt);
        assert_eq!(messages[1]["role"], "user");
        let transcript = messages[1]["content"].as_str().unwrap();
        assert!(transcript.contains("tell me about the moon"));
    }

    #[tokio::test]
    async fn two_messages_without_history_stay_a_chat_turn() {
        let ai = service();
        let body = chat_body(
            "alice",
            "luna",
            json!([
                {"role": "system", "content": "You are Luna."},
                {"role": "user", "content": "hi"},
            ]),
        );
        let prepared = ai.prepare_chat_request(body).await;
        assert!(!prepared.summary);
    }

    #[tokio::test]
    async fn cached_mood_is_injected_into_the_system_prompt() {
        let ai = service();
        ai.moods().insert(
            "luna",
            DailyMood {
                event: "found a coin".to_string(),
                mood: "cheerful".to_string(),
            },
        );

        let body = chat_body(
            "alice",
            "luna",
            json!([
                {"role": "system", "content": "You are Luna."},
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
                {"role": "user", "content": "morning"},
            ]),
        );
        let prepared = ai.prepare_chat_request(body).await;

        let parsed: Value = serde_json::from_str(&prepared.body).unwrap();
        let system = parsed["messages"][0]["content"].as_str().unwrap();
        assert!(system.starts_with("Earlier today: found a coin. It left me feeling cheerful."));
        assert!(system.ends_with("You are Luna."));
    }

    #[test]
    fn first_system_content_requires_a_leading_system_message() {
        let with_system = json!({"messages": [{"role": "system", "content": "persona"}]});
        assert_eq!(first_system_content(&with_system).as_deref(), Some("persona"));

        let user_first = json!({"messages": [{"role": "user", "content": "hi"}]});
        assert_eq!(first_system_content(&user_first), None);

        let no_messages = json!({"model": "m"});
        assert_eq!(first_system_content(&no_messages), None);
    }

    #[test]
    fn inject_mood_leaves_non_system_heads_alone() {
        let mood = DailyMood {
            event: "rain".to_string(),
            mood: "gloomy".to_string(),
        };
        let mut body = json!({"messages": [{"role": "user", "content": "hi"}]});
        inject_mood(&mut body, &mood);
        assert_eq!(body["messages"][0]["content"], "hi");
    }
}
