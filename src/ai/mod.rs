//! AI chat proxy: forwards OpenAI-compatible chat completions upstream while
//! layering in per-character daily moods and conversation summaries.

pub mod keys;
pub mod mood;
pub mod proxy;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::json;

use crate::config::AiConfig;
use keys::ApiKeyPool;
use mood::{DailyMood, MoodStore};

/// Upstream client plus the in-memory caches the proxy layers on top of it.
///
/// Cheap to clone; all interior state is shared.
#[derive(Clone)]
pub struct AiService {
    http: reqwest::Client,
    config: Arc<AiConfig>,
    keys: ApiKeyPool,
    moods: MoodStore,
    /// Last full request body per (user, character) pair, kept so a later
    /// two-message "resume" request can be rewritten into a summary of it.
    last_requests: Arc<DashMap<String, String>>,
}

impl AiService {
    pub fn new(config: AiConfig) -> Self {
        if config.api_keys.is_empty() {
            tracing::warn!("no AI API keys configured; /v1 endpoints will answer 502");
        } else {
            tracing::info!(keys = config.api_keys.len(), "AI API key pool loaded");
        }
        Self {
            http: reqwest::Client::new(),
            keys: ApiKeyPool::new(config.api_keys.clone()),
            moods: MoodStore::default(),
            last_requests: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    pub fn moods(&self) -> &MoodStore {
        &self.moods
    }

    fn history_key(user: &str, character_id: &str) -> String {
        format!("{user}:{character_id}")
    }

    fn store_last_request(&self, user: &str, character_id: &str, body: &str) {
        self.last_requests
            .insert(Self::history_key(user, character_id), body.to_string());
    }

    fn last_request(&self, user: &str, character_id: &str) -> Option<String> {
        self.last_requests
            .get(&Self::history_key(user, character_id))
            .map(|entry| entry.clone())
    }

    /// Ask the upstream model to invent a daily event and mood for a character
    /// described by `settings` (the character's own system prompt). Returns
    /// None on any failure; a missing mood only means no injection happens.
    async fn generate_mood(&self, settings: &str) -> Option<DailyMood> {
        let key = self.keys.next()?;
        let prompt = self.config.event_mood_prompt.replace("{character}", settings);
        let payload = json!({
            "model": self.config.model,
            "messages": [{"role": "system", "content": prompt}],
            "stream": false,
        });

        let result = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .json(&payload)
            .send()
            .await;
        let response = match result {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "mood generation rejected upstream");
                return None;
            }
            Err(err) => {
                tracing::warn!(error = %err, "mood generation request failed");
                return None;
            }
        };

        let body: serde_json::Value = match response.json().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "mood generation returned unreadable body");
                return None;
            }
        };
        let content = body
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)?;
        match serde_json::from_str::<DailyMood>(content.trim()) {
            Ok(mood) => Some(mood),
            Err(err) => {
                tracing::warn!(error = %err, "mood generation produced non-JSON content");
                None
            }
        }
    }
}
