//! Per-character daily event/mood cache.
//!
//! A character's mood is generated once per day from its system prompt and
//! injected into every chat request for that character until the cache is
//! cleared by the background task.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// One generated "something that happened today" entry for a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMood {
    pub event: String,
    pub mood: String,
}

#[derive(Debug, Clone, Default)]
pub struct MoodStore {
    moods: Arc<DashMap<String, DailyMood>>,
}

impl MoodStore {
    pub fn get(&self, character_id: &str) -> Option<DailyMood> {
        self.moods.get(character_id).map(|entry| entry.clone())
    }

    pub fn insert(&self, character_id: &str, mood: DailyMood) {
        self.moods.insert(character_id.to_string(), mood);
    }

    pub fn len(&self) -> usize {
        self.moods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moods.is_empty()
    }

    /// Drop every cached mood. Returns how many entries were cleared.
    pub fn clear(&self) -> usize {
        let cleared = self.moods.len();
        self.moods.clear();
        cleared
    }
}

/// Background task that empties the mood cache on a fixed interval, so each
/// character gets a fresh daily event the next time it is asked about.
pub fn spawn_daily_clear(store: MoodStore, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; skip it so a fresh boot does not
        // log a pointless clear.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let cleared = store.clear();
            tracing::info!(cleared, "cleared daily mood cache");
        }
    });
}
