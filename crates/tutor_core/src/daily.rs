//! crates/tutor_core/src/daily.rs
//!
//! Model-generated reading suggestions, cached locally once per calendar day.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::domain::ChatTurn;
use crate::ports::{Clock, KeyValueStore, LanguageModel};
use crate::prompts;

const DAILY_KEY_PREFIX: &str = "daily_recommendations_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecommendation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub read_time: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

pub struct DailyRecommendations {
    local: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl DailyRecommendations {
    pub fn new(local: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { local, clock }
    }

    pub fn cache_key(&self) -> String {
        format!("{}{}", DAILY_KEY_PREFIX, self.clock.now().format("%Y-%m-%d"))
    }

    /// Today's suggestions for the level. Failures yield an empty list, which is
    /// never cached so the next call tries again.
    pub async fn get(&self, model: &dyn LanguageModel, level: &str) -> Vec<DailyRecommendation> {
        let key = self.cache_key();
        if let Ok(Some(cached)) = self.local.get::<Vec<DailyRecommendation>>(&key) {
            debug!("Serving daily recommendations from {}.", key);
            return cached;
        }

        let items = generate_recommendations(model, level).await;
        if !items.is_empty() {
            if let Err(e) = self.local.set(&key, &items) {
                warn!("Could not cache daily recommendations: {}", e);
            }
        }
        items
    }
}

pub async fn generate_recommendations(model: &dyn LanguageModel, level: &str) -> Vec<DailyRecommendation> {
    let raw = match model
        .complete(
            prompts::JSON_TUTOR_SYSTEM,
            &[ChatTurn::user(prompts::recommendations(level))],
        )
        .await
    {
        Ok(raw) => raw,
        Err(e) => {
            error!("Recommendation generation failed: {}", e);
            return Vec::new();
        }
    };
    serde_json::from_str(prompts::strip_code_fences(&raw)).unwrap_or_else(|e| {
        warn!("Recommendations were not a JSON array: {}", e);
        Vec::new()
    })
}
