//! crates/tutor_core/src/recommended.rs
//!
//! Day-granularity local cache of the curated news and blog lists shown on the
//! recommended-content screen.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{ContentCategory, RecommendedArticle};
use crate::ports::{Clock, ContentStore, DeliveryFilter, KeyValueStore, PortResult};

pub const RECOMMENDED_CACHE_KEY: &str = "recommended_content_cache";
const CACHE_DURATION_DAYS: i64 = 1;
pub const DEFAULT_ITEMS_PER_CATEGORY: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedCacheEntry {
    pub news: Vec<RecommendedArticle>,
    pub blogs: Vec<RecommendedArticle>,
    pub last_updated: DateTime<Utc>,
}

impl RecommendedCacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.last_updated < Duration::days(CACHE_DURATION_DAYS)
    }

    pub fn items(&self) -> impl Iterator<Item = &RecommendedArticle> {
        self.news.iter().chain(self.blogs.iter())
    }
}

/// How fetched items relate to the backend's delivered flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPolicy {
    /// Show only items the curation job has already pushed to clients.
    #[default]
    PushedOnly,
    /// Show items not yet delivered and flag them as delivered afterwards.
    ClaimUndelivered,
}

impl std::str::FromStr for DeliveryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pushed-only" => Ok(DeliveryPolicy::PushedOnly),
            "claim-undelivered" => Ok(DeliveryPolicy::ClaimUndelivered),
            other => Err(format!(
                "'{}' is not one of pushed-only, claim-undelivered",
                other
            )),
        }
    }
}

/// Outcome of flagging a batch of items as delivered.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub marked: usize,
    pub failed: Vec<Uuid>,
}

pub struct RecommendedContentCache {
    store: Arc<dyn ContentStore>,
    local: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    per_category: u32,
    policy: DeliveryPolicy,
}

impl RecommendedContentCache {
    pub fn new(
        store: Arc<dyn ContentStore>,
        local: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        per_category: u32,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            store,
            local,
            clock,
            per_category,
            policy,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.cached().is_some()
    }

    fn cached(&self) -> Option<RecommendedCacheEntry> {
        let entry = self
            .local
            .get::<RecommendedCacheEntry>(RECOMMENDED_CACHE_KEY)
            .unwrap_or_else(|e| {
                warn!("Could not read recommended-content cache: {}", e);
                None
            })?;
        entry.is_fresh(self.clock.now()).then_some(entry)
    }

    /// Returns the cached lists while they are less than a day old, otherwise
    /// fetches and caches fresh ones. Fetch errors are returned, never masked
    /// by an older entry.
    pub async fn get(&self) -> PortResult<RecommendedCacheEntry> {
        if let Some(entry) = self.cached() {
            debug!("Serving recommended content cached at {}.", entry.last_updated);
            return Ok(entry);
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> PortResult<RecommendedCacheEntry> {
        let filter = match self.policy {
            DeliveryPolicy::PushedOnly => DeliveryFilter::Delivered,
            DeliveryPolicy::ClaimUndelivered => DeliveryFilter::Undelivered,
        };

        let (news, blogs) = futures::join!(
            self.store
                .fetch_recommended(ContentCategory::News, filter, self.per_category),
            self.store
                .fetch_recommended(ContentCategory::Blog, filter, self.per_category),
        );
        for (category, result) in [(ContentCategory::News, &news), (ContentCategory::Blog, &blogs)] {
            if let Err(e) = result {
                error!("Error fetching recommended {} items: {}", category.as_str(), e);
            }
        }

        let entry = RecommendedCacheEntry {
            news: news?,
            blogs: blogs?,
            last_updated: self.clock.now(),
        };
        if let Err(e) = self.local.set(RECOMMENDED_CACHE_KEY, &entry) {
            warn!("Could not store recommended-content cache: {}", e);
        }
        info!(
            "Fetched {} news and {} blog recommendations.",
            entry.news.len(),
            entry.blogs.len()
        );

        if self.policy == DeliveryPolicy::ClaimUndelivered {
            self.mark_delivered(&entry).await;
        }
        Ok(entry)
    }

    /// Flags every item of the entry as delivered, one independent update per item.
    pub async fn mark_delivered(&self, entry: &RecommendedCacheEntry) -> DeliveryReport {
        let ids: Vec<Uuid> = entry.items().map(|item| item.id).collect();
        let results = join_all(ids.iter().map(|id| self.store.mark_delivered(*id))).await;

        let mut report = DeliveryReport::default();
        for (id, result) in ids.into_iter().zip(results) {
            match result {
                Ok(()) => report.marked += 1,
                Err(e) => {
                    warn!("Failed to mark recommended item {} as delivered: {}", id, e);
                    report.failed.push(id);
                }
            }
        }
        report
    }

    pub fn invalidate(&self) {
        if let Err(e) = self.local.remove(RECOMMENDED_CACHE_KEY) {
            warn!("Could not clear recommended-content cache: {}", e);
        }
    }
}
