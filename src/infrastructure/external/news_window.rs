//! Read contract for a news-calendar feed (§1, §4.7 step 10). Fetching and
//! parsing economic calendars is out of scope; the pipeline only needs to
//! ask "is `currency` inside a blackout window right now?"

use crate::domain::types::ImpactLevel;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// One scheduled event's blackout window, already expanded to
/// `{-30min,+15min}` (HIGH) / `{-15min,+10min}` (MEDIUM) per §4.7 step 10.
#[derive(Debug, Clone)]
pub struct NewsWindow {
    pub currency: String,
    pub impact: ImpactLevel,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl NewsWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at && at <= self.ends_at
    }
}

#[async_trait]
pub trait NewsWindowSource: Send + Sync {
    /// The active blackout window for `currency` at `at`, if any. Only
    /// HIGH/MEDIUM windows gate trading (§4.7 step 10); LOW-impact events
    /// are not modeled as windows at all.
    async fn active_window(&self, currency: &str, at: DateTime<Utc>) -> Result<Option<NewsWindow>>;
}

#[derive(Default)]
pub struct InMemoryNewsWindowSource {
    windows: RwLock<Vec<NewsWindow>>,
}

impl InMemoryNewsWindowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, window: NewsWindow) {
        self.windows.write().unwrap().push(window);
    }
}

#[async_trait]
impl NewsWindowSource for InMemoryNewsWindowSource {
    async fn active_window(&self, currency: &str, at: DateTime<Utc>) -> Result<Option<NewsWindow>> {
        Ok(self
            .windows
            .read()
            .unwrap()
            .iter()
            .find(|w| w.currency == currency && w.contains(at))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn no_windows_means_clear() {
        let source = InMemoryNewsWindowSource::new();
        assert!(source.active_window("USD", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn inside_window_is_reported() {
        let source = InMemoryNewsWindowSource::new();
        let now = Utc::now();
        source.push(NewsWindow {
            currency: "USD".into(),
            impact: ImpactLevel::High,
            starts_at: now - Duration::minutes(30),
            ends_at: now + Duration::minutes(15),
        });
        assert!(source.active_window("USD", now).await.unwrap().is_some());
        assert!(source.active_window("EUR", now).await.unwrap().is_none());
    }
}
