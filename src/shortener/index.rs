//! Short-URL index
//!
//! Forward index (code -> record), reverse index (url -> code) and the
//! per-code analytics buckets live behind one mutex, so every create, click,
//! eviction and snapshot sees them in a consistent state.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::models::{CreateResult, ImportSummary, ShortUrlRecord, SystemStats, UrlSummary};
use crate::analytics::{AccessInfo, AnalyticsBucket, AnalyticsSummary};
use crate::backup::snapshot::Snapshot;
use crate::config::{AnalyticsConfig, ShortenerConfig, StaticConfig};
use crate::errors::{LinkkeeperError, Result};
use crate::utils::{generate_code_from, is_valid_url, validate_url};

/// 三个 map 必须同时更新
#[derive(Debug, Default)]
pub(crate) struct IndexState {
    pub(crate) urls: HashMap<String, ShortUrlRecord>,
    pub(crate) reverse: HashMap<String, String>,
    pub(crate) analytics: HashMap<String, AnalyticsBucket>,
    pub(crate) next_sequence: u64,
}

impl IndexState {
    fn insert(&mut self, record: ShortUrlRecord) {
        self.reverse
            .insert(record.original_url.clone(), record.short_code.clone());
        self.analytics
            .insert(record.short_code.clone(), AnalyticsBucket::new());
        self.urls.insert(record.short_code.clone(), record);
    }

    /// 同时删除记录、反向索引和 bucket
    pub(crate) fn remove(&mut self, code: &str) -> Option<ShortUrlRecord> {
        let record = self.urls.remove(code)?;
        // 反向索引只删除指向自己的条目
        if self
            .reverse
            .get(&record.original_url)
            .is_some_and(|c| c == code)
        {
            self.reverse.remove(&record.original_url);
        }
        self.analytics.remove(code);
        Some(record)
    }

    /// 按创建时间从旧到新排序的短码
    pub(crate) fn codes_oldest_first(&self) -> Vec<String> {
        let mut entries: Vec<(&String, (DateTime<Utc>, u64))> = self
            .urls
            .iter()
            .map(|(code, record)| (code, record.age_key()))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries.into_iter().map(|(code, _)| code.clone()).collect()
    }
}

pub struct UrlIndex {
    state: Mutex<IndexState>,
    shortener: ShortenerConfig,
    analytics: AnalyticsConfig,
}

impl Default for UrlIndex {
    fn default() -> Self {
        Self::new(ShortenerConfig::default(), AnalyticsConfig::default())
    }
}

impl UrlIndex {
    pub fn new(shortener: ShortenerConfig, analytics: AnalyticsConfig) -> Self {
        Self {
            state: Mutex::new(IndexState::default()),
            shortener,
            analytics,
        }
    }

    pub fn from_config(config: &StaticConfig) -> Self {
        Self::new(config.shortener.clone(), config.analytics.clone())
    }

    /// Runs `f` with the index lock held.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut IndexState) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    pub fn len(&self) -> usize {
        self.state.lock().urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shortens `original_url`, returning the existing code if the URL is already known.
    pub fn create_short_url(&self, original_url: &str) -> Result<CreateResult> {
        let url = validate_url(original_url).map_err(|e| {
            debug!("Rejected URL '{}': {}", original_url, e);
            LinkkeeperError::from(e)
        })?;
        if !is_valid_url(&url) {
            return Err(LinkkeeperError::invalid_url(format!(
                "Only http and https URLs are allowed: {}",
                url
            )));
        }

        let mut state = self.state.lock();

        if let Some(code) = state.reverse.get(&url) {
            debug!("URL already shortened as {}", code);
            return Ok(CreateResult {
                short_code: code.clone(),
                original_url: url,
                existing_url: true,
            });
        }

        let code = self.generate_unique_code(&state)?;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.insert(ShortUrlRecord {
            short_code: code.clone(),
            original_url: url.clone(),
            created_at: Utc::now(),
            click_count: 0,
            last_accessed_at: None,
            sequence,
        });

        info!("Created short code {} -> {}", code, url);
        Ok(CreateResult {
            short_code: code,
            original_url: url,
            existing_url: false,
        })
    }

    fn generate_unique_code(&self, state: &IndexState) -> Result<String> {
        let attempts = self.shortener.max_generation_attempts;
        for attempt in 1..=attempts {
            let candidate =
                generate_code_from(&self.shortener.alphabet, self.shortener.code_length);
            if !candidate.is_empty() && !state.urls.contains_key(&candidate) {
                if attempt > 1 {
                    debug!("Short code generated after {} attempts", attempt);
                }
                return Ok(candidate);
            }
        }

        error!(
            "Failed to generate a unique short code after {} attempts ({} codes in use)",
            attempts,
            state.urls.len()
        );
        Err(LinkkeeperError::code_exhausted(format!(
            "No free short code found after {} attempts",
            attempts
        )))
    }

    pub fn get_original_url(&self, short_code: &str) -> Result<ShortUrlRecord> {
        self.state
            .lock()
            .urls
            .get(short_code)
            .cloned()
            .ok_or_else(|| LinkkeeperError::not_found(format!("Short code '{}'", short_code)))
    }

    pub fn get_url(&self, short_code: &str) -> Result<UrlSummary> {
        self.get_original_url(short_code)
            .map(|record| UrlSummary::from(&record))
    }

    /// 反向查询：URL 对应的短码
    pub fn lookup_code(&self, original_url: &str) -> Option<String> {
        let url = validate_url(original_url).ok()?;
        self.state.lock().reverse.get(&url).cloned()
    }

    /// Records one access. Unknown codes are ignored, returning `false`.
    pub fn record_click(&self, short_code: &str, access: impl Into<AccessInfo>) -> bool {
        let mut state = self.state.lock();
        // 加锁后再取时间，保证同一 bucket 的追加顺序与时间戳一致
        let at = Utc::now();
        self.record_locked(&mut state, short_code, access.into(), at)
    }

    /// Same as [`record_click`](Self::record_click) with an explicit timestamp.
    ///
    /// Late timestamps are placed in order within the history.
    pub fn record_click_at(
        &self,
        short_code: &str,
        access: impl Into<AccessInfo>,
        at: DateTime<Utc>,
    ) -> bool {
        let mut state = self.state.lock();
        self.record_locked(&mut state, short_code, access.into(), at)
    }

    fn record_locked(
        &self,
        state: &mut IndexState,
        short_code: &str,
        access: AccessInfo,
        at: DateTime<Utc>,
    ) -> bool {
        let IndexState {
            urls, analytics, ..
        } = &mut *state;

        let Some(record) = urls.get_mut(short_code) else {
            debug!("Click on unknown short code {}, ignored", short_code);
            return false;
        };
        let event = access.into_event(at);

        record.click_count += 1;
        if record.last_accessed_at.is_none_or(|last| last < at) {
            record.last_accessed_at = Some(at);
        }

        let bucket = analytics.entry(short_code.to_string()).or_default();
        if bucket.record(event, &self.analytics) {
            debug!("Security signal raised for {}", short_code);
        }
        true
    }

    pub fn get_analytics(&self, short_code: &str) -> Option<AnalyticsSummary> {
        self.get_analytics_at(short_code, Utc::now())
    }

    pub fn get_analytics_at(&self, short_code: &str, now: DateTime<Utc>) -> Option<AnalyticsSummary> {
        let state = self.state.lock();
        let record = state.urls.get(short_code)?;
        let empty = AnalyticsBucket::default();
        let bucket = state.analytics.get(short_code).unwrap_or(&empty);

        Some(AnalyticsSummary {
            short_code: record.short_code.clone(),
            original_url: record.original_url.clone(),
            created_at: record.created_at,
            last_accessed_at: record.last_accessed_at,
            total_clicks: record.click_count,
            recent_clicks: bucket.clicks_within(now, Duration::hours(1)),
            daily_clicks: bucket.clicks_on_day(now),
            hourly_counts: bucket.hourly_counts.clone(),
            daily_counts: bucket.daily_counts.clone(),
            history: bucket.history.iter().cloned().collect(),
            security: bucket.assess(),
        })
    }

    /// 按创建时间倒序
    pub fn get_all_urls(&self) -> Vec<UrlSummary> {
        let state = self.state.lock();
        let mut records: Vec<&ShortUrlRecord> = state.urls.values().collect();
        records.sort_by(|a, b| b.age_key().cmp(&a.age_key()));
        records.into_iter().map(UrlSummary::from).collect()
    }

    pub fn get_system_stats(&self) -> SystemStats {
        self.get_system_stats_at(Utc::now())
    }

    pub fn get_system_stats_at(&self, now: DateTime<Utc>) -> SystemStats {
        let state = self.state.lock();
        let day_ago = now - Duration::hours(24);

        let mut stats = SystemStats {
            total_urls: state.urls.len(),
            ..SystemStats::default()
        };
        for record in state.urls.values() {
            stats.total_clicks += record.click_count;
            if record.created_at > day_ago {
                stats.recent_urls += 1;
            }
        }
        stats.recent_clicks = state
            .analytics
            .values()
            .map(|bucket| bucket.clicks_within(now, Duration::hours(24)))
            .sum();
        stats
    }

    /// 手动删除短码（连同反向索引和 bucket）
    pub fn delete_short_url(&self, short_code: &str) -> Result<ShortUrlRecord> {
        let removed = self.state.lock().remove(short_code);
        match removed {
            Some(record) => {
                info!("Deleted short code {}", short_code);
                Ok(record)
            }
            None => Err(LinkkeeperError::not_found(format!(
                "Short code '{}'",
                short_code
            ))),
        }
    }

    /// Consistent copy of the whole index, ordered oldest first.
    pub fn export_data(&self) -> Snapshot {
        let state = self.state.lock();
        let codes = state.codes_oldest_first();

        let urls = codes
            .iter()
            .filter_map(|code| state.urls.get(code).map(|r| (code.clone(), r.clone())))
            .collect();
        let analytics = codes
            .iter()
            .filter_map(|code| state.analytics.get(code).map(|b| (code.clone(), b.clone())))
            .collect();
        let reverse_index = codes
            .iter()
            .filter_map(|code| state.urls.get(code))
            .map(|r| (r.original_url.clone(), r.short_code.clone()))
            .collect();

        Snapshot::new(urls, analytics, reverse_index)
    }

    /// Replaces the whole index with `snapshot`.
    ///
    /// The reverse index is rebuilt from the records; duplicate URLs keep the
    /// oldest code and buckets without a record are dropped.
    pub fn import_data(&self, snapshot: Snapshot) -> Result<ImportSummary> {
        snapshot.check_version()?;

        let mut records: Vec<ShortUrlRecord> = snapshot
            .urls
            .into_iter()
            .map(|(key, mut record)| {
                if key != record.short_code {
                    warn!(
                        "Snapshot key '{}' differs from record code '{}', using key",
                        key, record.short_code
                    );
                    record.short_code = key;
                }
                record
            })
            .collect();
        records.sort_by(|a, b| a.age_key().cmp(&b.age_key()));

        let mut next = IndexState::default();
        let mut summary = ImportSummary::default();

        for record in records {
            if next.reverse.contains_key(&record.original_url)
                || next.urls.contains_key(&record.short_code)
            {
                warn!(
                    "Dropping duplicate entry {} -> {} from snapshot",
                    record.short_code, record.original_url
                );
                summary.dropped += 1;
                continue;
            }
            next.next_sequence = next.next_sequence.max(record.sequence + 1);
            next.insert(record);
        }

        for (code, mut bucket) in snapshot.analytics {
            match next.analytics.get_mut(&code) {
                Some(slot) => {
                    bucket.sort_history();
                    *slot = bucket;
                    summary.buckets += 1;
                }
                _ => {
                    debug!("Dropping orphan analytics bucket {}", code);
                    summary.dropped += 1;
                }
            }
        }

        let derived: HashMap<&String, &String> = next.reverse.iter().collect();
        let mismatched = snapshot
            .reverse_index
            .iter()
            .filter(|(url, code)| derived.get(url) != Some(&code))
            .count();
        if mismatched > 0 || snapshot.reverse_index.len() != derived.len() {
            warn!(
                "Snapshot reverse index disagrees with records ({} mismatches), rebuilt from records",
                mismatched
            );
        }

        summary.urls = next.urls.len();
        *self.state.lock() = next;

        info!(
            "Imported {} urls and {} analytics buckets ({} dropped)",
            summary.urls, summary.buckets, summary.dropped
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::EnrichedAccessInfo;

    fn click_from(ip: &str) -> EnrichedAccessInfo {
        EnrichedAccessInfo {
            source_address: Some(ip.to_string()),
            client_agent: Some("unit-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_is_idempotent() {
        let index = UrlIndex::default();
        let first = index.create_short_url("https://example.com/a").unwrap();
        let second = index.create_short_url("https://example.com/a").unwrap();

        assert!(!first.existing_url);
        assert!(second.existing_url);
        assert_eq!(first.short_code, second.short_code);
        assert_eq!(first.short_code.len(), 6);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_rejects_bad_urls() {
        let index = UrlIndex::default();
        for url in ["javascript:alert(1)", "", "ftp://x.org", "not a url"] {
            assert!(matches!(
                index.create_short_url(url),
                Err(LinkkeeperError::InvalidUrl(_))
            ));
        }
        assert!(index.is_empty());
    }

    #[test]
    fn test_code_exhausted_is_a_defined_failure() {
        let index = UrlIndex::new(
            ShortenerConfig {
                code_length: 1,
                alphabet: "ab".to_string(),
                max_generation_attempts: 100,
            },
            AnalyticsConfig::default(),
        );
        index.create_short_url("https://one.example").unwrap();
        index.create_short_url("https://two.example").unwrap();

        let err = index.create_short_url("https://three.example").unwrap_err();
        assert!(matches!(err, LinkkeeperError::CodeExhausted(_)));
        assert!(!err.is_client_error());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_record_click_unknown_code_is_noop() {
        let index = UrlIndex::default();
        index.create_short_url("https://example.com").unwrap();
        let before = index.get_system_stats();

        assert!(!index.record_click("doesnotexist", click_from("1.1.1.1")));
        assert_eq!(index.get_system_stats(), before);
    }

    #[test]
    fn test_record_click_updates_record_and_bucket() {
        let index = UrlIndex::default();
        let code = index.create_short_url("https://example.com").unwrap().short_code;

        assert!(index.record_click(&code, click_from("1.1.1.1")));
        assert!(index.record_click(&code, click_from("2.2.2.2")));

        let record = index.get_original_url(&code).unwrap();
        assert_eq!(record.click_count, 2);
        assert!(record.last_accessed_at.is_some());

        let analytics = index.get_analytics(&code).unwrap();
        assert_eq!(analytics.history.len(), 2);
        assert_eq!(analytics.security.unique_ips, 2);
    }

    #[test]
    fn test_delete_removes_all_three_entries() {
        let index = UrlIndex::default();
        let code = index.create_short_url("https://example.com/x").unwrap().short_code;

        index.delete_short_url(&code).unwrap();
        assert!(index.lookup_code("https://example.com/x").is_none());
        assert!(index.get_analytics(&code).is_none());
        index.with_state(|s| assert!(s.analytics.is_empty() && s.reverse.is_empty()));
        assert!(matches!(
            index.delete_short_url(&code),
            Err(LinkkeeperError::NotFound(_))
        ));
    }

    #[test]
    fn test_codes_oldest_first_uses_sequence_for_ties() {
        let index = UrlIndex::default();
        let a = index.create_short_url("https://a.example").unwrap().short_code;
        let b = index.create_short_url("https://b.example").unwrap().short_code;
        let c = index.create_short_url("https://c.example").unwrap().short_code;

        // 强制 created_at 相同
        index.with_state(|s| {
            let at = Utc::now();
            for record in s.urls.values_mut() {
                record.created_at = at;
            }
        });
        assert_eq!(index.with_state(|s| s.codes_oldest_first()), vec![a, b, c]);
    }
}
