//! Per-user conversation sessions, kept in memory only.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sitepulse_core::config::SessionConfig;
use sitepulse_core::types::ChatEntry;
use sitepulse_scanner::ScanReport;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    /// Channel of the most recent message.
    pub channel_id: Option<String>,
    pub current_url: Option<String>,
    pub last_analysis: Option<ScanReport>,
    /// Advisor summary of the last analysis.
    pub last_report: Option<String>,
    pub history: VecDeque<ChatEntry>,
    pub last_activity: DateTime<Utc>,
    pub analysis_count: u32,
}

impl UserSession {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            channel_id: None,
            current_url: None,
            last_analysis: None,
            last_report: None,
            history: VecDeque::new(),
            last_activity: now,
            analysis_count: 0,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }

    /// A report counts only while the session has not expired.
    pub fn has_active_report_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.last_report.is_some() && !self.is_expired_at(now, ttl)
    }

    /// Append to history, evicting the oldest entries beyond `limit`.
    pub fn push_history(&mut self, entry: ChatEntry, limit: usize) {
        self.history.push_back(entry);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    pub fn record_analysis(&mut self, url: &str, report: ScanReport, summary: String) {
        self.current_url = Some(url.to_string());
        self.last_analysis = Some(report);
        self.last_report = Some(summary);
        self.analysis_count += 1;
    }

    fn forget_analysis(&mut self) {
        self.current_url = None;
        self.last_analysis = None;
        self.last_report = None;
    }
}

/// Sessions keyed by user id. Created lazily, never removed.
pub struct SessionStore {
    sessions: DashMap<String, UserSession>,
    ttl: Duration,
    history_limit: usize,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::minutes(config.ttl_minutes),
            history_limit: config.history_limit,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, user_id: &str) -> Option<UserSession> {
        self.sessions.get(user_id).map(|s| s.value().clone())
    }

    pub fn has_active_report(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        self.sessions
            .get(user_id)
            .is_some_and(|s| s.has_active_report_at(now, self.ttl))
    }

    /// Record activity at `now`, creating the session if needed. A session
    /// that had expired loses its analysis state first.
    pub fn touch(&self, user_id: &str, channel_id: &str, now: DateTime<Utc>) {
        let mut session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| UserSession::new(user_id, now));
        if session.is_expired_at(now, self.ttl) && session.last_report.is_some() {
            tracing::debug!("⌛ Session for {user_id} expired, dropping last report");
            session.forget_analysis();
        }
        session.last_activity = now;
        session.channel_id = Some(channel_id.to_string());
    }

    /// Apply `f` to the user's session, creating it if needed.
    pub fn update<R>(&self, user_id: &str, f: impl FnOnce(&mut UserSession) -> R) -> R {
        let mut session = self
            .sessions
            .entry(user_id.to_string())
            .or_insert_with(|| UserSession::new(user_id, Utc::now()));
        f(&mut session)
    }

    pub fn push_history(&self, user_id: &str, entry: ChatEntry) {
        let limit = self.history_limit;
        self.update(user_id, |s| s.push_history(entry, limit));
    }

    /// History snapshot, oldest first.
    pub fn history(&self, user_id: &str) -> Vec<ChatEntry> {
        self.sessions
            .get(user_id)
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sitepulse_scanner::{LinkSummary, MetaReport};
    use sitepulse_core::types::ParsedPage;

    fn store() -> SessionStore {
        SessionStore::new(&SessionConfig::default())
    }

    fn report() -> ScanReport {
        let page = ParsedPage { url: "https://a.com/".into(), status: 200, ..Default::default() };
        ScanReport {
            scan_id: "s1".into(),
            url: "https://a.com/".into(),
            meta: MetaReport::analyze(&page),
            links: LinkSummary::categorize(&page),
            broken: vec![],
            duplicates: vec![],
            link_report: String::new(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_session_expires_after_ttl() {
        let now = Utc::now();
        let mut session = UserSession::new("u1", now - Duration::minutes(31));
        session.record_analysis("https://a.com/", report(), "summary".into());
        assert!(session.is_expired_at(now, Duration::minutes(30)));
        assert!(!session.has_active_report_at(now, Duration::minutes(30)));

        session.last_activity = now - Duration::minutes(29);
        assert!(session.has_active_report_at(now, Duration::minutes(30)));
    }

    #[test]
    fn test_store_gates_report_on_expiry() {
        let store = store();
        let start = Utc::now() - Duration::minutes(31);
        store.touch("u1", "c1", start);
        store.update("u1", |s| s.record_analysis("https://a.com/", report(), "ok".into()));

        let now = Utc::now();
        assert!(!store.has_active_report("u1", now));
        assert!(store.has_active_report("u1", start + Duration::minutes(5)));

        // New activity after expiry does not revive the stale report.
        store.touch("u1", "c1", now);
        assert!(!store.has_active_report("u1", now));
        let session = store.get("u1").unwrap();
        assert!(session.last_report.is_none());
        assert_eq!(session.analysis_count, 1);
    }

    #[test]
    fn test_history_is_capped_oldest_first() {
        let store = store();
        for i in 0..25 {
            store.push_history("u1", ChatEntry::user(&format!("msg {i}")));
        }
        let history = store.history("u1");
        assert_eq!(history.len(), 20);
        assert_eq!(history[0].content, "msg 5");
        assert_eq!(history[19].content, "msg 24");
    }

    #[test]
    fn test_sessions_created_lazily() {
        let store = store();
        assert!(store.is_empty());
        assert!(!store.has_active_report("nobody", Utc::now()));
        assert!(store.is_empty());
        store.touch("u1", "c9", Utc::now());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("u1").unwrap().channel_id.as_deref(), Some("c9"));
    }
}
