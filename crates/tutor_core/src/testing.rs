//! In-memory fakes of the ports, shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::{
    Article, ChatTurn, ContentCategory, Essay, NewEssay, ProfileDefaults, QuizAttempt,
    QuizHistoryEntry, RecommendedArticle, Session, SignUpOutcome,
};
use crate::ports::{
    AuthService, Clock, ContentStore, DeliveryFilter, LanguageModel, PortError, PortResult,
};

pub fn session(email: &str) -> Session {
    Session {
        user_id: Uuid::new_v4(),
        email: email.to_string(),
        access_token: Uuid::new_v4().to_string(),
        expires_at: Utc::now() + Duration::days(30),
    }
}

//=========================================================================================
// Auth
//=========================================================================================

pub struct FakeAuth {
    pub sender: watch::Sender<Option<Session>>,
    pub probe: Mutex<Option<PortResult<Option<Session>>>>,
    /// Token and email of the one sign-up awaiting confirmation.
    pub pending_confirmation: Mutex<Option<(String, String)>>,
}

impl FakeAuth {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender,
            probe: Mutex::new(Some(Ok(None))),
            pending_confirmation: Mutex::new(None),
        }
    }

    pub fn with_probe(result: PortResult<Option<Session>>) -> Self {
        let auth = Self::new();
        *auth.probe.lock().unwrap() = Some(result);
        auth
    }

    pub fn notify(&self, session: Option<Session>) {
        self.sender.send_replace(session);
    }
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn current_session(&self) -> PortResult<Option<Session>> {
        self.probe.lock().unwrap().take().unwrap_or(Ok(None))
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }

    async fn sign_in(&self, email: &str, _password: &str) -> PortResult<Session> {
        let session = session(email);
        self.notify(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _profile: &ProfileDefaults,
    ) -> PortResult<SignUpOutcome> {
        *self.pending_confirmation.lock().unwrap() =
            Some((format!("confirm-{}", email), email.to_string()));
        Ok(SignUpOutcome::ConfirmationPending)
    }

    async fn confirm_email(&self, token: &str) -> PortResult<Session> {
        let mut pending = self.pending_confirmation.lock().unwrap();
        match pending.take() {
            Some((expected, email)) if expected == token => {
                let session = session(&email);
                self.notify(Some(session.clone()));
                Ok(session)
            }
            other => {
                *pending = other;
                Err(PortError::Unauthorized("Invalid or expired confirmation link".to_string()))
            }
        }
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.notify(None);
        Ok(())
    }
}

//=========================================================================================
// Language Model
//=========================================================================================

/// Replies from a script, falling back to echoing a canned answer.
#[derive(Default)]
pub struct FakeModel {
    pub replies: Mutex<VecDeque<PortResult<String>>>,
    pub calls: Mutex<Vec<(String, Vec<ChatTurn>)>>,
}

impl FakeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, error: PortError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> String {
        let calls = self.calls.lock().unwrap();
        calls
            .last()
            .and_then(|(_, turns)| turns.last())
            .map(|turn| turn.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, system_prompt: &str, turns: &[ChatTurn]) -> PortResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), turns.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("analysis #{}", self.call_count())))
    }
}

//=========================================================================================
// Content Store
//=========================================================================================

#[derive(Default)]
pub struct FakeContentStore {
    pub articles: Mutex<Vec<(Article, String)>>,
    pub attempts: Mutex<Vec<QuizAttempt>>,
    pub essays: Mutex<Vec<NewEssay>>,
    pub recommended: Mutex<Vec<RecommendedArticle>>,
    pub fetch_calls: Mutex<Vec<(ContentCategory, DeliveryFilter)>>,
    pub marked: Mutex<Vec<Uuid>>,
    pub fail_category: Mutex<Option<ContentCategory>>,
    pub fail_mark: Mutex<Option<Uuid>>,
    pub fail_writes: Mutex<bool>,
    pub write_calls: AtomicUsize,
}

impl FakeContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recommended(items: Vec<RecommendedArticle>) -> Self {
        let store = Self::default();
        *store.recommended.lock().unwrap() = items;
        store
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn write(&self) -> PortResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_writes.lock().unwrap() {
            return Err(PortError::Unexpected("insert rejected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for FakeContentStore {
    async fn insert_article(&self, article: &Article, level: &str) -> PortResult<Uuid> {
        self.write()?;
        self.articles
            .lock()
            .unwrap()
            .push((article.clone(), level.to_string()));
        Ok(Uuid::new_v4())
    }

    async fn insert_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        self.write()?;
        self.attempts.lock().unwrap().push(attempt.clone());
        Ok(())
    }

    async fn quiz_history(&self, _user_id: Uuid) -> PortResult<Vec<QuizHistoryEntry>> {
        Ok(Vec::new())
    }

    async fn insert_essay(&self, essay: &NewEssay) -> PortResult<Uuid> {
        self.write()?;
        self.essays.lock().unwrap().push(essay.clone());
        Ok(Uuid::new_v4())
    }

    async fn list_essays(&self, user_id: Uuid) -> PortResult<Vec<Essay>> {
        let essays = self.essays.lock().unwrap();
        Ok(essays
            .iter()
            .rev()
            .filter(|essay| essay.user_id == user_id)
            .map(|essay| Essay {
                id: Uuid::new_v4(),
                user_id: essay.user_id,
                content: essay.content.clone(),
                style_analysis: essay.style_analysis.clone(),
                evaluation: essay.evaluation.clone(),
                improvement: essay.improvement.clone(),
                refinement: essay.refinement.clone(),
                followup: essay.followup.clone(),
                created_at: Utc::now(),
            })
            .collect())
    }

    async fn fetch_recommended(
        &self,
        category: ContentCategory,
        filter: DeliveryFilter,
        limit: u32,
    ) -> PortResult<Vec<RecommendedArticle>> {
        self.fetch_calls.lock().unwrap().push((category, filter));
        if *self.fail_category.lock().unwrap() == Some(category) {
            return Err(PortError::Unexpected(format!("{} query failed", category.as_str())));
        }
        let wanted = filter == DeliveryFilter::Delivered;
        let mut items: Vec<RecommendedArticle> = self
            .recommended
            .lock()
            .unwrap()
            .iter()
            .filter(|item| item.category == category && item.delivered == wanted)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.pulled_at.cmp(&a.pulled_at));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn mark_delivered(&self, id: Uuid) -> PortResult<()> {
        if *self.fail_mark.lock().unwrap() == Some(id) {
            return Err(PortError::Unexpected("update failed".to_string()));
        }
        for item in self.recommended.lock().unwrap().iter_mut() {
            if item.id == id {
                item.delivered = true;
            }
        }
        self.marked.lock().unwrap().push(id);
        Ok(())
    }
}

pub fn recommended(title: &str, category: ContentCategory, delivered: bool) -> RecommendedArticle {
    RecommendedArticle {
        id: Uuid::new_v4(),
        article_id: format!("ext-{}", title.to_lowercase().replace(' ', "-")),
        title: title.to_string(),
        url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        source: "Example".to_string(),
        image_url: String::new(),
        category,
        level: "General".to_string(),
        snippet: String::new(),
        published_at: None,
        pulled_at: Utc::now(),
        delivered,
    }
}

//=========================================================================================
// Clock
//=========================================================================================

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn start() -> Arc<Self> {
        Self::at(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
