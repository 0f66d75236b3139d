//! crates/tutor_core/src/navigation.rs
//!
//! The navigation controller: which screen is current, where the article
//! reader returns to, and where the user goes once they finish signing in.
//!
//! The controller is the single owner of the view and session fields. Session
//! transitions arrive either from the startup probe or from the auth service's
//! watch channel; whichever is applied last wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{Article, Session, ViewState};
use crate::ports::{AuthService, KeyValueStore, PortResult};

/// Local-store key of the post-auth redirect target.
pub const PENDING_REDIRECT_KEY: &str = "pending_redirect";

/// What the controller currently knows about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Unknown,
    Absent,
    Present(Session),
}

pub struct NavigationController {
    current_view: ViewState,
    previous_view: ViewState,
    session: SessionStatus,
    pending_redirect: Option<ViewState>,
    selected_article: Option<Article>,
    scroll_offset: u32,
    store: Arc<dyn KeyValueStore>,
    sessions: watch::Receiver<Option<Session>>,
    settle_timeout: Duration,
}

impl NavigationController {
    /// Creates a controller in the loading view, restoring any redirect
    /// persisted before a reload.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        sessions: watch::Receiver<Option<Session>>,
        settle_timeout: Duration,
    ) -> Self {
        let pending_redirect = store
            .get::<ViewState>(PENDING_REDIRECT_KEY)
            .unwrap_or_else(|e| {
                warn!("Could not read pending redirect: {}", e);
                None
            });

        Self {
            current_view: ViewState::Loading,
            previous_view: ViewState::Home,
            session: SessionStatus::Unknown,
            pending_redirect,
            selected_article: None,
            scroll_offset: 0,
            store,
            sessions,
            settle_timeout,
        }
    }

    //=====================================================================================
    // Session Transitions
    //=====================================================================================

    /// Runs the one-time startup probe. A failed probe counts as signed out.
    pub async fn start(&mut self, auth: &dyn AuthService) {
        let session = match auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Startup session check failed, treating as signed out: {}", e);
                None
            }
        };
        self.on_session_changed(session);
    }

    /// Applies a session notification from the auth service.
    pub fn on_session_changed(&mut self, session: Option<Session>) {
        let was_unknown = self.session == SessionStatus::Unknown;
        self.session = match session {
            Some(session) => SessionStatus::Present(session),
            None => SessionStatus::Absent,
        };
        debug!("Session is now {}", if self.has_session() { "present" } else { "absent" });

        if was_unknown {
            let landing = if self.has_session() {
                ViewState::Home
            } else {
                ViewState::Auth
            };
            self.navigate(landing);
            return;
        }

        if !self.has_session() && self.current_view.is_gated() {
            let gated = self.current_view;
            info!("Session ended while on {}, returning to sign-in.", gated);
            self.navigate(gated);
        }
    }

    /// Applies the newest value from the session channel, if it has not been seen yet.
    pub fn sync_session(&mut self) -> bool {
        if !self.sessions.has_changed().unwrap_or(false) {
            return false;
        }
        let latest = self.sessions.borrow_and_update().clone();
        self.on_session_changed(latest);
        true
    }

    /// Called by the auth view once sign-in or sign-up has completed.
    ///
    /// Waits until the session notification has been observed (bounded by the
    /// settle timeout), then consumes the pending redirect or goes home.
    pub async fn on_auth_success(&mut self) {
        match tokio::time::timeout(
            self.settle_timeout,
            self.sessions.wait_for(|session| session.is_some()),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => warn!("Session channel closed before sign-in was observed."),
            Err(_) => warn!(
                "No session observed within {:?} of sign-in.",
                self.settle_timeout
            ),
        }

        let latest = self.sessions.borrow_and_update().clone();
        self.on_session_changed(latest);

        match self.take_pending_redirect() {
            Some(target) => {
                info!("Resuming navigation to {} after sign-in.", target);
                self.navigate(target);
            }
            None => self.navigate(ViewState::Home),
        }
    }

    /// Handles an email-confirmation link. A confirmed account lands on home;
    /// a rejected link returns to the sign-in view.
    pub async fn on_auth_callback(&mut self, auth: &dyn AuthService, token: &str) -> PortResult<()> {
        self.navigate(ViewState::AuthCallback);
        match auth.confirm_email(token).await {
            Ok(session) => {
                self.sync_session();
                if !self.has_session() {
                    self.on_session_changed(Some(session));
                }
                info!("Email confirmed, continuing to home.");
                self.navigate(ViewState::Home);
                Ok(())
            }
            Err(e) => {
                warn!("Email confirmation failed: {}", e);
                self.navigate(ViewState::Auth);
                Err(e)
            }
        }
    }

    //=====================================================================================
    // Navigation
    //=====================================================================================

    pub fn navigate(&mut self, target: ViewState) {
        let mut target = target;
        if target.is_gated() && !self.has_session() {
            info!("{} requires sign-in; redirecting to auth.", target);
            self.set_pending_redirect(Some(target));
            target = ViewState::Auth;
        }

        if target == ViewState::ArticleReader && self.current_view != ViewState::ArticleReader {
            self.previous_view = self.current_view;
        }

        self.current_view = target;
        self.scroll_offset = 0;
    }

    /// Leaves the article reader for the screen that opened it.
    pub fn navigate_back(&mut self) {
        let target = if self.current_view == ViewState::ArticleReader {
            self.previous_view
        } else {
            ViewState::Home
        };
        self.navigate(target);
    }

    pub fn open_article(&mut self, article: Article) {
        self.selected_article = Some(article);
        self.navigate(ViewState::ArticleReader);
    }

    fn set_pending_redirect(&mut self, target: Option<ViewState>) {
        self.pending_redirect = target;
        let persisted = match target {
            Some(view) => self.store.set(PENDING_REDIRECT_KEY, &view),
            None => self.store.remove(PENDING_REDIRECT_KEY),
        };
        if let Err(e) = persisted {
            warn!("Could not persist pending redirect: {}", e);
        }
    }

    fn take_pending_redirect(&mut self) -> Option<ViewState> {
        let target = self.pending_redirect;
        if target.is_some() {
            self.set_pending_redirect(None);
        }
        target
    }

    //=====================================================================================
    // Accessors
    //=====================================================================================

    pub fn current_view(&self) -> ViewState {
        self.current_view
    }

    pub fn previous_view(&self) -> ViewState {
        self.previous_view
    }

    pub fn pending_redirect(&self) -> Option<ViewState> {
        self.pending_redirect
    }

    pub fn session(&self) -> &SessionStatus {
        &self.session
    }

    pub fn active_session(&self) -> Option<&Session> {
        match &self.session {
            SessionStatus::Present(session) => Some(session),
            _ => None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.active_session().is_some()
    }

    pub fn shows_bottom_nav(&self) -> bool {
        self.current_view.shows_bottom_nav()
    }

    pub fn selected_article(&self) -> Option<&Article> {
        self.selected_article.as_ref()
    }

    pub fn scroll_offset(&self) -> u32 {
        self.scroll_offset
    }

    pub fn set_scroll_offset(&mut self, offset: u32) {
        self.scroll_offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProfileDefaults;
    use crate::memory::MemoryStore;
    use crate::ports::PortError;
    use crate::testing::{session, FakeAuth};

    const SETTLE: Duration = Duration::from_millis(500);

    fn controller(auth: &FakeAuth, store: Arc<dyn KeyValueStore>) -> NavigationController {
        NavigationController::new(store, auth.subscribe(), SETTLE)
    }

    async fn signed_in(auth: &FakeAuth) -> NavigationController {
        let mut nav = controller(auth, Arc::new(MemoryStore::new()));
        nav.on_session_changed(Some(session("ana@example.com")));
        nav
    }

    #[tokio::test]
    async fn startup_without_session_lands_on_auth() {
        let auth = FakeAuth::new();
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));
        assert_eq!(nav.current_view(), ViewState::Loading);

        nav.start(&auth).await;

        assert_eq!(nav.current_view(), ViewState::Auth);
        assert_eq!(nav.session(), &SessionStatus::Absent);
    }

    #[tokio::test]
    async fn startup_with_session_lands_on_home() {
        let auth = FakeAuth::with_probe(Ok(Some(session("ana@example.com"))));
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));

        nav.start(&auth).await;

        assert_eq!(nav.current_view(), ViewState::Home);
        assert!(nav.has_session());
    }

    #[tokio::test]
    async fn failed_startup_probe_is_treated_as_signed_out() {
        let auth = FakeAuth::with_probe(Err(PortError::Unexpected("offline".to_string())));
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));

        nav.start(&auth).await;

        assert_eq!(nav.current_view(), ViewState::Auth);
    }

    #[tokio::test]
    async fn notification_before_probe_is_overwritten_by_probe() {
        let auth = FakeAuth::with_probe(Ok(None));
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));

        auth.notify(Some(session("ana@example.com")));
        assert!(nav.sync_session());
        assert_eq!(nav.current_view(), ViewState::Home);

        nav.start(&auth).await;
        assert_eq!(nav.session(), &SessionStatus::Absent);
        assert_eq!(nav.current_view(), ViewState::Home);
        assert!(!nav.sync_session());
    }

    #[tokio::test]
    async fn bottom_nav_is_visible_only_on_feed_views() {
        let auth = FakeAuth::new();
        let mut nav = signed_in(&auth).await;

        for view in ViewState::ALL.into_iter().chain(ViewState::ALL.into_iter().rev()) {
            nav.navigate(view);
            let expected = matches!(
                nav.current_view(),
                ViewState::Home | ViewState::RecommendedFeed | ViewState::RecommendedContent
            );
            assert_eq!(nav.shows_bottom_nav(), expected, "after navigating to {}", view);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gated_view_without_session_redirects_and_resumes_after_sign_in() {
        let auth = FakeAuth::new();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut nav = controller(&auth, store.clone());
        nav.start(&auth).await;

        nav.navigate(ViewState::WritingCoach);
        assert_eq!(nav.current_view(), ViewState::Auth);
        assert_eq!(nav.pending_redirect(), Some(ViewState::WritingCoach));
        assert_eq!(
            store.get::<ViewState>(PENDING_REDIRECT_KEY).unwrap(),
            Some(ViewState::WritingCoach)
        );

        auth.notify(Some(session("ana@example.com")));
        nav.on_auth_success().await;

        assert_eq!(nav.current_view(), ViewState::WritingCoach);
        assert_eq!(nav.pending_redirect(), None);
        assert_eq!(store.get::<ViewState>(PENDING_REDIRECT_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_success_waits_for_late_session_notification() {
        let auth = Arc::new(FakeAuth::new());
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));
        nav.start(auth.as_ref()).await;
        nav.navigate(ViewState::ReadingCoach);

        let notifier = auth.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            notifier.notify(Some(session("ana@example.com")));
        });
        nav.on_auth_success().await;

        assert!(nav.has_session());
        assert_eq!(nav.current_view(), ViewState::ReadingCoach);
        assert_eq!(nav.pending_redirect(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_success_without_session_never_renders_gated_view() {
        let auth = FakeAuth::new();
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));
        nav.start(&auth).await;
        nav.navigate(ViewState::WritingCoach);

        nav.on_auth_success().await;

        assert_eq!(nav.current_view(), ViewState::Auth);
        assert_eq!(nav.pending_redirect(), Some(ViewState::WritingCoach));
    }

    #[tokio::test(start_paused = true)]
    async fn auth_success_without_redirect_goes_home() {
        let auth = FakeAuth::new();
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));
        nav.start(&auth).await;

        auth.notify(Some(session("ana@example.com")));
        nav.on_auth_success().await;

        assert_eq!(nav.current_view(), ViewState::Home);
    }

    #[tokio::test]
    async fn confirmation_link_signs_in_and_goes_home() {
        let auth = FakeAuth::new();
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));
        nav.start(&auth).await;
        auth.sign_up("ana@example.com", "hunter22", &ProfileDefaults::for_email("ana@example.com"))
            .await
            .unwrap();

        nav.on_auth_callback(&auth, "confirm-ana@example.com").await.unwrap();

        assert_eq!(nav.current_view(), ViewState::Home);
        assert_eq!(nav.active_session().map(|s| s.email.as_str()), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn rejected_confirmation_link_returns_to_auth() {
        let auth = FakeAuth::new();
        let mut nav = controller(&auth, Arc::new(MemoryStore::new()));
        nav.start(&auth).await;

        let result = nav.on_auth_callback(&auth, "stale-token").await;

        assert!(matches!(result, Err(PortError::Unauthorized(_))));
        assert_eq!(nav.current_view(), ViewState::Auth);
        assert!(!nav.has_session());
    }

    #[tokio::test]
    async fn pending_redirect_survives_reload() {
        let auth = FakeAuth::new();
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut first = controller(&auth, store.clone());
        first.start(&auth).await;
        first.navigate(ViewState::ReadingCoach);

        let reloaded = controller(&auth, store);
        assert_eq!(reloaded.pending_redirect(), Some(ViewState::ReadingCoach));
    }

    #[tokio::test]
    async fn reader_opened_from_reader_keeps_original_previous_view() {
        let auth = FakeAuth::new();
        let mut nav = signed_in(&auth).await;
        nav.navigate(ViewState::History);

        nav.navigate(ViewState::ArticleReader);
        nav.navigate(ViewState::ArticleReader);

        assert_eq!(nav.previous_view(), ViewState::History);
        nav.navigate_back();
        assert_eq!(nav.current_view(), ViewState::History);
    }

    #[tokio::test]
    async fn open_article_remembers_selection() {
        let auth = FakeAuth::new();
        let mut nav = signed_in(&auth).await;
        nav.navigate(ViewState::RecommendedContent);
        let article = Article {
            id: "a1".to_string(),
            title: "Tides".to_string(),
            read_time: "3 MIN READ".to_string(),
            category: None,
            url: None,
            image_url: None,
            level: None,
            kind: "article".to_string(),
            snippet: None,
            content: vec!["Water moves.".to_string()],
        };

        nav.open_article(article.clone());

        assert_eq!(nav.current_view(), ViewState::ArticleReader);
        assert_eq!(nav.selected_article(), Some(&article));
        assert_eq!(nav.previous_view(), ViewState::RecommendedContent);
    }

    #[tokio::test]
    async fn sign_out_on_gated_view_returns_to_auth() {
        let auth = FakeAuth::new();
        let mut nav = signed_in(&auth).await;
        nav.navigate(ViewState::WritingCoach);
        assert_eq!(nav.current_view(), ViewState::WritingCoach);

        nav.on_session_changed(None);

        assert_eq!(nav.current_view(), ViewState::Auth);
        assert_eq!(nav.pending_redirect(), Some(ViewState::WritingCoach));
    }

    #[tokio::test]
    async fn navigation_resets_scroll() {
        let auth = FakeAuth::new();
        let mut nav = signed_in(&auth).await;
        nav.set_scroll_offset(640);

        nav.navigate(ViewState::Chat);

        assert_eq!(nav.scroll_offset(), 0);
    }
}
