//! services/tutor/src/app.rs
//!
//! Wires the core controllers to concrete adapters and turns shell commands
//! into controller calls and printable lines.

use std::sync::Arc;

use tracing::info;
use tutor_core::chat::TutorChat;
use tutor_core::daily::DailyRecommendations;
use tutor_core::domain::{Lesson, ProfileDefaults, RecommendedArticle, SignUpOutcome, ViewState};
use tutor_core::history;
use tutor_core::navigation::{NavigationController, SessionStatus};
use tutor_core::ports::{AuthService, Clock, ContentStore, KeyValueStore, LanguageModel};
use tutor_core::reading_coach::{QuizStep, QuizSummary, ReadingCoach};
use tutor_core::recommended::RecommendedContentCache;
use tutor_core::writing_coach::{ActivePhase, PhaseState, WritingCoach};

use crate::command::{Command, HELP};
use crate::config::Config;
use crate::error::AppError;

pub const CONFIRMATION_MESSAGE: &str =
    "Sign up successful! Please check your email to confirm your account.";
pub const ESSAY_SAVED_MESSAGE: &str = "Essay and analysis saved successfully!";
pub const EMAIL_CONFIRMED_MESSAGE: &str = "Email confirmed. You are now signed in.";

/// What the shell should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Lines(Vec<String>),
    Quit,
}

pub struct App {
    auth: Arc<dyn AuthService>,
    store: Arc<dyn ContentStore>,
    model: Arc<dyn LanguageModel>,
    nav: NavigationController,
    writing: WritingCoach,
    reading: ReadingCoach,
    recommended: RecommendedContentCache,
    daily: DailyRecommendations,
    chat: Option<TutorChat>,
    feed: Vec<RecommendedArticle>,
    level: String,
}

impl App {
    pub fn new(
        config: &Config,
        auth: Arc<dyn AuthService>,
        store: Arc<dyn ContentStore>,
        model: Arc<dyn LanguageModel>,
        local: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let nav = NavigationController::new(local.clone(), auth.subscribe(), config.auth_settle_timeout);
        let recommended = RecommendedContentCache::new(
            store.clone(),
            local.clone(),
            clock.clone(),
            config.recommended_limit,
            config.recommended_delivery,
        );
        Self {
            auth,
            store,
            model,
            nav,
            writing: WritingCoach::new(),
            reading: ReadingCoach::new(local.clone(), config.lesson_level.clone()),
            recommended,
            daily: DailyRecommendations::new(local, clock),
            chat: None,
            feed: Vec::new(),
            level: config.lesson_level.clone(),
        }
    }

    /// Resolves the startup session and leaves the loading view.
    pub async fn start(&mut self) -> ViewState {
        self.nav.start(self.auth.as_ref()).await;
        info!("Starting on {}.", self.nav.current_view());
        self.nav.current_view()
    }

    pub fn current_view(&self) -> ViewState {
        self.nav.current_view()
    }

    pub async fn handle(&mut self, command: Command) -> Result<Reply, AppError> {
        self.nav.sync_session();

        if let Some(screen) = command.screen() {
            if let Some(refused) = self.enter(screen) {
                return Ok(Reply::Lines(refused));
            }
        }

        let lines = match command {
            Command::Quit => return Ok(Reply::Quit),
            Command::Help => HELP.lines().map(str::to_string).collect(),
            Command::Status => self.status(),

            // --- Navigation & auth ---
            Command::Go(view) => {
                if view == ViewState::Chat {
                    self.chat = Some(TutorChat::new(self.nav.active_session()));
                }
                self.nav.navigate(view);
                let mut lines = self.status();
                if self.nav.current_view() == ViewState::Chat {
                    lines.extend(self.chat.iter().flat_map(|chat| render_chat(chat)));
                }
                lines
            }
            Command::Back => {
                self.nav.navigate_back();
                self.status()
            }
            Command::SignIn { email, password } => {
                let session = self.auth.sign_in(&email, &password).await?;
                self.nav.on_auth_success().await;
                vec![format!("Signed in as {}.", session.email), self.view_line()]
            }
            Command::SignUp { email, password } => {
                let profile = ProfileDefaults::for_email(&email);
                match self.auth.sign_up(&email, &password, &profile).await? {
                    SignUpOutcome::ConfirmationPending => vec![CONFIRMATION_MESSAGE.to_string()],
                    SignUpOutcome::SignedIn(session) => {
                        self.nav.on_auth_success().await;
                        vec![format!("Welcome, {}!", session.display_name()), self.view_line()]
                    }
                }
            }
            Command::Confirm(token) => {
                match self.nav.on_auth_callback(self.auth.as_ref(), &token).await {
                    Ok(()) => vec![EMAIL_CONFIRMED_MESSAGE.to_string(), self.view_line()],
                    Err(e) => vec![format!("Could not confirm your email: {}", e), self.view_line()],
                }
            }
            Command::SignOut => {
                self.auth.sign_out().await?;
                self.nav.sync_session();
                self.chat = None;
                vec!["Signed out.".to_string(), self.view_line()]
            }

            // --- Writing coach ---
            Command::Draft(text) => {
                self.writing.set_draft(text);
                vec![format!("Draft updated ({} words).", self.writing.draft().split_whitespace().count())]
            }
            Command::LoadDraft(path) => {
                self.writing.load_draft_file(&path).await?;
                vec![format!("Loaded {}.", path.display())]
            }
            Command::Done => vec![self.writing.mark_input_complete()?.to_string()],
            Command::Run(phase) => render_phase(self.writing.run_phase(self.model.as_ref(), phase).await?),
            Command::Clear => {
                self.writing.clear_display();
                Vec::new()
            }
            Command::Save => {
                self.writing
                    .save(self.nav.active_session(), self.store.as_ref())
                    .await?;
                vec![ESSAY_SAVED_MESSAGE.to_string()]
            }

            // --- Reading coach ---
            Command::Lesson => {
                self.reading.load_or_generate(self.model.as_ref()).await;
                self.render_lesson()
            }
            Command::NewLesson(topic) => {
                self.reading
                    .generate_new(self.model.as_ref(), topic.as_deref())
                    .await;
                self.render_lesson()
            }
            Command::Answer(option) => {
                if self.reading.select_answer(option) {
                    self.render_question()
                } else {
                    vec![format!("Option {} is not available.", option)]
                }
            }
            Command::Next => {
                let step = self
                    .reading
                    .next(self.nav.active_session(), self.store.as_ref())
                    .await;
                match step {
                    Some(QuizStep::Advanced(_)) => self.render_question(),
                    Some(QuizStep::Submitted(summary)) => {
                        self.nav.navigate(ViewState::QuizAnalysis);
                        self.render_results(summary)
                    }
                    None => vec!["No lesson loaded. Type 'lesson'.".to_string()],
                }
            }
            Command::Previous => {
                self.reading.previous();
                self.render_question()
            }
            Command::Results => match self.reading.summary() {
                Some(summary) => {
                    self.nav.navigate(ViewState::QuizAnalysis);
                    self.render_results(summary)
                }
                None => vec!["No lesson loaded. Type 'lesson'.".to_string()],
            },

            // --- Recommended content ---
            Command::Recommended { refresh } => {
                if refresh {
                    self.recommended.invalidate();
                }
                let entry = self.recommended.get().await?;
                self.feed = entry.items().cloned().collect();
                self.nav.navigate(ViewState::RecommendedContent);
                render_feed(&self.feed)
            }
            Command::Open(n) => match n.checked_sub(1).and_then(|i| self.feed.get(i)) {
                Some(item) => {
                    let article = item.to_article();
                    self.nav.open_article(article);
                    self.render_article()
                }
                None => vec![format!("No recommended item {}.", n)],
            },
            Command::Daily => {
                let items = self.daily.get(self.model.as_ref(), &self.level).await;
                if items.is_empty() {
                    vec!["No suggestions today.".to_string()]
                } else {
                    items
                        .iter()
                        .map(|item| format!("[{}] {} ({}, {})", item.kind, item.title, item.level, item.read_time))
                        .collect()
                }
            }

            // --- Chat ---
            Command::Chat(text) => {
                let session = self.nav.active_session();
                let chat = self.chat.get_or_insert_with(|| TutorChat::new(session));
                match chat.send(self.model.as_ref(), &text).await {
                    Some(reply) => vec![format!("tutor> {}", reply.content)],
                    None => Vec::new(),
                }
            }

            // --- History ---
            Command::History => {
                let entries = history::quiz_history(self.nav.active_session(), self.store.as_ref()).await?;
                self.nav.navigate(ViewState::History);
                if entries.is_empty() {
                    vec!["No quizzes yet.".to_string()]
                } else {
                    entries
                        .iter()
                        .map(|entry| {
                            format!(
                                "{}  {}/{}  {} [{}]",
                                entry.created_at.format("%Y-%m-%d"),
                                entry.score,
                                entry.total_questions,
                                entry.article.title,
                                entry.article.level
                            )
                        })
                        .collect()
                }
            }
            Command::Essays => {
                let essays = history::essay_history(self.nav.active_session(), self.store.as_ref()).await?;
                self.nav.navigate(ViewState::WritingHistory);
                if essays.is_empty() {
                    vec!["No saved essays yet.".to_string()]
                } else {
                    essays
                        .iter()
                        .map(|essay| format!("{}  {}", essay.created_at.format("%Y-%m-%d"), excerpt(&essay.content, 60)))
                        .collect()
                }
            }
        };
        Ok(Reply::Lines(lines))
    }

    /// Switches to the screen a command works on. Returns the lines to print
    /// instead when that screen needs a sign-in first.
    fn enter(&mut self, screen: ViewState) -> Option<Vec<String>> {
        self.nav.navigate(screen);
        if self.nav.current_view() == screen {
            return None;
        }
        let mut lines = vec![format!("Sign in to use {}.", screen)];
        lines.extend(self.status());
        Some(lines)
    }

    //=====================================================================================
    // Rendering
    //=====================================================================================

    fn view_line(&self) -> String {
        format!("[{}]", self.nav.current_view())
    }

    fn status(&self) -> Vec<String> {
        let session = match self.nav.session() {
            SessionStatus::Unknown => "unknown".to_string(),
            SessionStatus::Absent => "signed out".to_string(),
            SessionStatus::Present(session) => format!("signed in as {}", session.email),
        };
        let mut lines = vec![
            self.view_line(),
            format!("session: {}", session),
        ];
        if let Some(pending) = self.nav.pending_redirect() {
            lines.push(format!("after sign-in: {}", pending));
        }
        if self.nav.shows_bottom_nav() {
            lines.push("home | recommended-feed | recommended-content".to_string());
        }
        lines
    }

    fn render_lesson(&self) -> Vec<String> {
        let Some(lesson) = self.reading.lesson() else {
            return vec!["No lesson loaded.".to_string()];
        };
        let mut lines = render_article_body(lesson);
        lines.extend(self.render_question());
        lines
    }

    fn render_question(&self) -> Vec<String> {
        let Some(question) = self.reading.current_question() else {
            return Vec::new();
        };
        let total = self.reading.lesson().map_or(0, |lesson| lesson.questions.len());
        let selected = self.reading.selected_answer();
        let mut lines = vec![format!(
            "Question {}/{}: {}",
            self.reading.current_index() + 1,
            total,
            question.text
        )];
        lines.extend(question.options.iter().map(|option| {
            let marker = if selected == Some(option.id) { "*" } else { " " };
            format!(" {} {}) {} [{}]", marker, option.label, option.text, option.id)
        }));
        lines
    }

    fn render_results(&self, summary: QuizSummary) -> Vec<String> {
        let mut lines = vec![format!(
            "Score: {}/{} ({}%)",
            summary.correct,
            summary.total,
            summary.percentage()
        )];
        if let Some(lesson) = self.reading.lesson() {
            let answers = self.reading.answers();
            for (index, question) in lesson.questions.iter().enumerate() {
                let verdict = if answers.get(&index) == Some(&question.correct_id) {
                    "correct"
                } else {
                    "wrong"
                };
                lines.push(format!("{}. {} ({}): {}", index + 1, question.text, verdict, question.explanation));
            }
        }
        lines
    }

    fn render_article(&self) -> Vec<String> {
        let Some(article) = self.nav.selected_article() else {
            return Vec::new();
        };
        let mut lines = vec![self.view_line(), article.title.clone()];
        if let Some(snippet) = article.snippet.as_ref().filter(|s| !s.is_empty()) {
            lines.push(snippet.clone());
        }
        if let Some(url) = &article.url {
            lines.push(url.clone());
        }
        lines
    }
}

fn render_article_body(lesson: &Lesson) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", lesson.article.title, lesson.article.read_time)];
    lines.extend(lesson.article.content.iter().cloned());
    lines
}

fn render_phase(active: &ActivePhase) -> Vec<String> {
    let body = match &active.state {
        PhaseState::Loading => "Analyzing...".to_string(),
        PhaseState::Ready(text) => text.clone(),
        PhaseState::Failed(message) => message.to_string(),
    };
    vec![format!("== {} ==", active.phase.title()), body]
}

fn render_chat(chat: &TutorChat) -> Vec<String> {
    chat.turns()
        .iter()
        .map(|turn| format!("tutor> {}", turn.content))
        .collect()
}

fn render_feed(items: &[RecommendedArticle]) -> Vec<String> {
    if items.is_empty() {
        return vec!["No recommended content available.".to_string()];
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. [{}] {} ({})", i + 1, item.category.as_str(), item.title, item.source))
        .collect()
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
