//! crates/tutor_core/src/domain.rs
//!
//! Defines the pure, core data structures for the tutor client.
//! Records that travel through the local store or the model carry serde
//! derives; none of them know about the database.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Session & Views
//=========================================================================================

/// An authenticated session issued by the auth service.
///
/// Only the auth adapter creates these; the navigation layer just observes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// The name shown in greetings: the local part of the email address.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or("friend")
    }
}

/// Profile fields written alongside a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDefaults {
    pub name: String,
    pub level: String,
}

impl ProfileDefaults {
    pub fn for_email(email: &str) -> Self {
        Self {
            name: email.split('@').next().unwrap_or_default().to_string(),
            level: "B1 Intermediate".to_string(),
        }
    }
}

/// The outcome of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is active and a session was issued.
    SignedIn(Session),
    /// The account exists but the email address must be confirmed first.
    ConfirmationPending,
}

/// Identifies the screen currently rendered by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewState {
    Auth,
    AuthCallback,
    Loading,
    Home,
    ReadingCoach,
    QuizAnalysis,
    RecommendedFeed,
    RecommendedContent,
    Chat,
    ArticleReader,
    History,
    WritingCoach,
    WritingHistory,
}

impl ViewState {
    pub const ALL: [ViewState; 13] = [
        ViewState::Auth,
        ViewState::AuthCallback,
        ViewState::Loading,
        ViewState::Home,
        ViewState::ReadingCoach,
        ViewState::QuizAnalysis,
        ViewState::RecommendedFeed,
        ViewState::RecommendedContent,
        ViewState::Chat,
        ViewState::ArticleReader,
        ViewState::History,
        ViewState::WritingCoach,
        ViewState::WritingHistory,
    ];

    /// Views that may only be rendered with a session present.
    pub fn is_gated(self) -> bool {
        matches!(self, ViewState::WritingCoach | ViewState::ReadingCoach)
    }

    /// Views that render the fixed bottom navigation bar.
    pub fn shows_bottom_nav(self) -> bool {
        matches!(
            self,
            ViewState::Home | ViewState::RecommendedFeed | ViewState::RecommendedContent
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewState::Auth => "auth",
            ViewState::AuthCallback => "auth-callback",
            ViewState::Loading => "loading",
            ViewState::Home => "home",
            ViewState::ReadingCoach => "reading-coach",
            ViewState::QuizAnalysis => "quiz-analysis",
            ViewState::RecommendedFeed => "recommended-feed",
            ViewState::RecommendedContent => "recommended-content",
            ViewState::Chat => "chat",
            ViewState::ArticleReader => "article-reader",
            ViewState::History => "history",
            ViewState::WritingCoach => "writing-coach",
            ViewState::WritingHistory => "writing-history",
        }
    }
}

impl std::fmt::Display for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ViewState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewState::ALL
            .into_iter()
            .find(|view| view.as_str() == s)
            .ok_or_else(|| format!("unknown view '{}'", s))
    }
}

//=========================================================================================
// Reading Content
//=========================================================================================

/// A readable piece of content, either generated or curated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub read_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default = "Article::default_kind", rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default)]
    pub content: Vec<String>,
}

impl Article {
    fn default_kind() -> String {
        "article".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: u32,
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub correct_id: u32,
    #[serde(default)]
    pub explanation: String,
}

/// A generated article together with its ordered comprehension questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub article: Article,
    pub questions: Vec<Question>,
}

/// Answers keyed by question index, holding the chosen option id.
pub type QuizAnswers = BTreeMap<usize, u32>;

/// A persisted quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub score: u32,
    pub total_questions: u32,
    pub answers: QuizAnswers,
}

/// A quiz attempt joined with the article it was taken on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizHistoryEntry {
    pub attempt_id: Uuid,
    pub score: u32,
    pub total_questions: u32,
    pub created_at: DateTime<Utc>,
    pub article: StoredArticle,
}

/// An article row as stored by the content backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArticle {
    pub id: Uuid,
    pub title: String,
    pub content: Vec<String>,
    pub kind: String,
    pub level: String,
}

//=========================================================================================
// Recommended Content
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentCategory {
    News,
    Blog,
}

impl ContentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentCategory::News => "News",
            ContentCategory::Blog => "Blog",
        }
    }
}

/// An externally curated article offered on the recommended-content screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedArticle {
    pub id: Uuid,
    pub article_id: String,
    pub title: String,
    pub url: String,
    pub source: String,
    pub image_url: String,
    pub category: ContentCategory,
    pub level: String,
    pub snippet: String,
    pub published_at: Option<DateTime<Utc>>,
    pub pulled_at: DateTime<Utc>,
    pub delivered: bool,
}

impl RecommendedArticle {
    /// Converts the recommendation into an article the reader view can open.
    pub fn to_article(&self) -> Article {
        Article {
            id: self.article_id.clone(),
            title: self.title.clone(),
            read_time: String::new(),
            category: Some(self.source.clone()),
            url: Some(self.url.clone()),
            image_url: Some(self.image_url.clone()),
            level: Some(self.level.clone()),
            kind: self.category.as_str().to_string(),
            snippet: Some(self.snippet.clone()),
            content: Vec::new(),
        }
    }
}

//=========================================================================================
// Writing & Chat
//=========================================================================================

/// A saved writing sample together with whatever analysis existed at save time.
///
/// Each analysis field holds the JSON-serialized text of that phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Essay {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub style_analysis: Option<String>,
    pub evaluation: Option<String>,
    pub improvement: Option<String>,
    pub refinement: Option<String>,
    pub followup: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An essay about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEssay {
    pub user_id: Uuid,
    pub content: String,
    pub style_analysis: Option<String>,
    pub evaluation: Option<String>,
    pub improvement: Option<String>,
    pub refinement: Option<String>,
    pub followup: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
