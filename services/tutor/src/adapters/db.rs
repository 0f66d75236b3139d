//! services/tutor/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `ContentStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tutor_core::domain::{
    Article, ContentCategory, Essay, NewEssay, QuizAttempt, QuizHistoryEntry,
    RecommendedArticle, StoredArticle,
};
use tutor_core::ports::{ContentStore, DeliveryFilter, PortError, PortResult};
use uuid::Uuid;

/// The `type` written for articles produced by the lesson generator.
const GENERATED_ARTICLE_TYPE: &str = "Generated";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ContentStore` port.
#[derive(Clone)]
pub struct PgContentStore {
    pool: PgPool,
}

impl PgContentStore {
    /// Creates a new `PgContentStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct QuizHistoryRecord {
    attempt_id: Uuid,
    score: i32,
    total_questions: i32,
    created_at: DateTime<Utc>,
    article_id: Uuid,
    title: String,
    content: Json<Vec<String>>,
    kind: String,
    level: String,
}
impl QuizHistoryRecord {
    fn to_domain(self) -> QuizHistoryEntry {
        QuizHistoryEntry {
            attempt_id: self.attempt_id,
            score: self.score.max(0) as u32,
            total_questions: self.total_questions.max(0) as u32,
            created_at: self.created_at,
            article: StoredArticle {
                id: self.article_id,
                title: self.title,
                content: self.content.0,
                kind: self.kind,
                level: self.level,
            },
        }
    }
}

#[derive(FromRow)]
struct EssayRecord {
    id: Uuid,
    user_id: Uuid,
    content: String,
    style_analysis: Option<String>,
    evaluation: Option<String>,
    improvement: Option<String>,
    refinement: Option<String>,
    followup: Option<String>,
    created_at: DateTime<Utc>,
}
impl EssayRecord {
    fn to_domain(self) -> Essay {
        Essay {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            style_analysis: self.style_analysis,
            evaluation: self.evaluation,
            improvement: self.improvement,
            refinement: self.refinement,
            followup: self.followup,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct RecommendedRecord {
    id: Uuid,
    article_id: String,
    title: String,
    url: String,
    source: String,
    image_url: String,
    kind: String,
    level: String,
    snippet: String,
    published_at: Option<DateTime<Utc>>,
    pulled_at: DateTime<Utc>,
    is_pushed_to_client: bool,
}
impl RecommendedRecord {
    fn to_domain(self) -> PortResult<RecommendedArticle> {
        let category = match self.kind.as_str() {
            "News" => ContentCategory::News,
            "Blog" => ContentCategory::Blog,
            other => {
                return Err(PortError::Unexpected(format!(
                    "Recommended article {} has unknown type '{}'",
                    self.id, other
                )))
            }
        };
        Ok(RecommendedArticle {
            id: self.id,
            article_id: self.article_id,
            title: self.title,
            url: self.url,
            source: self.source,
            image_url: self.image_url,
            category,
            level: self.level,
            snippet: self.snippet,
            published_at: self.published_at,
            pulled_at: self.pulled_at,
            delivered: self.is_pushed_to_client,
        })
    }
}

//=========================================================================================
// `ContentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentStore for PgContentStore {
    async fn insert_article(&self, article: &Article, level: &str) -> PortResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO articles (id, title, content, type, level) VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&article.title)
        .bind(Json(&article.content))
        .bind(GENERATED_ARTICLE_TYPE)
        .bind(level)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn insert_quiz_attempt(&self, attempt: &QuizAttempt) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_quiz_attempts (id, user_id, article_id, score, total_questions, user_answers) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(attempt.user_id)
        .bind(attempt.article_id)
        .bind(attempt.score as i32)
        .bind(attempt.total_questions as i32)
        .bind(Json(&attempt.answers))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn quiz_history(&self, user_id: Uuid) -> PortResult<Vec<QuizHistoryEntry>> {
        let records = sqlx::query_as::<_, QuizHistoryRecord>(
            "SELECT q.id AS attempt_id, q.score, q.total_questions, q.created_at, \
                    a.id AS article_id, a.title, a.content, a.type AS kind, a.level \
             FROM user_quiz_attempts q \
             JOIN articles a ON a.id = q.article_id \
             WHERE q.user_id = $1 \
             ORDER BY q.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_essay(&self, essay: &NewEssay) -> PortResult<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO essays (id, user_id, content, ai_style_analysis, ai_evaluation, ai_improvement, ai_refinement, ai_followup) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(essay.user_id)
        .bind(&essay.content)
        .bind(&essay.style_analysis)
        .bind(&essay.evaluation)
        .bind(&essay.improvement)
        .bind(&essay.refinement)
        .bind(&essay.followup)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn list_essays(&self, user_id: Uuid) -> PortResult<Vec<Essay>> {
        let records = sqlx::query_as::<_, EssayRecord>(
            "SELECT id, user_id, content, ai_style_analysis AS style_analysis, ai_evaluation AS evaluation, \
                    ai_improvement AS improvement, ai_refinement AS refinement, ai_followup AS followup, created_at \
             FROM essays WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn fetch_recommended(
        &self,
        category: ContentCategory,
        filter: DeliveryFilter,
        limit: u32,
    ) -> PortResult<Vec<RecommendedArticle>> {
        let records = sqlx::query_as::<_, RecommendedRecord>(
            "SELECT id, article_id, title, url, source, image_url, type AS kind, level, snippet, \
                    published_at, pulled_at, is_pushed_to_client \
             FROM recommended_articles \
             WHERE type = $1 AND is_pushed_to_client = $2 \
             ORDER BY pulled_at DESC \
             LIMIT $3",
        )
        .bind(category.as_str())
        .bind(filter == DeliveryFilter::Delivered)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn mark_delivered(&self, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("UPDATE recommended_articles SET is_pushed_to_client = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Recommended article {} not found", id)));
        }
        Ok(())
    }
}
