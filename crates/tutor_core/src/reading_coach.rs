//! crates/tutor_core/src/reading_coach.rs
//!
//! Generated reading lessons and their comprehension quiz. The last lesson and
//! the in-progress answers live in the local store so a reload resumes the quiz.

use std::sync::Arc;

use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::{error, info, warn};

use crate::domain::{Article, ChatTurn, Lesson, Question, QuestionOption, QuizAnswers, QuizAttempt, Session};
use crate::ports::{ContentStore, KeyValueStore, LanguageModel, PortError};
use crate::prompts;

pub const LESSON_KEY: &str = "last_generated_lesson";
pub const ANSWERS_KEY: &str = "last_quiz_answers";

//=========================================================================================
// Lesson Generation
//=========================================================================================

/// Asks the model for a lesson. Never fails: a missing key or an unusable
/// response yields a fixed placeholder lesson.
pub async fn generate_lesson(model: &dyn LanguageModel, level: &str, topic: Option<&str>) -> Lesson {
    let topic = match topic {
        Some(topic) => topic.to_string(),
        None => random_topic(),
    };
    let article_id = format!("gen-{}", Utc::now().timestamp_millis());
    let prompt = prompts::lesson(level, &topic, &article_id);

    let raw = match model
        .complete(prompts::JSON_TUTOR_SYSTEM, &[ChatTurn::user(prompt)])
        .await
    {
        Ok(raw) => raw,
        Err(PortError::NotConfigured(reason)) => {
            error!("Lesson model is not configured: {}", reason);
            return missing_key_lesson();
        }
        Err(e) => {
            error!("AI Generation failed: {}", e);
            return fallback_lesson();
        }
    };

    match serde_json::from_str::<Lesson>(prompts::strip_code_fences(&raw)) {
        Ok(lesson) => {
            info!("Generated lesson '{}' on {}.", lesson.article.title, topic);
            lesson
        }
        Err(e) => {
            warn!("Lesson response was not valid JSON: {}", e);
            fallback_lesson()
        }
    }
}

fn random_topic() -> String {
    prompts::LESSON_TOPICS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(prompts::LESSON_TOPICS[0])
        .to_string()
}

fn placeholder_article(id: &str, title: &str, read_time: &str, content: &[&str]) -> Article {
    Article {
        id: id.to_string(),
        title: title.to_string(),
        read_time: read_time.to_string(),
        category: None,
        url: None,
        image_url: None,
        level: None,
        kind: "article".to_string(),
        snippet: None,
        content: content.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn missing_key_lesson() -> Lesson {
    Lesson {
        article: placeholder_article(
            "fallback-no-key",
            "API Key Missing",
            "1 MIN READ",
            &[
                "Configure LLM_API_KEY with a valid key to generate real content.",
                "This is a placeholder lesson.",
            ],
        ),
        questions: Vec::new(),
    }
}

pub fn fallback_lesson() -> Lesson {
    let option = |id: u32, label: &str, text: &str| QuestionOption {
        id,
        label: label.to_string(),
        text: text.to_string(),
    };
    Lesson {
        article: placeholder_article(
            "fallback",
            "The Evolution of Language (Fallback)",
            "3 MIN READ",
            &[
                "Language is a dynamic and ever-evolving system of communication. Over centuries, English has transformed through cultural exchange, technological advancement, and social shifts.",
                "Modern English continues to integrate new terminology from the digital age while maintaining its foundational Germanic and Latin roots.",
            ],
        ),
        questions: vec![Question {
            id: 1,
            text: "What is the main driver of change mentioned?".to_string(),
            options: vec![
                option(1, "A", "Cultural exchange"),
                option(2, "B", "Static rules"),
                option(3, "C", "Isolation"),
                option(4, "D", "None of above"),
            ],
            correct_id: 1,
            explanation: "The text mentions cultural exchange and technology.".to_string(),
        }],
    }
}

//=========================================================================================
// Quiz State
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSummary {
    pub correct: u32,
    pub total: u32,
}

impl QuizSummary {
    pub fn score(lesson: &Lesson, answers: &QuizAnswers) -> Self {
        let correct = lesson
            .questions
            .iter()
            .enumerate()
            .filter(|(index, question)| answers.get(index) == Some(&question.correct_id))
            .count() as u32;
        Self {
            correct,
            total: lesson.questions.len() as u32,
        }
    }

    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.correct as f64 / self.total as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizStep {
    Advanced(usize),
    Submitted(QuizSummary),
}

pub struct ReadingCoach {
    local: Arc<dyn KeyValueStore>,
    level: String,
    lesson: Option<Lesson>,
    answers: QuizAnswers,
    current_question: usize,
}

impl ReadingCoach {
    pub fn new(local: Arc<dyn KeyValueStore>, level: impl Into<String>) -> Self {
        Self {
            local,
            level: level.into(),
            lesson: None,
            answers: QuizAnswers::new(),
            current_question: 0,
        }
    }

    pub fn lesson(&self) -> Option<&Lesson> {
        self.lesson.as_ref()
    }

    pub fn answers(&self) -> &QuizAnswers {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current_question
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.lesson.as_ref()?.questions.get(self.current_question)
    }

    pub fn selected_answer(&self) -> Option<u32> {
        self.answers.get(&self.current_question).copied()
    }

    /// Restores the cached lesson and its answers, or generates a new lesson.
    pub async fn load_or_generate(&mut self, model: &dyn LanguageModel) -> Option<&Lesson> {
        let cached = self.local.get::<Lesson>(LESSON_KEY).unwrap_or_else(|e| {
            warn!("Could not read cached lesson: {}", e);
            None
        });
        match cached {
            Some(lesson) => {
                self.answers = self
                    .local
                    .get::<QuizAnswers>(ANSWERS_KEY)
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                self.lesson = Some(lesson);
                self.current_question = 0;
                self.lesson.as_ref()
            }
            None => self.generate_new(model, None).await,
        }
    }

    /// Generates a fresh lesson, replacing the cached one and clearing answers.
    pub async fn generate_new(&mut self, model: &dyn LanguageModel, topic: Option<&str>) -> Option<&Lesson> {
        let lesson = generate_lesson(model, &self.level, topic).await;
        if let Err(e) = self.local.set(LESSON_KEY, &lesson) {
            warn!("Could not cache lesson: {}", e);
        }
        if let Err(e) = self.local.remove(ANSWERS_KEY) {
            warn!("Could not clear cached answers: {}", e);
        }
        self.answers.clear();
        self.current_question = 0;
        self.lesson = Some(lesson);
        self.lesson.as_ref()
    }

    /// Records the chosen option for the current question. Unknown options are ignored.
    pub fn select_answer(&mut self, option_id: u32) -> bool {
        let valid = self
            .current_question()
            .is_some_and(|question| question.options.iter().any(|o| o.id == option_id));
        if !valid {
            return false;
        }
        self.answers.insert(self.current_question, option_id);
        if let Err(e) = self.local.set(ANSWERS_KEY, &self.answers) {
            warn!("Could not persist quiz answers: {}", e);
        }
        true
    }

    pub fn previous(&mut self) {
        self.current_question = self.current_question.saturating_sub(1);
    }

    /// Moves to the next question, or submits the quiz after the last one.
    ///
    /// With a session the article and the attempt are persisted; persistence
    /// failures are logged and do not prevent showing the results.
    pub async fn next(&mut self, session: Option<&Session>, store: &dyn ContentStore) -> Option<QuizStep> {
        let lesson = self.lesson.as_ref()?;
        if self.current_question + 1 < lesson.questions.len() {
            self.current_question += 1;
            return Some(QuizStep::Advanced(self.current_question));
        }

        let summary = QuizSummary::score(lesson, &self.answers);
        if let Some(session) = session {
            if let Err(e) = self.submit(lesson, session, summary, store).await {
                error!("Failed to save progress: {}", e);
            }
        }
        Some(QuizStep::Submitted(summary))
    }

    async fn submit(
        &self,
        lesson: &Lesson,
        session: &Session,
        summary: QuizSummary,
        store: &dyn ContentStore,
    ) -> Result<(), PortError> {
        let article_id = store.insert_article(&lesson.article, &self.level).await?;
        store
            .insert_quiz_attempt(&QuizAttempt {
                user_id: session.user_id,
                article_id,
                score: summary.correct,
                total_questions: summary.total,
                answers: self.answers.clone(),
            })
            .await?;
        info!(
            "Saved quiz attempt {}/{} for user {}.",
            summary.correct, summary.total, session.user_id
        );
        Ok(())
    }

    pub fn summary(&self) -> Option<QuizSummary> {
        self.lesson
            .as_ref()
            .map(|lesson| QuizSummary::score(lesson, &self.answers))
    }
}
