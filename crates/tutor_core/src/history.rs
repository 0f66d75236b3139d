//! crates/tutor_core/src/history.rs
//!
//! Read-only views over the signed-in user's past quizzes and saved essays.

use crate::domain::{Essay, QuizHistoryEntry, Session};
use crate::ports::{ContentStore, PortResult};

/// Quiz attempts with their articles, newest first. Empty without a session.
pub async fn quiz_history(
    session: Option<&Session>,
    store: &dyn ContentStore,
) -> PortResult<Vec<QuizHistoryEntry>> {
    match session {
        Some(session) => store.quiz_history(session.user_id).await,
        None => Ok(Vec::new()),
    }
}

/// Saved essays with their analyses, newest first. Empty without a session.
pub async fn essay_history(session: Option<&Session>, store: &dyn ContentStore) -> PortResult<Vec<Essay>> {
    match session {
        Some(session) => store.list_essays(session.user_id).await,
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewEssay;
    use crate::testing::{session, FakeContentStore};

    fn essay(user: &Session, content: &str) -> NewEssay {
        NewEssay {
            user_id: user.user_id,
            content: content.to_string(),
            style_analysis: Some("\"Formal.\"".to_string()),
            evaluation: None,
            improvement: None,
            refinement: None,
            followup: None,
        }
    }

    #[tokio::test]
    async fn lists_only_the_users_essays_newest_first() {
        let store = FakeContentStore::new();
        let ana = session("ana@example.com");
        let ben = session("ben@example.com");
        store.essays.lock().unwrap().extend([
            essay(&ana, "first"),
            essay(&ben, "other"),
            essay(&ana, "second"),
        ]);

        let essays = essay_history(Some(&ana), &store).await.unwrap();

        let contents: Vec<&str> = essays.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn no_session_means_no_history() {
        let store = FakeContentStore::new();
        store.essays.lock().unwrap().push(essay(&session("ana@example.com"), "x"));

        assert!(essay_history(None, &store).await.unwrap().is_empty());
        assert!(quiz_history(None, &store).await.unwrap().is_empty());
    }
}
