//! crates/tutor_core/src/writing_coach.rs
//!
//! The writing-coach pipeline: five independent analysis phases over the
//! current draft, each result cached against the exact draft text it was
//! computed from.
//!
//! A phase run is split into `begin_phase` (cache lookup or ticket issue) and
//! `complete_phase` (commit), so a result arriving after a newer request for
//! the same phase is dropped instead of overwriting it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{ChatTurn, NewEssay, Session};
use crate::ports::{ContentStore, LanguageModel, PortError, PortResult};
use crate::prompts;

//=========================================================================================
// Phases
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Style,
    Evaluation,
    Improvement,
    Refinement,
    Followup,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Style,
        Phase::Evaluation,
        Phase::Improvement,
        Phase::Refinement,
        Phase::Followup,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Style => "style",
            Phase::Evaluation => "evaluation",
            Phase::Improvement => "improvement",
            Phase::Refinement => "refinement",
            Phase::Followup => "followup",
        }
    }

    /// The heading shown above a displayed result.
    pub fn title(self) -> &'static str {
        match self {
            Phase::Style => "Style Analyzer",
            Phase::Evaluation => "Evaluate Content",
            Phase::Improvement => "Improvement Suggestions",
            Phase::Refinement => "Content Refiner",
            Phase::Followup => "Follow-up Questions",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Phase::Style => "Failed to analyze style. Please try again.",
            Phase::Evaluation => "Failed to evaluate content. Please try again.",
            Phase::Improvement => "Failed to generate suggestions. Please try again.",
            Phase::Refinement => "Failed to refine content. Please try again.",
            Phase::Followup => "Failed to generate follow-up questions. Please try again.",
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Phase::Style => prompts::STYLE_SYSTEM,
            Phase::Evaluation => prompts::EVALUATION_SYSTEM,
            Phase::Improvement => prompts::IMPROVEMENT_SYSTEM,
            Phase::Refinement => prompts::REFINEMENT_SYSTEM,
            Phase::Followup => prompts::FOLLOWUP_SYSTEM,
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "style" => Ok(Phase::Style),
            "evaluation" | "evaluate" => Ok(Phase::Evaluation),
            "improvement" => Ok(Phase::Improvement),
            "refinement" | "refiner" | "refine" => Ok(Phase::Refinement),
            "followup" | "follow-up" => Ok(Phase::Followup),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

//=========================================================================================
// Errors & Results
//=========================================================================================

pub const EMPTY_DRAFT_MESSAGE: &str = "Please write something first!";
pub const NOT_SIGNED_IN_MESSAGE: &str = "You must be logged in to save.";
pub const INPUT_COMPLETE_MESSAGE: &str =
    "Input complete! You can now use AI tools to analyze your writing.";

/// User-facing failures of writing-coach operations.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("Please write something first!")]
    EmptyDraft,
    #[error("You must be logged in to save.")]
    NotSignedIn,
    #[error("Selected file: {0} (Only text files supported for now)")]
    UnsupportedFile(String),
    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error: {0}")]
    Persistence(#[from] PortError),
}

/// A phase result and the draft text it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub text: String,
    pub snapshot: String,
}

/// Context handed to the follow-up phase, captured when the request is issued.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowupContext {
    pub style: Option<String>,
    pub evaluation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseState {
    Loading,
    Ready(String),
    Failed(&'static str),
}

/// The single phase currently shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePhase {
    pub phase: Phase,
    pub request_id: u64,
    pub state: PhaseState,
}

/// An issued request for one phase. Hand it back to `complete_phase`.
#[derive(Debug, Clone)]
pub struct PhaseTicket {
    pub phase: Phase,
    pub request_id: u64,
    pub snapshot: String,
    pub context: Option<FollowupContext>,
}

impl PhaseTicket {
    /// Runs the phase's model call for the captured draft snapshot.
    pub async fn run(&self, model: &dyn LanguageModel) -> PortResult<String> {
        let prompt = match self.phase {
            Phase::Style => prompts::style(&self.snapshot),
            Phase::Evaluation => prompts::evaluation(&self.snapshot),
            Phase::Improvement => prompts::improvement(&self.snapshot),
            Phase::Refinement => prompts::refinement(&self.snapshot),
            Phase::Followup => {
                let context = self.context.clone().unwrap_or_default();
                prompts::followup(
                    &self.snapshot,
                    context.style.as_deref(),
                    context.evaluation.as_deref(),
                )
            }
        };
        model
            .complete(self.phase.system_prompt(), &[ChatTurn::user(prompt)])
            .await
    }
}

pub enum PhaseStep {
    /// Served from cache; already displayed.
    Cached(ActivePhase),
    /// A model call is required.
    Call(PhaseTicket),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    phase: Phase,
    digest: Vec<u8>,
}

impl CacheKey {
    fn new(phase: Phase, draft: &str) -> Self {
        Self {
            phase,
            digest: Sha256::digest(draft.as_bytes()).to_vec(),
        }
    }
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

/// Owns the draft and every analysis computed for it in one editing session.
#[derive(Debug, Default)]
pub struct WritingCoach {
    draft: String,
    /// The latest result of each phase, whatever draft it came from.
    results: HashMap<Phase, AnalysisResult>,
    /// Every result seen, addressed by phase and draft digest.
    cache: HashMap<CacheKey, AnalysisResult>,
    latest_request: HashMap<Phase, u64>,
    next_request_id: u64,
    active: Option<ActivePhase>,
    saved: bool,
}

impl WritingCoach {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
        self.saved = false;
    }

    pub fn result(&self, phase: Phase) -> Option<&AnalysisResult> {
        self.results.get(&phase)
    }

    /// True if the phase has a result computed from the current draft.
    pub fn is_fresh(&self, phase: Phase) -> bool {
        self.results
            .get(&phase)
            .is_some_and(|result| result.snapshot == self.draft)
    }

    pub fn active(&self) -> Option<&ActivePhase> {
        self.active.as_ref()
    }

    pub fn clear_display(&mut self) {
        self.active = None;
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    fn ensure_draft(&self) -> Result<(), CoachError> {
        if self.draft.trim().is_empty() {
            return Err(CoachError::EmptyDraft);
        }
        Ok(())
    }

    pub fn mark_input_complete(&self) -> Result<&'static str, CoachError> {
        self.ensure_draft()?;
        Ok(INPUT_COMPLETE_MESSAGE)
    }

    /// Replaces the draft with the contents of a `.txt` or `.md` file.
    pub async fn load_draft_file(&mut self, path: &Path) -> Result<(), CoachError> {
        let is_text = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("md"));
        if !is_text {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            return Err(CoachError::UnsupportedFile(name));
        }
        let text = tokio::fs::read_to_string(path).await?;
        self.set_draft(text);
        Ok(())
    }

    //=====================================================================================
    // Running Phases
    //=====================================================================================

    /// Selects a phase for display: reuses a result for the current draft, or
    /// issues a ticket for a model call.
    pub fn begin_phase(&mut self, phase: Phase) -> Result<PhaseStep, CoachError> {
        self.ensure_draft()?;

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.latest_request.insert(phase, request_id);

        let key = CacheKey::new(phase, &self.draft);
        if let Some(hit) = self.cache.get(&key).filter(|hit| hit.snapshot == self.draft) {
            debug!("Using cached {} result.", phase.as_str());
            let hit = hit.clone();
            let shown = ActivePhase {
                phase,
                request_id,
                state: PhaseState::Ready(hit.text.clone()),
            };
            self.active = Some(shown.clone());
            self.results.insert(phase, hit);
            return Ok(PhaseStep::Cached(shown));
        }

        let context = (phase == Phase::Followup).then(|| FollowupContext {
            style: self.results.get(&Phase::Style).map(|r| r.text.clone()),
            evaluation: self.results.get(&Phase::Evaluation).map(|r| r.text.clone()),
        });
        self.active = Some(ActivePhase {
            phase,
            request_id,
            state: PhaseState::Loading,
        });

        Ok(PhaseStep::Call(PhaseTicket {
            phase,
            request_id,
            snapshot: self.draft.clone(),
            context,
        }))
    }

    /// Commits a finished call. Returns whether a result was stored.
    pub fn complete_phase(&mut self, ticket: PhaseTicket, outcome: PortResult<String>) -> bool {
        let is_displayed = self
            .active
            .as_ref()
            .is_some_and(|active| active.request_id == ticket.request_id);
        let (stored, shown) = self.settle(ticket, outcome);
        if is_displayed {
            self.active = Some(shown);
        }
        stored
    }

    /// Records the outcome of a call and returns how it would be displayed.
    fn settle(&mut self, ticket: PhaseTicket, outcome: PortResult<String>) -> (bool, ActivePhase) {
        let PhaseTicket {
            phase,
            request_id,
            snapshot,
            ..
        } = ticket;
        let is_latest = self.latest_request.get(&phase) == Some(&request_id);

        let (stored, state) = match outcome {
            Ok(text) if is_latest => {
                let result = AnalysisResult {
                    text: text.clone(),
                    snapshot,
                };
                self.cache
                    .insert(CacheKey::new(phase, &result.snapshot), result.clone());
                self.results.insert(phase, result);
                (true, PhaseState::Ready(text))
            }
            Ok(text) => {
                debug!("Dropping stale {} result (request {}).", phase.as_str(), request_id);
                (false, PhaseState::Ready(text))
            }
            Err(e) => {
                warn!("Error running {}: {}", phase.as_str(), e);
                (false, PhaseState::Failed(phase.failure_message()))
            }
        };
        (
            stored,
            ActivePhase {
                phase,
                request_id,
                state,
            },
        )
    }

    /// Runs one phase end to end. Model failures are shown, not returned.
    pub async fn run_phase(
        &mut self,
        model: &dyn LanguageModel,
        phase: Phase,
    ) -> Result<&ActivePhase, CoachError> {
        let shown = match self.begin_phase(phase)? {
            PhaseStep::Cached(shown) => shown,
            PhaseStep::Call(ticket) => {
                let outcome = ticket.run(model).await;
                self.settle(ticket, outcome).1
            }
        };
        let shown: &ActivePhase = self.active.insert(shown);
        Ok(shown)
    }

    //=====================================================================================
    // Saving
    //=====================================================================================

    /// Inserts the draft and the current text of every phase as a new essay.
    pub async fn save(
        &mut self,
        session: Option<&Session>,
        store: &dyn ContentStore,
    ) -> Result<Uuid, CoachError> {
        self.ensure_draft()?;
        let session = session.ok_or(CoachError::NotSignedIn)?;

        let essay = NewEssay {
            user_id: session.user_id,
            content: self.draft.clone(),
            style_analysis: self.serialized(Phase::Style)?,
            evaluation: self.serialized(Phase::Evaluation)?,
            improvement: self.serialized(Phase::Improvement)?,
            refinement: self.serialized(Phase::Refinement)?,
            followup: self.serialized(Phase::Followup)?,
        };
        let id = store.insert_essay(&essay).await?;
        self.saved = true;
        info!("Saved essay {} for user {}.", id, session.user_id);
        Ok(id)
    }

    fn serialized(&self, phase: Phase) -> Result<Option<String>, CoachError> {
        self.results
            .get(&phase)
            .map(|result| {
                serde_json::to_string(&result.text)
                    .map_err(|e| CoachError::Persistence(PortError::Unexpected(e.to_string())))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{session, FakeContentStore, FakeModel};

    fn coach(draft: &str) -> WritingCoach {
        let mut coach = WritingCoach::new();
        coach.set_draft(draft);
        coach
    }

    #[tokio::test]
    async fn empty_draft_is_rejected_without_a_call() {
        let model = FakeModel::new();
        let mut coach = coach("   \n");

        let err = coach.run_phase(&model, Phase::Style).await.unwrap_err();

        assert!(matches!(err, CoachError::EmptyDraft));
        assert_eq!(err.to_string(), EMPTY_DRAFT_MESSAGE);
        assert_eq!(model.call_count(), 0);
        assert!(coach.active().is_none());
    }

    #[tokio::test]
    async fn unchanged_draft_is_served_from_cache() {
        let model = FakeModel::new().reply("Informal narrative.");
        let mut coach = coach("The dog run fast.");

        coach.run_phase(&model, Phase::Style).await.unwrap();
        let active = coach.run_phase(&model, Phase::Style).await.unwrap();

        assert_eq!(active.state, PhaseState::Ready("Informal narrative.".to_string()));
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn edited_draft_triggers_a_new_call() {
        let model = FakeModel::new().reply("first").reply("second");
        let mut coach = coach("The dog run fast.");

        coach.run_phase(&model, Phase::Style).await.unwrap();
        coach.set_draft("The dog runs fast.");
        coach.run_phase(&model, Phase::Style).await.unwrap();

        assert_eq!(model.call_count(), 2);
        assert_eq!(coach.result(Phase::Style).unwrap().text, "second");
        assert_eq!(coach.result(Phase::Style).unwrap().snapshot, "The dog runs fast.");
    }

    #[tokio::test]
    async fn editing_leaves_other_phase_results_tied_to_old_snapshot() {
        let model = FakeModel::new()
            .reply("style v1")
            .reply("evaluation v1")
            .reply("style v2");
        let mut coach = coach("The dog run fast.");

        coach.run_phase(&model, Phase::Style).await.unwrap();
        coach.run_phase(&model, Phase::Evaluation).await.unwrap();
        coach.set_draft("The dog runs fast.");
        coach.run_phase(&model, Phase::Style).await.unwrap();

        assert_eq!(model.call_count(), 3);
        let evaluation = coach.result(Phase::Evaluation).unwrap();
        assert_eq!(evaluation.text, "evaluation v1");
        assert_eq!(evaluation.snapshot, "The dog run fast.");
        assert!(!coach.is_fresh(Phase::Evaluation));
        assert!(coach.is_fresh(Phase::Style));
    }

    #[tokio::test]
    async fn reverting_the_draft_reuses_the_earlier_result() {
        let model = FakeModel::new().reply("v1").reply("v2");
        let mut coach = coach("one");

        coach.run_phase(&model, Phase::Refinement).await.unwrap();
        coach.set_draft("two");
        coach.run_phase(&model, Phase::Refinement).await.unwrap();
        coach.set_draft("one");
        let active = coach.run_phase(&model, Phase::Refinement).await.unwrap();

        assert_eq!(active.state, PhaseState::Ready("v1".to_string()));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn failure_is_displayed_and_keeps_other_results() {
        let model = FakeModel::new()
            .reply("style ok")
            .fail(PortError::Unexpected("timeout".to_string()));
        let mut coach = coach("A short essay.");

        coach.run_phase(&model, Phase::Style).await.unwrap();
        let active = coach.run_phase(&model, Phase::Improvement).await.unwrap();

        assert_eq!(
            active.state,
            PhaseState::Failed("Failed to generate suggestions. Please try again.")
        );
        assert_eq!(coach.result(Phase::Style).unwrap().text, "style ok");
        assert!(coach.result(Phase::Improvement).is_none());
    }

    #[tokio::test]
    async fn failed_phase_is_retried_on_next_run() {
        let model = FakeModel::new()
            .fail(PortError::Unexpected("timeout".to_string()))
            .reply("recovered");
        let mut coach = coach("A short essay.");

        coach.run_phase(&model, Phase::Style).await.unwrap();
        let active = coach.run_phase(&model, Phase::Style).await.unwrap();

        assert_eq!(active.state, PhaseState::Ready("recovered".to_string()));
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn followup_receives_current_style_and_evaluation() {
        let model = FakeModel::new()
            .reply("STYLE-CONTEXT")
            .reply("questions");
        let mut coach = coach("My essay.");

        coach.run_phase(&model, Phase::Style).await.unwrap();
        coach.run_phase(&model, Phase::Followup).await.unwrap();

        let prompt = model.last_prompt();
        assert!(prompt.contains("STYLE-CONTEXT"));
        assert!(prompt.contains("Not available"));
    }

    #[test]
    fn only_one_phase_is_displayed_at_a_time() {
        let mut coach = coach("Text.");
        let PhaseStep::Call(style) = coach.begin_phase(Phase::Style).unwrap() else {
            panic!("expected a call");
        };
        let PhaseStep::Call(evaluation) = coach.begin_phase(Phase::Evaluation).unwrap() else {
            panic!("expected a call");
        };

        assert!(coach.complete_phase(style, Ok("style".to_string())));
        assert!(coach.complete_phase(evaluation, Ok("evaluation".to_string())));

        let active = coach.active().unwrap();
        assert_eq!(active.phase, Phase::Evaluation);
        assert_eq!(active.state, PhaseState::Ready("evaluation".to_string()));
        assert_eq!(coach.result(Phase::Style).unwrap().text, "style");
    }

    #[test]
    fn cache_hit_after_clearing_redisplays_the_result() {
        let mut coach = coach("Text.");
        let PhaseStep::Call(ticket) = coach.begin_phase(Phase::Style).unwrap() else {
            panic!("expected a call");
        };
        coach.complete_phase(ticket, Ok("style".to_string()));
        coach.clear_display();

        let PhaseStep::Cached(shown) = coach.begin_phase(Phase::Style).unwrap() else {
            panic!("expected a cache hit");
        };

        assert_eq!(shown.state, PhaseState::Ready("style".to_string()));
        assert_eq!(coach.active(), Some(&shown));
    }

    #[tokio::test]
    async fn run_phase_returns_what_is_displayed() {
        let model = FakeModel::new().fail(PortError::Unexpected("timeout".to_string()));
        let mut coach = coach("Text.");

        let shown = coach.run_phase(&model, Phase::Evaluation).await.unwrap().clone();

        assert_eq!(shown.phase, Phase::Evaluation);
        assert!(matches!(shown.state, PhaseState::Failed(_)));
        assert_eq!(coach.active(), Some(&shown));
    }

    #[test]
    fn late_result_does_not_overwrite_newer_one() {
        let mut coach = coach("old text");
        let PhaseStep::Call(first) = coach.begin_phase(Phase::Style).unwrap() else {
            panic!("expected a call");
        };
        coach.set_draft("new text");
        let PhaseStep::Call(second) = coach.begin_phase(Phase::Style).unwrap() else {
            panic!("expected a call");
        };

        assert!(coach.complete_phase(second, Ok("for new text".to_string())));
        assert!(!coach.complete_phase(first, Ok("for old text".to_string())));

        let result = coach.result(Phase::Style).unwrap();
        assert_eq!(result.text, "for new text");
        assert_eq!(result.snapshot, "new text");
        assert_eq!(
            coach.active().unwrap().state,
            PhaseState::Ready("for new text".to_string())
        );
    }

    #[tokio::test]
    async fn save_requires_a_draft() {
        let store = FakeContentStore::new();
        let mut coach = coach("");
        let user = session("ana@example.com");

        let err = coach.save(Some(&user), &store).await.unwrap_err();

        assert_eq!(err.to_string(), "Please write something first!");
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn save_requires_a_session() {
        let store = FakeContentStore::new();
        let mut coach = coach("Something worth keeping.");

        let err = coach.save(None, &store).await.unwrap_err();

        assert_eq!(err.to_string(), NOT_SIGNED_IN_MESSAGE);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn save_inserts_draft_with_serialized_results() {
        let model = FakeModel::new().reply("Formal \"academic\" tone.");
        let store = FakeContentStore::new();
        let user = session("ana@example.com");
        let mut coach = coach("Essay body.");
        coach.run_phase(&model, Phase::Style).await.unwrap();

        coach.save(Some(&user), &store).await.unwrap();
        coach.save(Some(&user), &store).await.unwrap();

        let essays = store.essays.lock().unwrap();
        assert_eq!(essays.len(), 2);
        let essay = &essays[0];
        assert_eq!(essay.user_id, user.user_id);
        assert_eq!(essay.content, "Essay body.");
        assert_eq!(
            essay.style_analysis.as_deref(),
            Some(r#""Formal \"academic\" tone.""#)
        );
        assert_eq!(essay.evaluation, None);
        assert!(coach.is_saved());
    }

    #[tokio::test]
    async fn save_surfaces_persistence_failure() {
        let store = FakeContentStore::new();
        *store.fail_writes.lock().unwrap() = true;
        let user = session("ana@example.com");
        let mut coach = coach("Essay body.");

        let err = coach.save(Some(&user), &store).await.unwrap_err();

        assert!(matches!(err, CoachError::Persistence(_)));
        assert!(!coach.is_saved());
    }

    #[tokio::test]
    async fn loads_text_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let essay = dir.path().join("essay.md");
        std::fs::write(&essay, "# Draft\nHello.").unwrap();
        let image = dir.path().join("scan.png");
        std::fs::write(&image, [0u8; 4]).unwrap();
        let mut coach = WritingCoach::new();

        coach.load_draft_file(&essay).await.unwrap();
        let err = coach.load_draft_file(&image).await.unwrap_err();

        assert_eq!(coach.draft(), "# Draft\nHello.");
        assert!(matches!(err, CoachError::UnsupportedFile(name) if name == "scan.png"));
    }

    #[test]
    fn phase_names_parse_from_labels() {
        assert_eq!("Evaluate".parse::<Phase>(), Ok(Phase::Evaluation));
        assert_eq!("refiner".parse::<Phase>(), Ok(Phase::Refinement));
        assert_eq!("follow-up".parse::<Phase>(), Ok(Phase::Followup));
        assert!("grammar".parse::<Phase>().is_err());
    }
}
