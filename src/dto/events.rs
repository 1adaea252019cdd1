//! Payloads fanned out to session subscribers.

use indexmap::IndexMap;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{roster::LeaderboardEntry, state_machine::FinishReason};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Broadcast when a player enters the lobby.
pub struct PlayerJoinedEvent {
    /// Nickname as registered.
    pub nickname: String,
    /// Players in the lobby after this join.
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Answer option as displayed to players (the correct answer is not revealed).
pub struct OptionSummary {
    /// Identifier to send back when answering.
    pub option_id: Uuid,
    /// Label shown on the answer button.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Broadcast when a question opens; clients derive their countdown from `deadline`.
pub struct QuestionStartedEvent {
    /// Question being asked.
    pub question_id: Uuid,
    /// Zero-based position in the quiz.
    pub question_index: usize,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Prompt displayed to players.
    pub text: String,
    /// Options in display order.
    pub options: Vec<OptionSummary>,
    /// Time allowed to answer.
    pub duration_seconds: u32,
    /// RFC 3339 timestamp after which answers no longer score.
    pub deadline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Broadcast each time an answer is accepted for the current question.
pub struct AnswerSubmittedEvent {
    /// Question the answer targets.
    pub question_id: Uuid,
    /// Player who answered.
    pub nickname: String,
    /// Players who answered so far.
    pub answered_count: usize,
    /// Players in the session.
    pub player_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Live submission counts per option for the current question only.
pub struct AnswerTallyEvent {
    /// Question being counted.
    pub question_id: Uuid,
    /// Submissions per option id.
    #[schema(value_type = Object)]
    pub counts: IndexMap<Uuid, u32>,
    /// Players who answered so far.
    pub answered_count: usize,
    /// Players in the session.
    pub player_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// What closed a question.
pub enum ResolveReason {
    /// The authoritative deadline elapsed.
    Deadline,
    /// Every joined player answered.
    AllAnswered,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Broadcast when a question closes, revealing the correct option.
pub struct QuestionResolvedEvent {
    /// Question that closed.
    pub question_id: Uuid,
    /// Zero-based position in the quiz.
    pub question_index: usize,
    /// Option that scored.
    pub correct_option_id: Uuid,
    /// Timer or last answer.
    pub reason: ResolveReason,
    /// Final submissions per option id.
    #[schema(value_type = Object)]
    pub counts: IndexMap<Uuid, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Terminal event; subscribers stop listening after it.
pub struct SessionEndedEvent {
    /// Why the session finished.
    pub reason: FinishReason,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Final ranking.
    pub leaderboard: Vec<LeaderboardEntry>,
}
