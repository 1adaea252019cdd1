//! Frozen quiz content and the per-session aggregate built from it.

use std::time::SystemTime;

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    dao::models::{OptionEntity, QuestionEntity, QuizEntity},
    dto::events::OptionSummary,
    state::{pin::Pin, state_machine::SessionStatus},
};

/// Fallback time limit when a question does not declare one.
pub const DEFAULT_QUESTION_SECONDS: u32 = 30;

/// Answer option of a question, frozen for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    /// Identifier submitted by players.
    pub option_id: Uuid,
    /// Label displayed to players.
    pub text: String,
}

/// Immutable runtime copy of a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRuntime {
    /// Stable question identifier.
    pub question_id: Uuid,
    /// Position in the quiz.
    pub order_index: usize,
    /// Prompt.
    pub text: String,
    /// Options in display order.
    pub options: Vec<QuestionOption>,
    /// The single scoring option.
    pub correct_option_id: Uuid,
    /// Answer window.
    pub duration_seconds: u32,
}

impl QuestionRuntime {
    /// Whether `option_id` belongs to this question.
    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.options.iter().any(|option| option.option_id == option_id)
    }

    /// Player-facing projection of the options.
    pub fn option_summaries(&self) -> Vec<OptionSummary> {
        self.options
            .iter()
            .map(|option| OptionSummary {
                option_id: option.option_id,
                text: option.text.clone(),
            })
            .collect()
    }
}

/// Per-session copy of a quiz's questions, loaded once at session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSnapshot {
    /// Source quiz.
    pub quiz_id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Quiz title.
    pub title: String,
    /// Questions sorted by `order_index`.
    pub questions: Vec<QuestionRuntime>,
}

impl QuestionSnapshot {
    /// Freeze `quiz`, applying `default_seconds` to questions without their own limit.
    pub fn from_quiz(quiz: QuizEntity, default_seconds: u32) -> Self {
        let questions = quiz
            .questions
            .into_iter()
            .enumerate()
            .map(|(order_index, question)| question_runtime(order_index, question, default_seconds))
            .collect();

        Self {
            quiz_id: quiz.id,
            course_id: quiz.course_id,
            title: quiz.title,
            questions,
        }
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True for a quiz without questions.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Question at play position `index`.
    pub fn get(&self, index: usize) -> Option<&QuestionRuntime> {
        self.questions.get(index)
    }

    /// Look a question up by id.
    pub fn find(&self, question_id: Uuid) -> Option<&QuestionRuntime> {
        self.questions
            .iter()
            .find(|question| question.question_id == question_id)
    }
}

fn question_runtime(
    order_index: usize,
    question: QuestionEntity,
    default_seconds: u32,
) -> QuestionRuntime {
    QuestionRuntime {
        question_id: question.id,
        order_index,
        text: question.text,
        options: question.options.into_iter().map(Into::into).collect(),
        correct_option_id: question.correct_option_id,
        duration_seconds: question
            .duration_seconds
            .filter(|seconds| *seconds > 0)
            .unwrap_or(default_seconds),
    }
}

impl From<OptionEntity> for QuestionOption {
    fn from(value: OptionEntity) -> Self {
        Self {
            option_id: value.id,
            text: value.text,
        }
    }
}

/// One live run of a quiz. Mutated only by its session actor.
#[derive(Debug, Clone)]
pub struct QuizSession {
    /// Join code.
    pub pin: Pin,
    /// Unique per run, even when a PIN is reused.
    pub session_id: Uuid,
    /// Quiz being played.
    pub quiz_id: Uuid,
    /// Course the quiz belongs to.
    pub course_id: Uuid,
    /// Title shown in the lobby.
    pub quiz_title: String,
    /// Only this user may start or end the session.
    pub host_user_id: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Index of the question in progress (or last played once finished).
    pub current_question_index: Option<usize>,
    /// Wall-clock deadline of the question in progress, reported to clients.
    pub question_deadline: Option<SystemTime>,
    /// Creation time.
    pub created_at: SystemTime,
}

impl QuizSession {
    /// Build a waiting session for `snapshot` hosted by `host_user_id`.
    pub fn new(pin: Pin, snapshot: &QuestionSnapshot, host_user_id: String) -> Self {
        Self {
            pin,
            session_id: Uuid::new_v4(),
            quiz_id: snapshot.quiz_id,
            course_id: snapshot.course_id,
            quiz_title: snapshot.title.clone(),
            host_user_id,
            status: SessionStatus::Waiting,
            current_question_index: None,
            question_deadline: None,
            created_at: SystemTime::now(),
        }
    }
}

/// A player's answer on its way to scoring. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEvent {
    /// Session the answer belongs to.
    pub session_pin: Pin,
    /// Question being answered.
    pub question_id: Uuid,
    /// Answering player.
    pub player_nickname: String,
    /// `None` means the player let the question time out.
    pub selected_option_id: Option<Uuid>,
    /// Stamped when the request entered the engine, before queueing.
    pub submitted_at: Instant,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::dao::models::{OptionEntity, QuestionEntity, QuizEntity};

    /// Build a quiz whose questions each have three options; the first one is correct.
    pub fn quiz(question_count: usize, duration_seconds: Option<u32>) -> QuizEntity {
        QuizEntity {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            title: "General knowledge".into(),
            questions: (0..question_count)
                .map(|index| {
                    let options: Vec<OptionEntity> = (0..3)
                        .map(|option| OptionEntity {
                            id: Uuid::new_v4(),
                            text: format!("Q{index} option {option}"),
                        })
                        .collect();
                    QuestionEntity {
                        id: Uuid::new_v4(),
                        text: format!("Question {index}"),
                        correct_option_id: options[0].id,
                        options,
                        duration_seconds,
                    }
                })
                .collect(),
        }
    }

    pub fn snapshot(question_count: usize) -> QuestionSnapshot {
        QuestionSnapshot::from_quiz(quiz(question_count, None), DEFAULT_QUESTION_SECONDS)
    }
}
