//! Answer evaluation and end-of-session result computation.
//!
//! Scoring is flat: one point per correct answer submitted no later than the
//! question deadline. Timeouts and late answers score zero without raising.

use std::time::SystemTime;

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerIdentity, QuizAttemptEntity},
    state::{
        quiz::{AnswerEvent, QuestionRuntime, QuestionSnapshot, QuizSession},
        roster::{Player, PlayerRoster},
    },
};

/// Points awarded for a correct, on-time answer.
pub const POINTS_PER_CORRECT_ANSWER: u32 = 1;

/// Points `event` earns for `question` given its `deadline`.
pub fn evaluate(event: &AnswerEvent, question: &QuestionRuntime, deadline: Instant) -> u32 {
    match event.selected_option_id {
        Some(option) if option == question.correct_option_id && event.submitted_at <= deadline => {
            POINTS_PER_CORRECT_ANSWER
        }
        _ => 0,
    }
}

/// Score an accepted answer and credit the player; returns the points awarded.
///
/// Unknown questions or players score zero.
pub fn score(
    snapshot: &QuestionSnapshot,
    roster: &mut PlayerRoster,
    event: &AnswerEvent,
    deadline: Instant,
) -> u32 {
    let Some(question) = snapshot.find(event.question_id) else {
        return 0;
    };

    let points = evaluate(event, question, deadline);
    if points > 0 && roster.award(&event.player_nickname, points).is_err() {
        return 0;
    }
    points
}

/// `score / total * 100`, rounded to one decimal place.
pub fn percentage(score: u32, total_questions: u32) -> f64 {
    if total_questions == 0 {
        return 0.0;
    }
    (f64::from(score) * 1000.0 / f64::from(total_questions)).round() / 10.0
}

fn identity_of(player: &Player) -> PlayerIdentity {
    match &player.user_id {
        Some(user_id) => PlayerIdentity::User(user_id.clone()),
        None => PlayerIdentity::Nickname(player.nickname.clone()),
    }
}

/// Build one attempt per player from the final roster.
pub fn finalize(
    session: &QuizSession,
    snapshot: &QuestionSnapshot,
    roster: &PlayerRoster,
    taken_at: SystemTime,
) -> Vec<QuizAttemptEntity> {
    let total_questions = u32::try_from(snapshot.len()).unwrap_or(u32::MAX);

    roster
        .iter()
        .map(|player| QuizAttemptEntity {
            id: Uuid::new_v4(),
            session_id: Some(session.session_id),
            session_pin: Some(session.pin.to_string()),
            player_identity: identity_of(player),
            quiz_id: session.quiz_id,
            course_id: session.course_id,
            score: player.score,
            total_questions,
            percentage: percentage(player.score, total_questions),
            taken_at,
        })
        .collect()
}
