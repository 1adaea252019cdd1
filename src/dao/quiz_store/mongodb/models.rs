use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    OptionEntity, PlayerIdentity, QuestionEntity, QuizAttemptEntity, QuizEntity,
};

/// Quiz document; identifiers are stored as hyphenated strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuizDocument {
    #[serde(rename = "_id")]
    id: String,
    course_id: String,
    title: String,
    #[serde(default)]
    questions: Vec<MongoQuestionDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoQuestionDocument {
    id: String,
    text: String,
    options: Vec<MongoOptionDocument>,
    correct_option_id: String,
    #[serde(default)]
    duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoOptionDocument {
    id: String,
    text: String,
}

fn parse_id(quiz_id: &str, raw: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(raw).map_err(|source| MongoDaoError::MalformedQuiz {
        id: quiz_id.to_owned(),
        source,
    })
}

impl TryFrom<MongoQuizDocument> for QuizEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoQuizDocument) -> Result<Self, Self::Error> {
        let quiz_id = value.id.clone();
        let questions = value
            .questions
            .into_iter()
            .map(|question| {
                let options = question
                    .options
                    .into_iter()
                    .map(|option| {
                        Ok(OptionEntity {
                            id: parse_id(&quiz_id, &option.id)?,
                            text: option.text,
                        })
                    })
                    .collect::<Result<Vec<_>, MongoDaoError>>()?;

                Ok(QuestionEntity {
                    id: parse_id(&quiz_id, &question.id)?,
                    text: question.text,
                    options,
                    correct_option_id: parse_id(&quiz_id, &question.correct_option_id)?,
                    duration_seconds: question.duration_seconds,
                })
            })
            .collect::<Result<Vec<_>, MongoDaoError>>()?;

        Ok(Self {
            id: parse_id(&quiz_id, &value.id)?,
            course_id: parse_id(&quiz_id, &value.course_id)?,
            title: value.title,
            questions,
        })
    }
}

/// Filter selecting one quiz by id.
pub fn quiz_filter(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Filter matching the natural key of an attempt.
pub fn attempt_filter(attempt: &QuizAttemptEntity) -> Document {
    let key = attempt.key();
    doc! {
        "session_id": key.session_id.map(|id| id.to_string()),
        "session_pin": key.session_pin,
        "player_key": key.player_identity,
        "quiz_id": key.quiz_id.to_string(),
    }
}

/// `$setOnInsert` update so an existing attempt is never overwritten.
pub fn attempt_insert_only(attempt: &QuizAttemptEntity) -> Document {
    let (kind, value) = match &attempt.player_identity {
        PlayerIdentity::User(id) => ("user", id.clone()),
        PlayerIdentity::Nickname(name) => ("nickname", name.clone()),
    };

    doc! {
        "$setOnInsert": {
            "_id": attempt.id.to_string(),
            "player_kind": kind,
            "player_value": value,
            "course_id": attempt.course_id.to_string(),
            "score": i64::from(attempt.score),
            "total_questions": i64::from(attempt.total_questions),
            "percentage": attempt.percentage,
            "taken_at": DateTime::from_system_time(attempt.taken_at),
        }
    }
}
