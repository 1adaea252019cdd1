use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use live_quiz_back::{
    config::AppConfig,
    dao::{
        models::{OptionEntity, QuestionEntity, QuizEntity},
        quiz_store::memory::MemoryQuizStore,
    },
    routes::router,
    state::AppState,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    store: MemoryQuizStore,
    quiz: QuizEntity,
}

fn one_question_quiz() -> QuizEntity {
    let correct = Uuid::new_v4();
    QuizEntity {
        id: Uuid::new_v4(),
        course_id: Uuid::new_v4(),
        title: "Capitals".into(),
        questions: vec![QuestionEntity {
            id: Uuid::new_v4(),
            text: "Capital of Peru?".into(),
            options: vec![
                OptionEntity {
                    id: correct,
                    text: "Lima".into(),
                },
                OptionEntity {
                    id: Uuid::new_v4(),
                    text: "Cusco".into(),
                },
            ],
            correct_option_id: correct,
            duration_seconds: Some(30),
        }],
    }
}

async fn app() -> TestApp {
    let quiz = one_question_quiz();
    let store = MemoryQuizStore::with_quizzes([quiz.clone()]);
    let state = AppState::new(AppConfig::default());
    state.install_quiz_store(Arc::new(store.clone())).await;
    TestApp {
        router: router(state),
        store,
        quiz,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            request = request.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).expect("request build should succeed"))
        .await
        .expect("router should respond");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be json")
    };
    (status, json)
}

async fn host(app: &TestApp) -> String {
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/sessions",
        Some(json!({ "quiz_id": app.quiz.id, "host_user_id": "host-7" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["pin"].as_str().expect("pin in response").to_owned()
}

#[tokio::test]
async fn healthcheck_reports_ok_with_storage() {
    let app = app().await;
    let (status, body) = send(&app.router, Method::GET, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_pin_and_unknown_quiz_are_not_found() {
    let app = app().await;

    let (status, body) = send(&app.router, Method::GET, "/sessions/ZZZZZZ", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "session_not_found");

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/sessions",
        Some(json!({ "quiz_id": Uuid::new_v4(), "host_user_id": "host-7" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "quiz_not_found");
}

#[tokio::test]
async fn lobby_rejects_duplicate_nicknames_and_blank_ones() {
    let app = app().await;
    let pin = host(&app).await;
    let join_uri = format!("/sessions/{pin}/players");

    let (status, body) = send(
        &app.router,
        Method::POST,
        &join_uri,
        Some(json!({ "nickname": "Ana" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["player_count"], 1);
    assert_eq!(body["quiz_id"], json!(app.quiz.id));

    let (status, body) = send(
        &app.router,
        Method::POST,
        &join_uri,
        Some(json!({ "nickname": "Ana" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "nickname_taken");

    let (status, _) = send(
        &app.router,
        Method::POST,
        &join_uri,
        Some(json!({ "nickname": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn full_round_scores_players_and_records_attempts() {
    let app = app().await;
    let pin = host(&app).await;
    let question = &app.quiz.questions[0];
    let wrong = question.options[1].id;

    for (nickname, user_id) in [("Ana", Some("student-7")), ("Bo", None)] {
        let (status, _) = send(
            &app.router,
            Method::POST,
            &format!("/sessions/{pin}/players"),
            Some(json!({ "nickname": nickname, "user_id": user_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/sessions/{pin}/start"),
        Some(json!({ "host_user_id": "someone-else" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/sessions/{pin}/start"),
        Some(json!({ "host_user_id": "host-7" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["current_question_index"], 0);
    assert_eq!(body["current_question_id"], json!(question.id));

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/sessions/{pin}/answers"),
        Some(json!({
            "question_id": question.id,
            "nickname": "Ana",
            "option_id": question.correct_option_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answered_count"], 1);

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/sessions/{pin}/answers"),
        Some(json!({
            "question_id": question.id,
            "nickname": "Ana",
            "option_id": wrong,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_answered");

    let (status, body) = send(&app.router, Method::GET, &format!("/sessions/{pin}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["answer_counts"][question.correct_option_id.to_string()],
        1
    );

    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/sessions/{pin}/answers"),
        Some(json!({ "question_id": question.id, "nickname": "Bo", "option_id": wrong })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, Method::GET, &format!("/sessions/{pin}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "finished");
    assert_eq!(body["finish_reason"], "completed");
    assert_eq!(body["leaderboard"][0]["nickname"], "Ana");
    assert_eq!(body["leaderboard"][0]["score"], 1);

    let mut attempts = app.store.attempts_for_session(&pin);
    attempts.sort_by_key(|attempt| attempt.score);
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].score, 0);
    assert_eq!(attempts[1].score, 1);
    assert_eq!(attempts[1].total_questions, 1);

    let (status, _) = send(
        &app.router,
        Method::DELETE,
        &format!("/sessions/{pin}"),
        Some(json!({ "host_user_id": "host-7" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app.router, Method::GET, &format!("/sessions/{pin}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
