use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use exam_session_engine::config::SessionConfig;
use exam_session_engine::models::answer::AnswerValue;
use exam_session_engine::models::attempt::AttemptStatus;
use exam_session_engine::platform::{surface_channel, ExamSurface, SurfaceEvent, Visibility};
use exam_session_engine::services::attempt_api::AttemptApi;
use exam_session_engine::services::session::{
    FinishReason, SessionCommand, SessionExit, SessionState,
};
use exam_session_engine::SessionRuntime;

/// Surface fake backed by a shared flag, so the test can watch fullscreen
/// being acquired on start and released after the finish call.
#[derive(Clone, Default)]
struct FlowSurface {
    fullscreen: Arc<AtomicBool>,
}

impl ExamSurface for FlowSurface {
    fn request_fullscreen(&self) {
        self.fullscreen.store(true, Ordering::SeqCst);
    }

    fn exit_fullscreen(&self) {
        self.fullscreen.store(false, Ordering::SeqCst);
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    fn set_capture_guards(&self, _enabled: bool) {}
}

struct ServerInner {
    exam_id: Uuid,
    attempt_id: Uuid,
    exam_published: bool,
    status: String,
    seconds_remaining: u64,
    violation_count: u32,
    score: f64,
    questions: Vec<Value>,
    adaptive_next: HashMap<Uuid, Uuid>,
    answers: Vec<Value>,
    finish_calls: u32,
}

/// In-process stand-in for the attempt service, mirroring its route shapes.
#[derive(Clone)]
struct FakeAttemptServer {
    inner: Arc<Mutex<ServerInner>>,
}

impl FakeAttemptServer {
    fn new(questions: Vec<Value>, adaptive_next: HashMap<Uuid, Uuid>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerInner {
                exam_id: Uuid::new_v4(),
                attempt_id: Uuid::new_v4(),
                exam_published: true,
                status: "STARTED".to_string(),
                seconds_remaining: 300,
                violation_count: 0,
                score: 0.0,
                questions,
                adaptive_next,
                answers: Vec::new(),
                finish_calls: 0,
            })),
        }
    }

    fn attempt_json(inner: &ServerInner) -> Value {
        json!({
            "id": inner.attempt_id,
            "exam": inner.exam_id,
            "exam_title": "Integration Exam",
            "start_time": Utc::now().to_rfc3339(),
            "finish_time": if inner.status == "STARTED" {
                Value::Null
            } else {
                json!(Utc::now().to_rfc3339())
            },
            "status": inner.status,
            "score": inner.score,
            "questions": inner.questions,
            "is_active": inner.status == "STARTED",
            "seconds_remaining": inner.seconds_remaining,
            "violation_count": inner.violation_count,
        })
    }

    async fn serve(self) -> SocketAddr {
        let app = Router::new()
            .route("/api/attempts/", get(list_attempts))
            .route("/api/attempts/start/:exam_id/", post(start_attempt))
            .route("/api/attempts/:id/", get(get_attempt))
            .route("/api/attempts/:id/submit-answer/", post(submit_answer))
            .route("/api/attempts/:id/record-violation/", post(record_violation))
            .route("/api/attempts/:id/finish/", post(finish_attempt))
            .route("/api/attempts/:id/review/", get(get_review))
            .with_state(self);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

async fn start_attempt(
    State(server): State<FakeAttemptServer>,
    Path(_exam_id): Path<Uuid>,
) -> Response {
    let inner = server.inner.lock().unwrap();
    if !inner.exam_published {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Exam is not published"})),
        )
            .into_response();
    }
    Json(FakeAttemptServer::attempt_json(&inner)).into_response()
}

async fn get_attempt(State(server): State<FakeAttemptServer>, Path(_id): Path<Uuid>) -> Json<Value> {
    let inner = server.inner.lock().unwrap();
    Json(FakeAttemptServer::attempt_json(&inner))
}

async fn list_attempts(State(server): State<FakeAttemptServer>) -> Json<Value> {
    let inner = server.inner.lock().unwrap();
    Json(json!([FakeAttemptServer::attempt_json(&inner)]))
}

async fn submit_answer(
    State(server): State<FakeAttemptServer>,
    Path(_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut inner = server.inner.lock().unwrap();
    let question_id = body
        .get("question_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    inner.answers.push(body.clone());
    let next = question_id.and_then(|q| inner.adaptive_next.get(&q).copied());
    match next {
        Some(next_id) => Json(json!({"status": "saved", "next_question_id": next_id})),
        None => Json(json!({"status": "saved"})),
    }
}

async fn record_violation(
    State(server): State<FakeAttemptServer>,
    Path(_id): Path<Uuid>,
) -> Json<Value> {
    let mut inner = server.inner.lock().unwrap();
    inner.violation_count += 1;
    let terminated = inner.violation_count >= 3;
    if terminated {
        inner.status = "COMPLETED".to_string();
    }
    Json(json!({"count": inner.violation_count, "terminated": terminated}))
}

async fn finish_attempt(
    State(server): State<FakeAttemptServer>,
    Path(_id): Path<Uuid>,
) -> Json<Value> {
    let mut inner = server.inner.lock().unwrap();
    inner.finish_calls += 1;
    inner.status = "COMPLETED".to_string();
    inner.score = 1.0;
    inner.seconds_remaining = 0;
    Json(FakeAttemptServer::attempt_json(&inner))
}

async fn get_review(State(server): State<FakeAttemptServer>, Path(_id): Path<Uuid>) -> Json<Value> {
    let inner = server.inner.lock().unwrap();
    let answers: Vec<Value> = inner
        .answers
        .iter()
        .map(|answer| {
            let question_id = answer.get("question_id").cloned().unwrap_or(Value::Null);
            let question = inner
                .questions
                .iter()
                .find(|q| q.get("id") == Some(&question_id))
                .cloned()
                .unwrap_or(json!({
                    "id": question_id,
                    "title": "",
                    "question_text": "",
                    "question_type": "MCQ",
                    "choices": [],
                }));
            json!({
                "question": with_correctness(question),
                "selected_choice_id": answer.get("selected_choice_id").cloned().unwrap_or(Value::Null),
                "answer_text": answer.get("answer_text").cloned().unwrap_or(Value::Null),
                "feedback": "Reviewed",
                "is_correct": true,
                "marks_awarded": 1.0,
            })
        })
        .collect();
    Json(json!({
        "id": inner.attempt_id,
        "exam": inner.exam_id,
        "exam_title": "Integration Exam",
        "start_time": Utc::now().to_rfc3339(),
        "finish_time": Utc::now().to_rfc3339(),
        "status": inner.status,
        "score": inner.score,
        "violation_count": inner.violation_count,
        "answers": answers,
    }))
}

fn with_correctness(mut question: Value) -> Value {
    if let Some(choices) = question.get_mut("choices").and_then(|c| c.as_array_mut()) {
        for (i, choice) in choices.iter_mut().enumerate() {
            choice["is_correct"] = json!(i == 0);
        }
    }
    question
}

fn mcq(title: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "title": title,
        "question_text": format!("{}?", title),
        "question_type": "MCQ",
        "choices": [
            {"id": Uuid::new_v4(), "text": "Yes"},
            {"id": Uuid::new_v4(), "text": "No"},
        ],
    })
}

fn descriptive(title: &str) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "title": title,
        "question_text": format!("{}?", title),
        "question_type": "DESCRIPTIVE",
        "choices": [],
    })
}

fn question_id(question: &Value) -> Uuid {
    Uuid::parse_str(question["id"].as_str().unwrap()).unwrap()
}

fn choice_id(question: &Value, index: usize) -> Uuid {
    Uuid::parse_str(question["choices"][index]["id"].as_str().unwrap()).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn full_attempt_flow_submits_and_reviews() {
    init_tracing();
    let q1 = mcq("Subnetting");
    let q2 = descriptive("Routing");
    let q3 = mcq("Switching");
    let q1_id = question_id(&q1);
    let q2_id = question_id(&q2);
    let q3_id = question_id(&q3);
    let q1_choice = choice_id(&q1, 0);
    let mut adaptive = HashMap::new();
    adaptive.insert(q1_id, q3_id);

    let server = FakeAttemptServer::new(vec![q1, q2, q3], adaptive);
    let addr = server.clone().serve().await;
    let runtime = SessionRuntime::new(SessionConfig::for_base_url(format!("http://{}/api", addr)))
        .expect("runtime");
    let surface = FlowSurface::default();
    let (exam_id, attempt_id) = {
        let inner = server.inner.lock().unwrap();
        (inner.exam_id, inner.attempt_id)
    };

    let mut controller = runtime.start_session(surface.clone(), exam_id);
    controller.initialize().await.expect("initialize");
    assert_eq!(controller.state(), SessionState::Active);
    assert_eq!(controller.navigator().len(), 3);
    assert_eq!(controller.time_remaining(), 300);
    let first = controller.navigator().current().expect("first question");
    assert!(first.question_type.has_choices());
    assert!(surface.is_fullscreen());

    let (_surface_tx, surface_rx) = surface_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(controller.run(surface_rx, cmd_rx));

    cmd_tx
        .send(SessionCommand::Answer {
            question_id: q1_id,
            value: AnswerValue::Choice(q1_choice),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    cmd_tx
        .send(SessionCommand::Answer {
            question_id: q2_id,
            value: AnswerValue::Text("Distance vector versus link state".to_string()),
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    cmd_tx.send(SessionCommand::RequestSubmit).unwrap();
    cmd_tx.send(SessionCommand::ConfirmSubmit).unwrap();

    let exit = handle.await.unwrap().expect("session run");
    let outcome = match exit {
        SessionExit::Finished(outcome) => outcome,
        SessionExit::Left => panic!("expected a finished session"),
    };
    assert_eq!(outcome.reason, FinishReason::UserSubmitted);
    assert!(!outcome.reason.is_forced());
    assert_eq!(outcome.attempt.status, AttemptStatus::Completed);
    assert_eq!(outcome.attempt.score, 1.0);
    assert!(outcome
        .log
        .iter()
        .any(|entry| entry.message.contains("Adaptive jump")));
    // Fullscreen is only dropped after the finish call went through.
    assert!(!surface.is_fullscreen());

    {
        let inner = server.inner.lock().unwrap();
        assert_eq!(inner.answers.len(), 2);
        assert_eq!(inner.finish_calls, 1);
    }

    let review = runtime
        .attempt_api
        .get_review(attempt_id)
        .await
        .expect("review");
    assert_eq!(review.status, AttemptStatus::Completed);
    assert_eq!(review.answers.len(), 2);
    assert!(review.answers.iter().all(|a| a.is_correct));

    let history = runtime.attempt_api.list_attempts().await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, attempt_id);
}

#[tokio::test]
async fn violation_limit_terminates_the_attempt() {
    init_tracing();
    let server = FakeAttemptServer::new(vec![mcq("Q1")], HashMap::new());
    let addr = server.clone().serve().await;
    let runtime = SessionRuntime::new(SessionConfig::for_base_url(format!("http://{}/api", addr)))
        .expect("runtime");
    let surface = FlowSurface::default();
    let exam_id = server.inner.lock().unwrap().exam_id;

    let mut controller = runtime.start_session(surface.clone(), exam_id);
    controller.initialize().await.expect("initialize");

    let (surface_tx, surface_rx) = surface_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(controller.run(surface_rx, cmd_rx));

    for _ in 0..3 {
        surface_tx
            .send(SurfaceEvent::VisibilityChanged(Visibility::Hidden))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let exit = handle.await.unwrap().expect("session run");
    let outcome = match exit {
        SessionExit::Finished(outcome) => outcome,
        SessionExit::Left => panic!("expected a terminated session"),
    };
    assert_eq!(outcome.reason, FinishReason::ViolationLimit);
    assert!(outcome.reason.is_forced());
    assert_eq!(outcome.attempt.violation_count, 3);
    assert_eq!(server.inner.lock().unwrap().finish_calls, 1);
    drop(cmd_tx);
}

#[tokio::test]
async fn unpublished_exam_cannot_start() {
    init_tracing();
    let server = FakeAttemptServer::new(vec![], HashMap::new());
    server.inner.lock().unwrap().exam_published = false;
    let addr = server.clone().serve().await;
    let runtime = SessionRuntime::new(SessionConfig::for_base_url(format!("http://{}/api", addr)))
        .expect("runtime");
    let exam_id = server.inner.lock().unwrap().exam_id;

    let mut controller = runtime.start_session(FlowSurface::default(), exam_id);
    let err = controller.initialize().await.expect_err("start must fail");
    assert!(err.to_string().contains("Exam is not published"));
    assert_eq!(controller.state(), SessionState::Initializing);
}

#[tokio::test]
async fn resuming_a_finished_attempt_routes_to_result() {
    init_tracing();
    let server = FakeAttemptServer::new(vec![], HashMap::new());
    server.inner.lock().unwrap().status = "COMPLETED".to_string();
    let addr = server.clone().serve().await;
    let runtime = SessionRuntime::new(SessionConfig::for_base_url(format!("http://{}/api", addr)))
        .expect("runtime");
    let attempt_id = server.inner.lock().unwrap().attempt_id;

    let controller = runtime.resume_session(FlowSurface::default(), attempt_id);
    let (surface_tx, surface_rx) = surface_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let exit = controller.run(surface_rx, cmd_rx).await.expect("run");

    match exit {
        SessionExit::Finished(outcome) => {
            assert_eq!(outcome.reason, FinishReason::AlreadyFinished);
            assert_eq!(outcome.attempt.status, AttemptStatus::Completed);
        }
        SessionExit::Left => panic!("expected routing to the result view"),
    }
    assert_eq!(server.inner.lock().unwrap().finish_calls, 0);
    drop((surface_tx, cmd_tx));
}
