//! クラウドミラーの統合テスト
//!
//! ローカルのaxumサーバでWebhookの受信内容を確認する

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use case_rater::controller::{Annotator, Notice, SaveMode, SessionOptions};
use case_rater::mirror::{CloudMirror, MirrorPayload};
use case_rater_common::{
    CaseRecord, Choice, MemoryStore, NavigationPolicy, Rating, RatingValue, Score, SessionState,
    Task, TaskSet,
};
use chrono::Utc;
use indicatif::ProgressBar;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Received = Arc<Mutex<Vec<Value>>>;

async fn record(
    State((received, status)): State<(Received, StatusCode)>,
    Json(body): Json<Value>,
) -> StatusCode {
    received.lock().unwrap().push(body);
    status
}

/// 指定ステータスを返すWebhookサーバを起動
async fn spawn_webhook(status: StatusCode) -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/hook", post(record))
        .with_state((received.clone(), status));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/hook", addr), received)
}

fn mirror_for(url: &str) -> CloudMirror {
    CloudMirror::new(url, "rater-7", Duration::from_secs(5)).unwrap()
}

fn create_cases() -> Vec<CaseRecord> {
    vec![
        CaseRecord::new(vec!["images/1.png".into()], "皮".repeat(120)),
        CaseRecord::new(vec!["images/2.png".into()], "second case"),
    ]
}

fn open(mirror: CloudMirror, tasks: Vec<Task>) -> Annotator {
    let options = SessionOptions {
        key: "case-rater/mirror".to_string(),
        tasks: TaskSet::new(tasks).unwrap(),
        navigation: NavigationPolicy::Blocking,
        save_mode: SaveMode::EveryChange,
    };
    let (annotator, _) = Annotator::open(
        create_cases(),
        Box::new(MemoryStore::new()),
        options,
        Some(mirror),
    );
    annotator
}

#[tokio::test]
async fn test_post_sends_camel_case_payload() {
    let (url, received) = spawn_webhook(StatusCode::OK).await;
    let mirror = mirror_for(&url);

    let cases = create_cases();
    let rating = Rating {
        value: RatingValue::Score(Score::new(4).unwrap()),
        timestamp: Utc::now(),
    };
    let payload = MirrorPayload::new("rater-7", "session-1", 0, &cases[0], Task::Image, &rating);
    mirror.post(&payload).await.unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let body = &received[0];
    assert_eq!(body["userId"], "rater-7");
    assert_eq!(body["sessionId"], "session-1");
    assert_eq!(body["caseIndex"], 1);
    assert_eq!(body["task"], "image");
    assert_eq!(body["score"], 4);
    assert_eq!(body["prompt"].as_str().unwrap().chars().count(), 100);
}

#[tokio::test]
async fn test_post_non_success_status_is_error() {
    let (url, _) = spawn_webhook(StatusCode::INTERNAL_SERVER_ERROR).await;
    let mirror = mirror_for(&url);

    let cases = create_cases();
    let rating = Rating {
        value: RatingValue::Choice(Choice::A),
        timestamp: Utc::now(),
    };
    let payload = MirrorPayload::new("u", "s", 1, &cases[1], Task::Pair, &rating);
    assert!(mirror.post(&payload).await.is_err());
}

#[tokio::test]
async fn test_annotator_mirrors_each_rating() {
    let (url, received) = spawn_webhook(StatusCode::OK).await;
    let mut annotator = open(mirror_for(&url), vec![Task::Image]);

    annotator
        .rate(Task::Image, RatingValue::Score(Score::new(2).unwrap()))
        .unwrap();
    annotator.next().unwrap();
    annotator
        .rate(Task::Image, RatingValue::Score(Score::new(3).unwrap()))
        .unwrap();

    let notices = annotator.finish().await;
    assert!(notices.is_empty());

    let received = received.lock().unwrap();
    let mut indexes: Vec<i64> = received
        .iter()
        .map(|body| body["caseIndex"].as_i64().unwrap())
        .collect();
    indexes.sort();
    assert_eq!(indexes, vec![1, 2]);
}

/// 送信失敗は通知になるだけで、評価と移動は続けられる
#[tokio::test]
async fn test_mirror_failure_does_not_touch_state() {
    let (url, _) = spawn_webhook(StatusCode::SERVICE_UNAVAILABLE).await;
    let mut annotator = open(mirror_for(&url), vec![Task::Pair]);

    annotator
        .rate(Task::Pair, RatingValue::Choice(Choice::B))
        .unwrap();
    assert_eq!(annotator.next().unwrap(), 1);

    let rating = annotator.state().get_rating(0, Task::Pair).unwrap().value;
    assert_eq!(rating, RatingValue::Choice(Choice::B));

    let notices = annotator.finish().await;
    assert_eq!(notices.len(), 1);
    match &notices[0] {
        Notice::MirrorFailed {
            case_index, task, ..
        } => {
            assert_eq!(*case_index, 1);
            assert_eq!(*task, Task::Pair);
        }
        other => panic!("unexpected notice: {:?}", other),
    }
}

#[tokio::test]
async fn test_push_all_reports_counts() {
    let (url, received) = spawn_webhook(StatusCode::OK).await;
    let mirror = mirror_for(&url);

    let cases = create_cases();
    let tasks = TaskSet::new(vec![Task::Image, Task::Diagnosis]).unwrap();
    let mut state = SessionState::new(cases.len(), tasks, NavigationPolicy::Free);
    for index in 0..2 {
        state
            .set_rating(index, Task::Image, RatingValue::Score(Score::new(1).unwrap()))
            .unwrap();
    }
    state
        .set_rating(1, Task::Diagnosis, RatingValue::Score(Score::new(4).unwrap()))
        .unwrap();

    let pb = ProgressBar::hidden();
    let report = mirror.push_all(&cases, &state, &pb).await;

    assert_eq!(report.sent, 3);
    assert!(report.failed.is_empty());
    assert_eq!(pb.position(), 3);
    assert_eq!(received.lock().unwrap().len(), 3);
}
