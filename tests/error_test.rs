//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use case_rater::error::RaterError;
use case_rater::loader;
use case_rater_common::Error;
use std::time::Duration;
use tempfile::tempdir;

const TIMEOUT: Duration = Duration::from_secs(5);

/// 存在しないデータセット
#[tokio::test]
async fn test_fetch_nonexistent_file() {
    let result = loader::fetch_dataset("/nonexistent/path/12345.json", TIMEOUT).await;
    assert!(matches!(result, Err(RaterError::FileNotFound(_))));
}

/// 必須フィールドの欠けた症例はメッセージに症例番号が入る
#[tokio::test]
async fn test_fetch_dataset_missing_prompt() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("data.json");
    std::fs::write(
        &path,
        r#"[{"image_paths": ["a.png"], "prompt": "ok"}, {"image_paths": ["b.png"]}]"#,
    )
    .unwrap();

    let err = loader::fetch_dataset(path.to_str().unwrap(), TIMEOUT)
        .await
        .unwrap_err();
    match err {
        RaterError::DatasetLoad(message) => assert!(message.contains("case 2"), "{}", message),
        other => panic!("unexpected error: {}", other),
    }
}

/// JSON配列でないデータセット
#[tokio::test]
async fn test_fetch_dataset_not_array() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("data.json");
    std::fs::write(&path, r#"{"cases": []}"#).unwrap();

    let result = loader::fetch_dataset(path.to_str().unwrap(), TIMEOUT).await;
    assert!(matches!(result, Err(RaterError::DatasetLoad(_))));
}

/// 共通ライブラリのエラーはそのまま表示される
#[test]
fn test_common_error_is_transparent() {
    let err: RaterError = Error::NavigationBlocked(0).into();
    assert_eq!(err.to_string(), "Case 1 must be rated before moving on");
}

/// RaterErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        RaterError::Config("テスト設定エラー".to_string()),
        RaterError::DatasetLoad("data.json".to_string()),
        RaterError::FileNotFound("data.json".to_string()),
        RaterError::Webhook("HTTP 500".to_string()),
        RaterError::Prompt("入力中断".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty());
        assert!(display.contains(':'));
    }
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: RaterError = io_err.into();
    assert!(matches!(err, RaterError::Io(_)));
    assert!(err.to_string().contains("denied"));
}
