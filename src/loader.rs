//! データセット取得
//!
//! ローカルファイルまたは http(s) URL からJSONを取得して検証する。
//! 再試行はしない。失敗はそのままコマンドのエラーになる。

use crate::error::{RaterError, Result};
use case_rater_common::{parse_dataset, CaseRecord};
use std::path::Path;
use std::time::Duration;

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// データセットを取得して検証
pub async fn fetch_dataset(source: &str, timeout: Duration) -> Result<Vec<CaseRecord>> {
    let text = if is_url(source) {
        fetch_remote(source, timeout).await?
    } else {
        read_local(Path::new(source))?
    };

    let cases = parse_dataset(&text).map_err(|e| RaterError::DatasetLoad(e.to_string()))?;
    log::info!("loaded {} cases from {}", cases.len(), source);
    Ok(cases)
}

fn read_local(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(RaterError::FileNotFound(path.display().to_string()));
    }
    std::fs::read_to_string(path)
        .map_err(|e| RaterError::DatasetLoad(format!("{}: {}", path.display(), e)))
}

async fn fetch_remote(url: &str, timeout: Duration) -> Result<String> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RaterError::DatasetLoad(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(RaterError::DatasetLoad(format!(
            "{}: HTTP {}",
            url,
            response.status()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| RaterError::DatasetLoad(format!("{}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.org/data.json"));
        assert!(is_url("http://localhost:8000/data.json"));
        assert!(!is_url("data.json"));
        assert!(!is_url("/srv/http://odd"));
    }

    #[tokio::test]
    async fn test_fetch_local_dataset() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"[{"image_paths": ["a.jpg"], "prompt": "p"}]"#).unwrap();

        let cases = fetch_dataset(path.to_str().unwrap(), Duration::from_secs(1))
            .await
            .expect("読み込み失敗");
        assert_eq!(cases.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let result = fetch_dataset("/nonexistent/path/12345.json", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(RaterError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_invalid_shape() {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"not": "an array"}"#).unwrap();

        let result = fetch_dataset(path.to_str().unwrap(), Duration::from_secs(1)).await;
        match result {
            Err(RaterError::DatasetLoad(msg)) => assert!(msg.contains("expected a JSON array")),
            other => panic!("unexpected result: {:?}", other.map(|c| c.len())),
        }
    }
}
