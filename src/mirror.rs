//! クラウドミラー
//!
//! 評価ごとに小さなJSONをWebhook（スプレッドシート連携など）へPOSTする。
//! ベストエフォート: 失敗はログと一時的な通知のみで、ローカル状態には影響しない。
//! URL未設定なら機能ごと無効。

use crate::config::Config;
use crate::error::{RaterError, Result};
use case_rater_common::{CaseRecord, Choice, Rating, RatingValue, SessionState, Task};
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Webhookに送るプロンプトの最大文字数
pub const PROMPT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorPayload {
    pub user_id: String,
    pub session_id: String,
    /// 1始まりの症例番号
    pub case_index: usize,
    pub task: Task,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice: Option<Choice>,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
}

impl MirrorPayload {
    pub fn new(
        user_id: &str,
        session_id: &str,
        index: usize,
        case: &CaseRecord,
        task: Task,
        rating: &Rating,
    ) -> Self {
        let (score, choice) = match rating.value {
            RatingValue::Score(score) => (Some(score.get()), None),
            RatingValue::Choice(choice) => (None, Some(choice)),
        };

        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            case_index: index + 1,
            task,
            score,
            choice,
            timestamp: rating.timestamp,
            prompt: truncate_prompt(&case.prompt, PROMPT_PREVIEW_CHARS),
        }
    }
}

/// 文字単位で切り詰める（マルチバイト文字を壊さない）
pub fn truncate_prompt(prompt: &str, max_chars: usize) -> String {
    prompt.chars().take(max_chars).collect()
}

#[derive(Debug, Clone)]
pub struct CloudMirror {
    client: reqwest::Client,
    url: String,
    user_id: String,
}

impl CloudMirror {
    pub fn new(url: impl Into<String>, user_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            user_id: user_id.into(),
        })
    }

    /// 設定からミラーを作る。URL未設定なら `None`
    pub fn from_config(config: &Config) -> Option<Self> {
        let url = config.webhook_url()?;
        let timeout = Duration::from_secs(config.request_timeout_seconds);
        match Self::new(url, config.user_id(), timeout) {
            Ok(mirror) => Some(mirror),
            Err(e) => {
                log::warn!("cloud mirror disabled: {}", e);
                None
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// 1件送信。レスポンス本文は読まない
    pub async fn post(&self, payload: &MirrorPayload) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| RaterError::Webhook(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RaterError::Webhook(format!("HTTP {}", status)));
        }

        log::debug!(
            "mirrored case {} ({}) to {}",
            payload.case_index,
            payload.task,
            self.url
        );
        Ok(())
    }

    /// 保存済みの評価をすべて順番に送信する
    pub async fn push_all(
        &self,
        cases: &[CaseRecord],
        state: &SessionState,
        pb: &ProgressBar,
    ) -> SyncReport {
        let session_id = state.session_id().to_string();
        let mut report = SyncReport::default();

        for (key, rating) in state.ratings() {
            let Some(case) = cases.get(key.index) else {
                continue;
            };
            let payload =
                MirrorPayload::new(&self.user_id, &session_id, key.index, case, key.task, rating);
            match self.post(&payload).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    log::warn!("sync failed for case {}: {}", payload.case_index, e);
                    report.failed.push((payload.case_index, key.task, e.to_string()));
                }
            }
            pb.inc(1);
        }

        report
    }
}

/// 一括送信の結果
#[derive(Debug, Default)]
pub struct SyncReport {
    pub sent: usize,
    /// (1始まりの症例番号, タスク, 理由)
    pub failed: Vec<(usize, Task, String)>,
}
