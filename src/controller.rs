//! 評価コントローラ
//!
//! セッション状態・ストア・クラウドミラー・保存方針をまとめ、
//! 描画層（端末UI、テスト）から呼ぶ操作を提供する。

use crate::config::Config;
use crate::error::Result;
use crate::mirror::{CloudMirror, MirrorPayload};
use case_rater_common::{
    CaseRecord, KeyValueStore, NavigationPolicy, RatingValue, SessionState, Task, TaskSet,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// いつストアへ保存するか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// 評価・移動のたびに保存
    #[default]
    EveryChange,
    /// 明示的な保存時のみ
    Manual,
}

impl FromStr for SaveMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "every_change" | "auto" => Ok(SaveMode::EveryChange),
            "manual" => Ok(SaveMode::Manual),
            _ => Err(format!("Unknown save mode: {}. Use auto or manual", s)),
        }
    }
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveMode::EveryChange => write!(f, "every_change"),
            SaveMode::Manual => write!(f, "manual"),
        }
    }
}

/// 画面に一時表示する通知
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Webhook送信失敗（1始まりの症例番号）
    MirrorFailed { case_index: usize, task: Task, reason: String },
    /// ストアへの保存失敗
    SaveFailed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MirrorFailed {
                case_index,
                task,
                reason,
            } => write!(
                f,
                "クラウド同期に失敗しました（症例{} / {}）: {}",
                case_index,
                task.label(),
                reason
            ),
            Notice::SaveFailed => write!(f, "進捗を保存できませんでした（評価は継続できます）"),
        }
    }
}

/// セッションの開き方
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub key: String,
    pub tasks: TaskSet,
    pub navigation: NavigationPolicy,
    pub save_mode: SaveMode,
}

impl SessionOptions {
    pub fn from_config(config: &Config, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tasks: config.tasks.clone(),
            navigation: config.navigation,
            save_mode: config.save_mode,
        }
    }
}

pub struct Annotator {
    cases: Vec<CaseRecord>,
    state: SessionState,
    store: Box<dyn KeyValueStore + Send>,
    key: String,
    save_mode: SaveMode,
    mirror: Option<CloudMirror>,
    notice_tx: mpsc::UnboundedSender<Notice>,
    notice_rx: mpsc::UnboundedReceiver<Notice>,
    in_flight: Vec<JoinHandle<()>>,
    dirty: bool,
}

impl Annotator {
    /// 保存済みセッションを復元、なければ新規作成。復元できたかを返す
    pub fn open(
        cases: Vec<CaseRecord>,
        store: Box<dyn KeyValueStore + Send>,
        options: SessionOptions,
        mirror: Option<CloudMirror>,
    ) -> (Self, bool) {
        let (state, restored) = SessionState::load_or_fresh(
            store.as_ref(),
            &options.key,
            cases.len(),
            options.tasks,
            options.navigation,
        );
        if restored {
            log::info!(
                "restored session {} at case {}",
                state.session_id(),
                state.current_index() + 1
            );
        }

        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let annotator = Self {
            cases,
            state,
            store,
            key: options.key,
            save_mode: options.save_mode,
            mirror,
            notice_tx,
            notice_rx,
            in_flight: Vec::new(),
            dirty: false,
        };
        (annotator, restored)
    }

    pub fn cases(&self) -> &[CaseRecord] {
        &self.cases
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    pub fn has_mirror(&self) -> bool {
        self.mirror.is_some()
    }

    /// 未保存の変更があるか（手動保存モードのみ意味を持つ）
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn current_case(&self) -> Option<&CaseRecord> {
        self.cases.get(self.state.current_index())
    }

    pub fn current_image(&self) -> Option<&str> {
        self.current_case()
            .and_then(|case| case.image_paths.get(self.state.current_image_index()))
            .map(String::as_str)
    }

    /// 現在の症例を評価する
    pub fn rate(&mut self, task: Task, value: RatingValue) -> Result<()> {
        let index = self.state.current_index();
        self.state.set_rating(index, task, value)?;
        self.after_change();
        self.mirror_rating(index, task);
        Ok(())
    }

    /// 次の症例へ（未評価なら拒否）
    pub fn next(&mut self) -> Result<usize> {
        let before = self.state.current_index();
        let index = self.state.next_case()?;
        if index != before {
            self.after_change();
        }
        Ok(index)
    }

    pub fn previous(&mut self) -> usize {
        let before = self.state.current_index();
        let index = self.state.previous_case();
        if index != before {
            self.after_change();
        }
        index
    }

    pub fn go_to(&mut self, index: usize) -> Result<usize> {
        let before = self.state.current_index();
        let index = self.state.go_to(index)?;
        if index != before {
            self.after_change();
        }
        Ok(index)
    }

    pub fn next_image(&mut self) -> usize {
        let count = self.current_case().map(CaseRecord::image_count).unwrap_or(0);
        self.state.next_image(count)
    }

    pub fn previous_image(&mut self) -> usize {
        self.state.previous_image()
    }

    /// 明示的に保存
    pub fn save(&mut self) -> bool {
        let saved = self.state.save(self.store.as_mut(), &self.key);
        if saved {
            self.dirty = false;
        } else {
            self.notify(Notice::SaveFailed);
        }
        saved
    }

    /// 保存を消して最初からやり直す
    pub fn restart(&mut self) -> bool {
        let cleared = SessionState::clear(self.store.as_mut(), &self.key);
        self.state.reset();
        self.dirty = false;
        if self.save_mode == SaveMode::EveryChange {
            return self.save() && cleared;
        }
        cleared
    }

    /// 溜まった通知を取り出す
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notice_rx.try_recv() {
            notices.push(notice);
        }
        notices
    }

    /// 送信中のWebhookを待ってから残りの通知を返す
    pub async fn finish(mut self) -> Vec<Notice> {
        for handle in self.in_flight.drain(..) {
            if let Err(e) = handle.await {
                log::warn!("mirror task failed: {}", e);
            }
        }
        self.drain_notices()
    }

    fn after_change(&mut self) {
        match self.save_mode {
            SaveMode::EveryChange => {
                self.save();
            }
            SaveMode::Manual => self.dirty = true,
        }
    }

    fn mirror_rating(&mut self, index: usize, task: Task) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };
        let (Some(case), Some(rating)) = (self.cases.get(index), self.state.get_rating(index, task))
        else {
            return;
        };

        let payload = MirrorPayload::new(
            mirror.user_id(),
            &self.state.session_id().to_string(),
            index,
            case,
            task,
            rating,
        );
        let tx = self.notice_tx.clone();

        self.in_flight.retain(|handle| !handle.is_finished());
        self.in_flight.push(tokio::spawn(async move {
            if let Err(e) = mirror.post(&payload).await {
                log::warn!("cloud mirror failed for case {}: {}", payload.case_index, e);
                let _ = tx.send(Notice::MirrorFailed {
                    case_index: payload.case_index,
                    task: payload.task,
                    reason: e.to_string(),
                });
            }
        }));
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notice_tx.send(notice);
    }
}
