//! 評価セッション状態
//!
//! カーソル（症例・画像）、(症例, タスク) ごとの評価、開始時刻を保持する。
//! 永続化はキー・バリューストア経由で、失敗は `bool` で返し呼び出し側を止めない。
//!
//! 不変条件:
//! - `current_index` は常に `0..=dataset_len`
//! - `current_index == dataset_len` のときのみ完了
//! - 評価キーの症例番号は `dataset_len` 未満、タスクはセッションのタスクに含まれる

use crate::error::{Error, Result};
use crate::store::KeyValueStore;
use crate::types::{Rating, RatingValue, Task, TaskSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 保存形式のバージョン
pub const STATE_VERSION: u32 = 1;

/// 未評価の症例から先へ進めるか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    /// 現在の症例の全タスクを評価するまで前進できない
    #[default]
    Blocking,
    /// 自由に移動できる
    Free,
}

impl FromStr for NavigationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blocking" | "block" => Ok(NavigationPolicy::Blocking),
            "free" => Ok(NavigationPolicy::Free),
            _ => Err(format!("Unknown navigation policy: {}. Use blocking or free", s)),
        }
    }
}

impl fmt::Display for NavigationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationPolicy::Blocking => write!(f, "blocking"),
            NavigationPolicy::Free => write!(f, "free"),
        }
    }
}

/// 評価のキー
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RatingKey {
    pub index: usize,
    pub task: Task,
}

/// 進捗
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// 全タスク評価済みの症例数
    pub rated_cases: usize,
    pub total: usize,
    pub percent: f64,
}

/// 評価セッション
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: Uuid,
    tasks: TaskSet,
    dataset_len: usize,
    current_index: usize,
    current_image_index: usize,
    ratings: BTreeMap<RatingKey, Rating>,
    navigation: NavigationPolicy,
    start_time: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl SessionState {
    pub fn new(dataset_len: usize, tasks: TaskSet, navigation: NavigationPolicy) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            tasks,
            dataset_len,
            current_index: 0,
            current_image_index: 0,
            ratings: BTreeMap::new(),
            navigation,
            start_time: now,
            last_modified: now,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn dataset_len(&self) -> usize {
        self.dataset_len
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_image_index(&self) -> usize {
        self.current_image_index
    }

    pub fn navigation(&self) -> NavigationPolicy {
        self.navigation
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// 全評価（症例番号→タスク順）
    pub fn ratings(&self) -> impl Iterator<Item = (&RatingKey, &Rating)> {
        self.ratings.iter()
    }

    // =============================================
    // 評価
    // =============================================

    /// 評価を記録（既存の評価は上書き）
    pub fn set_rating(&mut self, index: usize, task: Task, value: RatingValue) -> Result<()> {
        self.set_rating_at(index, task, value, Utc::now())
    }

    /// 記録時刻を指定して評価を記録
    pub fn set_rating_at(
        &mut self,
        index: usize,
        task: Task,
        value: RatingValue,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if index >= self.dataset_len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.dataset_len,
            });
        }
        if !self.tasks.contains(task) {
            return Err(Error::UnknownTask(task));
        }
        if !task.accepts(&value) {
            return Err(Error::ValueMismatch { task, value });
        }

        self.ratings.insert(
            RatingKey { index, task },
            Rating {
                value,
                timestamp: at,
            },
        );
        self.last_modified = at;
        Ok(())
    }

    /// 評価を取得（範囲外・未評価は `None`）
    pub fn get_rating(&self, index: usize, task: Task) -> Option<&Rating> {
        self.ratings.get(&RatingKey { index, task })
    }

    /// 症例の全タスクが評価済みか
    pub fn is_case_rated(&self, index: usize) -> bool {
        index < self.dataset_len && self.tasks.iter().all(|task| self.get_rating(index, task).is_some())
    }

    /// 症例の未評価タスク
    pub fn pending_tasks(&self, index: usize) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|&task| self.get_rating(index, task).is_none())
            .collect()
    }

    /// 記録済みの評価数
    pub fn total_rated(&self) -> usize {
        self.ratings.len()
    }

    /// 全タスク評価済みの症例数
    pub fn rated_cases(&self) -> usize {
        (0..self.dataset_len).filter(|&i| self.is_case_rated(i)).count()
    }

    /// 最初の未評価症例
    pub fn first_unrated(&self) -> Option<usize> {
        (0..self.dataset_len).find(|&i| !self.is_case_rated(i))
    }

    pub fn is_complete(&self) -> bool {
        self.current_index == self.dataset_len
    }

    pub fn progress(&self) -> Progress {
        let rated_cases = self.rated_cases();
        let percent = if self.dataset_len == 0 {
            0.0
        } else {
            rated_cases as f64 * 100.0 / self.dataset_len as f64
        };
        Progress {
            rated_cases,
            total: self.dataset_len,
            percent,
        }
    }

    // =============================================
    // ナビゲーション
    // =============================================

    /// 次の症例へ（完了状態では何もしない）
    pub fn next_case(&mut self) -> Result<usize> {
        if self.is_complete() {
            return Ok(self.current_index);
        }
        if self.navigation == NavigationPolicy::Blocking && !self.is_case_rated(self.current_index) {
            return Err(Error::NavigationBlocked(self.current_index));
        }
        self.move_to(self.current_index + 1);
        Ok(self.current_index)
    }

    /// 前の症例へ
    pub fn previous_case(&mut self) -> usize {
        if self.current_index > 0 {
            self.move_to(self.current_index - 1);
        }
        self.current_index
    }

    /// 指定症例へ移動（`dataset_len` は完了位置）
    pub fn go_to(&mut self, index: usize) -> Result<usize> {
        if index > self.dataset_len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.dataset_len,
            });
        }
        if self.navigation == NavigationPolicy::Blocking && index > self.current_index {
            if let Some(unrated) = (0..index).find(|&i| !self.is_case_rated(i)) {
                return Err(Error::NavigationBlocked(unrated));
            }
        }
        if index != self.current_index {
            self.move_to(index);
        }
        Ok(self.current_index)
    }

    /// 次の画像へ（最後の画像で止まる）
    pub fn next_image(&mut self, image_count: usize) -> usize {
        if self.current_image_index + 1 < image_count {
            self.current_image_index += 1;
        }
        self.current_image_index
    }

    /// 前の画像へ
    pub fn previous_image(&mut self) -> usize {
        self.current_image_index = self.current_image_index.saturating_sub(1);
        self.current_image_index
    }

    fn move_to(&mut self, index: usize) {
        self.current_index = index;
        self.current_image_index = 0;
        self.last_modified = Utc::now();
    }

    /// 新しいセッションとしてやり直す
    pub fn reset(&mut self) {
        *self = Self::new(self.dataset_len, self.tasks.clone(), self.navigation);
    }

    // =============================================
    // 永続化
    // =============================================

    /// 保存用JSON
    pub fn to_json(&self) -> Result<String> {
        let persisted = PersistedSession {
            version: STATE_VERSION,
            session_id: self.session_id,
            tasks: self.tasks.as_slice().to_vec(),
            dataset_len: self.dataset_len,
            current_index: self.current_index,
            current_image_index: self.current_image_index,
            ratings: self
                .ratings
                .iter()
                .map(|(key, rating)| PersistedRating {
                    index: key.index,
                    task: key.task,
                    value: rating.value,
                    timestamp: rating.timestamp,
                })
                .collect(),
            start_time: self.start_time,
            last_modified: self.last_modified,
        };
        Ok(serde_json::to_string(&persisted)?)
    }

    /// 保存用JSONから復元
    ///
    /// タスクとナビゲーション方針は現在の設定を使う。データセットの範囲外や
    /// 設定にないタスクの評価は捨てる。
    pub fn from_json(
        text: &str,
        dataset_len: usize,
        tasks: TaskSet,
        navigation: NavigationPolicy,
    ) -> Result<Self> {
        let persisted: PersistedSession = serde_json::from_str(text)?;

        if persisted.version != STATE_VERSION {
            return Err(Error::Store(format!(
                "unsupported state version {} (expected {})",
                persisted.version, STATE_VERSION
            )));
        }
        if persisted.dataset_len != dataset_len {
            return Err(Error::Store(format!(
                "saved session covers {} cases but the dataset has {}",
                persisted.dataset_len, dataset_len
            )));
        }

        let current_index = persisted.current_index.min(dataset_len);
        let mut state = Self {
            session_id: persisted.session_id,
            tasks,
            dataset_len,
            current_index,
            current_image_index: if current_index == dataset_len {
                0
            } else {
                persisted.current_image_index
            },
            ratings: BTreeMap::new(),
            navigation,
            start_time: persisted.start_time,
            last_modified: persisted.last_modified,
        };

        let mut dropped = 0;
        for rating in persisted.ratings {
            let valid = rating.index < dataset_len
                && state.tasks.contains(rating.task)
                && rating.task.accepts(&rating.value);
            if valid {
                state.ratings.insert(
                    RatingKey {
                        index: rating.index,
                        task: rating.task,
                    },
                    Rating {
                        value: rating.value,
                        timestamp: rating.timestamp,
                    },
                );
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!("discarded {} saved ratings that do not fit the current session", dropped);
        }

        Ok(state)
    }

    /// ストアに保存。失敗時は `false`
    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S, key: &str) -> bool {
        let result = self.to_json().and_then(|json| store.set(key, &json));
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to save session `{}`: {}", key, e);
                false
            }
        }
    }

    /// ストアから復元。保存がない・壊れている場合は新規セッションと `false`
    pub fn load_or_fresh<S: KeyValueStore + ?Sized>(
        store: &S,
        key: &str,
        dataset_len: usize,
        tasks: TaskSet,
        navigation: NavigationPolicy,
    ) -> (Self, bool) {
        let saved = match store.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return (Self::new(dataset_len, tasks, navigation), false),
            Err(e) => {
                log::warn!("failed to read session `{}`: {}", key, e);
                return (Self::new(dataset_len, tasks, navigation), false);
            }
        };

        match Self::from_json(&saved, dataset_len, tasks.clone(), navigation) {
            Ok(state) => (state, true),
            Err(e) => {
                log::warn!("ignoring saved session `{}`: {}", key, e);
                (Self::new(dataset_len, tasks, navigation), false)
            }
        }
    }

    /// 保存済みセッションのタスク構成（保存がない・読めない場合は `None`）
    pub fn saved_tasks<S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Option<TaskSet> {
        let text = store.get(key).ok().flatten()?;
        let persisted: PersistedSession = serde_json::from_str(&text).ok()?;
        TaskSet::new(persisted.tasks).ok()
    }

    /// ストアから削除。失敗時は `false`
    pub fn clear<S: KeyValueStore + ?Sized>(store: &mut S, key: &str) -> bool {
        match store.remove(key) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to clear session `{}`: {}", key, e);
                false
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    version: u32,
    session_id: Uuid,
    tasks: Vec<Task>,
    dataset_len: usize,
    current_index: usize,
    #[serde(default)]
    current_image_index: usize,
    ratings: Vec<PersistedRating>,
    start_time: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedRating {
    index: usize,
    task: Task,
    value: RatingValue,
    timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Choice, Score};

    fn score(v: u8) -> RatingValue {
        RatingValue::Score(Score::new(v).unwrap())
    }

    fn session(len: usize) -> SessionState {
        SessionState::new(len, TaskSet::default(), NavigationPolicy::Blocking)
    }

    /// ストア操作が常に失敗するストア
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Store("quota exceeded".into()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Store("quota exceeded".into()))
        }

        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(Error::Store("quota exceeded".into()))
        }
    }

    #[test]
    fn test_get_rating_out_of_range_is_none() {
        let mut state = session(3);
        state.set_rating(2, Task::Image, score(1)).unwrap();

        for i in [3, 4, 100, usize::MAX] {
            assert!(state.get_rating(i, Task::Image).is_none());
        }
        assert!(state.get_rating(2, Task::Diagnosis).is_none());
    }

    #[test]
    fn test_set_rating_overwrites() {
        let mut state = session(2);
        state.set_rating(0, Task::Image, score(1)).unwrap();
        state.set_rating(0, Task::Image, score(4)).unwrap();

        assert_eq!(state.get_rating(0, Task::Image).unwrap().value, score(4));
        assert_eq!(state.total_rated(), 1);
    }

    #[test]
    fn test_set_rating_idempotent() {
        let mut once = session(3);
        once.set_rating(1, Task::Image, score(2)).unwrap();

        let mut many = session(3);
        for _ in 0..5 {
            many.set_rating(1, Task::Image, score(2)).unwrap();
        }

        let values = |s: &SessionState| {
            s.ratings()
                .map(|(k, r)| (*k, r.value))
                .collect::<Vec<_>>()
        };
        assert_eq!(values(&once), values(&many));
        assert_eq!(once.current_index(), many.current_index());
    }

    #[test]
    fn test_set_rating_rejects_invalid() {
        let mut state = session(2);

        assert!(matches!(
            state.set_rating(2, Task::Image, score(1)),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            state.set_rating(0, Task::Pair, RatingValue::Choice(Choice::A)),
            Err(Error::UnknownTask(Task::Pair))
        ));
        assert!(matches!(
            state.set_rating(0, Task::Image, RatingValue::Choice(Choice::A)),
            Err(Error::ValueMismatch { .. })
        ));
        assert_eq!(state.total_rated(), 0);
    }

    #[test]
    fn test_is_complete_only_at_end() {
        let mut state = SessionState::new(4, TaskSet::default(), NavigationPolicy::Free);
        for expected in 0..4 {
            assert_eq!(state.current_index(), expected);
            assert!(!state.is_complete());
            state.next_case().unwrap();
        }
        assert!(state.is_complete());

        // 完了後の前進は何もしない
        assert_eq!(state.next_case().unwrap(), 4);
        assert!(state.is_complete());
    }

    #[test]
    fn test_empty_dataset_is_complete() {
        let state = session(0);
        assert!(state.is_complete());
        assert_eq!(state.progress().percent, 0.0);
    }

    #[test]
    fn test_forward_navigation_blocked_until_rated() {
        let mut state = session(3);
        state.set_rating(0, Task::Image, score(3)).unwrap();

        assert_eq!(state.next_case().unwrap(), 1);
        assert!(matches!(state.next_case(), Err(Error::NavigationBlocked(1))));
        assert_eq!(state.current_index(), 1);

        state.set_rating(1, Task::Image, score(2)).unwrap();
        assert_eq!(state.next_case().unwrap(), 2);
        assert!(matches!(state.next_case(), Err(Error::NavigationBlocked(2))));

        state.set_rating(2, Task::Image, score(4)).unwrap();
        assert_eq!(state.next_case().unwrap(), 3);
        assert!(state.is_complete());
    }

    #[test]
    fn test_blocking_requires_every_task() {
        let tasks = TaskSet::new(vec![Task::Image, Task::Pair]).unwrap();
        let mut state = SessionState::new(2, tasks, NavigationPolicy::Blocking);

        state.set_rating(0, Task::Image, score(3)).unwrap();
        assert_eq!(state.pending_tasks(0), vec![Task::Pair]);
        assert!(state.next_case().is_err());

        state.set_rating(0, Task::Pair, RatingValue::Choice(Choice::B)).unwrap();
        assert!(state.is_case_rated(0));
        assert_eq!(state.next_case().unwrap(), 1);
    }

    #[test]
    fn test_go_to() {
        let mut state = session(3);
        assert!(matches!(state.go_to(2), Err(Error::NavigationBlocked(0))));
        assert!(matches!(state.go_to(4), Err(Error::IndexOutOfRange { .. })));

        state.set_rating(0, Task::Image, score(1)).unwrap();
        state.set_rating(1, Task::Image, score(1)).unwrap();
        assert_eq!(state.go_to(2).unwrap(), 2);
        assert_eq!(state.go_to(0).unwrap(), 0);

        let mut free = SessionState::new(3, TaskSet::default(), NavigationPolicy::Free);
        assert_eq!(free.go_to(3).unwrap(), 3);
        assert!(free.is_complete());
    }

    #[test]
    fn test_image_cursor() {
        let mut state = SessionState::new(2, TaskSet::default(), NavigationPolicy::Free);
        assert_eq!(state.next_image(3), 1);
        assert_eq!(state.next_image(3), 2);
        assert_eq!(state.next_image(3), 2);
        assert_eq!(state.previous_image(), 1);

        state.next_case().unwrap();
        assert_eq!(state.current_image_index(), 0);
        assert_eq!(state.previous_image(), 0);
        assert_eq!(state.next_image(0), 0);
    }

    #[test]
    fn test_previous_case_saturates() {
        let mut state = session(2);
        assert_eq!(state.previous_case(), 0);
    }

    #[test]
    fn test_progress_counts_complete_cases() {
        let tasks = TaskSet::new(vec![Task::Image, Task::Diagnosis]).unwrap();
        let mut state = SessionState::new(4, tasks, NavigationPolicy::Free);
        state.set_rating(0, Task::Image, score(1)).unwrap();
        state.set_rating(0, Task::Diagnosis, score(2)).unwrap();
        state.set_rating(1, Task::Image, score(3)).unwrap();

        let progress = state.progress();
        assert_eq!(progress.rated_cases, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percent, 25.0);
        assert_eq!(state.total_rated(), 3);
        assert_eq!(state.first_unrated(), Some(1));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut store = MemoryStore::new();
        let tasks = TaskSet::new(vec![Task::Image, Task::Pair]).unwrap();
        let mut state = SessionState::new(3, tasks.clone(), NavigationPolicy::Blocking);
        state.set_rating(0, Task::Image, score(3)).unwrap();
        state.set_rating(0, Task::Pair, RatingValue::Choice(Choice::A)).unwrap();
        state.next_case().unwrap();
        state.set_rating(1, Task::Image, score(1)).unwrap();
        state.next_image(4);

        assert!(state.save(&mut store, "session"));

        let (restored, ok) =
            SessionState::load_or_fresh(&store, "session", 3, tasks, NavigationPolicy::Blocking);
        assert!(ok);
        assert_eq!(restored.session_id(), state.session_id());
        assert_eq!(restored.current_index(), 1);
        assert_eq!(restored.current_image_index(), 1);

        let values = |s: &SessionState| {
            s.ratings()
                .map(|(k, r)| (*k, r.value))
                .collect::<Vec<_>>()
        };
        assert_eq!(values(&restored), values(&state));
    }

    #[test]
    fn test_load_missing_or_corrupt_falls_back() {
        let mut store = MemoryStore::new();

        let (fresh, ok) =
            SessionState::load_or_fresh(&store, "none", 2, TaskSet::default(), NavigationPolicy::Blocking);
        assert!(!ok);
        assert_eq!(fresh.total_rated(), 0);

        store.set("bad", "{not json").unwrap();
        let (fresh, ok) =
            SessionState::load_or_fresh(&store, "bad", 2, TaskSet::default(), NavigationPolicy::Blocking);
        assert!(!ok);
        assert_eq!(fresh.current_index(), 0);
    }

    #[test]
    fn test_load_rejects_dataset_length_change() {
        let mut store = MemoryStore::new();
        let mut state = session(3);
        state.set_rating(0, Task::Image, score(2)).unwrap();
        assert!(state.save(&mut store, "k"));

        let (fresh, ok) =
            SessionState::load_or_fresh(&store, "k", 5, TaskSet::default(), NavigationPolicy::Blocking);
        assert!(!ok);
        assert_eq!(fresh.total_rated(), 0);
    }

    #[test]
    fn test_load_drops_ratings_for_other_tasks() {
        let mut store = MemoryStore::new();
        let tasks = TaskSet::new(vec![Task::Image, Task::Diagnosis]).unwrap();
        let mut state = SessionState::new(2, tasks, NavigationPolicy::Free);
        state.set_rating(0, Task::Image, score(2)).unwrap();
        state.set_rating(0, Task::Diagnosis, score(4)).unwrap();
        assert!(state.save(&mut store, "k"));

        let (restored, ok) =
            SessionState::load_or_fresh(&store, "k", 2, TaskSet::default(), NavigationPolicy::Free);
        assert!(ok);
        assert_eq!(restored.total_rated(), 1);
        assert!(restored.get_rating(0, Task::Diagnosis).is_none());

        let saved = SessionState::saved_tasks(&store, "k").unwrap();
        assert_eq!(saved.as_slice(), &[Task::Image, Task::Diagnosis]);
        assert!(SessionState::saved_tasks(&store, "missing").is_none());
    }

    #[test]
    fn test_load_clamps_cursor() {
        let mut store = MemoryStore::new();
        let json = serde_json::json!({
            "version": STATE_VERSION,
            "sessionId": Uuid::new_v4(),
            "tasks": ["image"],
            "datasetLen": 2,
            "currentIndex": 9,
            "currentImageIndex": 3,
            "ratings": [
                {"index": 0, "task": "image", "value": 2, "timestamp": "2026-01-01T00:00:00Z"},
                {"index": 5, "task": "image", "value": 2, "timestamp": "2026-01-01T00:00:00Z"}
            ],
            "startTime": "2026-01-01T00:00:00Z",
            "lastModified": "2026-01-01T00:00:00Z"
        });
        store.set("k", &json.to_string()).unwrap();

        let (restored, ok) =
            SessionState::load_or_fresh(&store, "k", 2, TaskSet::default(), NavigationPolicy::Free);
        assert!(ok);
        assert_eq!(restored.current_index(), 2);
        assert_eq!(restored.current_image_index(), 0);
        assert!(restored.is_complete());
        assert_eq!(restored.total_rated(), 1);
    }

    #[test]
    fn test_store_failures_are_reported_not_raised() {
        let mut broken = BrokenStore;
        let state = session(1);

        assert!(!state.save(&mut broken, "k"));
        assert!(!SessionState::clear(&mut broken, "k"));

        let (fresh, ok) =
            SessionState::load_or_fresh(&broken, "k", 1, TaskSet::default(), NavigationPolicy::Blocking);
        assert!(!ok);
        assert_eq!(fresh.dataset_len(), 1);
    }

    #[test]
    fn test_clear_and_reset() {
        let mut store = MemoryStore::new();
        let mut state = session(2);
        state.set_rating(0, Task::Image, score(2)).unwrap();
        let old_id = state.session_id();
        assert!(state.save(&mut store, "k"));

        assert!(SessionState::clear(&mut store, "k"));
        assert!(store.get("k").unwrap().is_none());

        state.reset();
        assert_ne!(state.session_id(), old_id);
        assert_eq!(state.total_rated(), 0);
        assert_eq!(state.current_index(), 0);
    }
}
