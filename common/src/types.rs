//! 症例・評価の型定義
//!
//! 症例・タスク・評価値の型:
//! - CaseRecord: データセットの1症例（画像＋プロンプト、診断ペア）
//! - Task: 評価タスク（画像評価 / 診断一致度 / ペア比較）
//! - RatingValue / Rating: 評価値とその記録時刻

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// データセットの1症例
///
/// 入力JSONの表記ゆれ（`image` / `text` / `description`、数値のID）を吸収する。
/// 未知のフィールドは `extra` に保持し、データセット加工時に失わないようにする。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,

    #[serde(default, alias = "image", deserialize_with = "one_or_many")]
    pub image_paths: Vec<String>,

    #[serde(default, alias = "text", alias = "description")]
    pub prompt: String,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub predicted_diagnosis: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub ground_truth_diagnosis: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub task3_pairs: Vec<DiagnosisPair>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CaseRecord {
    /// 画像パスとプロンプトのみの症例
    pub fn new(image_paths: Vec<String>, prompt: impl Into<String>) -> Self {
        Self {
            image_paths,
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn image_count(&self) -> usize {
        self.image_paths.len()
    }
}

/// 鑑別診断ペア（タスク3）
///
/// 数値のIDや `null` の類似度など、加工途中のデータでも読めるようにする。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisPair {
    #[serde(default, deserialize_with = "loose_text")]
    pub pair_id: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub predicted: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub ground_truth: String,
    /// 未計算なら `None`
    #[serde(default, deserialize_with = "loose_number")]
    pub similarity: Option<f64>,
}

/// 評価タスク
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// 画像＋プロンプトの品質スコア
    Image,
    /// 予測診断と正解診断の一致度スコア
    Diagnosis,
    /// 鑑別診断ペアのA/B選択
    Pair,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::Image, Task::Diagnosis, Task::Pair];

    /// このタスクが受け付ける評価値か
    pub fn accepts(&self, value: &RatingValue) -> bool {
        match self {
            Task::Image | Task::Diagnosis => matches!(value, RatingValue::Score(_)),
            Task::Pair => matches!(value, RatingValue::Choice(_)),
        }
    }

    /// 画面表示用ラベル
    pub fn label(&self) -> &'static str {
        match self {
            Task::Image => "画像評価",
            Task::Diagnosis => "診断一致度",
            Task::Pair => "鑑別診断ペア比較",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Image => write!(f, "image"),
            Task::Diagnosis => write!(f, "diagnosis"),
            Task::Pair => write!(f, "pair"),
        }
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "image" | "images" | "task1" => Ok(Task::Image),
            "diagnosis" | "task2" => Ok(Task::Diagnosis),
            "pair" | "pairs" | "task3" => Ok(Task::Pair),
            _ => Err(format!("Unknown task: {}. Use image, diagnosis, or pair", s)),
        }
    }
}

/// セッションで評価するタスクの並び（空でなく重複なし）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Task>", into = "Vec<Task>")]
pub struct TaskSet(Vec<Task>);

impl TaskSet {
    pub fn new(tasks: Vec<Task>) -> Result<Self> {
        if tasks.is_empty() {
            return Err(Error::Config("at least one task is required".into()));
        }
        let mut unique = Vec::with_capacity(tasks.len());
        for task in tasks {
            if !unique.contains(&task) {
                unique.push(task);
            }
        }
        Ok(Self(unique))
    }

    pub fn single(task: Task) -> Self {
        Self(vec![task])
    }

    pub fn contains(&self, task: Task) -> bool {
        self.0.contains(&task)
    }

    pub fn iter(&self) -> impl Iterator<Item = Task> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Task] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TaskSet {
    fn default() -> Self {
        Self::single(Task::Image)
    }
}

impl TryFrom<Vec<Task>> for TaskSet {
    type Error = Error;

    fn try_from(tasks: Vec<Task>) -> Result<Self> {
        Self::new(tasks)
    }
}

impl From<TaskSet> for Vec<Task> {
    fn from(set: TaskSet) -> Self {
        set.0
    }
}

/// 1〜4のスコア
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Score::new(value).ok_or_else(|| {
            format!("score must be between {} and {}, got {}", Score::MIN, Score::MAX, value)
        })
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// A/B選択
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

/// 評価値（スコアまたはA/B選択）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingValue {
    Score(Score),
    Choice(Choice),
}

impl fmt::Display for RatingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingValue::Score(score) => write!(f, "{}", score.get()),
            RatingValue::Choice(Choice::A) => write!(f, "A"),
            RatingValue::Choice(Choice::B) => write!(f, "B"),
        }
    }
}

impl FromStr for RatingValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "a" | "A" => Ok(RatingValue::Choice(Choice::A)),
            "b" | "B" => Ok(RatingValue::Choice(Choice::B)),
            other => other
                .parse::<u8>()
                .ok()
                .and_then(Score::new)
                .map(RatingValue::Score)
                .ok_or_else(|| format!("Unknown rating: {}. Use 1-4, A, or B", s)),
        }
    }
}

/// 記録済みの評価
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub value: RatingValue,
    pub timestamp: DateTime<Utc>,
}

/// 文字列・数値どちらのIDも文字列として読む
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(serde::de::Error::custom("expected a string or number")),
    }
}

/// `loose_string` の欠損を空文字にしたもの
fn loose_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(loose_string(deserializer)?.unwrap_or_default())
}

/// 数値・数値文字列を受け付け、それ以外は未設定とみなす
fn loose_number<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// 単一パスと配列の両方を受け付ける
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(path)) if path.is_empty() => Vec::new(),
        Some(OneOrMany::One(path)) => vec![path],
        Some(OneOrMany::Many(paths)) => paths,
        None => Vec::new(),
    })
}
