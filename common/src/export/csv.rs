//! CSVエクスポート
//!
//! 表計算ソフトで文字化けしないようBOM付きUTF-8。自由記述の列は常に
//! ダブルクォートで囲み、内部の `"` は `""` にする。

use crate::session::SessionState;
use crate::types::{CaseRecord, Rating, Task};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const UTF8_BOM: &str = "\u{FEFF}";

pub const CSV_HEADER: &str =
    "Index,CaseId,Task,Images,Prompt,PredictedDiagnosis,GroundTruthDiagnosis,Rating,Timestamp";

/// 出力する行の範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvRows {
    /// 評価済みの (症例, タスク) のみ
    #[default]
    RatedOnly,
    /// 全症例×全タスク（未評価は空欄）
    AllCases,
}

impl FromStr for CsvRows {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rated" | "rated_only" => Ok(CsvRows::RatedOnly),
            "all" | "all_cases" => Ok(CsvRows::AllCases),
            _ => Err(format!("Unknown CSV row mode: {}. Use rated or all", s)),
        }
    }
}

impl fmt::Display for CsvRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvRows::RatedOnly => write!(f, "rated_only"),
            CsvRows::AllCases => write!(f, "all_cases"),
        }
    }
}

/// CSV文字列を生成
pub fn to_csv(cases: &[CaseRecord], state: &SessionState, rows: CsvRows) -> String {
    let mut lines = vec![format!("{}{}", UTF8_BOM, CSV_HEADER)];

    match rows {
        CsvRows::RatedOnly => {
            for (key, rating) in state.ratings() {
                if let Some(case) = cases.get(key.index) {
                    lines.push(csv_row(key.index, case, key.task, Some(rating)));
                }
            }
        }
        CsvRows::AllCases => {
            for (index, case) in cases.iter().enumerate() {
                for task in state.tasks().iter() {
                    lines.push(csv_row(index, case, task, state.get_rating(index, task)));
                }
            }
        }
    }

    lines.join("\n")
}

fn csv_row(index: usize, case: &CaseRecord, task: Task, rating: Option<&Rating>) -> String {
    let (value, timestamp) = match rating {
        Some(r) => (r.value.to_string(), r.timestamp.to_rfc3339()),
        None => (String::new(), String::new()),
    };

    [
        (index + 1).to_string(),
        quote(case.id.as_deref().unwrap_or_default()),
        task.to_string(),
        quote(&case.image_paths.join(";")),
        quote(&case.prompt),
        quote(case.predicted_diagnosis.as_deref().unwrap_or_default()),
        quote(case.ground_truth_diagnosis.as_deref().unwrap_or_default()),
        value,
        timestamp,
    ]
    .join(",")
}

/// 自由記述フィールドをクォート
pub fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
