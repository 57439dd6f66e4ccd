//! JSONエクスポート
//!
//! `{metadata, results}` 形式。results は全症例×全タスクで、未評価は `null`。

use crate::error::Result;
use crate::session::SessionState;
use crate::types::{CaseRecord, RatingValue, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub session_id: Uuid,
    pub tasks: Vec<Task>,
    pub total_items: usize,
    /// 記録済みの評価数
    pub rated_count: usize,
    /// 全タスク評価済みの症例数
    pub completed_cases: usize,
    pub start_time: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub export_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    /// 1始まりの症例番号
    pub index: usize,
    pub case_id: Option<String>,
    pub task: Task,
    pub image_paths: Vec<String>,
    pub prompt: String,
    pub predicted_diagnosis: Option<String>,
    pub ground_truth_diagnosis: Option<String>,
    pub rating: Option<RatingValue>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonExport {
    pub metadata: ExportMetadata,
    pub results: Vec<ExportEntry>,
}

/// エクスポート用の構造体を組み立てる
pub fn build_json_export(
    cases: &[CaseRecord],
    state: &SessionState,
    exported_at: DateTime<Utc>,
) -> JsonExport {
    let metadata = ExportMetadata {
        session_id: state.session_id(),
        tasks: state.tasks().as_slice().to_vec(),
        total_items: cases.len(),
        rated_count: state.total_rated(),
        completed_cases: state.rated_cases(),
        start_time: state.start_time(),
        last_modified: state.last_modified(),
        export_time: exported_at,
    };

    let results = cases
        .iter()
        .enumerate()
        .flat_map(|(index, case)| {
            state.tasks().iter().map(move |task| {
                let rating = state.get_rating(index, task);
                ExportEntry {
                    index: index + 1,
                    case_id: case.id.clone(),
                    task,
                    image_paths: case.image_paths.clone(),
                    prompt: case.prompt.clone(),
                    predicted_diagnosis: case.predicted_diagnosis.clone(),
                    ground_truth_diagnosis: case.ground_truth_diagnosis.clone(),
                    rating: rating.map(|r| r.value),
                    timestamp: rating.map(|r| r.timestamp),
                }
            })
        })
        .collect();

    JsonExport { metadata, results }
}

/// 整形済みJSON文字列を生成
pub fn to_json(cases: &[CaseRecord], state: &SessionState, exported_at: DateTime<Utc>) -> Result<String> {
    let export = build_json_export(cases, state, exported_at);
    Ok(serde_json::to_string_pretty(&export)?)
}
