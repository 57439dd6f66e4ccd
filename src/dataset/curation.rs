//! データセットの品質フィルタ
//!
//! 評価に使えない症例を理由付きで除外する。除外規則:
//! 1. null値を含む
//! 2. task3_pairs がちょうど2件でない、欠損フィールドがある、重複している
//! 3. 予測診断・正解診断が空、または同一
//! 4. 画像パスがない
//! 5. id / pmid / prompt が空

use super::similarity::diagnoses_match;
use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const DEFAULT_LIMIT: usize = 200;

const PAIR_FIELDS: &[&str] = &["pair_id", "predicted", "ground_truth", "similarity"];
const REQUIRED_FIELDS: &[&str] = &["id", "pmid", "prompt"];

/// 除外された症例
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedCase {
    pub case_id: String,
    pub reasons: Vec<String>,
    pub predicted_diagnosis: String,
    pub ground_truth_diagnosis: String,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub kept: Vec<Value>,
    pub removed: Vec<RemovedCase>,
    /// 上限による間引き前の有効件数
    pub valid_before_limit: usize,
}

impl FilterOutcome {
    pub fn input_count(&self) -> usize {
        self.valid_before_limit + self.removed.len()
    }

    /// 除外理由ごとの件数（多い順）
    pub fn reason_counts(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for case in &self.removed {
            for reason in &case.reasons {
                *counts.entry(reason.as_str()).or_default() += 1;
            }
        }
        let mut counts: Vec<(String, usize)> =
            counts.into_iter().map(|(r, n)| (r.to_string(), n)).collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts
    }
}

/// 症例を検証し、有効なものを最大 `limit` 件までランダムに残す
pub fn filter_cases<R: Rng + ?Sized>(items: Vec<Value>, limit: Option<usize>, rng: &mut R) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for (idx, item) in items.into_iter().enumerate() {
        let reasons = removal_reasons(&item);
        if reasons.is_empty() {
            outcome.kept.push(item);
        } else {
            outcome.removed.push(RemovedCase {
                case_id: case_id(&item, idx),
                reasons,
                predicted_diagnosis: text_field(&item, "predicted_diagnosis"),
                ground_truth_diagnosis: text_field(&item, "ground_truth_diagnosis"),
            });
        }
    }

    outcome.valid_before_limit = outcome.kept.len();
    if let Some(limit) = limit {
        if outcome.kept.len() > limit {
            outcome.kept.shuffle(rng);
            outcome.kept.truncate(limit);
        }
    }

    outcome
}

/// 1症例の除外理由（空なら有効）
pub fn removal_reasons(item: &Value) -> Vec<String> {
    let mut reasons = Vec::new();

    if has_null(item) {
        reasons.push("null値を含む".to_string());
    }

    if let Err(reason) = check_pairs(item.get("task3_pairs")) {
        reasons.push(reason);
    }

    let predicted = text_field(item, "predicted_diagnosis");
    let truth = text_field(item, "ground_truth_diagnosis");
    if predicted.is_empty() || truth.is_empty() {
        reasons.push("診断が空".to_string());
    } else if diagnoses_match(&predicted, &truth) {
        reasons.push(format!("診断が一致: '{}' == '{}'", predicted, truth));
    }

    let has_images = item
        .get("image_paths")
        .and_then(Value::as_array)
        .map(|paths| !paths.is_empty())
        .unwrap_or(false);
    if !has_images {
        reasons.push("画像パスなし".to_string());
    }

    for field in REQUIRED_FIELDS {
        if is_blank(item.get(*field)) {
            reasons.push(format!("必須フィールドなし: {}", field));
        }
    }

    reasons
}

/// 再帰的にnullを探す
pub fn has_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.iter().any(has_null),
        Value::Object(map) => map.values().any(has_null),
        _ => false,
    }
}

fn check_pairs(pairs: Option<&Value>) -> Result<(), String> {
    let pairs = pairs.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);

    if pairs.len() < 2 {
        return Err(format!("task3_pairsが2件未満 (現在: {})", pairs.len()));
    }
    if pairs.len() > 2 {
        return Err(format!("task3_pairsが2件を超える (現在: {})", pairs.len()));
    }

    for (i, pair) in pairs.iter().enumerate() {
        let obj = pair
            .as_object()
            .ok_or_else(|| format!("task3_pairs[{}]がオブジェクトではない", i))?;
        for field in PAIR_FIELDS {
            match obj.get(*field) {
                None => return Err(format!("task3_pairs[{}]にフィールドなし: {}", i, field)),
                Some(Value::Null) => return Err(format!("task3_pairs[{}].{}がnull", i, field)),
                Some(_) => {}
            }
        }
    }

    let (a, b) = (&pairs[0], &pairs[1]);
    if a.get("pair_id") == b.get("pair_id") {
        return Err("2つのペアのpair_idが同じ".to_string());
    }
    if a.get("predicted") == b.get("predicted") && a.get("ground_truth") == b.get("ground_truth") {
        return Err(format!(
            "2つのペアの診断内容が同じ: ({}, {})",
            text_field(a, "predicted"),
            text_field(a, "ground_truth")
        ));
    }

    Ok(())
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
    }
}

fn text_field(item: &Value, field: &str) -> String {
    match item.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn case_id(item: &Value, idx: usize) -> String {
    ["pmid", "id"]
        .iter()
        .map(|field| text_field(item, field))
        .find(|id| !id.is_empty())
        .unwrap_or_else(|| format!("case_{}", idx))
}

/// Markdown形式の除外レポート
pub fn render_report(
    input: &str,
    output: &str,
    outcome: &FilterOutcome,
    generated_at: DateTime<Local>,
) -> String {
    let mut report = String::new();
    let total = outcome.input_count();
    let ratio = if total == 0 {
        0.0
    } else {
        outcome.valid_before_limit as f64 * 100.0 / total as f64
    };

    let _ = writeln!(report, "# データ選別レポート\n");
    let _ = writeln!(report, "入力ファイル: {}", input);
    let _ = writeln!(report, "出力ファイル: {}", output);
    let _ = writeln!(report, "生成日時: {}\n", generated_at.format("%Y-%m-%d %H:%M:%S"));

    let _ = writeln!(report, "## 統計\n");
    let _ = writeln!(report, "- 元の症例数: {}", total);
    let _ = writeln!(report, "- 有効症例数: {}", outcome.valid_before_limit);
    let _ = writeln!(report, "- 出力症例数: {}", outcome.kept.len());
    let _ = writeln!(report, "- 除外症例数: {}", outcome.removed.len());
    let _ = writeln!(report, "- 有効率: {:.1}%\n", ratio);

    if !outcome.removed.is_empty() {
        let _ = writeln!(report, "## 除外された症例\n");
        for (i, case) in outcome.removed.iter().enumerate() {
            let _ = writeln!(report, "### {}. 症例 {}\n", i + 1, case.case_id);
            let _ = writeln!(report, "**除外理由**: {}\n", case.reasons.join(", "));
            if !case.predicted_diagnosis.is_empty() {
                let _ = writeln!(report, "**予測診断**: {}\n", case.predicted_diagnosis);
            }
            if !case.ground_truth_diagnosis.is_empty() {
                let _ = writeln!(report, "**正解診断**: {}\n", case.ground_truth_diagnosis);
            }
            let _ = writeln!(report, "---\n");
        }
    }

    report
}
