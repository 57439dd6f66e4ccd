//! データセット読み込み・検証
//!
//! 入力はJSON配列。各要素はプロンプト（`prompt` / `text` / `description`）と
//! 画像（`image_paths` / `image`、配列または単一パス）を持つこと。

use crate::error::{Error, Result};
use crate::types::CaseRecord;
use serde::Serialize;
use serde_json::{Map, Value};

/// プロンプトとして認めるフィールド名
pub const PROMPT_FIELDS: &[&str] = &["prompt", "text", "description"];

/// 画像として認めるフィールド名
pub const IMAGE_FIELDS: &[&str] = &["image_paths", "image"];

/// 文字列か数値であればよい任意フィールド
const SCALAR_FIELDS: &[&str] = &["id", "pmid", "predicted_diagnosis", "ground_truth_diagnosis"];

/// 鑑別診断ペアの文字列フィールド
const PAIR_TEXT_FIELDS: &[&str] = &["pair_id", "predicted", "ground_truth"];

/// JSON文字列からデータセットを読み込む
///
/// 1件でも必須フィールドが欠けていればエラー。メッセージの症例番号は1始まり。
pub fn parse_dataset(text: &str) -> Result<Vec<CaseRecord>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Dataset(format!("not valid JSON: {}", e)))?;
    parse_dataset_value(value)
}

/// パース済みJSONからデータセットを読み込む
pub fn parse_dataset_value(value: Value) -> Result<Vec<CaseRecord>> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(Error::Dataset(format!(
                "expected a JSON array of cases, got {}",
                json_type_name(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if let Some(problem) = check_case(&item).into_iter().next() {
                return Err(Error::Dataset(format!("case {}: {}", i + 1, problem)));
            }
            serde_json::from_value(normalize_aliases(item))
                .map_err(|e| Error::Dataset(format!("case {}: {}", i + 1, e)))
        })
        .collect()
}

/// 別名フィールドを正式名に寄せる
///
/// 複数の別名があれば `PROMPT_FIELDS` / `IMAGE_FIELDS` の順で最初のものを採り、残りは捨てる。
fn normalize_aliases(mut item: Value) -> Value {
    if let Some(obj) = item.as_object_mut() {
        for fields in [PROMPT_FIELDS, IMAGE_FIELDS] {
            let mut chosen = None;
            for &name in fields {
                if let Some(value) = obj.remove(name) {
                    chosen.get_or_insert(value);
                }
            }
            if let Some(value) = chosen {
                obj.insert(fields[0].to_string(), value);
            }
        }
    }
    item
}

/// データセット検証レポート
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReport {
    pub case_count: usize,
    pub image_count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl DatasetReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// 症例あたりの平均画像数
    pub fn average_images(&self) -> f64 {
        if self.case_count == 0 {
            0.0
        } else {
            self.image_count as f64 / self.case_count as f64
        }
    }
}

/// 全症例を検証し、エラーと警告を集める
pub fn validate_dataset(items: &[Value]) -> DatasetReport {
    let mut report = DatasetReport {
        case_count: items.len(),
        ..Default::default()
    };

    for (i, item) in items.iter().enumerate() {
        let number = i + 1;
        for problem in check_case(item) {
            report.errors.push(format!("case {}: {}", number, problem));
        }

        if let Some(obj) = item.as_object() {
            let images = count_images(obj);
            report.image_count += images;
            if images == 0 && find_field(obj, IMAGE_FIELDS).is_some() {
                report.warnings.push(format!("case {}: no images", number));
            }
        }
    }

    report
}

/// 1症例の問題点
fn check_case(item: &Value) -> Vec<String> {
    let obj = match item.as_object() {
        Some(obj) => obj,
        None => return vec![format!("expected an object, got {}", json_type_name(item))],
    };

    let mut problems = Vec::new();

    match find_field(obj, PROMPT_FIELDS) {
        None => problems.push("missing `prompt` field".to_string()),
        Some((name, value)) if !value.is_string() => {
            problems.push(format!("`{}` should be a string", name))
        }
        Some(_) => {}
    }

    match find_field(obj, IMAGE_FIELDS) {
        None => problems.push("missing `image_paths` field".to_string()),
        Some((name, value)) => {
            let ok = match value {
                Value::String(_) => true,
                Value::Array(paths) => paths.iter().all(Value::is_string),
                _ => false,
            };
            if !ok {
                problems.push(format!("`{}` should be an array of paths", name));
            }
        }
    }

    for &name in SCALAR_FIELDS {
        if obj.get(name).map_or(false, is_compound) {
            problems.push(format!("`{}` should be a string", name));
        }
    }

    match obj.get("task3_pairs") {
        None | Some(Value::Null) => {}
        Some(Value::Array(pairs)) => {
            for (j, pair) in pairs.iter().enumerate() {
                match pair.as_object() {
                    Some(pair) => {
                        for &name in PAIR_TEXT_FIELDS {
                            if pair.get(name).map_or(false, is_compound) {
                                problems.push(format!(
                                    "`task3_pairs[{}].{}` should be a string",
                                    j, name
                                ));
                            }
                        }
                    }
                    None => problems.push(format!(
                        "`task3_pairs[{}]` should be an object, got {}",
                        j,
                        json_type_name(pair)
                    )),
                }
            }
        }
        Some(other) => problems.push(format!(
            "`task3_pairs` should be an array, got {}",
            json_type_name(other)
        )),
    }

    problems
}

fn is_compound(value: &Value) -> bool {
    value.is_array() || value.is_object()
}

fn find_field<'a>(obj: &'a Map<String, Value>, names: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    names
        .iter()
        .find_map(|&name| obj.get(name).map(|value| (name, value)))
}

fn count_images(obj: &Map<String, Value>) -> usize {
    match find_field(obj, IMAGE_FIELDS) {
        Some((_, Value::Array(paths))) => paths.len(),
        Some((_, Value::String(path))) if !path.is_empty() => 1,
        _ => 0,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
