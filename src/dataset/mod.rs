//! データセット準備ツール
//!
//! 評価用JSONを作る前処理（サンプル生成・診断の統合・パス書き換え・
//! 画像の収集・品質フィルタ）をまとめる。いずれも生のJSON値を扱う。

pub mod curation;
pub mod similarity;

use crate::error::{RaterError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SAMPLE_PROMPTS: &[&str] = &[
    "A 45-year-old patient presents with skin lesions. Please evaluate the clinical presentation.",
    "Dermatological findings in a 32-year-old female with autoimmune condition.",
    "Chronic skin manifestation in immunocompromised patient. Diagnostic approach needed.",
    "Pediatric case: 8-year-old with progressive rash. Please provide differential diagnosis.",
    "Elderly patient with atypical dermatitis. Consider systemic factors.",
];

/// JSON配列ファイルを読み込む
pub fn read_json_array(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(RaterError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(RaterError::DatasetLoad(format!(
            "{}: JSON配列ではありません",
            path.display()
        ))),
    }
}

/// 整形JSONで書き出す
pub fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// サンプル症例（各3枚の画像パス）
pub fn sample_cases(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|n| {
            json!({
                "image_paths": [
                    format!("images/case_{:03}_img1.jpg", n),
                    format!("images/case_{:03}_img2.jpg", n),
                    format!("images/case_{:03}_img3.jpg", n),
                ],
                "prompt": SAMPLE_PROMPTS[(n - 1) % SAMPLE_PROMPTS.len()],
            })
        })
        .collect()
}

/// 評価レポートの `per_sample_results` から診断を取り込む。更新件数を返す
pub fn merge_diagnoses(cases: &mut [Value], evaluation: &Value) -> usize {
    let mut mapping: HashMap<&str, (Value, Value)> = HashMap::new();
    for sample in evaluation
        .get("per_sample_results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
    {
        let Some(case_id) = sample.get("case_id").and_then(Value::as_str) else {
            continue;
        };
        if case_id.is_empty() {
            continue;
        }
        let field = |name: &str| sample.get(name).cloned().unwrap_or_else(|| json!(""));
        mapping.insert(
            case_id,
            (field("predicted_diagnosis"), field("ground_truth_diagnosis")),
        );
    }

    let mut updated = 0;
    for case in cases.iter_mut() {
        let Some(id) = case.get("id").and_then(Value::as_str) else {
            continue;
        };
        let Some((predicted, truth)) = mapping.get(id) else {
            continue;
        };
        if let Some(obj) = case.as_object_mut() {
            obj.insert("predicted_diagnosis".to_string(), predicted.clone());
            obj.insert("ground_truth_diagnosis".to_string(), truth.clone());
            updated += 1;
        }
    }

    log::debug!("merged diagnoses into {} of {} cases", updated, cases.len());
    updated
}

/// 画像パスの接頭辞を置き換える。書き換えたパス数を返す
pub fn rewrite_image_paths(cases: &mut [Value], from: &str, to: &str) -> usize {
    let mut rewritten = 0;
    for case in cases.iter_mut() {
        let Some(paths) = case.get_mut("image_paths").and_then(Value::as_array_mut) else {
            continue;
        };
        for path in paths.iter_mut() {
            let Some(rest) = path.as_str().and_then(|p| p.strip_prefix(from)) else {
                continue;
            };
            let replaced = format!("{}{}", to, rest);
            *path = Value::String(replaced);
            rewritten += 1;
        }
    }
    rewritten
}

/// 全症例の画像パス（重複なし・昇順）
pub fn unique_image_paths(cases: &[Value]) -> Vec<String> {
    cases
        .iter()
        .filter_map(|case| case.get("image_paths").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// ペアの類似度を単語Jaccard（小数4桁）で付け直す。更新したペア数を返す
pub fn rescore_pairs(cases: &mut [Value]) -> usize {
    let mut rescored = 0;
    for case in cases.iter_mut() {
        let Some(pairs) = case.get_mut("task3_pairs").and_then(Value::as_array_mut) else {
            continue;
        };
        for pair in pairs.iter_mut() {
            let predicted = pair.get("predicted").and_then(Value::as_str).unwrap_or("");
            let truth = pair.get("ground_truth").and_then(Value::as_str).unwrap_or("");
            let score = similarity::round4(similarity::jaccard_similarity(predicted, truth));
            if let Some(obj) = pair.as_object_mut() {
                obj.insert("similarity".to_string(), json!(score));
                rescored += 1;
            }
        }
    }
    rescored
}

/// 画像収集の結果
#[derive(Debug, Default)]
pub struct CollectReport {
    pub total: usize,
    pub copied: usize,
    pub missing: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// 参照されている画像をファイル名で探し、targetへコピーする
///
/// sourceは再帰的に探索する。同名ファイルが複数ある場合は最初に見つかったものを使う。
pub fn collect_images(cases: &[Value], source: &Path, target: &Path) -> Result<CollectReport> {
    if !source.is_dir() {
        return Err(RaterError::FileNotFound(source.display().to_string()));
    }
    fs::create_dir_all(target)?;

    let index = index_by_file_name(source);
    log::debug!("indexed {} files under {}", index.len(), source.display());

    let paths = unique_image_paths(cases);
    let mut report = CollectReport {
        total: paths.len(),
        ..Default::default()
    };

    let pb = ProgressBar::new(paths.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
        pb.set_style(style);
    }

    for image in &paths {
        let Some(name) = file_name_of(image) else {
            report.missing.push(image.clone());
            pb.inc(1);
            continue;
        };
        pb.set_message(name.clone());

        match index.get(&name) {
            Some(found) => match fs::copy(found, target.join(&name)) {
                Ok(_) => report.copied += 1,
                Err(e) => {
                    log::warn!("failed to copy {}: {}", found.display(), e);
                    report.failed.push((name, e.to_string()));
                }
            },
            None => report.missing.push(name),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(report)
}

fn index_by_file_name(root: &Path) -> HashMap<String, PathBuf> {
    let mut index = HashMap::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy().to_string();
        index.entry(name).or_insert_with(|| entry.path().to_path_buf());
    }
    index
}

/// `/` と `\` のどちらの区切りでも末尾のファイル名を取り出す
fn file_name_of(path: &str) -> Option<String> {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
