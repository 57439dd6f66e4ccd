//! 診断文字列の比較
//!
//! - 単語集合のJaccard類似度
//! - 表記ゆれ（大文字小文字・空白・句読点）を無視した一致判定

use regex::Regex;
use std::collections::HashSet;

/// 単語集合のJaccard類似度（両方空なら0.0）
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

/// 小数点以下4桁に丸める
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// 2つの診断を同一とみなすか
///
/// 大文字小文字・前後空白・句読点を無視して一致するか、
/// 一方が他方を含み長さの比が0.8を超える場合に同一とする。
pub fn diagnoses_match(a: &str, b: &str) -> bool {
    lazy_static::lazy_static! {
        static ref PUNCT_RE: Regex = Regex::new(r"[^\w\s]").unwrap();
    }

    if a.is_empty() || b.is_empty() {
        return false;
    }

    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return true;
    }

    if PUNCT_RE.replace_all(&a, "") == PUNCT_RE.replace_all(&b, "") {
        return true;
    }

    if a.contains(b.as_str()) || b.contains(a.as_str()) {
        let len_a = a.chars().count();
        let len_b = b.chars().count();
        let ratio = len_a.min(len_b) as f64 / len_a.max(len_b) as f64;
        return ratio > 0.8;
    }

    false
}
