//! エラー型定義

use crate::types::{RatingValue, Task};
use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Case index {index} is out of range (dataset has {len} cases)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Task `{0}` is not part of this session")]
    UnknownTask(Task),

    #[error("Task `{task}` does not accept rating `{value}`")]
    ValueMismatch { task: Task, value: RatingValue },

    #[error("Case {} must be rated before moving on", .0 + 1)]
    NavigationBlocked(usize),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Choice, Score};

    #[test]
    fn test_error_display_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::Io(io_error);
        let display = format!("{}", error);
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: Error = json_error.into();
        assert!(matches!(error, Error::Json(_)));
    }

    #[test]
    fn test_navigation_blocked_is_one_based() {
        let error = Error::NavigationBlocked(0);
        assert_eq!(error.to_string(), "Case 1 must be rated before moving on");
    }

    #[test]
    fn test_value_mismatch_display() {
        let error = Error::ValueMismatch {
            task: Task::Pair,
            value: RatingValue::Score(Score::new(3).unwrap()),
        };
        assert_eq!(error.to_string(), "Task `pair` does not accept rating `3`");

        let error = Error::ValueMismatch {
            task: Task::Image,
            value: RatingValue::Choice(Choice::B),
        };
        assert!(error.to_string().contains("`B`"));
    }

    #[test]
    fn test_out_of_range_display() {
        let error = Error::IndexOutOfRange { index: 7, len: 3 };
        assert_eq!(
            error.to_string(),
            "Case index 7 is out of range (dataset has 3 cases)"
        );
    }
}
