//! Case Rater Common Library
//!
//! 描画層（端末UIなど）から独立したコア:
//! - データセットの読み込み・検証
//! - 評価セッション状態と永続化
//! - CSV / JSON エクスポート

pub mod types;
pub mod error;
pub mod loader;
pub mod session;
pub mod store;
pub mod export;

pub use types::{CaseRecord, Choice, DiagnosisPair, Rating, RatingValue, Score, Task, TaskSet};
pub use error::{Error, Result};
pub use loader::{parse_dataset, parse_dataset_value, validate_dataset, DatasetReport};
pub use session::{NavigationPolicy, Progress, RatingKey, SessionState};
pub use store::{KeyValueStore, MemoryStore};
pub use export::{build_json_export, to_csv, to_json, CsvRows, JsonExport};
