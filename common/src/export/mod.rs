//! エクスポート（CSV / JSON）
//!
//! どちらもセッション状態の純関数。ファイル書き出しは呼び出し側で行う。

pub mod csv;
pub mod json;

pub use self::csv::{to_csv, CsvRows, CSV_HEADER, UTF8_BOM};
pub use self::json::{build_json_export, to_json, ExportEntry, ExportMetadata, JsonExport};
