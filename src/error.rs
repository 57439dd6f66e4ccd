use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaterError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("データセットを読み込めません: {0}")]
    DatasetLoad(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("Webhook送信エラー: {0}")]
    Webhook(String),

    #[error("入力エラー: {0}")]
    Prompt(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] case_rater_common::Error),
}

pub type Result<T> = std::result::Result<T, RaterError>;
