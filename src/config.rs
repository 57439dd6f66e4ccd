use crate::controller::SaveMode;
use crate::error::{RaterError, Result};
use case_rater_common::{CsvRows, NavigationPolicy, TaskSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const WEBHOOK_URL_ENV: &str = "CASE_RATER_WEBHOOK_URL";
pub const USER_ID_ENV: &str = "CASE_RATER_USER_ID";

const DEFAULT_USER_ID: &str = "anonymous";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Webhookに送る評価者ID
    pub user_id: Option<String>,
    /// クラウドミラーの送信先（未設定なら無効）
    pub webhook_url: Option<String>,
    pub request_timeout_seconds: u64,
    pub navigation: NavigationPolicy,
    pub save_mode: SaveMode,
    pub csv_rows: CsvRows,
    pub tasks: TaskSet,
    /// セッション保存先（省略時はデータディレクトリ）
    pub store_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_json::from_str(&content)
                .map_err(|e| RaterError::Config(format!("{}: {}", config_path.display(), e)))
        } else {
            Ok(Self::default_config())
        }
    }

    /// 読めない設定ファイルは警告して既定値で続ける（`config` コマンドで修復するため）
    pub fn load_or_default() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_or_default_from(&path),
            Err(e) => {
                log::warn!("{}", e);
                Self::default_config()
            }
        }
    }

    pub fn load_or_default_from(config_path: &Path) -> Self {
        Self::load_from(config_path).unwrap_or_else(|e| {
            log::warn!("設定ファイルを読めないため既定値を使います: {}", e);
            Self::default_config()
        })
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| RaterError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("case-rater").join("config.json"))
    }

    fn default_config() -> Self {
        Self {
            user_id: None,
            webhook_url: None,
            request_timeout_seconds: 10,
            navigation: NavigationPolicy::Blocking,
            save_mode: SaveMode::EveryChange,
            csv_rows: CsvRows::RatedOnly,
            tasks: TaskSet::default(),
            store_dir: None,
        }
    }

    /// Webhook URL（環境変数を優先、空文字は未設定扱い）
    pub fn webhook_url(&self) -> Option<String> {
        std::env::var(WEBHOOK_URL_ENV)
            .ok()
            .or_else(|| self.webhook_url.clone())
            .filter(|url| !url.trim().is_empty())
    }

    /// 評価者ID（環境変数を優先）
    pub fn user_id(&self) -> String {
        std::env::var(USER_ID_ENV)
            .ok()
            .or_else(|| self.user_id.clone())
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_ID.to_string())
    }

    /// セッション保存ディレクトリ
    pub fn store_dir(&self) -> PathBuf {
        if let Some(dir) = &self.store_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join("case-rater").join("sessions"))
            .unwrap_or_else(|| PathBuf::from(".case-rater"))
    }

    pub fn set_webhook_url(&mut self, url: Option<String>) -> Result<()> {
        if let Some(url) = &url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(RaterError::Config(format!(
                    "Webhook URLは http:// または https:// で始まる必要があります: {}",
                    url
                )));
            }
        }
        self.webhook_url = url;
        self.save()
    }

    pub fn set_user_id(&mut self, user_id: String) -> Result<()> {
        self.user_id = Some(user_id);
        self.save()
    }
}
