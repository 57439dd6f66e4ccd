use crate::controller::SaveMode;
use case_rater_common::{NavigationPolicy, Task, TaskSet};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "case-rater")]
#[command(about = "症例画像・診断の評価ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 症例を1件ずつ評価する
    Rate {
        /// データセット（JSONファイルのパスまたはURL）
        #[arg(required = true)]
        dataset: String,

        /// 評価タスク（カンマ区切り: image,diagnosis,pair）
        #[arg(short, long, value_parser = parse_tasks)]
        tasks: Option<TaskSet>,

        /// 移動方針 (blocking/free)
        #[arg(long)]
        navigation: Option<NavigationPolicy>,

        /// 保存方針 (auto/manual)
        #[arg(long)]
        save_mode: Option<SaveMode>,

        /// セッションキー（省略時はデータセット名から生成）
        #[arg(long)]
        session_key: Option<String>,

        /// 保存済みの評価を破棄して最初から始める
        #[arg(long)]
        restart: bool,
    },

    /// 評価の進捗を表示
    Status {
        /// データセット（JSONファイルのパスまたはURL）
        #[arg(required = true)]
        dataset: String,

        /// セッションキー
        #[arg(long)]
        session_key: Option<String>,
    },

    /// 評価結果をCSV/JSONで出力
    Export {
        /// データセット（JSONファイルのパスまたはURL）
        #[arg(required = true)]
        dataset: String,

        /// 出力形式 (csv/json/both)
        #[arg(short, long, default_value = "both")]
        format: ExportFormat,

        /// 出力ディレクトリ（デフォルト: カレント）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 未評価の症例もCSVに含める
        #[arg(long)]
        all_rows: bool,

        /// セッションキー
        #[arg(long)]
        session_key: Option<String>,
    },

    /// 保存済みセッションを削除
    Reset {
        /// データセット（JSONファイルのパスまたはURL）
        #[arg(required = true)]
        dataset: String,

        /// セッションキー
        #[arg(long)]
        session_key: Option<String>,

        /// 確認せずに削除
        #[arg(short, long)]
        yes: bool,
    },

    /// 保存済みの評価をすべてWebhookへ送信
    Sync {
        /// データセット（JSONファイルのパスまたはURL）
        #[arg(required = true)]
        dataset: String,

        /// セッションキー
        #[arg(long)]
        session_key: Option<String>,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// Webhook URLを設定
        #[arg(long)]
        set_webhook: Option<String>,

        /// Webhook URLを削除（クラウドミラー無効）
        #[arg(long, conflicts_with = "set_webhook")]
        clear_webhook: bool,

        /// 評価者IDを設定
        #[arg(long)]
        set_user: Option<String>,
    },

    /// データセット準備ツール
    Dataset {
        #[command(subcommand)]
        tool: DatasetTool,
    },
}

#[derive(Subcommand)]
pub enum DatasetTool {
    /// データ形式を検証
    Validate {
        /// データファイル
        #[arg(default_value = "medical_data.json")]
        input: PathBuf,
    },

    /// サンプルデータを作成
    Sample {
        /// 症例数
        #[arg(default_value = "5")]
        count: usize,

        /// 出力ファイル
        #[arg(short, long, default_value = "medical_data.json")]
        output: PathBuf,
    },

    /// 評価に使えない症例を除外
    Filter {
        /// 入力ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル
        #[arg(short, long, default_value = "filtered_data.json")]
        output: PathBuf,

        /// 残す最大件数（超えた分はランダムに間引く）
        #[arg(long, default_value = "200")]
        limit: usize,

        /// 件数制限なし
        #[arg(long, conflicts_with = "limit")]
        no_limit: bool,

        /// 乱数シード（間引きを再現したい場合）
        #[arg(long)]
        seed: Option<u64>,

        /// 除外レポート（Markdown）の出力先
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// 評価レポートの診断を取り込む
    MergeDiagnoses {
        /// 入力ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 評価レポート（per_sample_results を含むJSON）
        #[arg(required = true)]
        evaluation: PathBuf,

        /// 出力ファイル
        #[arg(short, long, default_value = "data_updated.json")]
        output: PathBuf,
    },

    /// 画像パスの接頭辞を置き換える
    RewritePaths {
        /// 入力ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 置き換え前の接頭辞
        #[arg(long, required = true)]
        from: String,

        /// 置き換え後の接頭辞
        #[arg(long, required = true)]
        to: String,

        /// 出力ファイル（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 画像パス一覧をテキストに出力
    ListImages {
        /// 入力ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル
        #[arg(short, long, default_value = "all_image_paths.txt")]
        output: PathBuf,
    },

    /// 参照されている画像を集めてコピー
    CollectImages {
        /// 入力ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 画像の探索元（サブフォルダも探索）
        #[arg(long, required = true)]
        source: PathBuf,

        /// コピー先
        #[arg(long, required = true)]
        target: PathBuf,
    },

    /// ペアの類似度を単語Jaccardで付け直す
    RescorePairs {
        /// 入力ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    #[default]
    Both,
}

impl ExportFormat {
    pub fn includes_csv(&self) -> bool {
        matches!(self, ExportFormat::Csv | ExportFormat::Both)
    }

    pub fn includes_json(&self) -> bool {
        matches!(self, ExportFormat::Json | ExportFormat::Both)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "both" => Ok(ExportFormat::Both),
            _ => Err(format!("Unknown format: {}. Use csv, json, or both", s)),
        }
    }
}

/// `image,diagnosis` 形式のタスク指定を読む
pub fn parse_tasks(s: &str) -> Result<TaskSet, String> {
    let tasks = s
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<Task>().map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    TaskSet::new(tasks).map_err(|e| e.to_string())
}
