use case_rater::{cli, config, controller, dataset, error, interactive, loader, mirror, store};
use case_rater_common::{to_csv, to_json, validate_dataset, CaseRecord, CsvRows, SessionState};
use chrono::{Local, Utc};
use clap::Parser;
use cli::{Cli, Commands, DatasetTool};
use config::Config;
use controller::{Annotator, SessionOptions};
use error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use store::FileStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let config = match cli.command {
        Commands::Config { .. } => Config::load_or_default(),
        _ => Config::load()?,
    };

    match cli.command {
        Commands::Rate {
            dataset,
            tasks,
            navigation,
            save_mode,
            session_key,
            restart,
        } => {
            println!("🩺 case-rater - 症例評価\n");

            println!("[1/2] データセットを読み込み中...");
            let cases = load_cases(&dataset, &config).await?;
            println!("✔ {}件の症例を読み込みました\n", cases.len());

            let key = session_key.unwrap_or_else(|| store::session_key(&dataset));
            let file_store = FileStore::new(config.store_dir());
            let mut options = SessionOptions::from_config(&config, key);
            if let Some(tasks) = tasks.or_else(|| SessionState::saved_tasks(&file_store, &options.key)) {
                options.tasks = tasks;
            }
            if let Some(navigation) = navigation {
                options.navigation = navigation;
            }
            if let Some(save_mode) = save_mode {
                options.save_mode = save_mode;
            }

            let mirror = mirror::CloudMirror::from_config(&config);
            let (mut annotator, restored) = Annotator::open(cases, Box::new(file_store), options, mirror);

            if restart {
                annotator.restart();
                println!("✔ 保存済みの評価を破棄しました");
            } else if restored {
                let progress = annotator.state().progress();
                println!(
                    "✔ 前回のセッションを復元しました（完了 {}/{}）",
                    progress.rated_cases, progress.total
                );
            }
            if annotator.has_mirror() {
                println!("- クラウド同期: 有効");
            }

            println!("[2/2] 評価開始\n");
            interactive::run_interactive_rating(&mut annotator)?;

            let progress = annotator.state().progress();
            for notice in annotator.finish().await {
                println!("⚠ {}", notice);
            }
            println!(
                "\n✅ 評価を終了しました（完了 {}/{}, {:.1}%）",
                progress.rated_cases, progress.total, progress.percent
            );
        }

        Commands::Status { dataset, session_key } => {
            let saved = open_saved(&dataset, session_key, &config).await?;
            if !saved.restored {
                println!("保存済みセッションがありません: {}", saved.key);
                return Ok(());
            }

            let state = &saved.state;
            let progress = state.progress();
            let tasks: Vec<&str> = state.tasks().iter().map(|t| t.label()).collect();
            println!("セッション:");
            println!("  キー: {}", saved.key);
            println!("  ID: {}", state.session_id());
            println!("  タスク: {}", tasks.join(", "));
            println!(
                "  進捗: {}/{}件 ({:.1}%), 評価数 {}",
                progress.rated_cases,
                progress.total,
                progress.percent,
                state.total_rated()
            );
            match state.first_unrated() {
                Some(index) => println!("  次の未評価: {}件目", index + 1),
                None => println!("  次の未評価: なし（完了）"),
            }
            println!("  開始: {}", state.start_time().with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
            println!(
                "  最終更新: {}",
                state.last_modified().with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            );
        }

        Commands::Export {
            dataset,
            format,
            output,
            all_rows,
            session_key,
        } => {
            println!("📄 case-rater - エクスポート\n");

            let saved = open_saved(&dataset, session_key, &config).await?;
            if !saved.restored {
                println!("⚠ 保存済みの評価がありません（空の結果を出力します）");
            }

            let output_dir = output.unwrap_or_else(|| PathBuf::from("."));
            std::fs::create_dir_all(&output_dir)?;
            let stem = export_stem(&saved.key);

            if format.includes_csv() {
                let rows = if all_rows { CsvRows::AllCases } else { config.csv_rows };
                let path = output_dir.join(format!("{}_ratings.csv", stem));
                std::fs::write(&path, to_csv(&saved.cases, &saved.state, rows))?;
                println!("✔ CSV: {}", path.display());
            }
            if format.includes_json() {
                let path = output_dir.join(format!("{}_ratings.json", stem));
                std::fs::write(&path, to_json(&saved.cases, &saved.state, Utc::now())?)?;
                println!("✔ JSON: {}", path.display());
            }

            println!("\n✅ エクスポート完了（評価数 {}）", saved.state.total_rated());
        }

        Commands::Reset {
            dataset,
            session_key,
            yes,
        } => {
            let key = session_key.unwrap_or_else(|| store::session_key(&dataset));
            let mut file_store = FileStore::new(config.store_dir());

            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("セッション {} を削除しますか？", key))
                    .default(false)
                    .interact()
                    .map_err(|e| error::RaterError::Prompt(e.to_string()))?;
                if !confirmed {
                    println!("中止しました");
                    return Ok(());
                }
            }

            if SessionState::clear(&mut file_store, &key) {
                println!("✔ セッションを削除しました: {}", key);
            } else {
                println!("⚠ セッションを削除できませんでした: {}", key);
            }
        }

        Commands::Sync { dataset, session_key } => {
            println!("☁ case-rater - クラウド同期\n");

            let Some(mirror) = mirror::CloudMirror::from_config(&config) else {
                return Err(error::RaterError::Config(
                    "Webhook URLが未設定です（case-rater config --set-webhook <URL>）".into(),
                ));
            };

            let saved = open_saved(&dataset, session_key, &config).await?;
            let total = saved.state.total_rated();
            if total == 0 {
                println!("送信する評価がありません");
                return Ok(());
            }

            let pb = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len}") {
                pb.set_style(style);
            }
            let report = mirror.push_all(&saved.cases, &saved.state, &pb).await;
            pb.finish_and_clear();

            println!("✔ 送信成功: {}件", report.sent);
            if !report.failed.is_empty() {
                println!("⚠ 送信失敗: {}件", report.failed.len());
                for (case_index, task, reason) in report.failed.iter().take(10) {
                    println!("  症例{} / {}: {}", case_index, task.label(), reason);
                }
            }
        }

        Commands::Config {
            show,
            set_webhook,
            clear_webhook,
            set_user,
        } => {
            let mut config = config;

            if let Some(url) = set_webhook {
                config.set_webhook_url(Some(url))?;
                println!("✔ Webhook URLを設定しました");
            }
            if clear_webhook {
                config.set_webhook_url(None)?;
                println!("✔ Webhook URLを削除しました");
            }
            if let Some(user) = set_user {
                config.set_user_id(user)?;
                println!("✔ 評価者IDを設定しました");
            }

            if show {
                let tasks: Vec<&str> = config.tasks.iter().map(|t| t.label()).collect();
                println!("設定:");
                println!("  評価者ID: {}", config.user_id());
                println!(
                    "  Webhook: {}",
                    config.webhook_url().unwrap_or_else(|| "未設定".to_string())
                );
                println!("  タイムアウト: {}秒", config.request_timeout_seconds);
                println!("  移動方針: {}", config.navigation);
                println!("  保存方針: {}", config.save_mode);
                println!("  CSV行: {}", config.csv_rows);
                println!("  タスク: {}", tasks.join(", "));
                println!("  保存先: {}", config.store_dir().display());
            }
        }

        Commands::Dataset { tool } => run_dataset_tool(tool)?,
    }

    Ok(())
}

fn init_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn load_cases(source: &str, config: &Config) -> Result<Vec<CaseRecord>> {
    let timeout = Duration::from_secs(config.request_timeout_seconds);
    loader::fetch_dataset(source, timeout).await
}

/// 保存済みセッションを読み取り専用で開いたもの
struct SavedSession {
    key: String,
    cases: Vec<CaseRecord>,
    state: SessionState,
    restored: bool,
}

async fn open_saved(dataset: &str, session_key: Option<String>, config: &Config) -> Result<SavedSession> {
    let cases = load_cases(dataset, config).await?;
    let key = session_key.unwrap_or_else(|| store::session_key(dataset));
    let file_store = FileStore::new(config.store_dir());
    let tasks = SessionState::saved_tasks(&file_store, &key).unwrap_or_else(|| config.tasks.clone());
    let (state, restored) =
        SessionState::load_or_fresh(&file_store, &key, cases.len(), tasks, config.navigation);

    Ok(SavedSession {
        key,
        cases,
        state,
        restored,
    })
}

/// セッションキーの末尾をファイル名に使う
fn export_stem(key: &str) -> String {
    let stem = key.rsplit('/').next().unwrap_or(key);
    stem.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn run_dataset_tool(tool: DatasetTool) -> Result<()> {
    match tool {
        DatasetTool::Validate { input } => {
            println!("データ形式を検証中: {}\n", input.display());
            let items = dataset::read_json_array(&input)?;
            let report = validate_dataset(&items);

            println!("📊 データ統計:");
            println!("  総症例数: {}", report.case_count);
            println!("  総画像数: {}", report.image_count);
            println!("  平均画像数: {:.1}", report.average_images());

            print_limited("❌ エラー", &report.errors);
            print_limited("⚠ 警告", &report.warnings);

            if report.is_valid() {
                println!("\n✔ データ形式の検証に合格しました");
            } else {
                return Err(error::RaterError::DatasetLoad(format!(
                    "{}件のエラーがあります",
                    report.errors.len()
                )));
            }
        }

        DatasetTool::Sample { count, output } => {
            dataset::write_json(&output, &dataset::sample_cases(count))?;
            println!("✔ サンプルデータを作成しました: {}", output.display());
            println!("✔ {}件の症例（各3枚の画像）", count);
        }

        DatasetTool::Filter {
            input,
            output,
            limit,
            no_limit,
            seed,
            report,
        } => {
            let items = dataset::read_json_array(&input)?;
            println!("✔ {}件の症例を読み込みました", items.len());

            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let limit = if no_limit { None } else { Some(limit) };
            let outcome = dataset::curation::filter_cases(items, limit, &mut rng);

            dataset::write_json(&output, &outcome.kept)?;
            println!(
                "✔ 有効 {}件 / 除外 {}件 → 出力 {}件: {}",
                outcome.valid_before_limit,
                outcome.removed.len(),
                outcome.kept.len(),
                output.display()
            );
            for (reason, count) in outcome.reason_counts().iter().take(10) {
                println!("  - {}: {}件", reason, count);
            }

            if let Some(report_path) = report {
                let markdown = dataset::curation::render_report(
                    &input.display().to_string(),
                    &output.display().to_string(),
                    &outcome,
                    Local::now(),
                );
                std::fs::write(&report_path, markdown)?;
                println!("✔ レポート: {}", report_path.display());
            }
        }

        DatasetTool::MergeDiagnoses {
            input,
            evaluation,
            output,
        } => {
            let mut items = dataset::read_json_array(&input)?;
            let evaluation = read_json_value(&evaluation)?;
            let updated = dataset::merge_diagnoses(&mut items, &evaluation);
            dataset::write_json(&output, &items)?;
            println!("✔ {}件の症例の診断を更新しました: {}", updated, output.display());
        }

        DatasetTool::RewritePaths {
            input,
            from,
            to,
            output,
        } => {
            let mut items = dataset::read_json_array(&input)?;
            let rewritten = dataset::rewrite_image_paths(&mut items, &from, &to);
            let output = output.unwrap_or(input);
            dataset::write_json(&output, &items)?;
            println!("✔ {}件の画像パスを書き換えました: {}", rewritten, output.display());
        }

        DatasetTool::ListImages { input, output } => {
            let items = dataset::read_json_array(&input)?;
            let paths = dataset::unique_image_paths(&items);
            let mut content = paths.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            std::fs::write(&output, content)?;
            println!("✔ {}件の画像パスを出力しました: {}", paths.len(), output.display());
        }

        DatasetTool::CollectImages {
            input,
            source,
            target,
        } => {
            let items = dataset::read_json_array(&input)?;
            let report = dataset::collect_images(&items, &source, &target)?;

            println!("総画像数: {}", report.total);
            println!("✔ コピー成功: {}", report.copied);
            if !report.missing.is_empty() {
                println!("⚠ 見つからない画像: {}", report.missing.len());
                for name in report.missing.iter().take(10) {
                    println!("  - {}", name);
                }
            }
            for (name, reason) in &report.failed {
                println!("⚠ コピー失敗 {}: {}", name, reason);
            }
        }

        DatasetTool::RescorePairs { input, output } => {
            let mut items = dataset::read_json_array(&input)?;
            let rescored = dataset::rescore_pairs(&mut items);
            let output = output.unwrap_or(input);
            dataset::write_json(&output, &items)?;
            println!("✔ {}件のペアの類似度を更新しました: {}", rescored, output.display());
        }
    }

    Ok(())
}

fn read_json_value(path: &Path) -> Result<serde_json::Value> {
    if !path.exists() {
        return Err(error::RaterError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// 先頭10件まで表示し、残りは件数だけ出す
fn print_limited(title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    println!("\n{} ({}件):", title, lines.len());
    for line in lines.iter().take(10) {
        println!("  {}", line);
    }
    if lines.len() > 10 {
        println!("  ... 他{}件", lines.len() - 10);
    }
}
