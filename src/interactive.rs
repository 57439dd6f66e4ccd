//! 対話式評価モジュール
//!
//! 端末上で症例を1件ずつ表示し、評価と移動のコマンドを受け付ける。

use crate::controller::{Annotator, SaveMode};
use crate::error::{RaterError, Result};
use case_rater_common::{CaseRecord, Choice, RatingValue, Score, SessionState, Task};
use dialoguer::{Confirm, Input};

/// 対話アクション
#[derive(Debug, Clone, PartialEq)]
pub enum RaterAction {
    /// 現在の症例を評価
    Rate(Task, RatingValue),
    /// 次の症例
    Next,
    /// 前の症例
    Previous,
    /// 次の画像
    NextImage,
    /// 前の画像
    PreviousImage,
    /// 指定症例へ移動（0始まり）
    GoTo(usize),
    /// 保存
    Save,
    /// 最初からやり直す
    Restart,
    /// ヘルプ表示
    Help,
    /// 終了
    Quit,
}

const HELP: &str = "操作: [1-4]スコア [i1-4]画像 [d1-4]診断 [a/b]ペア選択 [Enter/n]次へ [p]前へ \
                    []]次の画像 [[]前の画像 [g 番号]移動 [s]保存 [R]やり直し [q]終了 [?]ヘルプ";

/// 入力文字列をアクションに変換
///
/// 数字だけの入力は、未評価のスコア系タスクのうち最初のものに割り当てる。
pub fn parse_action(input: &str, state: &SessionState) -> std::result::Result<RaterAction, String> {
    let trimmed = input.trim();

    match trimmed {
        "" | "n" => return Ok(RaterAction::Next),
        "p" => return Ok(RaterAction::Previous),
        "]" => return Ok(RaterAction::NextImage),
        "[" => return Ok(RaterAction::PreviousImage),
        "s" => return Ok(RaterAction::Save),
        "R" => return Ok(RaterAction::Restart),
        "?" | "h" => return Ok(RaterAction::Help),
        "q" | "Q" => return Ok(RaterAction::Quit),
        "a" | "A" => return Ok(RaterAction::Rate(Task::Pair, RatingValue::Choice(Choice::A))),
        "b" | "B" => return Ok(RaterAction::Rate(Task::Pair, RatingValue::Choice(Choice::B))),
        _ => {}
    }

    if let Some(rest) = trimmed.strip_prefix('g') {
        let number: usize = rest
            .trim()
            .parse()
            .map_err(|_| format!("移動先の番号が不正です: {}", rest.trim()))?;
        if number == 0 || number > state.dataset_len() + 1 {
            return Err(format!("番号は1〜{}で指定してください", state.dataset_len() + 1));
        }
        return Ok(RaterAction::GoTo(number - 1));
    }

    let (task, digits) = match trimmed.chars().next() {
        Some('i') => (Some(Task::Image), &trimmed[1..]),
        Some('d') => (Some(Task::Diagnosis), &trimmed[1..]),
        _ => (None, trimmed),
    };

    let score = digits
        .parse::<u8>()
        .ok()
        .and_then(Score::new)
        .ok_or_else(|| format!("不明な入力です: {}（?でヘルプ）", trimmed))?;

    let task = match task {
        Some(task) => task,
        None => default_score_task(state)
            .ok_or_else(|| "このセッションにはスコアで評価するタスクがありません".to_string())?,
    };

    Ok(RaterAction::Rate(task, RatingValue::Score(score)))
}

/// 数字だけの入力を割り当てるタスク
fn default_score_task(state: &SessionState) -> Option<Task> {
    let index = state.current_index();
    let mut score_tasks = state
        .tasks()
        .iter()
        .filter(|task| matches!(task, Task::Image | Task::Diagnosis))
        .peekable();
    let first = score_tasks.peek().copied();
    score_tasks
        .find(|&task| state.get_rating(index, task).is_none())
        .or(first)
}

/// 対話式で評価する
pub fn run_interactive_rating(annotator: &mut Annotator) -> Result<()> {
    println!("{}", HELP);
    println!("---\n");

    loop {
        for notice in annotator.drain_notices() {
            println!("⚠ {}", notice);
        }

        if annotator.state().is_complete() {
            print_completion(annotator.state());
        } else {
            print_case(annotator);
        }

        let input: String = Input::new()
            .with_prompt("入力")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| RaterError::Prompt(e.to_string()))?;

        let action = match parse_action(&input, annotator.state()) {
            Ok(action) => action,
            Err(message) => {
                println!("  → {}\n", message);
                continue;
            }
        };

        match action {
            RaterAction::Rate(task, value) => match annotator.rate(task, value) {
                Ok(()) => println!("  → {}: {}\n", task.label(), value),
                Err(e) => println!("  → {}\n", e),
            },
            RaterAction::Next => match annotator.next() {
                Ok(_) => println!(),
                Err(e) => println!("  → {}\n", e),
            },
            RaterAction::Previous => {
                annotator.previous();
                println!();
            }
            RaterAction::NextImage => {
                annotator.next_image();
            }
            RaterAction::PreviousImage => {
                annotator.previous_image();
            }
            RaterAction::GoTo(index) => match annotator.go_to(index) {
                Ok(_) => println!(),
                Err(e) => println!("  → {}\n", e),
            },
            RaterAction::Save => {
                if annotator.save() {
                    println!("  ✔ 保存しました\n");
                }
            }
            RaterAction::Restart => {
                let confirmed = Confirm::new()
                    .with_prompt("すべての評価を削除して最初からやり直しますか？")
                    .default(false)
                    .interact()
                    .map_err(|e| RaterError::Prompt(e.to_string()))?;
                if confirmed {
                    annotator.restart();
                    println!("  → 新しいセッションを開始しました\n");
                }
            }
            RaterAction::Help => println!("{}\n", HELP),
            RaterAction::Quit => break,
        }
    }

    if annotator.save_mode() == SaveMode::Manual && annotator.is_dirty() {
        let save = Confirm::new()
            .with_prompt("未保存の評価があります。保存しますか？")
            .default(true)
            .interact()
            .map_err(|e| RaterError::Prompt(e.to_string()))?;
        if save && annotator.save() {
            println!("✔ 保存しました");
        }
    }

    Ok(())
}

fn print_case(annotator: &Annotator) {
    let state = annotator.state();
    let index = state.current_index();
    let Some(case) = annotator.current_case() else {
        return;
    };
    let progress = state.progress();

    println!(
        "[{}/{}] {}（完了 {}/{}, {:.1}%）",
        index + 1,
        state.dataset_len(),
        case.id.as_deref().map(|id| format!("症例ID: {}", id)).unwrap_or_default(),
        progress.rated_cases,
        progress.total,
        progress.percent
    );

    if case.image_paths.is_empty() {
        println!("  画像: なし");
    } else if let Some(image) = annotator.current_image() {
        println!(
            "  画像 ({}/{}): {}",
            state.current_image_index() + 1,
            case.image_count(),
            image
        );
    }
    println!("  プロンプト: {}", case.prompt);

    if state.tasks().contains(Task::Diagnosis) {
        print_diagnoses(case);
    }
    if state.tasks().contains(Task::Pair) {
        for pair in &case.task3_pairs {
            let similarity = pair
                .similarity
                .map(|s| format!("{:.2}", s))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  ペア{}: {} ↔ {}（類似度 {}）",
                pair.pair_id, pair.predicted, pair.ground_truth, similarity
            );
        }
    }

    let ratings: Vec<String> = state
        .tasks()
        .iter()
        .map(|task| match state.get_rating(index, task) {
            Some(rating) => format!("{}={}", task.label(), rating.value),
            None => format!("{}=未評価", task.label()),
        })
        .collect();
    println!("  評価: {}", ratings.join(", "));
}

fn print_diagnoses(case: &CaseRecord) {
    println!(
        "  予測診断: {}",
        case.predicted_diagnosis.as_deref().unwrap_or("-")
    );
    println!(
        "  正解診断: {}",
        case.ground_truth_diagnosis.as_deref().unwrap_or("-")
    );
}

fn print_completion(state: &SessionState) {
    println!(
        "✅ 全{}件の評価が完了しました（評価数: {}）",
        state.dataset_len(),
        state.total_rated()
    );
    println!("  [p]前へ戻る [q]終了（`case-rater export` で結果を出力）");
}

#[cfg(test)]
mod tests {
    use super::*;
    use case_rater_common::{NavigationPolicy, TaskSet};

    fn state_with(tasks: Vec<Task>) -> SessionState {
        SessionState::new(3, TaskSet::new(tasks).unwrap(), NavigationPolicy::Blocking)
    }

    fn score(v: u8) -> RatingValue {
        RatingValue::Score(Score::new(v).unwrap())
    }

    #[test]
    fn test_parse_navigation() {
        let state = state_with(vec![Task::Image]);
        assert_eq!(parse_action("", &state), Ok(RaterAction::Next));
        assert_eq!(parse_action(" n ", &state), Ok(RaterAction::Next));
        assert_eq!(parse_action("p", &state), Ok(RaterAction::Previous));
        assert_eq!(parse_action("]", &state), Ok(RaterAction::NextImage));
        assert_eq!(parse_action("[", &state), Ok(RaterAction::PreviousImage));
        assert_eq!(parse_action("q", &state), Ok(RaterAction::Quit));
        assert_eq!(parse_action("g 2", &state), Ok(RaterAction::GoTo(1)));
        assert_eq!(parse_action("g4", &state), Ok(RaterAction::GoTo(3)));
        assert!(parse_action("g 9", &state).is_err());
        assert!(parse_action("g x", &state).is_err());
    }

    #[test]
    fn test_parse_scores() {
        let state = state_with(vec![Task::Image]);
        assert_eq!(parse_action("3", &state), Ok(RaterAction::Rate(Task::Image, score(3))));
        assert_eq!(parse_action("d2", &state), Ok(RaterAction::Rate(Task::Diagnosis, score(2))));
        assert!(parse_action("5", &state).is_err());
        assert!(parse_action("zz", &state).is_err());
    }

    #[test]
    fn test_parse_choice() {
        let state = state_with(vec![Task::Pair]);
        assert_eq!(
            parse_action("B", &state),
            Ok(RaterAction::Rate(Task::Pair, RatingValue::Choice(Choice::B)))
        );
        assert!(parse_action("2", &state).is_err());
    }

    #[test]
    fn test_bare_digit_goes_to_first_pending_score_task() {
        let mut state = state_with(vec![Task::Image, Task::Diagnosis]);
        assert_eq!(parse_action("1", &state), Ok(RaterAction::Rate(Task::Image, score(1))));

        state.set_rating(0, Task::Image, score(1)).unwrap();
        assert_eq!(parse_action("4", &state), Ok(RaterAction::Rate(Task::Diagnosis, score(4))));

        state.set_rating(0, Task::Diagnosis, score(4)).unwrap();
        assert_eq!(parse_action("2", &state), Ok(RaterAction::Rate(Task::Image, score(2))));
    }
}
