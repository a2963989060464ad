//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use tally_core::test_utils::MockGeminiServer;
use tally_core::{
    AIClient, CandidateConfig, Category, ExamSession, GeminiBackend, InvocationErrorKind, Ledger,
    MockBackend, ModelReply, PinnedModel, PromptLibrary, StrategyKind, TaskType, TransactionKind,
};
use tempfile::TempDir;

use crate::commands::{self, colored_amount, format_amount, truncate};

fn temp_ledger() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tally.csv");
    (dir, path)
}

fn models(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ========== Add Command Tests ==========

#[tokio::test]
async fn test_cmd_add_schema_strategy() {
    let (_dir, path) = temp_ledger();

    let result = commands::cmd_add(
        &path,
        "Ăn phở 40k",
        StrategyKind::Schema,
        models(&["m"]),
        AIClient::mock(),
    )
    .await;
    assert!(result.is_ok());

    let ledger = Ledger::load_from_path(&path).unwrap();
    assert_eq!(ledger.len(), 1);
    let tx = &ledger.all()[0];
    assert_eq!(tx.category, Category::Food);
    assert_eq!(tx.amount, 40_000);
    assert_eq!(tx.kind, TransactionKind::Expense);
}

#[tokio::test]
async fn test_cmd_add_delimited_strategy_appends() {
    let (_dir, path) = temp_ledger();

    commands::cmd_add(&path, "Ăn phở 40k", StrategyKind::Delimited, models(&["m"]), MockBackend::new())
        .await
        .unwrap();
    commands::cmd_add(&path, "Lương 15tr", StrategyKind::Delimited, models(&["m"]), MockBackend::new())
        .await
        .unwrap();

    let ledger = Ledger::load_from_path(&path).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.all()[1].category, Category::Salary);
    assert_eq!(ledger.all()[1].amount, 15_000_000);
    assert_eq!(ledger.all()[1].kind, TransactionKind::Income);
    assert_eq!(ledger.totals().balance, 15_000_000 - 40_000);
}

#[tokio::test]
async fn test_cmd_add_falls_back_to_next_candidate() {
    let (_dir, path) = temp_ledger();
    let mock = MockBackend::new().with_failure("primary", InvocationErrorKind::RateLimited, "quota");

    commands::cmd_add(&path, "Grab 55k", StrategyKind::Schema, models(&["primary", "backup"]), mock.clone())
        .await
        .unwrap();

    assert_eq!(mock.calls(), vec!["primary", "backup"]);
    let ledger = Ledger::load_from_path(&path).unwrap();
    assert_eq!(ledger.all()[0].category, Category::Transport);
}

#[tokio::test]
async fn test_cmd_add_failure_leaves_ledger_untouched() {
    let (_dir, path) = temp_ledger();
    let mock = MockBackend::new().with_failure("m", InvocationErrorKind::Upstream, "boom");

    let result =
        commands::cmd_add(&path, "Ăn phở 40k", StrategyKind::Schema, models(&["m"]), mock).await;
    assert!(result.is_err());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_cmd_add_rejects_non_transaction() {
    let (_dir, path) = temp_ledger();
    let mock = MockBackend::new().with_reply("m", ModelReply::from_text("Không phải giao dịch."));

    let result =
        commands::cmd_add(&path, "Hôm nay trời đẹp", StrategyKind::Schema, models(&["m"]), mock).await;
    assert!(result.is_err());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_cmd_add_blank_text_calls_no_model() {
    let (_dir, path) = temp_ledger();
    let mock = MockBackend::new();

    let result = commands::cmd_add(&path, "   ", StrategyKind::Schema, models(&["m"]), mock.clone()).await;
    assert!(result.is_err());
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_cmd_add_against_gemini_api() {
    let server = MockGeminiServer::start().await;
    let (_dir, path) = temp_ledger();
    let client = AIClient::Gemini(GeminiBackend::new(
        &server.url(),
        Some("test-key"),
        Duration::from_secs(5),
    ));

    commands::cmd_add(
        &path,
        "Cafe sáng 25k",
        StrategyKind::Schema,
        models(&[MockGeminiServer::RATE_LIMITED_MODEL, "gemini-2.0-flash"]),
        client,
    )
    .await
    .unwrap();

    assert_eq!(server.request_count(), 2);
    let ledger = Ledger::load_from_path(&path).unwrap();
    assert_eq!(ledger.all()[0].amount, 25_000);
    assert_eq!(ledger.all()[0].category, Category::Food);
}

// ========== List / Report / Reset Tests ==========

#[test]
fn test_cmd_list_missing_ledger() {
    let (_dir, path) = temp_ledger();
    assert!(commands::cmd_list(&path, 10).is_ok());
}

#[tokio::test]
async fn test_cmd_list_and_report_with_data() {
    let (_dir, path) = temp_ledger();
    for text in ["Ăn phở 40k", "Grab 30k", "Lương 15tr"] {
        commands::cmd_add(&path, text, StrategyKind::Schema, models(&["m"]), MockBackend::new())
            .await
            .unwrap();
    }

    assert!(commands::cmd_list(&path, 2).is_ok());
    assert!(commands::cmd_list(&path, 0).is_ok());
    assert!(commands::cmd_report(&path).is_ok());
}

#[test]
fn test_cmd_report_empty() {
    let (_dir, path) = temp_ledger();
    assert!(commands::cmd_report(&path).is_ok());
}

#[test]
fn test_cmd_list_corrupt_ledger() {
    let (_dir, path) = temp_ledger();
    std::fs::write(
        &path,
        "date,category,amount,note,type\nyesterday,Food,100,x,Expense\n",
    )
    .unwrap();
    assert!(commands::cmd_list(&path, 10).is_err());
}

#[tokio::test]
async fn test_cmd_reset_requires_confirmation() {
    let (_dir, path) = temp_ledger();
    commands::cmd_add(&path, "Ăn phở 40k", StrategyKind::Schema, models(&["m"]), MockBackend::new())
        .await
        .unwrap();

    assert!(commands::cmd_reset(&path, false).is_err());
    assert_eq!(Ledger::load_from_path(&path).unwrap().len(), 1);

    assert!(commands::cmd_reset(&path, true).is_ok());
    assert!(Ledger::load_from_path(&path).unwrap().is_empty());
}

// ========== Exam Command Tests ==========

#[tokio::test]
async fn test_cmd_grade_with_reference() {
    let dir = TempDir::new().unwrap();
    let reference = dir.path().join("notes.txt");
    std::fs::write(&reference, "Hiệp định Genève ký năm 1954").unwrap();

    let mock = MockBackend::new().with_reply("m", ModelReply::from_text("Điểm: 7/10"));
    let result = commands::cmd_grade(
        "Hiệp định Genève ký năm nào?",
        "Năm 1954",
        Some(&reference),
        models(&["m"]),
        mock.clone(),
    )
    .await;
    assert!(result.is_ok());
    assert!(mock.requests()[0].1.prompt.contains("Hiệp định Genève ký năm 1954"));
}

#[tokio::test]
async fn test_cmd_grade_missing_reference_file() {
    let dir = TempDir::new().unwrap();
    let result = commands::cmd_grade(
        "Q",
        "A",
        Some(&dir.path().join("missing.txt")),
        models(&["m"]),
        MockBackend::new(),
    )
    .await;
    assert!(result.is_err());
}

#[test]
fn test_read_answer_sources() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("answer.txt");
    std::fs::write(&file, "Bài làm").unwrap();

    assert_eq!(commands::read_answer(Some("inline".into()), None).unwrap(), "inline");
    assert_eq!(commands::read_answer(None, Some(&file)).unwrap(), "Bài làm");
    assert!(commands::read_answer(None, None).is_err());
}

#[tokio::test]
async fn test_exam_loop_records_turns_and_resets() {
    let mock = MockBackend::new()
        .with_reply("m", ModelReply::from_text("Tại sao?"))
        .with_reply("m", ModelReply::from_text("Tốt lắm."));
    let mut prompts = PromptLibrary::embedded_only();
    let mut session = ExamSession::new(PinnedModel::new(mock.clone(), "m"), &mut prompts, None).unwrap();

    let input = Cursor::new("Năm 1945\n\nVì Nhật đầu hàng\n/quit\nkhông đọc tới đây\n");
    let mut output = Vec::new();
    commands::run_exam_loop(&mut session, input, &mut output).await.unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("Examiner: Tại sao?"));
    assert!(output.contains("Examiner: Tốt lắm."));
    assert!(output.contains("after 2 exchange(s)"));
    assert_eq!(session.context().len(), 4);
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_exam_loop_continues_after_failure() {
    let mock = MockBackend::new()
        .with_failure("m", InvocationErrorKind::Transport, "slow")
        .with_reply("m", ModelReply::from_text("Tiếp tục."));
    let mut prompts = PromptLibrary::embedded_only();
    let mut session = ExamSession::new(PinnedModel::new(mock, "m"), &mut prompts, None).unwrap();

    let input = Cursor::new("câu một\ncâu hai\n/reset\n");
    let mut output = Vec::new();
    commands::run_exam_loop(&mut session, input, &mut output).await.unwrap();

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("⚠️"));
    assert!(output.contains("Examiner: Tiếp tục."));
    assert!(output.contains("Conversation cleared"));
    assert!(session.context().is_empty());
}

// ========== Models / Prompts Command Tests ==========

#[tokio::test]
async fn test_cmd_models_with_mock() {
    let config = CandidateConfig::default();
    assert!(commands::cmd_models(&config, &AIClient::mock()).await.is_ok());
    assert!(commands::cmd_models(&config, &MockBackend::unhealthy()).await.is_ok());
}

#[test]
fn test_resolve_candidates_prefers_explicit_models() {
    let config = CandidateConfig::default();
    assert_eq!(
        commands::resolve_candidates(&config, TaskType::Extraction, &[]),
        config.candidates_for(TaskType::Extraction)
    );
    assert_eq!(
        commands::resolve_candidates(
            &config,
            TaskType::Exam,
            &models(&["a", " b ", "a"])
        ),
        models(&["a", "b"])
    );
}

#[test]
fn test_cmd_prompts_list() {
    assert!(commands::cmd_prompts_list().is_ok());
}

#[test]
fn test_cmd_prompts_show() {
    assert!(commands::cmd_prompts_show("extract_delimited").is_ok());
    assert!(commands::cmd_prompts_show("no_such_prompt").is_err());
}

#[test]
fn test_cmd_prompts_path() {
    assert!(commands::cmd_prompts_path().is_ok());
}

// ========== Helper Tests ==========

#[test]
fn test_format_amount() {
    assert_eq!(format_amount(0), "0đ");
    assert_eq!(format_amount(999), "999đ");
    assert_eq!(format_amount(40_000), "40.000đ");
    assert_eq!(format_amount(1_500_000), "1.500.000đ");
}

#[test]
fn test_colored_amount_pads_visible_text() {
    let expense = colored_amount(TransactionKind::Expense, 40_000, 14);
    assert_eq!(expense, "\x1b[31m      -40.000đ\x1b[0m");

    let income = colored_amount(TransactionKind::Income, 15_000_000, 14);
    let visible = income.trim_start_matches("\x1b[32m").trim_end_matches("\x1b[0m");
    assert_eq!(visible.chars().count(), 14);
    assert_eq!(visible.trim_start(), "+15.000.000đ");
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("this is a long string", 10), "this is...");
    assert_eq!(truncate("Ăn phở ở Hà Nội", 8), "Ăn ph...");
}
