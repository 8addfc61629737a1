/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use tracing::info;

use crate::config::Config;
use crate::models::{ExamState, ExamStatus, QuestionSet};

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - {}", config.exam_title);
    info!(
        "⏱️ 考试时长: {} 分钟 | 违规上限: {} 次",
        config.exam_duration_seconds / 60,
        config.max_violations
    );
    info!("🤖 评分模型: {}", config.llm_model_name);
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
}

/// 记录题库加载信息
pub fn log_questions_loaded(questions: &QuestionSet) {
    let essays = questions
        .questions()
        .iter()
        .filter(|q| q.is_free_text())
        .count();
    info!(
        "✓ 共 {} 道题 (主观题 {} 道)，满分 {}",
        questions.len(),
        essays,
        questions.total_points()
    );
}

/// 记录最终结果
pub fn log_final_result(state: &ExamState) {
    let outcome = match state.status {
        ExamStatus::Violation => "违规终止",
        _ => "正常交卷",
    };
    let student = state
        .student
        .as_ref()
        .map(|s| format!("{} ({})", s.name, s.class))
        .unwrap_or_default();

    info!("\n{}", "=".repeat(60));
    info!("📊 考试结束: {}", outcome);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("👤 考生: {}", student);
    info!("✅ 得分: {}/100", state.score);
    info!("⚠️ 违规: {} 次", state.violation_count);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
