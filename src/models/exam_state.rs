use serde::{Deserialize, Serialize};

use crate::models::answer::AnswerMap;
use crate::models::grading::FeedbackMap;
use crate::models::student::StudentData;

/// 考试状态
///
/// ```text
/// idle → active → pending_finish    ┐
///               → pending_violation ┴→ grading → finished / violation
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    Idle,
    Active,
    PendingFinish,
    PendingViolation,
    Grading,
    Finished,
    Violation,
}

impl ExamStatus {
    /// 终态：只能通过重启离开
    pub fn is_terminal(self) -> bool {
        matches!(self, ExamStatus::Finished | ExamStatus::Violation)
    }

    pub fn is_pending(self) -> bool {
        matches!(self, ExamStatus::PendingFinish | ExamStatus::PendingViolation)
    }
}

/// 考试结束的方式，决定评分完成后进入哪个终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamOutcome {
    Completed,
    Violation,
}

impl ExamOutcome {
    pub fn terminal_status(self) -> ExamStatus {
        match self {
            ExamOutcome::Completed => ExamStatus::Finished,
            ExamOutcome::Violation => ExamStatus::Violation,
        }
    }
}

/// 考试状态记录，只由状态机修改
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamState {
    pub status: ExamStatus,
    pub current_question_index: usize,
    pub answers: AnswerMap,
    pub time_left_seconds: u64,
    pub violation_count: u32,
    pub score: u32,
    pub ai_feedback: FeedbackMap,
    pub outcome: Option<ExamOutcome>,
    pub last_warning: Option<String>,
    pub student: Option<StudentData>,
}

impl ExamState {
    pub fn new(duration_seconds: u64) -> Self {
        Self {
            status: ExamStatus::Idle,
            current_question_index: 0,
            answers: AnswerMap::new(),
            time_left_seconds: duration_seconds,
            violation_count: 0,
            score: 0,
            ai_feedback: FeedbackMap::new(),
            outcome: None,
            last_warning: None,
            student: None,
        }
    }
}
