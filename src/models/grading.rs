use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::answer::AnswerMap;
use crate::models::exam_state::ExamStatus;
use crate::models::student::StudentData;

/// 主观题评分失败时的兜底反馈
pub const FALLBACK_FEEDBACK: &str =
    "Sorry, automatic grading failed. Your teacher will grade this answer manually.";

/// 答案过短时的固定反馈
pub const TOO_SHORT_FEEDBACK: &str = "Answer is too short or empty.";

/// 单道主观题的评分结果（0-100 分 + 评语）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingResult {
    pub score: u32,
    pub feedback: String,
}

impl GradingResult {
    pub fn new(score: u32, feedback: impl Into<String>) -> Self {
        Self {
            score: score.min(100),
            feedback: feedback.into(),
        }
    }

    /// 评分服务不可用时的兜底结果
    pub fn fallback() -> Self {
        Self::new(0, FALLBACK_FEEDBACK)
    }

    pub fn too_short() -> Self {
        Self::new(0, TOO_SHORT_FEEDBACK)
    }
}

/// 主观题评语表：题目ID → 评分结果（按题目ID排序）
pub type FeedbackMap = BTreeMap<String, GradingResult>;

/// 一次评分的最终结果，交给状态机进入终态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradingOutcome {
    pub score: u32,
    pub feedback: FeedbackMap,
}

impl GradingOutcome {
    /// 评分流程整体失败：0 分、无评语
    pub fn failed() -> Self {
        Self::default()
    }
}

/// 提交给成绩保存端点的数据
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResultPayload {
    pub student: StudentData,
    pub score: u32,
    pub answers: AnswerMap,
    pub ai_feedback: FeedbackMap,
    pub status: ExamStatus,
    pub violation_count: u32,
    pub submitted_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grading_result_clamps_score() {
        assert_eq!(GradingResult::new(150, "great").score, 100);
        assert_eq!(GradingResult::fallback().score, 0);
        assert_eq!(GradingResult::fallback().feedback, FALLBACK_FEEDBACK);
    }

    #[test]
    fn test_payload_uses_camel_case() {
        let payload = ExamResultPayload {
            student: StudentData::new("Budi", "9B", "123"),
            score: 70,
            answers: AnswerMap::new(),
            ai_feedback: FeedbackMap::new(),
            status: ExamStatus::Finished,
            violation_count: 1,
            submitted_at: "2026-01-01T00:00:00+07:00".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["aiFeedback"], serde_json::json!({}));
        assert_eq!(json["status"], "finished");
        assert_eq!(json["violationCount"], 1);
        assert_eq!(json["student"]["nisn"], "123");
    }
}
