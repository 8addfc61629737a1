use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::question::{MatchPair, QuestionKind};

/// 学生对单道题的作答，形状与题型一一对应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Answer {
    /// 单选：选中的选项ID
    SingleChoice(String),
    /// 多选：选中的选项ID集合
    MultiChoice(BTreeSet<String>),
    /// 配对：已配对的列表
    Matching(Vec<MatchPair>),
    /// 主观题：原始文本
    FreeText(String),
}

impl Answer {
    /// 答案形状是否与题型一致
    pub fn fits(&self, kind: &QuestionKind) -> bool {
        matches!(
            (self, kind),
            (Answer::SingleChoice(_), QuestionKind::SingleChoice { .. })
                | (Answer::MultiChoice(_), QuestionKind::MultiChoice { .. })
                | (Answer::Matching(_), QuestionKind::Matching { .. })
                | (Answer::FreeText(_), QuestionKind::FreeText { .. })
        )
    }
}

/// 答案表：题目ID → 作答。没有条目即未作答
pub type AnswerMap = BTreeMap<String, Answer>;
