use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::QuestionSetError;

/// 选项 / 配对项（两者结构相同）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
}

/// 配对题的一组配对（左 → 右）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchPair {
    pub left_id: String,
    pub right_id: String,
}

impl MatchPair {
    pub fn new(left_id: impl Into<String>, right_id: impl Into<String>) -> Self {
        Self {
            left_id: left_id.into(),
            right_id: right_id.into(),
        }
    }
}

/// 题目
///
/// 公共字段在外层，题型相关的字段放在 `kind` 中，JSON 里通过 `type` 区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub points: f64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// 题型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionKind {
    /// 单选题
    #[serde(rename = "PILIHAN_GANDA", rename_all = "camelCase")]
    SingleChoice {
        options: Vec<ChoiceOption>,
        correct_option_id: String,
    },
    /// 多选题（全对才得分）
    #[serde(rename = "PILIHAN_GANDA_KOMPLEKS", rename_all = "camelCase")]
    MultiChoice {
        options: Vec<ChoiceOption>,
        correct_option_ids: Vec<String>,
    },
    /// 配对题（按正确配对数给分）
    #[serde(rename = "MENJODOHKAN", rename_all = "camelCase")]
    Matching {
        left_items: Vec<ChoiceOption>,
        right_items: Vec<ChoiceOption>,
        correct_pairs: Vec<MatchPair>,
    },
    /// 主观题，评分标准只交给 LLM
    #[serde(rename = "URAIAN")]
    FreeText { rubric: String },
}

impl QuestionKind {
    /// 题型标签（用于界面显示）
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::SingleChoice { .. } => "single choice",
            QuestionKind::MultiChoice { .. } => "multiple answers",
            QuestionKind::Matching { .. } => "matching",
            QuestionKind::FreeText { .. } => "essay",
        }
    }
}

impl Question {
    pub fn is_free_text(&self) -> bool {
        matches!(self.kind, QuestionKind::FreeText { .. })
    }

    /// 单题校验
    fn validate(&self) -> Result<(), QuestionSetError> {
        if !self.points.is_finite() || self.points <= 0.0 {
            return Err(QuestionSetError::InvalidPoints {
                id: self.id.clone(),
                points: self.points,
            });
        }

        match &self.kind {
            QuestionKind::SingleChoice {
                options,
                correct_option_id,
            } => {
                if !options.iter().any(|o| &o.id == correct_option_id) {
                    return Err(QuestionSetError::UnknownCorrectOption {
                        id: self.id.clone(),
                        option_id: correct_option_id.clone(),
                    });
                }
            }
            QuestionKind::MultiChoice {
                options,
                correct_option_ids,
            } => {
                if correct_option_ids.is_empty() {
                    return Err(QuestionSetError::NoCorrectAnswer { id: self.id.clone() });
                }
                if let Some(missing) = correct_option_ids
                    .iter()
                    .find(|id| !options.iter().any(|o| &o.id == *id))
                {
                    return Err(QuestionSetError::UnknownCorrectOption {
                        id: self.id.clone(),
                        option_id: missing.clone(),
                    });
                }
            }
            QuestionKind::Matching {
                left_items,
                right_items,
                correct_pairs,
            } => {
                if correct_pairs.is_empty() {
                    return Err(QuestionSetError::NoCorrectAnswer { id: self.id.clone() });
                }
                let mut seen_left = HashSet::new();
                let mut seen_right = HashSet::new();
                for pair in correct_pairs {
                    let known = left_items.iter().any(|i| i.id == pair.left_id)
                        && right_items.iter().any(|i| i.id == pair.right_id);
                    // 左右两侧都必须是单射
                    let fresh = seen_left.insert(pair.left_id.as_str())
                        && seen_right.insert(pair.right_id.as_str());
                    if !known || !fresh {
                        return Err(QuestionSetError::InvalidPair {
                            id: self.id.clone(),
                            left_id: pair.left_id.clone(),
                            right_id: pair.right_id.clone(),
                        });
                    }
                }
            }
            QuestionKind::FreeText { .. } => {}
        }

        Ok(())
    }
}

/// 题库（加载后不可变）
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    questions: Vec<Question>,
}

impl QuestionSet {
    /// 校验并构建题库
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionSetError> {
        if questions.is_empty() {
            return Err(QuestionSetError::Empty);
        }

        let mut ids = HashSet::new();
        for question in &questions {
            if !ids.insert(question.id.as_str()) {
                return Err(QuestionSetError::DuplicateId {
                    id: question.id.clone(),
                });
            }
            question.validate()?;
        }

        Ok(Self { questions })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// 满分（所有题目分值之和）
    pub fn total_points(&self) -> f64 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub fn has_free_text(&self) -> bool {
        self.questions.iter().any(Question::is_free_text)
    }
}
