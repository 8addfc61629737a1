//! 作答采集 - 业务能力层
//!
//! 每种题型一个纯函数：(当前答案, 用户操作) → 新答案。
//! 只有配对题需要临时记住"已选中但还没配对的左侧项"。

use std::collections::BTreeSet;

use crate::error::ExamError;
use crate::models::{Answer, ChoiceOption, MatchPair, Question, QuestionKind};

/// 单选：选中某个选项
pub fn select_option(question: &Question, option_id: &str) -> Result<Answer, ExamError> {
    match &question.kind {
        QuestionKind::SingleChoice { options, .. } => {
            ensure_known(question, options, option_id)?;
            Ok(Answer::SingleChoice(option_id.to_string()))
        }
        _ => Err(shape_mismatch(question)),
    }
}

/// 多选：切换某个选项是否选中
pub fn toggle_option(
    question: &Question,
    current: Option<&Answer>,
    option_id: &str,
) -> Result<Answer, ExamError> {
    let QuestionKind::MultiChoice { options, .. } = &question.kind else {
        return Err(shape_mismatch(question));
    };
    ensure_known(question, options, option_id)?;

    let mut selected: BTreeSet<String> = match current {
        Some(Answer::MultiChoice(set)) => set.clone(),
        Some(_) => return Err(shape_mismatch(question)),
        None => BTreeSet::new(),
    };

    if !selected.remove(option_id) {
        selected.insert(option_id.to_string());
    }

    Ok(Answer::MultiChoice(selected))
}

/// 主观题：整体替换文本
pub fn write_text(question: &Question, text: &str) -> Result<Answer, ExamError> {
    match question.kind {
        QuestionKind::FreeText { .. } => Ok(Answer::FreeText(text.to_string())),
        _ => Err(shape_mismatch(question)),
    }
}

/// 配对题的"先点左、再点右"交互
///
/// 只持有待配对的左侧项；答案本身仍由调用方保存在答案表里
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairingSelection {
    pending_left: Option<String>,
}

impl PairingSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_left(&self) -> Option<&str> {
        self.pending_left.as_deref()
    }

    /// 清空临时选择（切题时调用）
    pub fn clear(&mut self) {
        self.pending_left = None;
    }

    /// 点击左侧项
    ///
    /// 已配对的左侧项会先解除配对，返回 `Some(新答案)`；否则答案不变，返回 `None`
    pub fn select_left(
        &mut self,
        question: &Question,
        current: Option<&Answer>,
        left_id: &str,
    ) -> Result<Option<Answer>, ExamError> {
        let (left_items, _) = matching_items(question)?;
        ensure_known(question, left_items, left_id)?;
        let pairs = current_pairs(question, current)?;

        self.pending_left = Some(left_id.to_string());

        if pairs.iter().any(|p| p.left_id == left_id) {
            let remaining = pairs.into_iter().filter(|p| p.left_id != left_id).collect();
            return Ok(Some(Answer::Matching(remaining)));
        }
        Ok(None)
    }

    /// 点击右侧项
    ///
    /// - 有待配对的左侧项：建立配对，并移除占用该左侧或该右侧的旧配对
    /// - 没有待配对项但该右侧已配对：解除配对
    /// - 其余情况：无变化
    pub fn select_right(
        &mut self,
        question: &Question,
        current: Option<&Answer>,
        right_id: &str,
    ) -> Result<Option<Answer>, ExamError> {
        let (_, right_items) = matching_items(question)?;
        ensure_known(question, right_items, right_id)?;
        let pairs = current_pairs(question, current)?;

        if let Some(left_id) = self.pending_left.take() {
            let mut next: Vec<MatchPair> = pairs
                .into_iter()
                .filter(|p| p.right_id != right_id && p.left_id != left_id)
                .collect();
            next.push(MatchPair::new(left_id, right_id));
            return Ok(Some(Answer::Matching(next)));
        }

        if pairs.iter().any(|p| p.right_id == right_id) {
            let remaining = pairs.into_iter().filter(|p| p.right_id != right_id).collect();
            return Ok(Some(Answer::Matching(remaining)));
        }

        Ok(None)
    }
}

fn matching_items(question: &Question) -> Result<(&[ChoiceOption], &[ChoiceOption]), ExamError> {
    match &question.kind {
        QuestionKind::Matching {
            left_items,
            right_items,
            ..
        } => Ok((left_items, right_items)),
        _ => Err(shape_mismatch(question)),
    }
}

fn current_pairs(question: &Question, current: Option<&Answer>) -> Result<Vec<MatchPair>, ExamError> {
    match current {
        Some(Answer::Matching(pairs)) => Ok(pairs.clone()),
        Some(_) => Err(shape_mismatch(question)),
        None => Ok(Vec::new()),
    }
}

fn ensure_known(question: &Question, items: &[ChoiceOption], id: &str) -> Result<(), ExamError> {
    if items.iter().any(|item| item.id == id) {
        Ok(())
    } else {
        Err(ExamError::UnknownItem {
            question_id: question.id.clone(),
            item_id: id.to_string(),
        })
    }
}

fn shape_mismatch(question: &Question) -> ExamError {
    ExamError::AnswerShapeMismatch {
        question_id: question.id.clone(),
    }
}
