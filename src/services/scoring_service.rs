//! 计分服务 - 业务能力层
//!
//! 客观题在本地计分，主观题逐题交给 [`EssayGrader`]，最后归一化为 0-100 分。

use anyhow::{bail, Result};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{Answer, AnswerMap, FeedbackMap, MatchPair, Question, QuestionKind};
use crate::services::essay_grader::{grade_or_fallback, EssayGrader, EssayRequest};

/// 单题得分
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionCredit {
    pub question_id: String,
    pub earned: f64,
    pub possible: f64,
}

/// 整卷计分结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    /// 归一化后的 0-100 分
    pub score: u32,
    pub earned: f64,
    pub total: f64,
    pub credits: Vec<QuestionCredit>,
    pub feedback: FeedbackMap,
}

/// 计分引擎
pub struct ScoringEngine {
    grader: Arc<dyn EssayGrader>,
    min_essay_chars: usize,
}

impl ScoringEngine {
    pub fn new(grader: Arc<dyn EssayGrader>, min_essay_chars: usize) -> Self {
        Self {
            grader,
            min_essay_chars,
        }
    }

    /// 计算整卷得分
    ///
    /// 主观题按题目顺序依次评分；单题评分失败只影响该题（0 分 + 兜底评语）。
    /// 答案形状与题型不符属于内部错误，整卷返回 `Err`。
    pub async fn score(&self, questions: &[Question], answers: &AnswerMap) -> Result<ScoreReport> {
        let mut credits = Vec::with_capacity(questions.len());
        let mut feedback = FeedbackMap::new();

        for question in questions {
            let earned = match (&question.kind, answers.get(&question.id)) {
                (_, None) => 0.0,
                (
                    QuestionKind::SingleChoice {
                        correct_option_id, ..
                    },
                    Some(Answer::SingleChoice(selected)),
                ) => single_choice_credit(question.points, correct_option_id, selected),
                (
                    QuestionKind::MultiChoice {
                        correct_option_ids, ..
                    },
                    Some(Answer::MultiChoice(selected)),
                ) => multi_choice_credit(question.points, correct_option_ids, selected),
                (QuestionKind::Matching { correct_pairs, .. }, Some(Answer::Matching(submitted))) => {
                    matching_credit(question.points, correct_pairs, submitted)
                }
                (QuestionKind::FreeText { rubric }, Some(Answer::FreeText(text))) => {
                    if text.trim().is_empty() {
                        0.0
                    } else {
                        let request = EssayRequest {
                            question_text: &question.text,
                            rubric,
                            answer: text,
                        };
                        let result =
                            grade_or_fallback(self.grader.as_ref(), &request, self.min_essay_chars)
                                .await;
                        let earned = question.points * f64::from(result.score) / 100.0;
                        feedback.insert(question.id.clone(), result);
                        earned
                    }
                }
                (_, Some(_)) => bail!("题目 {} 的答案类型与题型不匹配", question.id),
            };

            debug!("题目 {} 得分: {:.2}/{}", question.id, earned, question.points);
            credits.push(QuestionCredit {
                question_id: question.id.clone(),
                earned,
                possible: question.points,
            });
        }

        let earned: f64 = credits.iter().map(|c| c.earned).sum();
        let total: f64 = credits.iter().map(|c| c.possible).sum();
        let score = normalize_score(earned, total);

        info!("📊 计分完成: {:.2}/{} → {} 分", earned, total, score);

        Ok(ScoreReport {
            score,
            earned,
            total,
            credits,
            feedback,
        })
    }
}

/// 单选：完全一致得满分
pub fn single_choice_credit(points: f64, correct_option_id: &str, selected: &str) -> f64 {
    if selected == correct_option_id {
        points
    } else {
        0.0
    }
}

/// 多选：集合完全相等才得满分
pub fn multi_choice_credit(points: f64, correct_option_ids: &[String], selected: &BTreeSet<String>) -> f64 {
    let correct: BTreeSet<&str> = correct_option_ids.iter().map(String::as_str).collect();
    let chosen: BTreeSet<&str> = selected.iter().map(String::as_str).collect();
    if chosen == correct {
        points
    } else {
        0.0
    }
}

/// 配对：按答对的配对数比例给分，答错的配对不扣分
pub fn matching_credit(points: f64, correct_pairs: &[MatchPair], submitted: &[MatchPair]) -> f64 {
    if correct_pairs.is_empty() {
        return 0.0;
    }

    let correct: HashSet<&MatchPair> = correct_pairs.iter().collect();
    let matched = submitted
        .iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|pair| correct.contains(pair))
        .count();

    points * matched as f64 / correct.len() as f64
}

/// 归一化：round(100 × earned / total)，满分为 0 时定义为 0
pub fn normalize_score(earned: f64, total: f64) -> u32 {
    if total <= 0.0 || !total.is_finite() || !earned.is_finite() {
        return 0;
    }
    (100.0 * earned / total).round().clamp(0.0, 100.0) as u32
}
