//! 主观题评分服务 - 业务能力层
//!
//! 只负责"给一道主观题打分"，不关心流程。
//! 评分失败时不向上抛错，而是返回固定的兜底结果。

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::clients::LlmClient;
use crate::error::{AppError, LlmError};
use crate::models::GradingResult;
use crate::utils::logging::truncate_text;

/// 一次评分请求
#[derive(Debug, Clone)]
pub struct EssayRequest<'a> {
    pub question_text: &'a str,
    pub rubric: &'a str,
    pub answer: &'a str,
}

/// 主观题评分能力（外部协作者）
#[async_trait]
pub trait EssayGrader: Send + Sync {
    /// 返回 0-100 分和简短评语；任何失败都以 `Err` 返回，由调用方决定兜底
    async fn grade(&self, request: &EssayRequest<'_>) -> Result<GradingResult>;
}

/// 基于 LLM 的评分实现
pub struct LlmEssayGrader {
    llm: LlmClient,
}

const GRADING_SYSTEM_PROMPT: &str = "You are an experienced teacher grading short essay answers. \
Grade objectively against the rubric or answer key you are given. \
Reply with a single JSON object only, no prose and no code fences.";

impl LlmEssayGrader {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    fn build_prompt(request: &EssayRequest<'_>) -> String {
        format!(
            r#"Question: "{}"
Rubric / answer key: "{}"
Student answer: "{}"

Give a score from 0 to 100 (0 = completely wrong, 100 = fully matches the rubric).
Give short, constructive feedback for the student (at most 2 sentences).

Respond with exactly this JSON shape:
{{"score": <integer 0-100>, "feedback": "<string>"}}"#,
            request.question_text, request.rubric, request.answer
        )
    }
}

#[async_trait]
impl EssayGrader for LlmEssayGrader {
    async fn grade(&self, request: &EssayRequest<'_>) -> Result<GradingResult> {
        debug!(
            "🤖 LLM 评分: {} (模型: {})",
            truncate_text(request.question_text, 40),
            self.llm.model_name()
        );

        let prompt = Self::build_prompt(request);
        let response = self.llm.chat(&prompt, Some(GRADING_SYSTEM_PROMPT)).await?;
        let result = parse_verdict(&response)?;

        debug!("✓ LLM 评分完成: {} 分", result.score);
        Ok(result)
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    score: f64,
    feedback: String,
}

/// 解析 LLM 的评分回复
///
/// 模型偶尔会包一层 ```json 代码块或附带说明文字，这里只取第一个 `{` 到最后一个 `}`
pub fn parse_verdict(response: &str) -> Result<GradingResult, AppError> {
    let parse_failed = || {
        AppError::Llm(LlmError::VerdictParseFailed {
            response: truncate_text(response, 200),
        })
    };

    let re = Regex::new(r"(?s)\{.*\}").map_err(|_| parse_failed())?;
    let json = re
        .find(response)
        .map(|m| m.as_str())
        .ok_or_else(parse_failed)?;

    let raw: RawVerdict = serde_json::from_str(json).map_err(|_| parse_failed())?;
    if !raw.score.is_finite() {
        return Err(parse_failed());
    }

    let score = raw.score.round().clamp(0.0, 100.0) as u32;
    Ok(GradingResult::new(score, raw.feedback.trim()))
}

/// 对单道主观题评分，保证总能得到结果
///
/// - 去掉空白后少于 `min_chars` 个字符：直接 0 分，不调用评分服务
/// - 评分服务出错：记录日志并返回兜底结果
pub async fn grade_or_fallback(
    grader: &dyn EssayGrader,
    request: &EssayRequest<'_>,
    min_chars: usize,
) -> GradingResult {
    if request.answer.trim().chars().count() < min_chars {
        debug!("答案过短，跳过 LLM 评分");
        return GradingResult::too_short();
    }

    match grader.grade(request).await {
        Ok(result) => GradingResult::new(result.score, result.feedback),
        Err(e) => {
            warn!("⚠️ 主观题评分失败，使用兜底结果: {:#}", e);
            GradingResult::fallback()
        }
    }
}
