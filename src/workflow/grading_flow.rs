//! 评分流程 - 流程层
//!
//! 流程顺序：
//! 1. 计分（客观题本地计算，主观题逐题调用 LLM）
//! 2. 结果交回状态机
//! 3. 提交成绩（失败只记录日志）
//!
//! 计分过程中的错误或 panic 都在这里兜住，保证一定能得到一个结果。
//! 计分没有完成时，结果只交回状态机，不提交成绩。

use anyhow::{anyhow, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::{ExamResultPayload, GradingOutcome, QuestionSet};
use crate::services::{ResultSink, ScoringEngine};
use crate::workflow::exam_machine::GradingJob;

pub struct GradingFlow {
    questions: QuestionSet,
    engine: ScoringEngine,
    sink: Arc<dyn ResultSink>,
}

impl GradingFlow {
    pub fn new(questions: QuestionSet, engine: ScoringEngine, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            questions,
            engine,
            sink,
        }
    }

    /// 完整流程：计分 → 交回结果 → 提交成绩
    ///
    /// `deliver` 一定会被调用一次；计分失败时交回 0 分、无评语，并且不提交成绩
    pub async fn run<F>(&self, job: &GradingJob, deliver: F)
    where
        F: FnOnce(GradingOutcome),
    {
        match self.grade(job).await {
            Ok(outcome) => {
                deliver(outcome.clone());
                self.persist(job, &outcome).await;
            }
            Err(e) => {
                error!("❌ {:#}", e);
                warn!("⚠️ 评分未完成，跳过成绩保存: {}", job.student.name);
                deliver(GradingOutcome::failed());
            }
        }
    }

    /// 对快照计分；计分出错或 panic 时返回错误
    pub async fn grade(&self, job: &GradingJob) -> Result<GradingOutcome> {
        info!("🧮 开始评分 ({} 道题已作答)", job.answers.len());

        let scored = AssertUnwindSafe(self.engine.score(self.questions.questions(), &job.answers))
            .catch_unwind()
            .await;

        match scored {
            Ok(Ok(report)) => Ok(GradingOutcome {
                score: report.score,
                feedback: report.feedback,
            }),
            Ok(Err(e)) => Err(e.context("评分失败")),
            Err(_) => Err(anyhow!("评分过程中发生 panic")),
        }
    }

    /// 提交成绩；任何失败都只记录日志
    pub async fn persist(&self, job: &GradingJob, outcome: &GradingOutcome) {
        let payload = build_payload(job, outcome);

        match self.sink.submit(&payload).await {
            Ok(()) => info!("💾 成绩已提交: {} ({} 分)", payload.student.name, payload.score),
            Err(e) if is_misconfigured(&e) => {
                info!("后端未配置，跳过成绩保存");
            }
            Err(e) => warn!("⚠️ 成绩提交失败: {:#}", e),
        }
    }
}

pub fn build_payload(job: &GradingJob, outcome: &GradingOutcome) -> ExamResultPayload {
    ExamResultPayload {
        student: job.student.clone(),
        score: outcome.score,
        answers: job.answers.clone(),
        ai_feedback: outcome.feedback.clone(),
        status: job.outcome.terminal_status(),
        violation_count: job.violation_count,
        submitted_at: chrono::Local::now().to_rfc3339(),
    }
}

fn is_misconfigured(e: &anyhow::Error) -> bool {
    e.downcast_ref::<AppError>()
        .is_some_and(AppError::is_misconfiguration)
}
