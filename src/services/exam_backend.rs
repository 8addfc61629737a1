//! 后端能力接口 - 业务能力层
//!
//! 题库来源和成绩保存都是外部协作者，这里只定义能力，具体实现见 `clients::BackendClient`

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ExamResultPayload, QuestionSet};

/// 题库来源
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// 加载并校验题库；任何失败都视为致命的加载失败
    async fn fetch_questions(&self) -> Result<QuestionSet>;
}

/// 成绩保存端
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// 提交成绩，不读取响应内容
    async fn submit(&self, payload: &ExamResultPayload) -> Result<()>;
}
