/// 考试后端客户端
///
/// 同一个地址：GET 返回题库，POST 保存成绩
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ConfigError};
use crate::models::{ExamResultPayload, Question, QuestionSet};
use crate::services::{QuestionSource, ResultSink};

pub struct BackendClient {
    client: Client,
    endpoint: String,
    configured: bool,
}

impl BackendClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::api_request_failed(&config.backend_url, e))?;

        Ok(Self {
            client,
            endpoint: config.backend_url.trim().to_string(),
            configured: config.is_backend_configured(),
        })
    }

    fn ensure_configured(&self) -> AppResult<()> {
        if self.configured {
            Ok(())
        } else {
            Err(AppError::Config(ConfigError::BackendNotConfigured))
        }
    }

    /// 获取题库
    pub async fn load_questions(&self) -> AppResult<QuestionSet> {
        self.ensure_configured()?;
        debug!("GET {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Api(ApiError::BadResponse {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            }));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;

        let questions = parse_question_payload(&self.endpoint, &body)?;
        info!("✓ 题库加载成功，共 {} 道题", questions.len());
        Ok(questions)
    }

    /// 保存成绩，不读取响应内容
    pub async fn save_result(&self, payload: &ExamResultPayload) -> AppResult<()> {
        self.ensure_configured()?;
        debug!("POST {} (学生: {})", self.endpoint, payload.student.name);

        self.client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(&self.endpoint, e))?;

        Ok(())
    }
}

/// 解析并校验题库 JSON（非空数组）
pub fn parse_question_payload(endpoint: &str, body: &str) -> AppResult<QuestionSet> {
    if body.trim().is_empty() {
        return Err(AppError::Api(ApiError::EmptyResponse {
            endpoint: endpoint.to_string(),
        }));
    }

    let questions: Vec<Question> = serde_json::from_str(body)?;
    Ok(QuestionSet::new(questions)?)
}

#[async_trait]
impl QuestionSource for BackendClient {
    async fn fetch_questions(&self) -> Result<QuestionSet> {
        Ok(self.load_questions().await?)
    }
}

#[async_trait]
impl ResultSink for BackendClient {
    async fn submit(&self, payload: &ExamResultPayload) -> Result<()> {
        Ok(self.save_result(payload).await?)
    }
}
