use thiserror::Error;

use crate::models::ExamStatus;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 题库数据错误
    #[error("题库错误: {0}")]
    QuestionSet(#[from] QuestionSetError),
    /// 考试流程错误
    #[error("考试错误: {0}")]
    Exam(#[from] ExamError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed { endpoint: String, source: BoxError },
    /// API 返回错误响应
    #[error("API返回错误响应 ({endpoint}): status={status}")]
    BadResponse { endpoint: String, status: u16 },
    /// API 返回空结果
    #[error("API返回空结果: {endpoint}")]
    EmptyResponse { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed { source: BoxError },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed { path: String, source: BoxError },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed { model: String, source: BoxError },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 评分结果解析失败
    #[error("无法解析LLM评分结果 (响应: {response})")]
    VerdictParseFailed { response: String },
}

/// 题库数据错误（加载时校验）
#[derive(Debug, Error, PartialEq)]
pub enum QuestionSetError {
    #[error("题库为空")]
    Empty,
    #[error("题目ID重复: {id}")]
    DuplicateId { id: String },
    #[error("题目 {id} 的分值无效: {points}")]
    InvalidPoints { id: String, points: f64 },
    #[error("题目 {id} 的正确答案 {option_id} 不在选项中")]
    UnknownCorrectOption { id: String, option_id: String },
    #[error("题目 {id} 没有正确答案")]
    NoCorrectAnswer { id: String },
    #[error("题目 {id} 的配对无效: {left_id} -> {right_id}")]
    InvalidPair {
        id: String,
        left_id: String,
        right_id: String,
    },
}

/// 考试流程错误（状态机拒绝事件时返回）
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExamError {
    /// 当前状态不接受该事件
    #[error("状态 {status:?} 下不能执行 {action}")]
    InvalidTransition { status: ExamStatus, action: &'static str },
    /// 身份信息不完整
    #[error("请填写完整的身份信息 (姓名、班级、NISN)")]
    IncompleteIdentity,
    /// 班级不在允许列表中
    #[error("未知班级: {class}")]
    UnknownClass { class: String },
    /// 答案类型与题型不符
    #[error("题目 {question_id} 的答案类型不匹配")]
    AnswerShapeMismatch { question_id: String },
    /// 选项或配对项不存在
    #[error("题目 {question_id} 中不存在选项 {item_id}")]
    UnknownItem { question_id: String, item_id: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 后端地址未配置
    #[error("后端地址未配置，请设置 BACKEND_URL")]
    BackendNotConfigured,
    /// 指定的配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },
    /// 配置文件格式错误
    #[error("配置文件解析失败 ({path}): {source}")]
    InvalidFile { path: String, source: BoxError },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.to_string()).unwrap_or_default();
        AppError::api_request_failed(endpoint, err)
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::InvalidFile {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否属于"后端未配置"（加载界面据此提示检查配置）
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, AppError::Config(ConfigError::BackendNotConfigured))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
