use serde::Deserialize;
use std::path::Path;

use crate::error::{AppError, AppResult, ConfigError};

/// 后端地址占位符，未替换时客户端直接进入加载失败界面
pub const BACKEND_URL_PLACEHOLDER: &str = "https://script.google.com/macros/s/YOUR_WEB_APP_URL/exec";

/// 默认配置文件名
const DEFAULT_CONFIG_FILE: &str = "exam.toml";

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 考试标题（显示在开始界面）
    pub exam_title: String,
    /// 考试时长（秒）
    pub exam_duration_seconds: u64,
    /// 违规次数上限，达到即终止考试
    pub max_violations: u32,
    /// 题库 / 成绩保存共用的后端地址
    pub backend_url: String,
    /// HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 允许的班级列表，为空表示不限制
    pub allowed_classes: Vec<String>,
    /// 是否把窗口失焦也当作违规
    pub detect_window_blur: bool,
    /// 主观题答案最少字符数，低于该值不调用 LLM
    pub min_essay_chars: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exam_title: "Online Exam".to_string(),
            exam_duration_seconds: 45 * 60,
            max_violations: 3,
            backend_url: BACKEND_URL_PLACEHOLDER.to_string(),
            request_timeout_secs: 30,
            allowed_classes: Vec::new(),
            detect_window_blur: false,
            min_essay_chars: 5,
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.5-flash".to_string(),
            llm_temperature: 0.3,
        }
    }
}

impl Config {
    /// 加载配置：先读取 TOML 文件（可选），再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let explicit = std::env::var("EXAM_CONFIG").ok();
        let path = explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let base = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else if explicit.is_some() {
            return Err(AppError::Config(ConfigError::FileNotFound { path }));
        } else {
            Self::default()
        };

        Ok(base.with_env_overrides())
    }

    /// 从 TOML 文件读取配置，缺失的字段使用默认值
    pub fn from_toml_file(path: &str) -> AppResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AppError::file_read_failed(path, e))?;
        Self::from_toml_str(&content).map_err(|e| {
            AppError::Config(ConfigError::InvalidFile {
                path: path.to_string(),
                source: Box::new(e),
            })
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        let base = self;
        Self {
            exam_title: std::env::var("EXAM_TITLE").unwrap_or(base.exam_title),
            exam_duration_seconds: std::env::var("EXAM_DURATION_SECONDS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.exam_duration_seconds),
            max_violations: std::env::var("MAX_VIOLATIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.max_violations),
            backend_url: std::env::var("BACKEND_URL").unwrap_or(base.backend_url),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.request_timeout_secs),
            allowed_classes: std::env::var("ALLOWED_CLASSES").ok().map(|v| parse_class_list(&v)).unwrap_or(base.allowed_classes),
            detect_window_blur: std::env::var("DETECT_WINDOW_BLUR").ok().and_then(|v| v.parse().ok()).unwrap_or(base.detect_window_blur),
            min_essay_chars: std::env::var("MIN_ESSAY_CHARS").ok().and_then(|v| v.parse().ok()).unwrap_or(base.min_essay_chars),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(base.verbose_logging),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(base.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(base.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(base.llm_model_name),
            llm_temperature: std::env::var("LLM_TEMPERATURE").ok().and_then(|v| v.parse().ok()).unwrap_or(base.llm_temperature),
        }
    }

    /// 后端地址是否已配置（非空且不是占位符）
    pub fn is_backend_configured(&self) -> bool {
        let url = self.backend_url.trim();
        !url.is_empty() && url != BACKEND_URL_PLACEHOLDER && !url.contains("YOUR_WEB_APP_URL")
    }
}

fn parse_class_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
