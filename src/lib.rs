//! # Exam Client
//!
//! 限时在线考试客户端：展示题目、收集作答、防作弊监控、本地计分 + LLM 主观题评分、提交成绩
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - 计时器（`Ticker`）、显示控制（`DisplayControl`）
//! - `clients/` - 考试后端（`BackendClient`）、LLM（`LlmClient`）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `answer_capture` - 各题型的作答规则
//! - `IntegrityMonitor` - 环境信号 → 违规
//! - `ScoringEngine` - 客观题计分 + 主观题委托评分
//! - `EssayGrader` - 单道主观题评分能力
//!
//! ### ③ 流程层（Workflow）
//! - `ExamMachine` - 考试状态机（纯状态转换 + 副作用推导）
//! - `GradingFlow` - 评分流程（计分 → 结果 → 提交）
//!
//! ### ④ 编排层（Orchestration）
//! - `ExamSession` - 单写者事件循环，执行副作用
//! - `App` - 应用生命周期与控制台交互
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod console;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{Answer, ExamState, ExamStatus, Question, QuestionKind, QuestionSet};
pub use orchestrator::{App, ExamSession, SessionDeps};
pub use workflow::{ExamEvent, ExamMachine, Reaction};
