//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用主结构
//! - 管理应用生命周期（加载题库、身份填写、结果、重来）
//! - 读取控制台输入，把命令交给会话
//!
//! ### `exam_session` - 考试会话
//! - 持有状态机、防作弊监控、计时器和评分流程
//! - 单写者事件循环：所有事件都经过同一个通道
//! - 执行状态机给出的副作用
//!
//! ## 层次关系
//!
//! ```text
//! app (控制台输入 / 界面)
//!     ↓
//! exam_session (事件循环 + 副作用)
//!     ↓
//! workflow (ExamMachine 状态转换 / GradingFlow 评分流程)
//!     ↓
//! services (能力层：作答 / 防作弊 / 计分 / 主观题评分)
//!     ↓
//! infrastructure + clients (计时器、显示、后端、LLM)
//! ```

pub mod app;
pub mod exam_session;

pub use app::App;
pub use exam_session::{ExamSession, SessionDeps};
