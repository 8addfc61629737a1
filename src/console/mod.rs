//! 控制台前端：命令解析与界面渲染

pub mod command;
pub mod render;

pub use command::{parse_command, Command, CommandError};
