//! 控制台命令解析
//!
//! 一行输入对应一条命令。以 `:` 开头的命令用来模拟环境信号（切屏、退出全屏、快捷键等）。

use thiserror::Error;

use crate::services::{EnvironmentSignal, KeyChord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Previous,
    /// 目标题号（从 0 开始）
    GoTo(usize),
    Pick(String),
    Toggle(String),
    Left(String),
    Right(String),
    Write(String),
    Finish,
    Confirm,
    Cancel,
    /// 关闭警告
    Dismiss,
    Restart,
    Help,
    Quit,
    Signal(EnvironmentSignal),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty input")]
    Empty,
    #[error("unknown command '{0}', type 'help' for the list of commands")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("'{0}' is not a valid question number")]
    InvalidNumber(String),
    #[error("'{0}' is not a valid key chord")]
    InvalidKey(String),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CommandError::Empty);
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    let arg = |name: &'static str| {
        if rest.is_empty() {
            Err(CommandError::MissingArgument(name))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match head.to_lowercase().as_str() {
        "n" | "next" => Command::Next,
        "p" | "prev" | "previous" => Command::Previous,
        "g" | "goto" => {
            let number: usize = arg("goto")?
                .parse()
                .map_err(|_| CommandError::InvalidNumber(rest.to_string()))?;
            if number == 0 {
                return Err(CommandError::InvalidNumber(rest.to_string()));
            }
            Command::GoTo(number - 1)
        }
        "pick" => Command::Pick(arg("pick")?),
        "toggle" => Command::Toggle(arg("toggle")?),
        "left" => Command::Left(arg("left")?),
        "right" => Command::Right(arg("right")?),
        // 允许写空内容（清空答案）
        "write" => Command::Write(rest.to_string()),
        "finish" | "submit" => Command::Finish,
        "y" | "yes" => Command::Confirm,
        "no" => Command::Cancel,
        "ok" => Command::Dismiss,
        "restart" => Command::Restart,
        "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,

        ":hide" => Command::Signal(EnvironmentSignal::VisibilityChanged { hidden: true }),
        ":show" => Command::Signal(EnvironmentSignal::VisibilityChanged { hidden: false }),
        ":fs-exit" => Command::Signal(EnvironmentSignal::FullscreenChanged { fullscreen: false }),
        ":fs-enter" => Command::Signal(EnvironmentSignal::FullscreenChanged { fullscreen: true }),
        ":blur" => Command::Signal(EnvironmentSignal::WindowBlurred),
        ":menu" => Command::Signal(EnvironmentSignal::ContextMenu),
        ":key" => {
            let chord = KeyChord::parse(&arg(":key")?)
                .ok_or_else(|| CommandError::InvalidKey(rest.to_string()))?;
            Command::Signal(EnvironmentSignal::KeyPressed(chord))
        }

        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(command)
}
