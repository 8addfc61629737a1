//! 显示控制 - 基础设施层
//!
//! 只暴露"进入 / 退出全屏"的能力，不认识考试流程

use anyhow::{Context, Result};
use std::io::Write;

/// 全屏控制能力
///
/// 监控器只通过这个 trait 操作显示环境，方便测试时替换
pub trait DisplayControl: Send {
    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&mut self) -> Result<()>;

    fn exit_fullscreen(&mut self) -> Result<()>;
}

const ENTER_ALTERNATE_SCREEN: &str = "\x1b[?1049h\x1b[H";
const LEAVE_ALTERNATE_SCREEN: &str = "\x1b[?1049l";

/// 终端实现：用备用屏幕缓冲区模拟全屏
pub struct TerminalDisplay {
    fullscreen: bool,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self { fullscreen: false }
    }

    fn write_sequence(sequence: &str) -> Result<()> {
        let mut stdout = std::io::stdout();
        stdout
            .write_all(sequence.as_bytes())
            .and_then(|_| stdout.flush())
            .context("写入终端控制序列失败")
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayControl for TerminalDisplay {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        Self::write_sequence(ENTER_ALTERNATE_SCREEN)?;
        self.fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        // 先改标记：即使写入失败也不再认为自己处于全屏
        self.fullscreen = false;
        Self::write_sequence(LEAVE_ALTERNATE_SCREEN)
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        if self.fullscreen {
            let _ = Self::write_sequence(LEAVE_ALTERNATE_SCREEN);
        }
    }
}
