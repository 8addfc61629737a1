//! 防作弊监控 - 业务能力层
//!
//! 把环境信号翻译成违规事件。监控器不计数，只在激活期间对每个违规信号回调一次；
//! 次数与阈值由状态机负责。

use phf::phf_map;
use std::fmt;
use tracing::{debug, warn};

use crate::infrastructure::DisplayControl;

/// 环境信号
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentSignal {
    VisibilityChanged { hidden: bool },
    FullscreenChanged { fullscreen: bool },
    WindowBlurred,
    ContextMenu,
    KeyPressed(KeyChord),
}

/// 一次按键及其修饰键
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyChord {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    pub meta: bool,
    pub alt: bool,
}

impl KeyChord {
    /// 解析 "ctrl+p"、"meta+shift+3"、"PrintScreen" 这类写法
    pub fn parse(text: &str) -> Option<Self> {
        let mut chord = KeyChord::default();
        let mut key = None;

        for part in text.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "" => return None,
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "meta" | "cmd" | "super" => chord.meta = true,
                "alt" | "option" => chord.alt = true,
                _ if key.is_none() => key = Some(part.to_string()),
                _ => return None,
            }
        }

        chord.key = key?;
        Some(chord)
    }

    fn satisfies(&self, required: &Modifiers) -> bool {
        (!required.ctrl || self.ctrl) && (!required.shift || self.shift) && (!required.meta || self.meta)
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (on, name) in [(self.ctrl, "Ctrl"), (self.alt, "Alt"), (self.meta, "Meta"), (self.shift, "Shift")] {
            if on {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// 触发违规的按键需要同时按下的修饰键
#[derive(Debug)]
struct Modifiers {
    ctrl: bool,
    shift: bool,
    meta: bool,
}

impl Modifiers {
    const NONE: Modifiers = Modifiers { ctrl: false, shift: false, meta: false };
    const CTRL: Modifiers = Modifiers { ctrl: true, shift: false, meta: false };
    const META_SHIFT: Modifiers = Modifiers { ctrl: false, shift: true, meta: true };
}

/// 截图 / 打印快捷键（键名小写）
static RESTRICTED_CHORDS: phf::Map<&'static str, Modifiers> = phf_map! {
    "printscreen" => Modifiers::NONE,
    "p" => Modifiers::CTRL,
    "3" => Modifiers::META_SHIFT,
    "4" => Modifiers::META_SHIFT,
    "5" => Modifiers::META_SHIFT,
};

fn is_restricted(chord: &KeyChord) -> bool {
    RESTRICTED_CHORDS
        .get(chord.key.to_lowercase().as_str())
        .is_some_and(|required| chord.satisfies(required))
}

/// 违规原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    LeftApplication,
    ExitedFullscreen,
    ScreenshotAttempt,
    LostFocus,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ViolationReason::LeftApplication => "left application/switched tab",
            ViolationReason::ExitedFullscreen => "exited fullscreen",
            ViolationReason::ScreenshotAttempt => "screenshot attempt detected",
            ViolationReason::LostFocus => "application lost focus",
        };
        f.write_str(text)
    }
}

type ViolationCallback = Box<dyn Fn(ViolationReason) + Send>;

/// 防作弊监控器
pub struct IntegrityMonitor {
    display: Box<dyn DisplayControl>,
    on_violation: ViolationCallback,
    active: bool,
    detect_blur: bool,
}

impl IntegrityMonitor {
    pub fn new(
        display: Box<dyn DisplayControl>,
        detect_blur: bool,
        on_violation: impl Fn(ViolationReason) + Send + 'static,
    ) -> Self {
        Self {
            display,
            on_violation: Box::new(on_violation),
            active: false,
            detect_blur,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_fullscreen(&self) -> bool {
        self.display.is_fullscreen()
    }

    /// 开始监控，并尝试进入全屏（失败只记录日志）
    pub fn activate(&mut self) {
        self.active = true;
        debug!("🛡️ 防作弊监控已激活");
        self.reenter_fullscreen();
    }

    /// 停止监控，如处于全屏则退出（失败只记录日志）
    pub fn deactivate(&mut self) {
        self.active = false;
        debug!("🛡️ 防作弊监控已停止");
        if self.display.is_fullscreen() {
            if let Err(e) = self.display.exit_fullscreen() {
                warn!("⚠️ 退出全屏失败: {:#}", e);
            }
        }
    }

    /// 重新请求全屏（学生确认警告后调用）
    pub fn reenter_fullscreen(&mut self) {
        if self.display.is_fullscreen() {
            return;
        }
        if let Err(e) = self.display.request_fullscreen() {
            warn!("⚠️ 进入全屏失败: {:#}", e);
        }
    }

    /// 处理一个环境信号
    ///
    /// 返回值表示是否应阻止该信号的默认行为（右键菜单、截图快捷键）
    pub fn observe(&mut self, signal: &EnvironmentSignal) -> bool {
        match signal {
            EnvironmentSignal::ContextMenu => true,
            EnvironmentSignal::VisibilityChanged { hidden: true } => {
                self.report(ViolationReason::LeftApplication);
                false
            }
            EnvironmentSignal::VisibilityChanged { hidden: false } => false,
            EnvironmentSignal::FullscreenChanged { fullscreen: false } => {
                // 环境已经离开全屏，同步显示状态
                if self.display.is_fullscreen() {
                    if let Err(e) = self.display.exit_fullscreen() {
                        debug!("同步全屏状态失败: {:#}", e);
                    }
                }
                self.report(ViolationReason::ExitedFullscreen);
                false
            }
            EnvironmentSignal::FullscreenChanged { fullscreen: true } => false,
            EnvironmentSignal::WindowBlurred => {
                if self.detect_blur {
                    self.report(ViolationReason::LostFocus);
                }
                false
            }
            EnvironmentSignal::KeyPressed(chord) => {
                if is_restricted(chord) {
                    debug!("拦截快捷键: {}", chord);
                    self.report(ViolationReason::ScreenshotAttempt);
                    true
                } else {
                    false
                }
            }
        }
    }

    fn report(&self, reason: ViolationReason) {
        if self.active {
            warn!("🚨 检测到违规: {}", reason);
            (self.on_violation)(reason);
        }
    }
}
