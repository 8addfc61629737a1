//! 计时器 - 基础设施层
//!
//! 每个周期向事件通道发送一条消息；本身不计数，剩余时间由状态机维护

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

pub struct Ticker {
    period: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            handle: None,
        }
    }

    /// 一秒一次的计时器
    pub fn every_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 启动计时；已在运行时不会再启动第二个
    ///
    /// 第一次发送发生在一个周期之后。接收端关闭时任务自行结束。
    pub fn start<T, F>(&mut self, tx: UnboundedSender<T>, make_tick: F)
    where
        T: Send + 'static,
        F: Fn() -> T + Send + 'static,
    {
        if self.is_running() {
            debug!("计时器已在运行，忽略重复启动");
            return;
        }

        let period = self.period;
        self.handle = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(make_tick()).is_err() {
                    break;
                }
            }
        }));
        debug!("⏱️ 计时器已启动 (周期 {:?})", period);
    }

    /// 立即停止，之后不会再发送任何消息
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("⏱️ 计时器已停止");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
