//! 考试会话 - 编排层
//!
//! 单写者事件循环：计时、违规、评分完成都以 `ExamEvent` 的形式进入同一个通道，
//! 由会话依次交给状态机处理，再执行状态机给出的副作用。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ExamError;
use crate::infrastructure::{DisplayControl, Ticker};
use crate::models::{Answer, ExamState, ExamStatus, Question, QuestionSet};
use crate::services::answer_capture::{self, PairingSelection};
use crate::services::{EnvironmentSignal, EssayGrader, IntegrityMonitor, ResultSink, ScoringEngine};
use crate::workflow::{ExamEvent, ExamMachine, ExamRules, GradingFlow, GradingJob, Reaction};

/// 会话依赖的外部协作者
pub struct SessionDeps {
    pub display: Box<dyn DisplayControl>,
    pub grader: Arc<dyn EssayGrader>,
    pub sink: Arc<dyn ResultSink>,
}

pub struct ExamSession {
    machine: ExamMachine,
    monitor: IntegrityMonitor,
    ticker: Ticker,
    flow: Arc<GradingFlow>,
    pairing: PairingSelection,
    tx: UnboundedSender<ExamEvent>,
    pending: Vec<JoinHandle<()>>,
}

impl ExamSession {
    /// 创建会话，返回会话和它的事件接收端
    pub fn new(
        config: &Config,
        questions: QuestionSet,
        deps: SessionDeps,
    ) -> (Self, UnboundedReceiver<ExamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let violation_tx = tx.clone();
        let monitor = IntegrityMonitor::new(deps.display, config.detect_window_blur, move |reason| {
            let _ = violation_tx.send(ExamEvent::Violation(reason));
        });

        let engine = ScoringEngine::new(deps.grader, config.min_essay_chars);
        let flow = Arc::new(GradingFlow::new(questions.clone(), engine, deps.sink));

        let session = Self {
            machine: ExamMachine::new(questions, ExamRules::from_config(config)),
            monitor,
            ticker: Ticker::every_second(),
            flow,
            pairing: PairingSelection::new(),
            tx,
            pending: Vec::new(),
        };
        (session, rx)
    }

    pub fn state(&self) -> &ExamState {
        self.machine.state()
    }

    pub fn machine(&self) -> &ExamMachine {
        &self.machine
    }

    pub fn pairing(&self) -> &PairingSelection {
        &self.pairing
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_active()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.monitor.is_fullscreen()
    }

    pub fn is_timer_running(&self) -> bool {
        self.ticker.is_running()
    }

    /// 交给状态机处理一个事件，并执行产生的副作用
    ///
    /// 返回所有已执行的副作用（界面据此决定显示什么）
    pub fn dispatch(&mut self, event: ExamEvent) -> Result<Vec<Reaction>, ExamError> {
        let navigation = matches!(event, ExamEvent::Next | ExamEvent::Previous | ExamEvent::GoTo(_));

        let mut performed = Vec::new();
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            for reaction in self.machine.dispatch(event)? {
                match &reaction {
                    Reaction::ActivateMonitor => self.monitor.activate(),
                    Reaction::DeactivateMonitor => self.monitor.deactivate(),
                    Reaction::StartTimer => self.ticker.start(self.tx.clone(), || ExamEvent::Tick),
                    Reaction::StopTimer => self.ticker.stop(),
                    Reaction::ReenterFullscreen => self.monitor.reenter_fullscreen(),
                    Reaction::BeginGrading => queue.push_back(ExamEvent::GradingStarted),
                    Reaction::RunGrading(job) => self.spawn_grading(job.clone()),
                    Reaction::ShowWarning(_) | Reaction::ShowResult => {}
                }
                performed.push(reaction);
            }
        }

        if navigation {
            self.pairing.clear();
        }
        Ok(performed)
    }

    /// 处理环境信号，返回是否应阻止默认行为
    ///
    /// 违规不会在这里直接计数，而是经由通道回到 `dispatch`
    pub fn observe(&mut self, signal: &EnvironmentSignal) -> bool {
        self.monitor.observe(signal)
    }

    // ========== 作答 ==========

    pub fn select_option(&mut self, option_id: &str) -> Result<Vec<Reaction>, ExamError> {
        let answer = answer_capture::select_option(self.answerable("select option")?, option_id)?;
        self.dispatch(ExamEvent::Answer(answer))
    }

    pub fn toggle_option(&mut self, option_id: &str) -> Result<Vec<Reaction>, ExamError> {
        let question = self.answerable("toggle option")?;
        let answer = answer_capture::toggle_option(question, self.machine.current_answer(), option_id)?;
        self.dispatch(ExamEvent::Answer(answer))
    }

    pub fn write_text(&mut self, text: &str) -> Result<Vec<Reaction>, ExamError> {
        let answer = answer_capture::write_text(self.answerable("write answer")?, text)?;
        self.dispatch(ExamEvent::Answer(answer))
    }

    pub fn select_left(&mut self, left_id: &str) -> Result<Vec<Reaction>, ExamError> {
        let question = self.answerable("select left item")?;
        let mut pairing = self.pairing.clone();
        let changed = pairing.select_left(question, self.machine.current_answer(), left_id)?;
        self.commit_pairing(pairing, changed)
    }

    pub fn select_right(&mut self, right_id: &str) -> Result<Vec<Reaction>, ExamError> {
        let question = self.answerable("select right item")?;
        let mut pairing = self.pairing.clone();
        let changed = pairing.select_right(question, self.machine.current_answer(), right_id)?;
        self.commit_pairing(pairing, changed)
    }

    fn commit_pairing(
        &mut self,
        pairing: PairingSelection,
        changed: Option<Answer>,
    ) -> Result<Vec<Reaction>, ExamError> {
        let reactions = match changed {
            Some(answer) => self.dispatch(ExamEvent::Answer(answer))?,
            None => Vec::new(),
        };
        self.pairing = pairing;
        Ok(reactions)
    }

    fn answerable(&self, action: &'static str) -> Result<&Question, ExamError> {
        let status = self.machine.state().status;
        if status != ExamStatus::Active {
            return Err(ExamError::InvalidTransition { status, action });
        }
        self.machine
            .current_question()
            .ok_or(ExamError::InvalidTransition { status, action })
    }

    // ========== 生命周期 ==========

    /// 重新开始（仅终态可用），丢弃所有作答和结果
    pub fn restart(&mut self) -> Result<(), ExamError> {
        let status = self.machine.state().status;
        if !status.is_terminal() {
            return Err(ExamError::InvalidTransition {
                status,
                action: "restart",
            });
        }
        self.ticker.stop();
        self.monitor.deactivate();
        self.pairing.clear();
        self.machine.restart();
        info!("🔄 考试已重置");
        Ok(())
    }

    fn spawn_grading(&mut self, job: GradingJob) {
        let flow = self.flow.clone();
        let tx = self.tx.clone();

        self.pending.retain(|handle| !handle.is_finished());
        self.pending.push(tokio::spawn(async move {
            flow.run(&job, |outcome| {
                if tx.send(ExamEvent::GradingCompleted(outcome)).is_err() {
                    debug!("会话已关闭，评分结果未送达");
                }
            })
            .await;
        }));
    }

    /// 关闭会话：停止计时和监控，并在限定时间内等待评分 / 成绩提交完成
    pub async fn shutdown(mut self, grace: Duration) {
        self.ticker.stop();
        self.monitor.deactivate();

        if self.pending.iter().all(|h| h.is_finished()) {
            return;
        }

        info!("⏳ 等待成绩提交完成...");
        let pending = std::mem::take(&mut self.pending);
        let wait_all = futures::future::join_all(pending);
        if tokio::time::timeout(grace, wait_all).await.is_err() {
            warn!("⚠️ 等待成绩提交超时 ({:?})，直接退出", grace);
        }
    }
}
