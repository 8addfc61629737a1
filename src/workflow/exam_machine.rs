//! 考试状态机 - 流程层
//!
//! 核心职责：定义"一场考试"的状态转换
//!
//! - `reduce`：纯函数 (状态, 事件) → 新状态，不产生任何副作用
//! - `reactions`：根据状态边 (转换前, 转换后) 推导需要执行的副作用
//!
//! 副作用（计时器、全屏、评分）由会话层执行，状态机本身不持有任何资源。

use tracing::{debug, info};

use crate::config::Config;
use crate::error::ExamError;
use crate::models::{
    Answer, AnswerMap, ExamOutcome, ExamState, ExamStatus, GradingOutcome, Question, QuestionSet,
    StudentData,
};
use crate::services::integrity_monitor::ViolationReason;

/// 输入状态机的事件
#[derive(Debug, Clone, PartialEq)]
pub enum ExamEvent {
    /// 学生确认开始
    Start(StudentData),
    /// 计时器每秒一次
    Tick,
    Next,
    Previous,
    GoTo(usize),
    /// 写入当前题的答案
    Answer(Answer),
    /// 学生确认交卷
    Finish,
    Violation(ViolationReason),
    /// 学生关闭违规警告
    DismissWarning,
    /// 会话层开始评分（pending_* → grading）
    GradingStarted,
    GradingCompleted(GradingOutcome),
}

/// 考试规则
#[derive(Debug, Clone, PartialEq)]
pub struct ExamRules {
    pub duration_seconds: u64,
    pub max_violations: u32,
    /// 为空表示不限制班级
    pub allowed_classes: Vec<String>,
}

impl ExamRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            duration_seconds: config.exam_duration_seconds,
            max_violations: config.max_violations.max(1),
            allowed_classes: config.allowed_classes.clone(),
        }
    }

    fn class_allowed(&self, class: &str) -> bool {
        self.allowed_classes.is_empty()
            || self
                .allowed_classes
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(class.trim()))
    }
}

impl Default for ExamRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 评分任务：进入 grading 时那一刻的快照
#[derive(Debug, Clone, PartialEq)]
pub struct GradingJob {
    pub answers: AnswerMap,
    pub student: StudentData,
    pub outcome: ExamOutcome,
    pub violation_count: u32,
}

/// 状态转换引发的副作用
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    ActivateMonitor,
    DeactivateMonitor,
    StartTimer,
    StopTimer,
    ShowWarning(String),
    ReenterFullscreen,
    /// 会话层应立即派发 `GradingStarted`
    BeginGrading,
    RunGrading(GradingJob),
    ShowResult,
}

/// 状态转换函数
///
/// 计时和违规在非 active 状态下静默忽略（可能是已排队的旧消息）；
/// 学生操作在非 active 状态下返回 `InvalidTransition`。
pub fn reduce(
    state: &ExamState,
    event: ExamEvent,
    questions: &QuestionSet,
    rules: &ExamRules,
) -> Result<ExamState, ExamError> {
    let mut next = state.clone();
    let active = state.status == ExamStatus::Active;

    match event {
        ExamEvent::Start(student) => {
            ensure(state, ExamStatus::Idle, "start")?;
            if !student.is_complete() {
                return Err(ExamError::IncompleteIdentity);
            }
            if !rules.class_allowed(&student.class) {
                return Err(ExamError::UnknownClass {
                    class: student.class,
                });
            }
            next = ExamState::new(rules.duration_seconds);
            next.status = ExamStatus::Active;
            next.student = Some(trimmed(student));
        }

        ExamEvent::Tick => {
            if !active {
                return Ok(next);
            }
            next.time_left_seconds = state.time_left_seconds.saturating_sub(1);
            if next.time_left_seconds == 0 {
                info!("⏰ 考试时间到，自动交卷");
                enter_pending(&mut next, ExamOutcome::Completed);
            }
        }

        ExamEvent::Next => {
            ensure(state, ExamStatus::Active, "next")?;
            next.current_question_index = clamp_index(state.current_question_index + 1, questions);
        }

        ExamEvent::Previous => {
            ensure(state, ExamStatus::Active, "previous")?;
            next.current_question_index = state.current_question_index.saturating_sub(1);
        }

        ExamEvent::GoTo(index) => {
            ensure(state, ExamStatus::Active, "go to")?;
            next.current_question_index = clamp_index(index, questions);
        }

        ExamEvent::Answer(answer) => {
            ensure(state, ExamStatus::Active, "answer")?;
            let question = current_question(state, questions)?;
            if !answer.fits(&question.kind) {
                return Err(ExamError::AnswerShapeMismatch {
                    question_id: question.id.clone(),
                });
            }
            next.answers.insert(question.id.clone(), answer);
        }

        ExamEvent::Finish => {
            ensure(state, ExamStatus::Active, "finish")?;
            info!("📝 学生确认交卷");
            enter_pending(&mut next, ExamOutcome::Completed);
        }

        ExamEvent::Violation(reason) => {
            if !active {
                return Ok(next);
            }
            next.violation_count = state.violation_count + 1;
            if next.violation_count >= rules.max_violations {
                info!(
                    "🚫 违规次数达到上限 ({}/{})，考试终止",
                    next.violation_count, rules.max_violations
                );
                next.last_warning = None;
                enter_pending(&mut next, ExamOutcome::Violation);
            } else {
                next.last_warning = Some(format!(
                    "{}. Warning {}/{}",
                    reason, next.violation_count, rules.max_violations
                ));
            }
        }

        ExamEvent::DismissWarning => {
            ensure(state, ExamStatus::Active, "dismiss warning")?;
            next.last_warning = None;
        }

        ExamEvent::GradingStarted => {
            if !state.status.is_pending() {
                return Err(ExamError::InvalidTransition {
                    status: state.status,
                    action: "start grading",
                });
            }
            next.status = ExamStatus::Grading;
        }

        ExamEvent::GradingCompleted(outcome) => {
            if state.status != ExamStatus::Grading {
                debug!("忽略评分结果（当前状态 {:?}）", state.status);
                return Ok(next);
            }
            let terminal = state
                .outcome
                .unwrap_or(ExamOutcome::Completed)
                .terminal_status();
            next.status = terminal;
            next.score = outcome.score.min(100);
            next.ai_feedback = outcome.feedback;
        }
    }

    Ok(next)
}

/// 根据状态边推导副作用
pub fn reactions(before: &ExamState, after: &ExamState) -> Vec<Reaction> {
    use ExamStatus::*;

    let mut out = Vec::new();
    match (before.status, after.status) {
        (Idle, Active) => {
            out.push(Reaction::ActivateMonitor);
            out.push(Reaction::StartTimer);
        }
        (Active, Active) => {
            if after.violation_count > before.violation_count {
                if let Some(message) = &after.last_warning {
                    out.push(Reaction::ShowWarning(message.clone()));
                }
            } else if before.last_warning.is_some() && after.last_warning.is_none() {
                out.push(Reaction::ReenterFullscreen);
            }
        }
        (Active, PendingFinish | PendingViolation) => {
            out.push(Reaction::StopTimer);
            out.push(Reaction::DeactivateMonitor);
            out.push(Reaction::BeginGrading);
        }
        (PendingFinish | PendingViolation, Grading) => {
            out.push(Reaction::StopTimer);
            out.push(Reaction::RunGrading(GradingJob {
                answers: after.answers.clone(),
                student: after.student.clone().unwrap_or_default(),
                outcome: after.outcome.unwrap_or(ExamOutcome::Completed),
                violation_count: after.violation_count,
            }));
        }
        (Grading, Finished | Violation) => out.push(Reaction::ShowResult),
        _ => {}
    }
    out
}

fn enter_pending(state: &mut ExamState, outcome: ExamOutcome) {
    state.status = match outcome {
        ExamOutcome::Completed => ExamStatus::PendingFinish,
        ExamOutcome::Violation => ExamStatus::PendingViolation,
    };
    state.outcome = Some(outcome);
}

fn ensure(state: &ExamState, expected: ExamStatus, action: &'static str) -> Result<(), ExamError> {
    if state.status == expected {
        Ok(())
    } else {
        Err(ExamError::InvalidTransition {
            status: state.status,
            action,
        })
    }
}

fn clamp_index(index: usize, questions: &QuestionSet) -> usize {
    index.min(questions.len().saturating_sub(1))
}

fn current_question<'a>(state: &ExamState, questions: &'a QuestionSet) -> Result<&'a Question, ExamError> {
    questions
        .get(state.current_question_index)
        .ok_or(ExamError::InvalidTransition {
            status: state.status,
            action: "answer",
        })
}

fn trimmed(student: StudentData) -> StudentData {
    StudentData::new(student.name.trim(), student.class.trim(), student.nisn.trim())
}

/// 状态机：持有题库、规则和当前状态
pub struct ExamMachine {
    questions: QuestionSet,
    rules: ExamRules,
    state: ExamState,
}

impl ExamMachine {
    pub fn new(questions: QuestionSet, rules: ExamRules) -> Self {
        let state = ExamState::new(rules.duration_seconds);
        Self {
            questions,
            rules,
            state,
        }
    }

    pub fn state(&self) -> &ExamState {
        &self.state
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    pub fn rules(&self) -> &ExamRules {
        &self.rules
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.state.current_question_index)
    }

    /// 当前题的已有答案
    pub fn current_answer(&self) -> Option<&Answer> {
        self.current_question()
            .and_then(|q| self.state.answers.get(&q.id))
    }

    /// 应用事件；被拒绝时状态保持不变
    pub fn dispatch(&mut self, event: ExamEvent) -> Result<Vec<Reaction>, ExamError> {
        let next = reduce(&self.state, event, &self.questions, &self.rules)?;
        let reactions = reactions(&self.state, &next);
        if self.state.status != next.status {
            debug!("状态转换: {:?} → {:?}", self.state.status, next.status);
        }
        self.state = next;
        Ok(reactions)
    }

    /// 重新开始：丢弃所有作答和结果
    pub fn restart(&mut self) {
        self.state = ExamState::new(self.rules.duration_seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChoiceOption, QuestionKind};

    fn questions() -> QuestionSet {
        let option = |id: &str| ChoiceOption {
            id: id.into(),
            text: id.into(),
        };
        QuestionSet::new(vec![
            Question {
                id: "q1".into(),
                text: "Rukun iman ada berapa?".into(),
                points: 50.0,
                kind: QuestionKind::SingleChoice {
                    options: vec![option("a"), option("b")],
                    correct_option_id: "a".into(),
                },
            },
            Question {
                id: "q2".into(),
                text: "Jelaskan arti ikhlas".into(),
                points: 50.0,
                kind: QuestionKind::FreeText {
                    rubric: "Beramal hanya karena Allah".into(),
                },
            },
        ])
        .unwrap()
    }

    fn rules() -> ExamRules {
        ExamRules {
            duration_seconds: 5,
            max_violations: 3,
            allowed_classes: vec!["9A".into(), "9B".into()],
        }
    }

    fn student() -> StudentData {
        StudentData::new("Aisyah", "9A", "0012345678")
    }

    fn started() -> ExamMachine {
        let mut machine = ExamMachine::new(questions(), rules());
        machine.dispatch(ExamEvent::Start(student())).unwrap();
        machine
    }

    #[test]
    fn test_start_requires_identity_and_known_class() {
        let mut machine = ExamMachine::new(questions(), rules());

        assert_eq!(
            machine.dispatch(ExamEvent::Start(StudentData::new("Aisyah", "9A", " "))),
            Err(ExamError::IncompleteIdentity)
        );
        assert_eq!(
            machine.dispatch(ExamEvent::Start(StudentData::new("Aisyah", "7C", "1"))),
            Err(ExamError::UnknownClass { class: "7C".into() })
        );
        assert_eq!(machine.state().status, ExamStatus::Idle);

        let reactions = machine
            .dispatch(ExamEvent::Start(StudentData::new(" Aisyah ", "9a", "1")))
            .unwrap();
        assert_eq!(reactions, vec![Reaction::ActivateMonitor, Reaction::StartTimer]);
        assert_eq!(machine.state().status, ExamStatus::Active);
        assert_eq!(machine.state().student.as_ref().unwrap().name, "Aisyah");
    }

    #[test]
    fn test_learner_actions_rejected_outside_active() {
        let mut machine = ExamMachine::new(questions(), rules());

        assert!(matches!(
            machine.dispatch(ExamEvent::Next),
            Err(ExamError::InvalidTransition { status: ExamStatus::Idle, .. })
        ));
        assert!(machine.dispatch(ExamEvent::Finish).is_err());
        assert!(machine
            .dispatch(ExamEvent::Answer(Answer::SingleChoice("a".into())))
            .is_err());
    }

    #[test]
    fn test_navigation_is_clamped() {
        let mut machine = started();

        machine.dispatch(ExamEvent::Previous).unwrap();
        assert_eq!(machine.state().current_question_index, 0);

        machine.dispatch(ExamEvent::Next).unwrap();
        machine.dispatch(ExamEvent::Next).unwrap();
        assert_eq!(machine.state().current_question_index, 1);

        machine.dispatch(ExamEvent::GoTo(42)).unwrap();
        assert_eq!(machine.state().current_question_index, 1);

        machine.dispatch(ExamEvent::GoTo(0)).unwrap();
        assert_eq!(machine.state().current_question_index, 0);
    }

    #[test]
    fn test_answer_must_fit_current_question() {
        let mut machine = started();

        assert_eq!(
            machine.dispatch(ExamEvent::Answer(Answer::FreeText("x".into()))),
            Err(ExamError::AnswerShapeMismatch { question_id: "q1".into() })
        );

        machine
            .dispatch(ExamEvent::Answer(Answer::SingleChoice("b".into())))
            .unwrap();
        machine
            .dispatch(ExamEvent::Answer(Answer::SingleChoice("a".into())))
            .unwrap();
        assert_eq!(machine.current_answer(), Some(&Answer::SingleChoice("a".into())));
    }

    #[test]
    fn test_violation_threshold() {
        let mut machine = started();

        let first = machine
            .dispatch(ExamEvent::Violation(ViolationReason::LeftApplication))
            .unwrap();
        assert_eq!(
            first,
            vec![Reaction::ShowWarning(
                "left application/switched tab. Warning 1/3".into()
            )]
        );

        let second = machine
            .dispatch(ExamEvent::Violation(ViolationReason::ExitedFullscreen))
            .unwrap();
        assert_eq!(
            second,
            vec![Reaction::ShowWarning("exited fullscreen. Warning 2/3".into())]
        );
        assert_eq!(machine.state().status, ExamStatus::Active);

        let third = machine
            .dispatch(ExamEvent::Violation(ViolationReason::ScreenshotAttempt))
            .unwrap();
        assert_eq!(
            third,
            vec![
                Reaction::StopTimer,
                Reaction::DeactivateMonitor,
                Reaction::BeginGrading
            ]
        );
        assert_eq!(machine.state().status, ExamStatus::PendingViolation);
        assert_eq!(machine.state().violation_count, 3);
        assert_eq!(machine.state().last_warning, None);

        // 已离开 active，后续违规不再计数
        machine
            .dispatch(ExamEvent::Violation(ViolationReason::LeftApplication))
            .unwrap();
        assert_eq!(machine.state().violation_count, 3);
    }

    #[test]
    fn test_dismiss_warning_reenters_fullscreen() {
        let mut machine = started();
        machine
            .dispatch(ExamEvent::Violation(ViolationReason::ExitedFullscreen))
            .unwrap();

        let reactions = machine.dispatch(ExamEvent::DismissWarning).unwrap();
        assert_eq!(reactions, vec![Reaction::ReenterFullscreen]);
        assert_eq!(machine.state().last_warning, None);
    }

    #[test]
    fn test_timer_expiry_finishes_exactly_once() {
        let mut machine = started();

        let mut pending_edges = 0;
        for _ in 0..10 {
            let reactions = machine.dispatch(ExamEvent::Tick).unwrap();
            if reactions.contains(&Reaction::BeginGrading) {
                pending_edges += 1;
            }
        }

        assert_eq!(pending_edges, 1);
        assert_eq!(machine.state().time_left_seconds, 0);
        assert_eq!(machine.state().status, ExamStatus::PendingFinish);
    }

    #[test]
    fn test_tick_ignored_outside_active() {
        let mut machine = ExamMachine::new(questions(), rules());
        machine.dispatch(ExamEvent::Tick).unwrap();
        assert_eq!(machine.state().time_left_seconds, 5);

        machine.dispatch(ExamEvent::Start(student())).unwrap();
        machine.dispatch(ExamEvent::Tick).unwrap();
        machine.dispatch(ExamEvent::Finish).unwrap();
        machine.dispatch(ExamEvent::Tick).unwrap();
        assert_eq!(machine.state().time_left_seconds, 4);
    }

    #[test]
    fn test_grading_path_to_finished() {
        let mut machine = started();
        machine
            .dispatch(ExamEvent::Answer(Answer::SingleChoice("a".into())))
            .unwrap();
        machine.dispatch(ExamEvent::Finish).unwrap();

        let reactions = machine.dispatch(ExamEvent::GradingStarted).unwrap();
        let job = match &reactions[..] {
            [Reaction::StopTimer, Reaction::RunGrading(job)] => job.clone(),
            other => panic!("unexpected reactions: {:?}", other),
        };
        assert_eq!(job.outcome, ExamOutcome::Completed);
        assert_eq!(job.answers.len(), 1);
        assert_eq!(job.student, student());

        // 评分中不接受作答
        assert!(machine.dispatch(ExamEvent::Next).is_err());

        let reactions = machine
            .dispatch(ExamEvent::GradingCompleted(GradingOutcome {
                score: 50,
                feedback: Default::default(),
            }))
            .unwrap();
        assert_eq!(reactions, vec![Reaction::ShowResult]);
        assert_eq!(machine.state().status, ExamStatus::Finished);
        assert_eq!(machine.state().score, 50);

        // 终态吸收
        machine
            .dispatch(ExamEvent::GradingCompleted(GradingOutcome::failed()))
            .unwrap();
        assert_eq!(machine.state().score, 50);
        assert!(machine.dispatch(ExamEvent::GradingStarted).is_err());
    }

    #[test]
    fn test_violation_path_ends_in_violation_status() {
        let mut machine = started();
        for _ in 0..3 {
            machine
                .dispatch(ExamEvent::Violation(ViolationReason::LeftApplication))
                .unwrap();
        }
        machine.dispatch(ExamEvent::GradingStarted).unwrap();
        machine
            .dispatch(ExamEvent::GradingCompleted(GradingOutcome::failed()))
            .unwrap();

        assert_eq!(machine.state().status, ExamStatus::Violation);
        assert_eq!(machine.state().score, 0);
        assert!(machine.state().ai_feedback.is_empty());
    }

    #[test]
    fn test_restart_discards_everything() {
        let mut machine = started();
        machine
            .dispatch(ExamEvent::Answer(Answer::SingleChoice("a".into())))
            .unwrap();
        machine.restart();

        assert_eq!(machine.state(), &ExamState::new(5));
    }
}
