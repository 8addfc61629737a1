use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_test::{assert_err, assert_ok};

use exam_client::config::Config;
use exam_client::infrastructure::DisplayControl;
use exam_client::models::grading::FALLBACK_FEEDBACK;
use exam_client::models::{ExamResultPayload, ExamStatus, GradingResult, Question, QuestionSet, StudentData};
use exam_client::services::{EnvironmentSignal, EssayGrader, EssayRequest, KeyChord, ResultSink};
use exam_client::{ExamEvent, ExamSession, Reaction, SessionDeps};

const QUESTIONS: &str = r#"[
    {"id": "q1", "type": "PILIHAN_GANDA", "text": "Rukun Islam yang kedua adalah?", "points": 25,
     "options": [{"id": "a", "text": "Syahadat"}, {"id": "b", "text": "Shalat"}],
     "correctOptionId": "b"},
    {"id": "q2", "type": "PILIHAN_GANDA_KOMPLEKS", "text": "Pilih sifat wajib bagi Rasul", "points": 25,
     "options": [{"id": "a", "text": "Siddiq"}, {"id": "b", "text": "Amanah"}, {"id": "c", "text": "Kizib"}],
     "correctOptionIds": ["a", "b"]},
    {"id": "q3", "type": "MENJODOHKAN", "text": "Pasangkan istilah berikut", "points": 25,
     "leftItems": [{"id": "l1", "text": "Zakat"}, {"id": "l2", "text": "Puasa"}],
     "rightItems": [{"id": "r1", "text": "Ramadhan"}, {"id": "r2", "text": "Fitrah"}],
     "correctPairs": [{"leftId": "l1", "rightId": "r2"}, {"leftId": "l2", "rightId": "r1"}]},
    {"id": "q4", "type": "URAIAN", "text": "Jelaskan pengertian ikhlas", "points": 25,
     "rubric": "Beramal semata-mata karena Allah"}
]"#;

struct StubDisplay {
    fullscreen: Arc<AtomicBool>,
}

impl DisplayControl for StubDisplay {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        self.fullscreen.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        self.fullscreen.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct StubGrader {
    score: Option<u32>,
}

#[async_trait]
impl EssayGrader for StubGrader {
    async fn grade(&self, _request: &EssayRequest<'_>) -> Result<GradingResult> {
        match self.score {
            Some(score) => Ok(GradingResult::new(score, "Jawaban sudah baik.")),
            None => bail!("grading service unreachable"),
        }
    }
}

struct PanickingGrader;

#[async_trait]
impl EssayGrader for PanickingGrader {
    async fn grade(&self, _request: &EssayRequest<'_>) -> Result<GradingResult> {
        panic!("grading backend crashed");
    }
}

#[derive(Default)]
struct RecordingSink {
    payloads: Mutex<Vec<ExamResultPayload>>,
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn submit(&self, payload: &ExamResultPayload) -> Result<()> {
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

struct Harness {
    session: ExamSession,
    events: UnboundedReceiver<ExamEvent>,
    fullscreen: Arc<AtomicBool>,
    sink: Arc<RecordingSink>,
}

fn harness(config: Config, grader_score: Option<u32>) -> Harness {
    harness_with_grader(config, Arc::new(StubGrader { score: grader_score }))
}

fn harness_with_grader(config: Config, grader: Arc<dyn EssayGrader>) -> Harness {
    let questions: Vec<Question> = serde_json::from_str(QUESTIONS).expect("sample questions parse");
    let questions = QuestionSet::new(questions).expect("sample questions are valid");

    let fullscreen = Arc::new(AtomicBool::new(false));
    let sink = Arc::new(RecordingSink::default());
    let deps = SessionDeps {
        display: Box::new(StubDisplay {
            fullscreen: fullscreen.clone(),
        }),
        grader,
        sink: sink.clone(),
    };

    let (session, events) = ExamSession::new(&config, questions, deps);
    Harness {
        session,
        events,
        fullscreen,
        sink,
    }
}

fn config() -> Config {
    Config {
        exam_duration_seconds: 60,
        max_violations: 3,
        ..Default::default()
    }
}

fn student() -> StudentData {
    StudentData::new("Aisyah Putri", "9A", "0081234567")
}

/// 把通道里的事件交给会话，直到进入终态
async fn drive_until_terminal(h: &mut Harness) -> Vec<Reaction> {
    let mut reactions = Vec::new();
    while !h.session.state().status.is_terminal() {
        let event = h.events.recv().await.expect("event channel stays open");
        if let Ok(mut performed) = h.session.dispatch(event) {
            reactions.append(&mut performed);
        }
    }
    reactions
}

#[tokio::test(start_paused = true)]
async fn test_full_exam_scores_seventy_and_persists() {
    let mut h = harness(config(), Some(80));

    h.session.dispatch(ExamEvent::Start(student())).unwrap();
    assert!(h.session.is_monitoring());
    assert!(h.session.is_timer_running());
    assert!(h.fullscreen.load(Ordering::SeqCst));

    // q1: 单选正确
    h.session.select_option("b").unwrap();
    // q2: 多选只选对一个
    h.session.dispatch(ExamEvent::Next).unwrap();
    h.session.toggle_option("a").unwrap();
    // q3: 配对全对
    h.session.dispatch(ExamEvent::Next).unwrap();
    h.session.select_left("l1").unwrap();
    h.session.select_right("r2").unwrap();
    h.session.select_left("l2").unwrap();
    h.session.select_right("r1").unwrap();
    // q4: 主观题
    h.session.dispatch(ExamEvent::Next).unwrap();
    h.session
        .write_text("Ikhlas adalah beramal hanya karena Allah")
        .unwrap();

    let reactions = assert_ok!(h.session.dispatch(ExamEvent::Finish));
    assert!(reactions.contains(&Reaction::BeginGrading));
    assert_eq!(h.session.state().status, ExamStatus::Grading);
    assert!(!h.session.is_monitoring());
    assert!(!h.session.is_timer_running());
    assert!(!h.fullscreen.load(Ordering::SeqCst));

    let reactions = drive_until_terminal(&mut h).await;
    assert!(reactions.contains(&Reaction::ShowResult));

    let state = h.session.state();
    assert_eq!(state.status, ExamStatus::Finished);
    assert_eq!(state.score, 70);
    assert_eq!(state.ai_feedback["q4"].score, 80);
    assert_eq!(state.ai_feedback["q4"].feedback, "Jawaban sudah baik.");

    let sink = h.sink.clone();
    h.session.shutdown(Duration::from_secs(5)).await;

    let payloads = sink.payloads.lock().unwrap();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].score, 70);
    assert_eq!(payloads[0].status, ExamStatus::Finished);
    assert_eq!(payloads[0].student, student());
    assert_eq!(payloads[0].answers.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_submits_exactly_once() {
    let mut h = harness(
        Config {
            exam_duration_seconds: 3,
            ..config()
        },
        Some(100),
    );

    h.session.dispatch(ExamEvent::Start(student())).unwrap();
    h.session.select_option("b").unwrap();

    let reactions = drive_until_terminal(&mut h).await;

    let grading_runs = reactions
        .iter()
        .filter(|r| matches!(r, Reaction::RunGrading(_)))
        .count();
    assert_eq!(grading_runs, 1);
    assert_eq!(h.session.state().time_left_seconds, 0);
    assert_eq!(h.session.state().status, ExamStatus::Finished);
    assert_eq!(h.session.state().score, 25);

    // 计时器已停止，不会再有新的计时事件
    tokio::time::sleep(Duration::from_secs(5)).await;
    while let Ok(event) = h.events.try_recv() {
        assert_ne!(event, ExamEvent::Tick);
    }

    let sink = h.sink.clone();
    h.session.shutdown(Duration::from_secs(5)).await;
    assert_eq!(sink.payloads.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_three_violations_end_exam_with_current_answers() {
    let mut h = harness(config(), Some(100));

    // 未开始时的信号不算违规
    h.session
        .observe(&EnvironmentSignal::VisibilityChanged { hidden: true });
    assert!(h.events.try_recv().is_err());

    h.session.dispatch(ExamEvent::Start(student())).unwrap();
    h.session.select_option("b").unwrap();

    h.session
        .observe(&EnvironmentSignal::VisibilityChanged { hidden: true });
    let event = h.events.recv().await.unwrap();
    let reactions = h.session.dispatch(event).unwrap();
    assert_eq!(
        reactions,
        vec![Reaction::ShowWarning(
            "left application/switched tab. Warning 1/3".into()
        )]
    );

    h.session
        .observe(&EnvironmentSignal::FullscreenChanged { fullscreen: false });
    let prevented = h
        .session
        .observe(&EnvironmentSignal::KeyPressed(KeyChord::parse("PrintScreen").unwrap()));
    assert!(prevented);

    drive_until_terminal(&mut h).await;

    let state = h.session.state();
    assert_eq!(state.status, ExamStatus::Violation);
    assert_eq!(state.violation_count, 3);
    assert_eq!(state.score, 25);

    let sink = h.sink.clone();
    h.session.shutdown(Duration::from_secs(5)).await;
    let payloads = sink.payloads.lock().unwrap();
    assert_eq!(payloads[0].status, ExamStatus::Violation);
    assert_eq!(payloads[0].violation_count, 3);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_grader_uses_fallback_for_essay_only() {
    let mut h = harness(config(), None);

    h.session.dispatch(ExamEvent::Start(student())).unwrap();
    h.session.select_option("b").unwrap();
    h.session.dispatch(ExamEvent::GoTo(3)).unwrap();
    h.session.write_text("Ikhlas berarti tulus").unwrap();
    h.session.dispatch(ExamEvent::Finish).unwrap();

    drive_until_terminal(&mut h).await;

    let state = h.session.state();
    assert_eq!(state.status, ExamStatus::Finished);
    assert_eq!(state.score, 25);
    assert_eq!(state.ai_feedback["q4"], GradingResult::new(0, FALLBACK_FEEDBACK));
}

#[tokio::test(start_paused = true)]
async fn test_crashed_grading_finishes_with_zero_and_saves_nothing() {
    let mut h = harness_with_grader(config(), Arc::new(PanickingGrader));

    h.session.dispatch(ExamEvent::Start(student())).unwrap();
    h.session.select_option("b").unwrap();
    h.session.dispatch(ExamEvent::GoTo(3)).unwrap();
    h.session.write_text("Ikhlas berarti tulus").unwrap();
    h.session.dispatch(ExamEvent::Finish).unwrap();

    drive_until_terminal(&mut h).await;

    let state = h.session.state();
    assert_eq!(state.status, ExamStatus::Finished);
    assert_eq!(state.score, 0);
    assert!(state.ai_feedback.is_empty());

    let sink = h.sink.clone();
    h.session.shutdown(Duration::from_secs(5)).await;
    assert!(sink.payloads.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_only_from_terminal_state() {
    let mut h = harness(config(), Some(50));

    assert_ok!(h.session.dispatch(ExamEvent::Start(student())));
    assert_err!(h.session.restart());

    h.session.dispatch(ExamEvent::Finish).unwrap();
    drive_until_terminal(&mut h).await;

    assert_ok!(h.session.restart());
    assert_eq!(h.session.state().status, ExamStatus::Idle);
    assert!(h.session.state().answers.is_empty());
    assert_eq!(h.session.state().time_left_seconds, 60);

    // 重新开始后可以再考一次
    h.session.dispatch(ExamEvent::Start(student())).unwrap();
    assert_eq!(h.session.state().status, ExamStatus::Active);
}
