pub mod answer_capture;
pub mod essay_grader;
pub mod exam_backend;
pub mod integrity_monitor;
pub mod scoring_service;

pub use answer_capture::PairingSelection;
pub use essay_grader::{EssayGrader, EssayRequest, LlmEssayGrader};
pub use exam_backend::{QuestionSource, ResultSink};
pub use integrity_monitor::{EnvironmentSignal, IntegrityMonitor, KeyChord, ViolationReason};
pub use scoring_service::{ScoreReport, ScoringEngine};
