pub mod exam_machine;
pub mod grading_flow;

pub use exam_machine::{ExamEvent, ExamMachine, ExamRules, GradingJob, Reaction};
pub use grading_flow::GradingFlow;
