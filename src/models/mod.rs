pub mod answer;
pub mod exam_state;
pub mod grading;
pub mod question;
pub mod student;

pub use answer::{Answer, AnswerMap};
pub use exam_state::{ExamOutcome, ExamState, ExamStatus};
pub use grading::{ExamResultPayload, FeedbackMap, GradingOutcome, GradingResult};
pub use question::{ChoiceOption, MatchPair, Question, QuestionKind, QuestionSet};
pub use student::StudentData;
