//! 界面渲染：只把状态变成文本，不做任何 I/O

use std::fmt::Write;

use crate::models::{Answer, ExamState, ExamStatus, MatchPair, Question, QuestionKind, QuestionSet};
use crate::services::PairingSelection;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const RULE_WIDTH: usize = 60;

/// 剩余时间显示为 mm:ss
pub fn format_timer(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// 剩余时间提醒（5 分钟、1 分钟、10 秒）
pub fn time_notice(seconds: u64) -> Option<String> {
    match seconds {
        300 => Some("⏰ 5 minutes left".to_string()),
        60 => Some("⏰ 1 minute left".to_string()),
        10 => Some("⏰ 10 seconds left!".to_string()),
        _ => None,
    }
}

fn rule(out: &mut String, ch: char) {
    let _ = writeln!(out, "{}", ch.to_string().repeat(RULE_WIDTH));
}

pub fn render_intro(title: &str, questions: &QuestionSet, duration_seconds: u64, max_violations: u32) -> String {
    let mut out = String::from(CLEAR_SCREEN);
    rule(&mut out, '=');
    let _ = writeln!(out, "📝 {}", title);
    rule(&mut out, '=');
    let _ = writeln!(out, "Questions : {}", questions.len());
    let _ = writeln!(out, "Duration  : {} minutes", duration_seconds / 60);
    let _ = writeln!(out);
    let _ = writeln!(out, "Rules:");
    let _ = writeln!(out, "  • The exam runs in fullscreen. Leaving it counts as a violation.");
    let _ = writeln!(out, "  • Switching away or screenshot shortcuts count as violations.");
    let _ = writeln!(
        out,
        "  • After {} violations the exam ends and is submitted automatically.",
        max_violations
    );
    let _ = writeln!(out, "  • The exam is submitted automatically when time runs out.");
    let _ = writeln!(out);
    let _ = writeln!(out, "Please fill in your details to begin.");
    out
}

fn answered_count(state: &ExamState, questions: &QuestionSet) -> usize {
    questions
        .questions()
        .iter()
        .filter(|q| is_answered(state.answers.get(&q.id)))
        .count()
}

fn is_answered(answer: Option<&Answer>) -> bool {
    match answer {
        None => false,
        Some(Answer::SingleChoice(_)) => true,
        Some(Answer::MultiChoice(set)) => !set.is_empty(),
        Some(Answer::Matching(pairs)) => !pairs.is_empty(),
        Some(Answer::FreeText(text)) => !text.trim().is_empty(),
    }
}

pub fn unanswered_count(state: &ExamState, questions: &QuestionSet) -> usize {
    questions.len() - answered_count(state, questions)
}

pub fn render_question(
    state: &ExamState,
    questions: &QuestionSet,
    pairing: &PairingSelection,
    max_violations: u32,
) -> String {
    let mut out = String::from(CLEAR_SCREEN);
    let index = state.current_question_index;
    let Some(question) = questions.get(index) else {
        return out;
    };

    let _ = writeln!(
        out,
        "⏱  {}   ⚠ {}/{}   ✎ {}/{} answered",
        format_timer(state.time_left_seconds),
        state.violation_count,
        max_violations,
        answered_count(state, questions),
        questions.len()
    );
    rule(&mut out, '─');
    let _ = writeln!(
        out,
        "Question {}/{} · {} · {} pts",
        index + 1,
        questions.len(),
        question.kind.label(),
        question.points
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", question.text);
    let _ = writeln!(out);

    render_body(&mut out, question, state.answers.get(&question.id), pairing);

    rule(&mut out, '─');
    let _ = writeln!(out, "{}", question_hint(question));
    let _ = writeln!(out, "next · prev · goto <n> · finish · help");
    out
}

fn render_body(out: &mut String, question: &Question, answer: Option<&Answer>, pairing: &PairingSelection) {
    match &question.kind {
        QuestionKind::SingleChoice { options, .. } => {
            let selected = match answer {
                Some(Answer::SingleChoice(id)) => Some(id.as_str()),
                _ => None,
            };
            for option in options {
                let mark = if selected == Some(option.id.as_str()) { "(•)" } else { "( )" };
                let _ = writeln!(out, "  {} {}. {}", mark, option.id, option.text);
            }
        }
        QuestionKind::MultiChoice { options, .. } => {
            for option in options {
                let checked = matches!(answer, Some(Answer::MultiChoice(set)) if set.contains(&option.id));
                let mark = if checked { "[x]" } else { "[ ]" };
                let _ = writeln!(out, "  {} {}. {}", mark, option.id, option.text);
            }
        }
        QuestionKind::Matching {
            left_items,
            right_items,
            ..
        } => {
            let pairs: &[MatchPair] = match answer {
                Some(Answer::Matching(pairs)) => pairs.as_slice(),
                _ => &[],
            };
            for item in left_items {
                let pending = if pairing.pending_left() == Some(item.id.as_str()) { "*" } else { " " };
                let paired = pairs
                    .iter()
                    .find(|p| p.left_id == item.id)
                    .map(|p| format!(" → {}", p.right_id))
                    .unwrap_or_default();
                let _ = writeln!(out, " {} {}. {}{}", pending, item.id, item.text, paired);
            }
            let _ = writeln!(out);
            for item in right_items {
                let used = if pairs.iter().any(|p| p.right_id == item.id) { "✓" } else { " " };
                let _ = writeln!(out, " {} {}. {}", used, item.id, item.text);
            }
        }
        QuestionKind::FreeText { .. } => match answer {
            Some(Answer::FreeText(text)) if !text.trim().is_empty() => {
                let _ = writeln!(out, "Your answer:");
                let _ = writeln!(out, "  {}", text);
            }
            _ => {
                let _ = writeln!(out, "(no answer yet)");
            }
        },
    }
}

fn question_hint(question: &Question) -> &'static str {
    match question.kind {
        QuestionKind::SingleChoice { .. } => "pick <id> to choose an answer",
        QuestionKind::MultiChoice { .. } => "toggle <id> to select or unselect (choose all that apply)",
        QuestionKind::Matching { .. } => "left <id> then right <id> to pair · right <id> alone removes that pair",
        QuestionKind::FreeText { .. } => "write <your answer> (replaces the previous answer)",
    }
}

pub fn render_finish_prompt(unanswered: usize) -> String {
    if unanswered == 0 {
        "Submit your exam now? (y/no)".to_string()
    } else {
        format!(
            "You still have {} unanswered question(s). Submit anyway? (y/no)",
            unanswered
        )
    }
}

pub fn render_warning(message: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    rule(&mut out, '!');
    let _ = writeln!(out, "🚨 VIOLATION DETECTED");
    let _ = writeln!(out, "{}", message);
    let _ = writeln!(out, "Type 'ok' to return to the exam.");
    rule(&mut out, '!');
    out
}

pub fn render_grading(has_free_text: bool) -> String {
    let mut out = String::from(CLEAR_SCREEN);
    if has_free_text {
        let _ = writeln!(out, "🧮 Your essay answers are being graded by AI, please wait...");
    } else {
        let _ = writeln!(out, "🧮 Calculating your final score...");
    }
    out
}

pub fn render_result(state: &ExamState, questions: &QuestionSet) -> String {
    let mut out = String::from(CLEAR_SCREEN);
    rule(&mut out, '=');
    match state.status {
        ExamStatus::Violation => {
            let _ = writeln!(out, "🚫 Exam terminated: too many violations ({})", state.violation_count);
        }
        _ => {
            let _ = writeln!(out, "✅ Exam finished");
        }
    }
    if let Some(student) = &state.student {
        let _ = writeln!(out, "{} · {} · {}", student.name, student.class, student.nisn);
    }
    rule(&mut out, '=');
    let _ = writeln!(out, "Score: {}/100", state.score);

    let _ = writeln!(out);
    let _ = writeln!(out, "Essay feedback:");
    if state.ai_feedback.is_empty() {
        let _ = writeln!(out, "  (no essay questions, or the essays were not graded)");
    }
    for question in questions.questions() {
        if let Some(result) = state.ai_feedback.get(&question.id) {
            let answer = match state.answers.get(&question.id) {
                Some(Answer::FreeText(text)) if !text.trim().is_empty() => text.as_str(),
                _ => "-",
            };
            let _ = writeln!(out, "  • {} ({}/100)", question.text, result.score);
            let _ = writeln!(out, "    Your answer: \"{}\"", answer);
            let _ = writeln!(out, "    Feedback: {}", result.feedback);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Type 'restart' to start over or 'quit' to exit.");
    out
}

pub fn render_load_error(message: &str, misconfigured: bool) -> String {
    let mut out = String::from(CLEAR_SCREEN);
    rule(&mut out, '=');
    let _ = writeln!(out, "❌ Failed to load the exam questions");
    rule(&mut out, '=');
    if misconfigured {
        let _ = writeln!(out, "The backend address is not configured.");
        let _ = writeln!(out, "Set BACKEND_URL (or backend_url in exam.toml) and start the program again.");
    } else {
        let _ = writeln!(out, "{}", message);
        let _ = writeln!(out, "Check the backend configuration and your connection, then start the program again.");
    }
    out
}

pub fn help_text() -> &'static str {
    "Commands:
  next | prev | goto <n>      move between questions
  pick <id>                   single choice
  toggle <id>                 multiple answers
  left <id> / right <id>      matching
  write <text>                essay
  finish                      submit the exam
  ok                          close a warning
  restart | quit"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChoiceOption, GradingResult, StudentData};

    fn item(id: &str) -> ChoiceOption {
        ChoiceOption {
            id: id.into(),
            text: format!("text {}", id),
        }
    }

    fn questions() -> QuestionSet {
        QuestionSet::new(vec![
            Question {
                id: "m1".into(),
                text: "Pasangkan".into(),
                points: 10.0,
                kind: QuestionKind::Matching {
                    left_items: vec![item("l1"), item("l2")],
                    right_items: vec![item("r1"), item("r2")],
                    correct_pairs: vec![MatchPair::new("l1", "r1"), MatchPair::new("l2", "r2")],
                },
            },
            Question {
                id: "e1".into(),
                text: "Jelaskan ikhlas".into(),
                points: 10.0,
                kind: QuestionKind::FreeText {
                    rubric: "tulus".into(),
                },
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_format_timer() {
        assert_eq!(format_timer(2700), "45:00");
        assert_eq!(format_timer(61), "01:01");
        assert_eq!(format_timer(0), "00:00");
    }

    #[test]
    fn test_time_notice_milestones() {
        assert!(time_notice(300).is_some());
        assert!(time_notice(299).is_none());
        assert!(time_notice(10).is_some());
    }

    #[test]
    fn test_matching_screen_shows_pairs_and_pending() {
        let questions = questions();
        let mut state = ExamState::new(100);
        state.answers.insert(
            "m1".into(),
            Answer::Matching(vec![MatchPair::new("l1", "r2")]),
        );
        let mut pairing = PairingSelection::new();
        pairing
            .select_left(questions.get(0).unwrap(), state.answers.get("m1"), "l2")
            .unwrap();

        let screen = render_question(&state, &questions, &pairing, 3);

        assert!(screen.contains("l1. text l1 → r2"));
        assert!(screen.contains(" * l2. text l2"));
        assert!(screen.contains("01:40"));
        assert!(screen.contains("1/2 answered"));
    }

    #[test]
    fn test_result_lists_essay_feedback() {
        let questions = questions();
        let mut state = ExamState::new(100);
        state.status = ExamStatus::Finished;
        state.score = 85;
        state.student = Some(StudentData::new("Aisyah", "9A", "001"));
        state
            .answers
            .insert("e1".into(), Answer::FreeText("Tulus karena Allah".into()));
        state
            .ai_feedback
            .insert("e1".into(), GradingResult::new(70, "Cukup baik."));

        let screen = render_result(&state, &questions);

        assert!(screen.contains("Score: 85/100"));
        assert!(screen.contains("Jelaskan ikhlas (70/100)"));
        assert!(screen.contains("Your answer: \"Tulus karena Allah\""));
        assert!(screen.contains("Feedback: Cukup baik."));
        assert!(!screen.contains("no essay questions"));
    }

    #[test]
    fn test_result_without_feedback_says_so() {
        let mut state = ExamState::new(100);
        state.status = ExamStatus::Violation;
        state.violation_count = 3;

        let screen = render_result(&state, &questions());

        assert!(screen.contains("Exam terminated"));
        assert!(screen.contains("(no essay questions, or the essays were not graded)"));
    }

    #[test]
    fn test_grading_screen_mentions_ai_only_with_essays() {
        assert!(render_grading(true).contains("graded by AI"));
        assert!(render_grading(false).contains("Calculating your final score"));
    }

    #[test]
    fn test_unanswered_ignores_blank_essay() {
        let questions = questions();
        let mut state = ExamState::new(100);
        state.answers.insert("e1".into(), Answer::FreeText("  ".into()));
        assert_eq!(unanswered_count(&state, &questions), 2);
    }
}
