//! 应用主结构 - 编排层
//!
//! 管理程序生命周期：加载题库 → 填写身份 → 考试循环 → 结果 → 重来 / 退出

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::clients::{BackendClient, LlmClient};
use crate::config::Config;
use crate::console::render;
use crate::console::{parse_command, Command, CommandError};
use crate::error::AppError;
use crate::infrastructure::TerminalDisplay;
use crate::models::{QuestionSet, StudentData};
use crate::orchestrator::exam_session::{ExamSession, SessionDeps};
use crate::services::{EssayGrader, LlmEssayGrader, QuestionSource};
use crate::utils::logging::{log_final_result, log_questions_loaded, log_startup};
use crate::workflow::{ExamEvent, Reaction};

type Input = Lines<BufReader<Stdin>>;

/// 应用主结构
pub struct App {
    config: Config,
    backend: Arc<BackendClient>,
    grader: Arc<dyn EssayGrader>,
    loaded: Result<QuestionSet>,
}

impl App {
    /// 初始化应用：创建客户端并加载题库
    ///
    /// 题库加载失败不会返回 `Err`，而是在 `run` 中显示加载失败界面
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let backend = Arc::new(BackendClient::new(&config)?);

        if config.llm_api_key.is_empty() {
            warn!("⚠️ 未设置 LLM_API_KEY，主观题将全部使用兜底评分");
        }
        let grader: Arc<dyn EssayGrader> = Arc::new(LlmEssayGrader::new(LlmClient::new(&config)));

        info!("📥 正在加载题库...");
        let loaded = backend.fetch_questions().await;

        Ok(Self {
            config,
            backend,
            grader,
            loaded,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<()> {
        let App {
            config,
            backend,
            grader,
            loaded,
        } = self;

        let questions = match loaded {
            Ok(questions) => questions,
            Err(e) => {
                error!("❌ 题库加载失败: {:#}", e);
                let misconfigured = e
                    .downcast_ref::<AppError>()
                    .is_some_and(AppError::is_misconfiguration);
                print!("{}", render::render_load_error(&format!("{:#}", e), misconfigured));
                return Ok(());
            }
        };
        log_questions_loaded(&questions);

        let deps = SessionDeps {
            display: Box::new(TerminalDisplay::new()),
            grader,
            sink: backend,
        };
        let (mut session, mut events) = ExamSession::new(&config, questions.clone(), deps);
        let mut input = BufReader::new(tokio::io::stdin()).lines();
        let mut screen = Screen {
            questions: &questions,
            max_violations: session.machine().rules().max_violations,
            confirm_finish: false,
        };

        'exam: loop {
            print!(
                "{}",
                render::render_intro(
                    &config.exam_title,
                    &questions,
                    config.exam_duration_seconds,
                    screen.max_violations
                )
            );

            let Some(student) = prompt_identity(&mut input, &config.allowed_classes).await? else {
                break 'exam;
            };

            if let Err(e) = session.dispatch(ExamEvent::Start(student)) {
                println!("⚠️ {}", e);
                prompt("Press Enter to try again");
                if input.next_line().await?.is_none() {
                    break 'exam;
                }
                continue 'exam;
            }
            info!("▶️ 考试开始");
            screen.redraw(&session);

            if !exam_loop(&mut session, &mut events, &mut input, &mut screen).await? {
                warn!("考试进行中退出程序，本次作答未提交");
                break 'exam;
            }

            log_final_result(session.state());
            print!("{}", render::render_result(session.state(), &questions));

            loop {
                let Some(line) = input.next_line().await? else {
                    break 'exam;
                };
                match parse_command(&line) {
                    Ok(Command::Restart) => {
                        session.restart()?;
                        // 丢弃上一场考试残留的事件
                        while events.try_recv().is_ok() {}
                        screen.confirm_finish = false;
                        continue 'exam;
                    }
                    Ok(Command::Quit) => break 'exam,
                    _ => println!("Type 'restart' to start over or 'quit' to exit."),
                }
            }
        }

        session
            .shutdown(Duration::from_secs(config.request_timeout_secs))
            .await;
        info!("👋 程序结束");
        Ok(())
    }
}

/// 考试进行中的循环，直到进入终态
///
/// 返回 `false` 表示学生中途退出
async fn exam_loop(
    session: &mut ExamSession,
    events: &mut UnboundedReceiver<ExamEvent>,
    input: &mut Input,
    screen: &mut Screen<'_>,
) -> Result<bool> {
    loop {
        if session.state().status.is_terminal() {
            return Ok(true);
        }

        tokio::select! {
            line = input.next_line() => {
                let Some(line) = line? else {
                    return Ok(false);
                };
                if !screen.handle_line(session, &line) {
                    return Ok(false);
                }
            }
            Some(event) = events.recv() => {
                let tick = matches!(event, ExamEvent::Tick);
                match session.dispatch(event) {
                    Ok(reactions) => screen.show(session, &reactions, tick),
                    Err(e) => debug!("事件被拒绝: {}", e),
                }
            }
        }
    }
}

/// 考试界面的临时状态
struct Screen<'a> {
    questions: &'a QuestionSet,
    max_violations: u32,
    /// 正在等待交卷确认
    confirm_finish: bool,
}

impl Screen<'_> {
    fn redraw(&self, session: &ExamSession) {
        let state = session.state();
        match &state.last_warning {
            Some(message) => print!("{}", render::render_warning(message)),
            None => print!(
                "{}",
                render::render_question(state, self.questions, session.pairing(), self.max_violations)
            ),
        }
        flush();
    }

    /// 根据副作用决定显示什么
    fn show(&self, session: &ExamSession, reactions: &[Reaction], tick: bool) {
        for reaction in reactions {
            match reaction {
                Reaction::ShowWarning(message) => {
                    print!("{}", render::render_warning(message));
                    flush();
                    return;
                }
                Reaction::BeginGrading => {
                    print!("{}", render::render_grading(self.questions.has_free_text()));
                    flush();
                    return;
                }
                Reaction::ShowResult => return,
                _ => {}
            }
        }

        if tick {
            if let Some(notice) = render::time_notice(session.state().time_left_seconds) {
                println!("{}", notice);
            }
            return;
        }
        self.redraw(session);
    }

    /// 处理一行输入；返回 `false` 表示退出
    fn handle_line(&mut self, session: &mut ExamSession, line: &str) -> bool {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(CommandError::Empty) => {
                self.redraw(session);
                return true;
            }
            Err(e) => {
                println!("⚠️ {}", e);
                return true;
            }
        };

        if self.confirm_finish {
            self.confirm_finish = false;
            if command == Command::Confirm {
                self.apply(session, |s| s.dispatch(ExamEvent::Finish));
            } else {
                println!("Submission cancelled.");
                self.redraw(session);
            }
            return true;
        }

        // 警告未关闭前只接受 ok
        let warning_open = session.state().last_warning.is_some();
        if warning_open && !matches!(command, Command::Dismiss | Command::Help | Command::Quit | Command::Signal(_)) {
            self.redraw(session);
            return true;
        }

        match command {
            Command::Next => self.apply(session, |s| s.dispatch(ExamEvent::Next)),
            Command::Previous => self.apply(session, |s| s.dispatch(ExamEvent::Previous)),
            Command::GoTo(index) => self.apply(session, |s| s.dispatch(ExamEvent::GoTo(index))),
            Command::Pick(id) => self.apply(session, |s| s.select_option(&id)),
            Command::Toggle(id) => self.apply(session, |s| s.toggle_option(&id)),
            Command::Left(id) => self.apply(session, |s| s.select_left(&id)),
            Command::Right(id) => self.apply(session, |s| s.select_right(&id)),
            Command::Write(text) => self.apply(session, |s| s.write_text(&text)),
            Command::Dismiss => self.apply(session, |s| s.dispatch(ExamEvent::DismissWarning)),
            Command::Finish => {
                if session.state().status.is_terminal() || session.state().status.is_pending() {
                    println!("The exam is already being submitted.");
                } else {
                    self.confirm_finish = true;
                    let unanswered = render::unanswered_count(session.state(), self.questions);
                    println!("{}", render::render_finish_prompt(unanswered));
                }
                flush();
            }
            Command::Confirm | Command::Cancel => println!("Nothing to confirm."),
            Command::Restart => println!("Restart is available after the exam ends."),
            Command::Help => println!("{}", render::help_text()),
            Command::Quit => return false,
            Command::Signal(signal) => {
                if session.observe(&signal) {
                    debug!("已阻止默认行为: {:?}", signal);
                }
            }
        }
        true
    }

    fn apply<F>(&self, session: &mut ExamSession, action: F)
    where
        F: FnOnce(&mut ExamSession) -> Result<Vec<Reaction>, crate::error::ExamError>,
    {
        match action(session) {
            Ok(reactions) => self.show(session, &reactions, false),
            Err(e) => {
                println!("⚠️ {}", e);
                flush();
            }
        }
    }
}

fn prompt(label: &str) {
    print!("{}: ", label);
    flush();
}

fn flush() {
    let _ = std::io::stdout().flush();
}

async fn read_field(input: &mut Input, label: &str) -> Result<Option<String>> {
    prompt(label);
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

/// 逐项读取身份信息；输入结束时返回 `None`
async fn prompt_identity(input: &mut Input, allowed_classes: &[String]) -> Result<Option<StudentData>> {
    let class_label = if allowed_classes.is_empty() {
        "Class".to_string()
    } else {
        format!("Class ({})", allowed_classes.join(", "))
    };

    let Some(name) = read_field(input, "Full name").await? else {
        return Ok(None);
    };
    let Some(class) = read_field(input, &class_label).await? else {
        return Ok(None);
    };
    let Some(nisn) = read_field(input, "NISN").await? else {
        return Ok(None);
    };

    Ok(Some(StudentData::new(name, class, nisn)))
}
