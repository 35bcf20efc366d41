//! 课堂抢答模式 - 流程层
//!
//! 状态机：`Setup → Active ⇄ Revealed → Finished → Setup`
//!
//! - [`GameSession`] 只管状态转换，不碰时间
//! - [`GameTimer`] 持有唯一的倒计时任务，drop 时自动 abort
//! - [`GameRunner`] 把两者绑在一起：进入 Active 时启动计时，离开时释放

use std::borrow::Cow;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info};

use crate::error::GameError;
use crate::models::document::Variant;
use crate::models::exercise::{Exercise, ExerciseBody};
use crate::services::parser::{strip_metadata_html, strip_metadata_lines};

pub const DEFAULT_TIME_LIMIT: u32 = 30;
pub const MIN_TIME_LIMIT: u32 = 5;
pub const TIME_STEP: u32 = 5;
pub const MAX_TIME_LIMIT: u32 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Setup,
    Active,
    Revealed,
    Finished,
}

impl GameState {
    pub fn name(self) -> &'static str {
        match self {
            GameState::Setup => "Setup",
            GameState::Active => "Active",
            GameState::Revealed => "Revealed",
            GameState::Finished => "Finished",
        }
    }
}

/// 一局游戏
#[derive(Debug, Clone)]
pub struct GameSession {
    exercises: Vec<Exercise>,
    state: GameState,
    index: usize,
    time_limit: u32,
    time_left: u32,
}

impl GameSession {
    /// 题目按传入顺序出场（通常就是当前选择的顺序）
    ///
    /// 时限向下取整到 5 秒的倍数，并限制在 `MIN_TIME_LIMIT..=MAX_TIME_LIMIT`
    pub fn new(exercises: Vec<Exercise>, time_limit: u32) -> Self {
        let time_limit = (time_limit - time_limit % TIME_STEP).clamp(MIN_TIME_LIMIT, MAX_TIME_LIMIT);
        Self {
            exercises,
            state: GameState::Setup,
            index: 0,
            time_limit,
            time_left: time_limit,
        }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn time_limit(&self) -> u32 {
        self.time_limit
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn current(&self) -> Option<&Exercise> {
        self.exercises.get(self.index)
    }

    pub fn increase_time(&mut self) -> Result<u32, GameError> {
        self.expect_state(GameState::Setup, "increase_time")?;
        self.time_limit = self.time_limit.saturating_add(TIME_STEP).min(MAX_TIME_LIMIT);
        Ok(self.time_limit)
    }

    /// 每次减 5 秒，最少 5 秒
    pub fn decrease_time(&mut self) -> Result<u32, GameError> {
        self.expect_state(GameState::Setup, "decrease_time")?;
        self.time_limit = self.time_limit.saturating_sub(TIME_STEP).max(MIN_TIME_LIMIT);
        Ok(self.time_limit)
    }

    pub fn start(&mut self) -> Result<(), GameError> {
        self.expect_state(GameState::Setup, "start")?;
        if self.exercises.is_empty() {
            return Err(GameError::NoExercises);
        }
        self.index = 0;
        self.time_left = self.time_limit;
        self.state = GameState::Active;
        info!("🎮 游戏开始: {} 道题, 每题 {} 秒", self.exercises.len(), self.time_limit);
        Ok(())
    }

    /// 倒计时减一秒，归零时自动揭晓；非 Active 状态下无操作
    pub fn tick(&mut self) -> GameState {
        if self.state == GameState::Active {
            self.time_left = self.time_left.saturating_sub(1);
            if self.time_left == 0 {
                debug!("⏰ 第 {} 题时间到", self.index + 1);
                self.state = GameState::Revealed;
            }
        }
        self.state
    }

    pub fn reveal(&mut self) -> Result<(), GameError> {
        self.expect_state(GameState::Active, "reveal")?;
        self.state = GameState::Revealed;
        Ok(())
    }

    /// 下一题；最后一题之后进入 Finished
    pub fn next(&mut self) -> Result<GameState, GameError> {
        self.expect_state(GameState::Revealed, "next")?;
        if self.index + 1 < self.exercises.len() {
            self.index += 1;
            self.time_left = self.time_limit;
            self.state = GameState::Active;
        } else {
            self.state = GameState::Finished;
            info!("🏁 游戏结束");
        }
        Ok(self.state)
    }

    pub fn play_again(&mut self) -> Result<(), GameError> {
        self.expect_state(GameState::Finished, "play_again")?;
        self.reset();
        Ok(())
    }

    /// 游戏中途回到设置界面
    pub fn restart(&mut self) -> Result<(), GameError> {
        match self.state {
            GameState::Active | GameState::Revealed => {
                self.reset();
                Ok(())
            }
            state => Err(GameError::InvalidTransition {
                state: state.name(),
                action: "restart",
            }),
        }
    }

    /// 当前画面
    ///
    /// 学生视图去掉答案/能力段落；揭晓后附带答案和能力
    pub fn current_view(&self, variant: Variant) -> Option<GameView<'_>> {
        if !matches!(self.state, GameState::Active | GameState::Revealed) {
            return None;
        }
        let exercise = self.current()?;

        let content = match (&exercise.body, variant) {
            (ExerciseBody::RichText { html, .. }, Variant::Student) => {
                ViewContent::Html(strip_metadata_html(html))
            }
            (ExerciseBody::RichText { html, .. }, Variant::Teacher) => ViewContent::Html(html.clone()),
            (ExerciseBody::FixedLayout { bytes }, _) => ViewContent::Document {
                filename: &exercise.filename,
                bytes,
            },
            (ExerciseBody::Plain, Variant::Student) => {
                ViewContent::Text(strip_metadata_lines(exercise.student_text()))
            }
            (ExerciseBody::Plain, Variant::Teacher) => {
                ViewContent::Text(Cow::Borrowed(exercise.content.as_str()))
            }
        };

        let revealed = self.state == GameState::Revealed;
        let answer = revealed.then(|| Revelation {
            answer_key: non_blank_or(&exercise.parsed.answer_key, "?"),
            skill: non_blank_or(&exercise.parsed.skill, "N/A"),
        });

        Some(GameView {
            number: self.index + 1,
            total: self.exercises.len(),
            time_left: self.time_left,
            content,
            answer,
        })
    }

    fn reset(&mut self) {
        self.index = 0;
        self.time_left = self.time_limit;
        self.state = GameState::Setup;
    }

    fn expect_state(&self, expected: GameState, action: &'static str) -> Result<(), GameError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(GameError::InvalidTransition {
                state: self.state.name(),
                action,
            })
        }
    }
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

/// 当前题目的展示内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView<'a> {
    pub number: usize,
    pub total: usize,
    pub time_left: u32,
    pub content: ViewContent<'a>,
    /// 仅在揭晓后存在
    pub answer: Option<Revelation<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewContent<'a> {
    Html(String),
    Text(Cow<'a, str>),
    /// 原始版式文件，直接交给外部查看器
    Document { filename: &'a str, bytes: &'a [u8] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revelation<'a> {
    pub answer_key: &'a str,
    pub skill: &'a str,
}

/// 倒计时任务
///
/// 后台任务每个周期发送一次 tick；drop 即停止
pub struct GameTimer {
    handle: JoinHandle<()>,
    ticks: mpsc::Receiver<()>,
}

impl GameTimer {
    pub fn spawn(period: Duration) -> Self {
        let (tx, ticks) = mpsc::channel(1);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Self { handle, ticks }
    }

    /// 等待下一次 tick；任务已结束时返回 `None`
    pub async fn tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }
}

impl Drop for GameTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// 状态机 + 计时器
///
/// 任何时刻最多一个计时器：进入 Active 时新建，离开 Active 时释放
pub struct GameRunner {
    session: GameSession,
    timer: Option<GameTimer>,
    period: Duration,
}

impl GameRunner {
    pub fn new(session: GameSession) -> Self {
        Self::with_period(session, Duration::from_secs(1))
    }

    pub fn with_period(session: GameSession, period: Duration) -> Self {
        Self {
            session,
            timer: None,
            period,
        }
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn is_timer_running(&self) -> bool {
        self.timer.is_some()
    }

    /// 只在 Setup 时可调，不涉及计时器
    pub fn increase_time(&mut self) -> Result<u32, GameError> {
        self.session.increase_time()
    }

    pub fn decrease_time(&mut self) -> Result<u32, GameError> {
        self.session.decrease_time()
    }

    pub fn start(&mut self) -> Result<(), GameError> {
        self.session.start()?;
        self.rearm();
        Ok(())
    }

    pub fn reveal(&mut self) -> Result<(), GameError> {
        self.session.reveal()?;
        self.rearm();
        Ok(())
    }

    pub fn next(&mut self) -> Result<GameState, GameError> {
        let state = self.session.next()?;
        self.rearm();
        Ok(state)
    }

    pub fn play_again(&mut self) -> Result<(), GameError> {
        self.session.play_again()?;
        self.rearm();
        Ok(())
    }

    pub fn restart(&mut self) -> Result<(), GameError> {
        self.session.restart()?;
        self.rearm();
        Ok(())
    }

    /// 等待一次计时并推进状态机
    ///
    /// 没有计时器（非 Active）时返回 `None`
    pub async fn wait_tick(&mut self) -> Option<GameState> {
        let timer = self.timer.as_mut()?;
        timer.tick().await?;
        let state = self.session.tick();
        if state != GameState::Active {
            self.timer = None;
        }
        Some(state)
    }

    /// 每次状态转换后调用：旧计时器总是先丢弃，Active 时再新建
    fn rearm(&mut self) {
        self.timer = None;
        if self.session.state() == GameState::Active {
            self.timer = Some(GameTimer::spawn(self.period));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exercise::{Difficulty, ExerciseType, ParsedExercise};

    fn exercise(id: &str, body: ExerciseBody) -> Exercise {
        Exercise {
            id: id.to_string(),
            filename: format!("{}.docx", id),
            content: "¿Cuánto es 2+2?\nRespuesta: B".to_string(),
            body,
            parsed: ParsedExercise {
                student_text: "¿Cuánto es 2+2?".to_string(),
                answer_key: "B".to_string(),
                skill: "Calcular".to_string(),
                extracted: true,
            },
            subject: "Matemáticas".to_string(),
            grade: "1° Básico".to_string(),
            oa: "OA 01".to_string(),
            indicator: "Suma".to_string(),
            exercise_type: ExerciseType::MultipleChoice,
            difficulty: Difficulty::Basic,
            tags: Vec::new(),
        }
    }

    fn session(n: usize) -> GameSession {
        let exercises = (0..n)
            .map(|i| exercise(&format!("ex-{}", i), ExerciseBody::Plain))
            .collect();
        GameSession::new(exercises, DEFAULT_TIME_LIMIT)
    }

    #[test]
    fn test_time_limit_adjustment() {
        let mut game = session(1);
        assert_eq!(game.time_limit(), 30);
        assert_eq!(game.increase_time().unwrap(), 35);
        for _ in 0..10 {
            game.decrease_time().unwrap();
        }
        assert_eq!(game.time_limit(), MIN_TIME_LIMIT);

        assert_eq!(GameSession::new(Vec::new(), 2).time_limit(), MIN_TIME_LIMIT);
        assert_eq!(GameSession::new(Vec::new(), 32).time_limit(), 30);
        assert_eq!(GameSession::new(Vec::new(), u32::MAX).time_limit(), MAX_TIME_LIMIT);

        let mut long = GameSession::new(Vec::new(), MAX_TIME_LIMIT);
        assert_eq!(long.increase_time().unwrap(), MAX_TIME_LIMIT);
    }

    #[test]
    fn test_start_requires_exercises() {
        let mut game = session(0);
        assert_eq!(game.start(), Err(GameError::NoExercises));
        assert_eq!(game.state(), GameState::Setup);
    }

    #[test]
    fn test_countdown_reveals_at_zero() {
        let mut game = session(2);
        game.start().unwrap();
        for _ in 0..29 {
            assert_eq!(game.tick(), GameState::Active);
        }
        assert_eq!(game.tick(), GameState::Revealed);
        assert_eq!(game.time_left(), 0);

        // 揭晓后不再倒计时
        assert_eq!(game.tick(), GameState::Revealed);
        assert_eq!(game.time_left(), 0);
    }

    #[test]
    fn test_full_round() {
        let mut game = session(2);
        game.start().unwrap();
        game.tick();
        game.reveal().unwrap();

        assert_eq!(game.next().unwrap(), GameState::Active);
        assert_eq!(game.index(), 1);
        assert_eq!(game.time_left(), 30);

        game.reveal().unwrap();
        assert_eq!(game.next().unwrap(), GameState::Finished);

        game.play_again().unwrap();
        assert_eq!(game.state(), GameState::Setup);
        assert_eq!(game.index(), 0);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut game = session(1);
        assert_eq!(
            game.reveal(),
            Err(GameError::InvalidTransition {
                state: "Setup",
                action: "reveal"
            })
        );
        game.start().unwrap();
        assert!(game.next().is_err());
        assert!(game.increase_time().is_err());
        assert!(game.play_again().is_err());

        game.restart().unwrap();
        assert_eq!(game.state(), GameState::Setup);
        assert!(game.restart().is_err());
    }

    #[test]
    fn test_student_view_hides_answer_until_revealed() {
        let html = "<p>¿Cuánto es 2+2?</p><p>Respuesta: B</p>".to_string();
        let mut game = GameSession::new(
            vec![exercise(
                "rich",
                ExerciseBody::RichText {
                    html,
                    original: None,
                },
            )],
            10,
        );
        assert!(game.current_view(Variant::Student).is_none());

        game.start().unwrap();
        let view = game.current_view(Variant::Student).unwrap();
        assert_eq!(view.content, ViewContent::Html("<p>¿Cuánto es 2+2?</p>".to_string()));
        assert!(view.answer.is_none());
        assert_eq!((view.number, view.total), (1, 1));

        game.reveal().unwrap();
        let view = game.current_view(Variant::Student).unwrap();
        assert_eq!(
            view.answer,
            Some(Revelation {
                answer_key: "B",
                skill: "Calcular"
            })
        );
    }

    #[test]
    fn test_plain_and_fixed_layout_views() {
        let mut game = GameSession::new(
            vec![
                exercise("plain", ExerciseBody::Plain),
                exercise("pdf", ExerciseBody::FixedLayout { bytes: b"%PDF".to_vec() }),
            ],
            10,
        );
        game.start().unwrap();
        assert_eq!(
            game.current_view(Variant::Student).unwrap().content,
            ViewContent::Text(Cow::Borrowed("¿Cuánto es 2+2?"))
        );
        assert_eq!(
            game.current_view(Variant::Teacher).unwrap().content,
            ViewContent::Text(Cow::Borrowed("¿Cuánto es 2+2?\nRespuesta: B"))
        );

        game.reveal().unwrap();
        game.next().unwrap();
        assert_eq!(
            game.current_view(Variant::Student).unwrap().content,
            ViewContent::Document {
                filename: "pdf.docx",
                bytes: b"%PDF"
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_reveals_after_time_limit() {
        let mut runner = GameRunner::new(session(1));
        assert!(runner.wait_tick().await.is_none());

        runner.start().unwrap();
        assert!(runner.is_timer_running());

        let mut ticks = 0;
        while let Some(state) = runner.wait_tick().await {
            ticks += 1;
            if state == GameState::Revealed {
                break;
            }
        }
        assert_eq!(ticks, 30);
        assert_eq!(runner.session().state(), GameState::Revealed);
        assert!(!runner.is_timer_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_releases_timer_on_every_exit() {
        let mut runner = GameRunner::with_period(session(2), Duration::from_millis(100));
        runner.start().unwrap();
        runner.wait_tick().await;
        assert_eq!(runner.session().time_left(), 29);

        runner.reveal().unwrap();
        assert!(!runner.is_timer_running());

        runner.next().unwrap();
        assert!(runner.is_timer_running());
        assert_eq!(runner.session().time_left(), 30);

        runner.restart().unwrap();
        assert!(!runner.is_timer_running());
        assert_eq!(runner.session().state(), GameState::Setup);
    }

    #[test]
    fn test_student_view_drops_unparsed_label_lines() {
        let mut only_metadata = exercise("meta", ExerciseBody::Plain);
        only_metadata.content = "Respuesta: B\nHabilidad: Calcular".to_string();
        only_metadata.parsed = crate::services::parser::parse(&only_metadata.content);
        let mut unparsed = exercise("decimal", ExerciseBody::Plain);
        unparsed.content = "Calcula 7/2\nRespuesta: 3.5".to_string();
        unparsed.parsed = crate::services::parser::parse(&unparsed.content);

        let mut game = GameSession::new(vec![only_metadata, unparsed], 10);
        game.start().unwrap();
        assert_eq!(
            game.current_view(Variant::Student).unwrap().content,
            ViewContent::Text(Cow::Borrowed(""))
        );

        game.reveal().unwrap();
        game.next().unwrap();
        assert_eq!(
            game.current_view(Variant::Student).unwrap().content,
            ViewContent::Text(Cow::Borrowed("Calcula 7/2"))
        );
        assert_eq!(
            game.current_view(Variant::Teacher).unwrap().content,
            ViewContent::Text(Cow::Borrowed("Calcula 7/2\nRespuesta: 3.5"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_adjusts_time_only_before_start() {
        let mut runner = GameRunner::new(session(1));
        assert_eq!(runner.increase_time().unwrap(), 35);
        assert_eq!(runner.decrease_time().unwrap(), 30);

        runner.start().unwrap();
        assert!(runner.increase_time().is_err());
        assert!(runner.is_timer_running());
    }
}
