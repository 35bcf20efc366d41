//! 命令行入口
//!
//! 每个子命令都是对 [`AppState`] 的一次调用，选择不跨进程保存，
//! 需要选择的命令通过 `--ids` 给出。

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use scraper::{Html, Selector};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::decoder::StandardDecoder;
use crate::models::catalog::{find_grade, find_subject};
use crate::models::document::Variant;
use crate::models::exercise::{Difficulty, Exercise, ExerciseType};
use crate::models::filter::FilterState;
use crate::models::settings::SettingsPatch;
use crate::orchestrator::upload::{import_files, BatchMetadata};
use crate::orchestrator::AppState;
use crate::services::analysis::analyze;
use crate::services::composer::ExamMeta;
use crate::services::llm_service::{Assistant, ASSISTANT_CONTEXT, GREETING};
use crate::services::parser;
use crate::utils::data_url::{encode_data_url, image_content_type};
use crate::utils::logging::truncate_text;
use crate::workflow::game::{GameRunner, GameState, GameView, ViewContent};

const NO_SELECTION_HINT: &str = "Para usar esta función, selecciona ejercicios con --ids.";

/// 题库与试卷生成工具
#[derive(Debug, Parser)]
#[command(name = "exam-generator", version, about = "Banco de ejercicios y generador de pruebas")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 输出 debug 日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// 批量导入文件（.docx / .pdf / .html / .txt）
    Import(ImportArgs),
    /// 按条件列出题目
    List(ListArgs),
    /// 查看一道题
    Show {
        id: String,
        /// 显示教师版（含答案）
        #[arg(long)]
        teacher: bool,
    },
    /// 删除一道题
    Delete { id: String },
    /// 清空题库
    Clear,
    /// 恢复示例题库
    RestoreDemo,
    /// 导出试卷
    Export(ExportArgs),
    /// 查看或修改全局设置
    Settings(SettingsArgs),
    /// 终端答题游戏
    Play(PlayArgs),
    /// 向助手提问
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// 分析所选题目的结构是否均衡
    Analyze {
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
    },
    /// 让助手生成一道选择题
    Suggest {
        #[arg(long, value_parser = parse_subject)]
        subject: String,
        #[arg(long, value_parser = parse_grade)]
        grade: String,
    },
}

#[derive(Clone, Debug, Args)]
pub struct ImportArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    #[arg(long, value_parser = parse_subject)]
    pub subject: Option<String>,
    #[arg(long, value_parser = parse_grade)]
    pub grade: Option<String>,
    #[arg(long)]
    pub oa: Option<String>,
    #[arg(long)]
    pub indicator: Option<String>,
    #[arg(long, value_parser = parse_difficulty)]
    pub difficulty: Option<Difficulty>,
    #[arg(long = "type", value_parser = parse_type)]
    pub exercise_type: Option<ExerciseType>,
}

impl ImportArgs {
    fn batch(&self) -> BatchMetadata {
        let default = BatchMetadata::default();
        BatchMetadata {
            subject: self.subject.clone().unwrap_or(default.subject),
            grade: self.grade.clone().unwrap_or(default.grade),
            oa: self.oa.clone().unwrap_or(default.oa),
            indicator: self.indicator.clone().unwrap_or(default.indicator),
            difficulty: self.difficulty.unwrap_or(default.difficulty),
            exercise_type: self.exercise_type.unwrap_or(default.exercise_type),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ListArgs {
    #[arg(long, value_parser = parse_subject)]
    pub subject: Option<String>,
    #[arg(long, value_parser = parse_grade)]
    pub grade: Option<String>,
    /// 只在同时给出 --subject 和 --grade 时生效
    #[arg(long)]
    pub oa: Option<String>,
    #[arg(long = "type", value_parser = parse_type)]
    pub exercise_type: Option<ExerciseType>,
    #[arg(long)]
    pub keyword: Option<String>,
}

impl ListArgs {
    fn filters(&self) -> FilterState {
        FilterState {
            subject: self.subject.clone(),
            grade: self.grade.clone(),
            oa: self.oa.clone(),
            indicator: None,
            exercise_type: self.exercise_type,
            keyword: self.keyword.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
    Student,
    Teacher,
    Both,
}

impl VariantArg {
    fn variants(self) -> &'static [Variant] {
        match self {
            VariantArg::Student => &[Variant::Student],
            VariantArg::Teacher => &[Variant::Teacher],
            VariantArg::Both => &[Variant::Student, Variant::Teacher],
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct ExportArgs {
    #[arg(long)]
    pub title: String,
    /// 题目 ID，按出现顺序组卷
    #[arg(long, value_delimiter = ',', required = true)]
    pub ids: Vec<String>,
    /// 默认取第一道题的科目
    #[arg(long)]
    pub subject: Option<String>,
    /// 默认取第一道题的年级
    #[arg(long)]
    pub grade: Option<String>,
    #[arg(long, value_enum, default_value = "both")]
    pub variant: VariantArg,
    /// 输出目录，默认取配置中的 OUTPUT_DIR
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Clone, Debug, Args)]
pub struct SettingsArgs {
    #[arg(long)]
    pub institution: Option<String>,
    /// 校徽图片文件
    #[arg(long, conflicts_with = "no_logo")]
    pub logo: Option<PathBuf>,
    /// 去掉校徽
    #[arg(long)]
    pub no_logo: bool,
    /// 教师版是否附带规格表
    #[arg(long)]
    pub spec_table: Option<bool>,
}

#[derive(Clone, Debug, Args)]
pub struct PlayArgs {
    #[arg(long, value_delimiter = ',', required = true)]
    pub ids: Vec<String>,
    /// 每题秒数，默认取配置中的 GAME_TIME_LIMIT
    #[arg(long)]
    pub time: Option<u32>,
    /// 显示教师视图（不隐藏答案段落）
    #[arg(long)]
    pub teacher: bool,
}

// ========== 参数解析 ==========

fn parse_subject(s: &str) -> Result<String, String> {
    find_subject(s)
        .map(str::to_string)
        .ok_or_else(|| format!("asignatura desconocida: {}", s))
}

fn parse_grade(s: &str) -> Result<String, String> {
    find_grade(s)
        .map(str::to_string)
        .ok_or_else(|| format!("curso desconocido: {}", s))
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    Difficulty::find(s).ok_or_else(|| format!("dificultad desconocida: {}", s))
}

fn parse_type(s: &str) -> Result<ExerciseType, String> {
    ExerciseType::find(s).ok_or_else(|| format!("tipo desconocido: {}", s))
}

// ========== 执行 ==========

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match &cli.command {
        Commands::Ask { question } => {
            let assistant = Assistant::from_config(&config);
            println!("{}\n", GREETING);
            println!("{}", assistant.ask(&question.join(" "), ASSISTANT_CONTEXT).await);
            return Ok(());
        }
        Commands::Suggest { subject, grade } => {
            let assistant = Assistant::from_config(&config);
            println!("{}", assistant.suggest_exercise(subject, grade).await);
            return Ok(());
        }
        _ => {}
    }

    let mut state = AppState::from_config(&config).await;

    match cli.command {
        Commands::Import(args) => {
            let report = import_files(&mut state, &StandardDecoder, &args.files, &args.batch()).await;
            for id in &report.imported {
                println!("✓ {}", id);
            }
            for (path, e) in &report.failed {
                println!("✗ {}: {}", path.display(), e);
            }
        }
        Commands::List(args) => list(&state, &args),
        Commands::Show { id, teacher } => {
            let exercise = state
                .get(&id)
                .with_context(|| format!("no existe el ejercicio: {}", id))?;
            show(exercise, teacher);
        }
        Commands::Delete { id } => {
            if !state.delete_exercise(&id).await {
                println!("No existe el ejercicio: {}", id);
            }
        }
        Commands::Clear => state.delete_all().await,
        Commands::RestoreDemo => {
            let count = state.restore_demo().await;
            println!("{} ejercicios de demostración restaurados", count);
        }
        Commands::Export(args) => export(&mut state, &config, &args).await?,
        Commands::Settings(args) => settings(&mut state, &args).await?,
        Commands::Play(args) => {
            select_ids(&mut state, &args.ids);
            let time = args.time.unwrap_or(config.default_time_limit);
            let variant = if args.teacher { Variant::Teacher } else { Variant::Student };
            play(&state, time, variant, &config.output_dir).await?;
        }
        Commands::Analyze { ids } => {
            select_ids(&mut state, &ids);
            let assistant = Assistant::from_config(&config);
            match analyze(&assistant, &state.selected()).await {
                Some(report) => {
                    println!("Preguntas: {}", report.stats.question_count);
                    for entry in &report.stats.difficulty {
                        println!("  {:<10} {}", entry.name, entry.value);
                    }
                    println!("Habilidades:");
                    for entry in &report.stats.skills {
                        println!("  {:<30} {}", entry.name, entry.value);
                    }
                    println!("\n{}", report.feedback);
                }
                None => println!("{}", NO_SELECTION_HINT),
            }
        }
        Commands::Ask { .. } | Commands::Suggest { .. } => {}
    }

    Ok(())
}

fn select_ids(state: &mut AppState, ids: &[String]) {
    for id in ids {
        if !state.selection().contains(id) && !state.toggle_selection(id) {
            warn!("⚠️ 忽略不存在的题目: {}", id);
        }
    }
}

fn list(state: &AppState, args: &ListArgs) {
    let mut filters = args.filters();
    let requested_oa = filters.oa.clone();
    let oas = state.refresh_oa(&mut filters);
    if let (Some(oa), None) = (requested_oa, &filters.oa) {
        warn!("⚠️ OA {} 不属于所选科目和年级，已忽略", oa);
    }
    if !oas.is_empty() {
        println!("OA disponibles: {}", oas.join(", "));
    }

    let exercises = state.filtered(&filters);

    for exercise in &exercises {
        println!(
            "{:<40} {:<18} {:<10} {:<8} {:<18} {:<9} {:<6} {}",
            exercise.id,
            exercise.subject,
            exercise.grade,
            exercise.oa,
            exercise.exercise_type,
            exercise.difficulty,
            exercise.parsed.answer_key,
            exercise.filename
        );
    }
    println!("{} ejercicios", exercises.len());
}

fn show(exercise: &Exercise, teacher: bool) {
    println!("{} ({})", exercise.filename, exercise.id);
    println!(
        "{} | {} | {} | {} | {}",
        exercise.subject, exercise.grade, exercise.oa, exercise.exercise_type, exercise.difficulty
    );
    println!("Indicador: {}", exercise.indicator);
    println!("Formato: {}\n", exercise.body.format_name());

    if teacher {
        println!("{}\n", exercise.content);
        println!("Respuesta: {}", exercise.parsed.answer_key);
        println!("Habilidad: {}", exercise.parsed.skill);
    } else {
        println!("{}", parser::strip_metadata_lines(exercise.student_text()));
    }
}

async fn export(state: &mut AppState, config: &Config, args: &ExportArgs) -> Result<()> {
    select_ids(state, &args.ids);

    let first = state.selected().first().map(|ex| (ex.subject.clone(), ex.grade.clone()));
    let (default_subject, default_grade) = first.unwrap_or_default();
    let meta = ExamMeta {
        title: args.title.clone(),
        grade: args.grade.clone().unwrap_or(default_grade),
        subject: args.subject.clone().unwrap_or(default_subject),
    };

    let out = args.out.as_deref().unwrap_or(&config.output_dir);
    for variant in args.variant.variants() {
        let path = state.export(*variant, &meta, out).await?;
        println!("✓ {}", path.display());
    }
    Ok(())
}

async fn settings(state: &mut AppState, args: &SettingsArgs) -> Result<()> {
    let logo = if args.no_logo {
        Some(None)
    } else if let Some(path) = &args.logo {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("no se pudo leer el logo: {}", path.display()))?;
        if bytes.is_empty() {
            return Err(AppError::invalid_argument("logo", "el archivo está vacío").into());
        }
        let content_type = image_content_type(&path.to_string_lossy());
        Some(Some(encode_data_url(content_type, &bytes)))
    } else {
        None
    };

    let patch = SettingsPatch {
        institution_name: args.institution.clone(),
        logo,
        include_spec_table: args.spec_table,
    };
    if patch != SettingsPatch::default() {
        state.update_settings(patch).await;
    }

    let current = state.settings();
    println!("Institución: {}", current.institution_name);
    println!(
        "Logo: {}",
        current
            .logo
            .as_deref()
            .map(|logo| truncate_text(logo, 40))
            .unwrap_or_else(|| "-".to_string())
    );
    println!("Tabla de especificaciones: {}", current.include_spec_table);
    Ok(())
}

// ========== 终端游戏 ==========

/// Enter：揭晓 / 下一题；`q`：退出
async fn play(state: &AppState, time_limit: u32, variant: Variant, output_dir: &Path) -> Result<()> {
    let mut runner = GameRunner::new(state.game_session(time_limit));
    if runner.session().is_empty() {
        println!("{}", NO_SELECTION_HINT);
        return Ok(());
    }

    runner.start()?;
    render(runner.session().current_view(variant), output_dir).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(input) = line? else { break };
                if input.trim().eq_ignore_ascii_case("q") {
                    break;
                }
                match runner.session().state() {
                    GameState::Active => runner.reveal()?,
                    GameState::Revealed => {
                        if runner.next()? == GameState::Finished {
                            println!("\n¡Juego terminado!");
                            break;
                        }
                    }
                    GameState::Setup | GameState::Finished => break,
                }
                render(runner.session().current_view(variant), output_dir).await?;
            }
            Some(game_state) = runner.wait_tick() => {
                if game_state == GameState::Revealed {
                    println!();
                    render(runner.session().current_view(variant), output_dir).await?;
                } else {
                    print!("\r⏱  {:>3}s ", runner.session().time_left());
                    std::io::stdout().flush().ok();
                }
            }
        }
    }

    Ok(())
}

async fn render(view: Option<GameView<'_>>, output_dir: &Path) -> Result<()> {
    let Some(view) = view else { return Ok(()) };

    if view.answer.is_none() {
        println!("\n===== Pregunta {}/{} ({}s) =====", view.number, view.total, view.time_left);
        match &view.content {
            ViewContent::Html(html) => println!("{}", html_to_text(html)),
            ViewContent::Text(text) => println!("{}", text),
            ViewContent::Document { filename, bytes } => {
                tokio::fs::create_dir_all(output_dir).await?;
                let path = output_dir.join(filename);
                tokio::fs::write(&path, bytes).await?;
                println!("📄 Documento: {}", path.display());
            }
        }
        println!("[Enter] revelar respuesta");
    }

    if let Some(answer) = &view.answer {
        println!("\n✅ Respuesta: {}", answer.answer_key);
        println!("🎯 Habilidad: {}", answer.skill);
        if view.number < view.total {
            println!("[Enter] siguiente pregunta");
        } else {
            println!("[Enter] terminar");
        }
    }
    Ok(())
}

fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let blocks = Selector::parse("p, li, h1, h2, h3, h4, h5, h6, tr").expect("block selector");
    let lines: Vec<String> = fragment
        .select(&blocks)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        fragment.root_element().text().collect::<String>().trim().to_string()
    } else {
        lines.join("\n")
    }
}
