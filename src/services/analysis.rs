//! 试卷结构分析 - 业务能力层
//!
//! 统计所选题目的难度分布和能力覆盖，再交给助手点评试卷是否均衡

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::models::exercise::{Difficulty, Exercise, UNDEFINED_MARKER};
use crate::services::llm_service::Assistant;

/// 分析请求附带的上下文
pub const ANALYSIS_CONTEXT: &str = "Análisis de Instrumento de Evaluación";

/// 图表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartEntry {
    pub name: String,
    pub value: usize,
}

/// 试卷统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentStats {
    pub question_count: usize,
    /// 按 Básica/Media/Avanzada 顺序，只保留数量大于 0 的项
    pub difficulty: Vec<ChartEntry>,
    /// 按首次出现顺序
    pub skills: Vec<ChartEntry>,
}

impl InstrumentStats {
    pub fn collect(exercises: &[&Exercise]) -> Self {
        let difficulty = Difficulty::ALL
            .iter()
            .map(|level| ChartEntry {
                name: level.label().to_string(),
                value: exercises.iter().filter(|ex| ex.difficulty == *level).count(),
            })
            .filter(|entry| entry.value > 0)
            .collect();

        let mut skill_counts: IndexMap<&str, usize> = IndexMap::new();
        for exercise in exercises {
            let skill = exercise.parsed.skill.trim();
            let skill = if skill.is_empty() { UNDEFINED_MARKER } else { skill };
            *skill_counts.entry(skill).or_insert(0) += 1;
        }
        let skills = skill_counts
            .into_iter()
            .map(|(name, value)| ChartEntry {
                name: name.to_string(),
                value,
            })
            .collect();

        Self {
            question_count: exercises.len(),
            difficulty,
            skills,
        }
    }

    /// 请求模型点评的提示词
    pub fn analysis_prompt(&self) -> String {
        let difficulty = serde_json::to_string(&self.difficulty).unwrap_or_default();
        let skills = serde_json::to_string(&self.skills).unwrap_or_default();
        format!(
            "Analiza la siguiente estructura de una prueba docente:\n\
             Cantidad de preguntas: {}\n\
             Distribución Dificultad: {}\n\
             Habilidades cubiertas: {}\n\n\
             Dame un feedback breve (max 3 parrafos) sobre el equilibrio de la prueba.\n\
             ¿Está bien balanceada? ¿Falta alguna habilidad cognitiva importante (Bloom)?\n\
             ¿Es muy difícil o muy fácil?",
            self.question_count, difficulty, skills
        )
    }
}

/// 分析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisReport {
    pub stats: InstrumentStats,
    pub feedback: String,
}

/// 统计并请求点评
///
/// 没有题目时返回 `None`，不调用模型
pub async fn analyze(assistant: &Assistant, exercises: &[&Exercise]) -> Option<AnalysisReport> {
    if exercises.is_empty() {
        return None;
    }

    let stats = InstrumentStats::collect(exercises);
    info!(
        "📊 分析试卷: {} 道题, {} 种能力",
        stats.question_count,
        stats.skills.len()
    );
    let feedback = assistant.ask(&stats.analysis_prompt(), ANALYSIS_CONTEXT).await;

    Some(AnalysisReport { stats, feedback })
}
