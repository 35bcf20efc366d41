//! 批量导入 - 编排层
//!
//! 逐个读取文件 → 解码 → 提取元数据 → 加入题库。
//! 按顺序处理，每个文件独立提交；一个文件失败不影响已导入的文件。

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::error::{AppError, DecodeError};
use crate::infrastructure::decoder::DocumentDecoder;
use crate::models::catalog::{GRADES, SUBJECTS};
use crate::models::exercise::{Difficulty, Exercise, ExerciseType};
use crate::orchestrator::app_state::AppState;
use crate::services::parser;
use crate::utils::logging::{log_batch_complete, truncate_text};

/// 批量导入时统一使用的分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMetadata {
    pub subject: String,
    pub grade: String,
    pub oa: String,
    pub indicator: String,
    pub difficulty: Difficulty,
    pub exercise_type: ExerciseType,
}

impl Default for BatchMetadata {
    fn default() -> Self {
        Self {
            subject: SUBJECTS[0].to_string(),
            grade: GRADES[0].to_string(),
            oa: "OA 01".to_string(),
            indicator: "Resolución de Problemas".to_string(),
            difficulty: Difficulty::Medium,
            exercise_type: ExerciseType::MultipleChoice,
        }
    }
}

/// 导入结果
#[derive(Debug, Default)]
pub struct UploadReport {
    /// 新题目的 ID，按导入顺序
    pub imported: Vec<String>,
    pub failed: Vec<(PathBuf, AppError)>,
}

/// 新上传题目的 ID：`upload-{毫秒时间戳}-{随机串}`
pub fn upload_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "upload-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &random[..9]
    )
}

/// 把解码后的文件组装成题目
pub fn build_exercise(
    filename: &str,
    bytes: &[u8],
    decoder: &dyn DocumentDecoder,
    batch: &BatchMetadata,
) -> Result<Exercise, DecodeError> {
    let decoded = decoder.decode(filename, bytes)?;
    let parsed = parser::parse(&decoded.content);

    Ok(Exercise {
        id: upload_id(),
        filename: filename.to_string(),
        content: decoded.content,
        body: decoded.body,
        parsed,
        subject: batch.subject.clone(),
        grade: batch.grade.clone(),
        oa: batch.oa.clone(),
        indicator: batch.indicator.clone(),
        exercise_type: batch.exercise_type,
        difficulty: batch.difficulty,
        tags: vec!["lote".to_string()],
    })
}

/// 按顺序导入一批文件
pub async fn import_files(
    state: &mut AppState,
    decoder: &dyn DocumentDecoder,
    files: &[PathBuf],
    batch: &BatchMetadata,
) -> UploadReport {
    let mut report = UploadReport::default();

    for (index, path) in files.iter().enumerate() {
        info!("[{}/{}] 📄 导入 {}", index + 1, files.len(), path.display());

        match import_one(state, decoder, path, batch).await {
            Ok(id) => report.imported.push(id),
            Err(e) => {
                error!("❌ 导入失败 {}: {}", path.display(), e);
                report.failed.push((path.clone(), e));
            }
        }
    }

    log_batch_complete(report.imported.len(), report.failed.len());
    report
}

async fn import_one(
    state: &mut AppState,
    decoder: &dyn DocumentDecoder,
    path: &Path,
    batch: &BatchMetadata,
) -> Result<String, AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DecodeError::SourceFailed {
            location: path.display().to_string(),
            message: e.to_string(),
        })?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("archivo")
        .to_string();

    let exercise = build_exercise(&filename, &bytes, decoder, batch)?;
    info!(
        "✓ 答案: {} | 能力: {} | {}",
        exercise.parsed.answer_key,
        exercise.parsed.skill,
        truncate_text(exercise.student_text(), 40)
    );

    let id = exercise.id.clone();
    state.add_exercise(exercise).await;
    Ok(id)
}
