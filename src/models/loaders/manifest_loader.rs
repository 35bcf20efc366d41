use crate::models::exercise::{Difficulty, ExerciseType};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 示例题库 manifest.json 中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// 相对题库根目录的路径，例如 "matematicas/7-basico/ej1.docx"
    pub path: String,
    pub subject: String,
    pub grade: String,
    pub oa: String,
    pub indicator: String,
    pub difficulty: Difficulty,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
}

impl ManifestEntry {
    /// 由路径确定的题目ID，同一路径总是得到同一ID
    pub fn exercise_id(&self) -> String {
        let slug: String = self
            .path
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("demo-{}", slug)
    }

    /// 路径最后一段作为文件名
    pub fn filename(&self) -> String {
        self.path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("demo-file.docx")
            .to_string()
    }
}

/// 解析 manifest JSON 文本
///
/// 顶层必须是数组，否则整个 manifest 无效；
/// 单条记录字段缺失或取值未知只跳过该条
pub fn parse_manifest(json: &str) -> Result<Vec<ManifestEntry>> {
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(json).context("无法解析 manifest.json")?;

    let entries = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<ManifestEntry>(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("⚠️ 跳过 manifest 第 {} 条记录: {}", index + 1, e);
                None
            }
        })
        .collect();
    Ok(entries)
}
