//! 示例题库加载器 - 编排层
//!
//! 读取 `manifest.json`，逐个取回文档、解码、提取元数据，组装成题目。
//! 单个文件失败只跳过该文件；manifest 本身读不到时返回空列表。

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::infrastructure::decoder::{DocumentDecoder, StandardDecoder};
use crate::infrastructure::source::{DirSource, DocumentSource, HttpSource, MANIFEST_NAME};
use crate::models::exercise::Exercise;
use crate::models::loaders::{parse_manifest, ManifestEntry};
use crate::services::parser;

pub struct DemoLoader {
    source: Box<dyn DocumentSource>,
    decoder: Box<dyn DocumentDecoder>,
}

impl DemoLoader {
    pub fn new(source: Box<dyn DocumentSource>, decoder: Box<dyn DocumentDecoder>) -> Self {
        Self { source, decoder }
    }

    /// 设置了 `demo_bank_url` 时走 HTTP，否则读本地目录
    pub fn from_config(config: &Config) -> Self {
        let source: Box<dyn DocumentSource> = match &config.demo_bank_url {
            Some(url) => Box::new(HttpSource::new(url.clone())),
            None => Box::new(DirSource::new(config.demo_bank_dir.clone())),
        };
        Self::new(source, Box::new(StandardDecoder))
    }

    /// 加载全部示例题目，按 manifest 顺序
    pub async fn load(&self) -> Vec<Exercise> {
        let manifest = match self.manifest().await {
            Ok(manifest) => manifest,
            Err(e) => {
                error!("❌ 无法加载示例题库 ({}): {:#}", self.source.describe(), e);
                return Vec::new();
            }
        };

        let mut exercises = Vec::with_capacity(manifest.len());
        for entry in manifest {
            match self.load_entry(&entry).await {
                Ok(exercise) => exercises.push(exercise),
                Err(e) => warn!("⚠️ 跳过示例题目 {}: {:#}", entry.path, e),
            }
        }

        info!("📦 已加载 {} 道示例题目", exercises.len());
        exercises
    }

    async fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let bytes = self.source.fetch(MANIFEST_NAME).await?;
        let text = String::from_utf8(bytes).context("manifest.json 不是有效的 UTF-8")?;
        let entries = parse_manifest(&text)?;
        info!("manifest 中共有 {} 个题目", entries.len());
        Ok(entries)
    }

    async fn load_entry(&self, entry: &ManifestEntry) -> Result<Exercise> {
        let bytes = self.source.fetch(&entry.path).await?;
        let filename = entry.filename();
        let decoded = self
            .decoder
            .decode(&filename, &bytes)
            .with_context(|| format!("解码失败: {}", entry.path))?;
        let parsed = parser::parse(&decoded.content);

        Ok(Exercise {
            id: entry.exercise_id(),
            filename,
            content: decoded.content,
            body: decoded.body,
            parsed,
            subject: entry.subject.clone(),
            grade: entry.grade.clone(),
            oa: entry.oa.clone(),
            indicator: entry.indicator.clone(),
            exercise_type: entry.exercise_type,
            difficulty: entry.difficulty,
            tags: vec![entry.subject.to_lowercase()],
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::exercise::{Difficulty, ExerciseBody, ExerciseType};
    use std::path::Path;

    pub(crate) const MANIFEST: &str = r#"[
        {
            "path": "matematicas/7-basico/ej1.txt",
            "subject": "Matemáticas",
            "grade": "7° Básico",
            "oa": "OA 03",
            "indicator": "Resuelve ecuaciones",
            "difficulty": "Media",
            "type": "Selección Única"
        },
        {
            "path": "lenguaje/falta.txt",
            "subject": "Lenguaje",
            "grade": "7° Básico",
            "oa": "OA 01",
            "indicator": "Comprende textos",
            "difficulty": "Básica",
            "type": "Desarrollo"
        }
    ]"#;

    /// 在目录中写一个最小示例题库（第二个条目的文件故意缺失）
    pub(crate) async fn write_demo_bank(root: &Path) {
        tokio::fs::create_dir_all(root.join("matematicas/7-basico"))
            .await
            .unwrap();
        tokio::fs::write(root.join(MANIFEST_NAME), MANIFEST).await.unwrap();
        tokio::fs::write(
            root.join("matematicas/7-basico/ej1.txt"),
            "Si 2x = 8, ¿cuánto vale x?\nA) 2\nB) 4\nRespuesta: B\nHabilidad: Resolver problemas",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_load_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        write_demo_bank(dir.path()).await;

        let loader = DemoLoader::new(
            Box::new(DirSource::new(dir.path())),
            Box::new(StandardDecoder),
        );
        let exercises = loader.load().await;
        assert_eq!(exercises.len(), 1);

        let ex = &exercises[0];
        assert_eq!(ex.id, "demo-matematicas-7-basico-ej1-txt");
        assert_eq!(ex.filename, "ej1.txt");
        assert_eq!(ex.tags, vec!["matemáticas".to_string()]);
        assert_eq!(ex.body, ExerciseBody::Plain);
        assert_eq!(ex.difficulty, Difficulty::Medium);
        assert_eq!(ex.exercise_type, ExerciseType::MultipleChoice);
        assert_eq!(ex.parsed.answer_key, "B");
        assert_eq!(ex.parsed.skill, "Resolver problemas");
        assert!(!ex.parsed.student_text.contains("Respuesta"));
    }

    #[tokio::test]
    async fn test_missing_manifest_gives_empty_bank() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DemoLoader::new(
            Box::new(DirSource::new(dir.path())),
            Box::new(StandardDecoder),
        );
        assert!(loader.load().await.is_empty());
    }
}
