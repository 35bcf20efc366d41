//! 题库持久化 - 基础设施层
//!
//! 对外只暴露 [`ExerciseStorage`] 能力，业务层不关心题目存在哪里

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::models::exercise::Exercise;

/// 持久化能力
///
/// 所有方法都是异步的；`get_all` 按 ID 升序返回
pub trait ExerciseStorage: Send + Sync {
    fn get_all(&self) -> BoxFuture<'_, Result<Vec<Exercise>, StorageError>>;

    /// 新增或覆盖
    fn put<'a>(&'a self, exercise: &'a Exercise) -> BoxFuture<'a, Result<(), StorageError>>;

    /// 删除不存在的 ID 不算错误
    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;

    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>>;
}

/// 每道题一个 `{id}.json` 文件
#[derive(Debug, Clone)]
pub struct JsonDirStorage {
    dir: PathBuf,
}

impl JsonDirStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(id)))
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: self.dir.display().to_string(),
                source: e,
            })
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>, StorageError> {
        let read_failed = |e| StorageError::ReadFailed {
            path: self.dir.display().to_string(),
            source: e,
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_failed(e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(path);
            }
        }
        Ok(files)
    }

    async fn load_all(&self) -> Result<Vec<Exercise>, StorageError> {
        let mut exercises = Vec::new();

        for path in self.json_files().await? {
            let text = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StorageError::ReadFailed {
                    path: path.display().to_string(),
                    source: e,
                })?;

            // 单个文件损坏只跳过该文件
            match serde_json::from_str::<Exercise>(&text) {
                Ok(exercise) => exercises.push(exercise),
                Err(e) => warn!("⚠️ 跳过损坏的题目文件 {}: {}", path.display(), e),
            }
        }

        exercises.sort_by(|a, b| a.id.cmp(&b.id));
        debug!("从 {} 读取 {} 道题目", self.dir.display(), exercises.len());
        Ok(exercises)
    }

    async fn write(&self, exercise: &Exercise) -> Result<(), StorageError> {
        self.ensure_dir().await?;
        let path = self.path_for(&exercise.id);
        let json = serde_json::to_string_pretty(exercise).map_err(|e| StorageError::Corrupted {
            path: path.display().to_string(),
            source: e,
        })?;

        // 先写临时文件再改名，避免半截文件
        let tmp = path.with_extension("json.tmp");
        let write_failed = |e| StorageError::WriteFailed {
            path: path.display().to_string(),
            source: e,
        };
        tokio::fs::write(&tmp, json).await.map_err(write_failed)?;
        tokio::fs::rename(&tmp, &path).await.map_err(write_failed)?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), StorageError> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        for path in self.json_files().await? {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| StorageError::DeleteFailed {
                    path: path.display().to_string(),
                    source: e,
                })?;
        }
        Ok(())
    }
}

/// ID → 文件名：字母、数字、`-`、`_` 原样保留，其余字节写成 `%XX`
///
/// `%` 本身也会被转义，所以不同的 ID 不会落到同一个文件
fn file_stem(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

impl ExerciseStorage for JsonDirStorage {
    fn get_all(&self) -> BoxFuture<'_, Result<Vec<Exercise>, StorageError>> {
        self.load_all().boxed()
    }

    fn put<'a>(&'a self, exercise: &'a Exercise) -> BoxFuture<'a, Result<(), StorageError>> {
        self.write(exercise).boxed()
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        self.remove(id).boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        self.remove_all().boxed()
    }
}

/// 纯内存存储
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<IndexMap<String, Exercise>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exercises(exercises: Vec<Exercise>) -> Self {
        let items = exercises.into_iter().map(|ex| (ex.id.clone(), ex)).collect();
        Self {
            items: Mutex::new(items),
        }
    }

    fn with_items<T>(
        &self,
        f: impl FnOnce(&mut IndexMap<String, Exercise>) -> T,
    ) -> Result<T, StorageError> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| StorageError::Unavailable("内存存储锁已损坏".to_string()))?;
        Ok(f(&mut items))
    }
}

impl ExerciseStorage for MemoryStorage {
    fn get_all(&self) -> BoxFuture<'_, Result<Vec<Exercise>, StorageError>> {
        let result = self.with_items(|items| {
            let mut all: Vec<Exercise> = items.values().cloned().collect();
            all.sort_by(|a, b| a.id.cmp(&b.id));
            all
        });
        async move { result }.boxed()
    }

    fn put<'a>(&'a self, exercise: &'a Exercise) -> BoxFuture<'a, Result<(), StorageError>> {
        let result = self.with_items(|items| {
            items.insert(exercise.id.clone(), exercise.clone());
        });
        async move { result }.boxed()
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        let result = self.with_items(|items| {
            items.shift_remove(id);
        });
        async move { result }.boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StorageError>> {
        let result = self.with_items(|items| items.clear());
        async move { result }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exercise::{Difficulty, ExerciseBody, ExerciseType, ParsedExercise};

    fn exercise(id: &str) -> Exercise {
        Exercise {
            id: id.to_string(),
            filename: format!("{}.docx", id),
            content: "Texto".to_string(),
            body: ExerciseBody::RichText {
                html: "<p>Texto</p>".to_string(),
                original: Some(vec![0x50, 0x4b, 0x03, 0x04]),
            },
            parsed: ParsedExercise::default(),
            subject: "Historia".to_string(),
            grade: "5° Básico".to_string(),
            oa: "OA 02".to_string(),
            indicator: "Indicador".to_string(),
            exercise_type: ExerciseType::Development,
            difficulty: Difficulty::Advanced,
            tags: vec!["historia".to_string()],
        }
    }

    #[tokio::test]
    async fn test_json_dir_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonDirStorage::new(dir.path().join("exercises"));

        assert!(storage.get_all().await.unwrap().is_empty());

        storage.put(&exercise("b")).await.unwrap();
        storage.put(&exercise("a/../x")).await.unwrap();
        let all = storage.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a/../x");
        assert_eq!(all[1], exercise("b"));

        storage.delete("b").await.unwrap();
        storage.delete("missing").await.unwrap();
        assert_eq!(storage.get_all().await.unwrap().len(), 1);

        storage.clear().await.unwrap();
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_file_stem_is_injective() {
        assert_eq!(file_stem("demo-mat_01"), "demo-mat_01");
        assert_eq!(file_stem("mat.001"), "mat%2E001");
        assert_eq!(file_stem("a/../x"), "a%2F%2E%2E%2Fx");
        assert_eq!(file_stem("ñ"), "%C3%B1");
        assert_ne!(file_stem("mat.001"), file_stem("mat_001"));
        assert_ne!(file_stem("a%2Eb"), file_stem("a.b"));
    }

    #[tokio::test]
    async fn test_json_dir_keeps_similar_ids_apart() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonDirStorage::new(dir.path());
        storage.put(&exercise("mat.001")).await.unwrap();
        storage.put(&exercise("mat_001")).await.unwrap();
        storage.put(&exercise("a_b")).await.unwrap();

        let ids: Vec<String> = storage.get_all().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a_b", "mat.001", "mat_001"]);

        storage.delete("a.b").await.unwrap();
        assert_eq!(storage.get_all().await.unwrap().len(), 3);
        storage.delete("mat.001").await.unwrap();
        let ids: Vec<String> = storage.get_all().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a_b", "mat_001"]);
    }

    #[tokio::test]
    async fn test_json_dir_skips_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonDirStorage::new(dir.path());
        storage.put(&exercise("ok")).await.unwrap();
        tokio::fs::write(dir.path().join("broken.json"), "{ not json").await.unwrap();

        let all = storage.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, "ok");
    }

    #[tokio::test]
    async fn test_memory_storage_overwrites() {
        let storage = MemoryStorage::new();
        let mut ex = exercise("x");
        storage.put(&ex).await.unwrap();
        ex.content = "Nuevo".to_string();
        storage.put(&ex).await.unwrap();

        let all = storage.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].content, "Nuevo");
    }

    #[test]
    fn test_memory_storage_delete_and_clear() {
        let storage = MemoryStorage::new();
        tokio_test::block_on(async {
            storage.put(&exercise("a")).await.unwrap();
            storage.put(&exercise("b")).await.unwrap();
            storage.delete("a").await.unwrap();
            assert_eq!(storage.get_all().await.unwrap().len(), 1);
            storage.clear().await.unwrap();
            assert!(storage.get_all().await.unwrap().is_empty());
        });
    }
}
