//! 内存题库
//!
//! 只负责 id → 题目的有序映射，持久化和选题联动由
//! [`crate::orchestrator::AppState`] 统一协调

use indexmap::IndexMap;

use crate::models::exercise::Exercise;

/// 有序题库，最新加入的题目排在最前
#[derive(Debug, Clone, Default)]
pub struct ExerciseStore {
    items: IndexMap<String, Exercise>,
}

impl ExerciseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_exercises(exercises: Vec<Exercise>) -> Self {
        let mut store = Self::new();
        store.replace_all(exercises);
        store
    }

    /// 加入题目；ID 已存在时不做任何修改（先到先得）
    ///
    /// 返回是否真正插入
    pub fn add(&mut self, exercise: Exercise) -> bool {
        if self.items.contains_key(&exercise.id) {
            return false;
        }
        self.items.shift_insert(0, exercise.id.clone(), exercise);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Exercise> {
        self.items.shift_remove(id)
    }

    /// 整体替换，保持给定顺序；列表内重复的 ID 只保留第一个
    pub fn replace_all(&mut self, exercises: Vec<Exercise>) {
        self.items.clear();
        for exercise in exercises {
            if !self.items.contains_key(&exercise.id) {
                self.items.insert(exercise.id.clone(), exercise);
            }
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Exercise> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn get_all(&self) -> impl Iterator<Item = &Exercise> {
        self.items.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
