//! 选题与排序
//!
//! 选中的题目有自己的顺序，和题库的自然顺序无关

use crate::models::exercise::Exercise;
use crate::workflow::store::ExerciseStore;

/// 有序、无重复的选中题目ID列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|selected| selected == id)
    }

    /// 已选中则移除，否则追加到末尾
    ///
    /// 返回操作后是否处于选中状态
    pub fn toggle(&mut self, id: &str) -> bool {
        if let Some(pos) = self.position(id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.to_string());
            true
        }
    }

    /// 追加所有尚未选中的ID，保持给定顺序
    pub fn select_all<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut added = 0;
        for id in ids {
            if !self.contains(id) {
                self.ids.push(id.to_string());
                added += 1;
            }
        }
        added
    }

    /// 整体替换顺序
    ///
    /// 调用方应传入当前选择的一个排列；不在当前选择中的ID和重复ID会被丢弃
    pub fn reorder(&mut self, new_order: &[String]) {
        let mut reordered: Vec<String> = Vec::with_capacity(new_order.len());
        for id in new_order {
            if self.contains(id) && !reordered.contains(id) {
                reordered.push(id.clone());
            }
        }
        self.ids = reordered;
    }

    /// 与相邻元素交换；越界时不做任何事
    pub fn move_adjacent(&mut self, index: usize, direction: isize) -> bool {
        let target = index as isize + direction;
        if index >= self.ids.len() || target < 0 || target as usize >= self.ids.len() {
            return false;
        }
        self.ids.swap(index, target as usize);
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// 去掉题库中已不存在的ID
    pub fn retain_existing(&mut self, store: &ExerciseStore) {
        self.ids.retain(|id| store.contains(id));
    }

    /// 按选择顺序取出题目，静默跳过题库中已不存在的ID
    pub fn materialize<'a>(&self, store: &'a ExerciseStore) -> Vec<&'a Exercise> {
        self.ids.iter().filter_map(|id| store.get(id)).collect()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|selected| selected == id)
    }
}
