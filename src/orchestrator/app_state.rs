//! 应用状态协调器 - 编排层
//!
//! ## 职责
//!
//! 唯一持有题库、选择、设置和持久化的地方，也是唯一的修改入口：
//!
//! 1. **启动加载**：本地存储为准；为空或读取失败时退回示例题库
//! 2. **修改镜像**：每次修改先改内存，再写存储；存储失败只记日志
//! 3. **级联删除**：删除题目时同步移出选择
//! 4. **只读视图**：筛选、选中列表、组装试卷都只借出不可变引用

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ComposeError;
use crate::infrastructure::docx_writer::save_docx;
use crate::infrastructure::settings_store::SettingsStore;
use crate::infrastructure::storage::{ExerciseStorage, JsonDirStorage};
use crate::models::document::{DocumentTree, Variant};
use crate::models::exercise::Exercise;
use crate::models::filter::FilterState;
use crate::models::settings::{GlobalSettings, SettingsPatch};
use crate::orchestrator::demo_loader::DemoLoader;
use crate::services::composer::{self, ExamMeta};
use crate::services::filter;
use crate::utils::logging::log_startup;
use crate::workflow::game::GameSession;
use crate::workflow::selection::Selection;
use crate::workflow::store::ExerciseStore;

pub struct AppState {
    store: ExerciseStore,
    selection: Selection,
    settings: GlobalSettings,
    storage: Box<dyn ExerciseStorage>,
    settings_store: Option<SettingsStore>,
    demo: DemoLoader,
}

impl AppState {
    /// 按配置组装：JSON 目录存储 + settings.toml + 示例题库
    pub async fn from_config(config: &Config) -> Self {
        Self::initialize(
            Box::new(JsonDirStorage::new(config.exercises_dir())),
            Some(SettingsStore::new(config.settings_path())),
            DemoLoader::from_config(config),
        )
        .await
    }

    /// 加载设置和题库
    ///
    /// `settings_store` 为 `None` 时设置只在内存中生效
    pub async fn initialize(
        storage: Box<dyn ExerciseStorage>,
        settings_store: Option<SettingsStore>,
        demo: DemoLoader,
    ) -> Self {
        let settings = match &settings_store {
            Some(settings_store) => settings_store.load().await.unwrap_or_else(|e| {
                warn!("⚠️ 读取设置失败，使用默认设置: {}", e);
                GlobalSettings::default()
            }),
            None => GlobalSettings::default(),
        };

        let mut state = Self {
            store: ExerciseStore::new(),
            selection: Selection::new(),
            settings,
            storage,
            settings_store,
            demo,
        };

        let from_demo = match state.storage.get_all().await {
            Ok(saved) if !saved.is_empty() => {
                state.store = ExerciseStore::from_exercises(saved);
                false
            }
            Ok(_) => {
                info!("📭 本地题库为空，载入示例题库");
                let demo = state.demo.load().await;
                state.persist_all(&demo).await;
                state.store = ExerciseStore::from_exercises(demo);
                true
            }
            Err(e) => {
                error!("❌ 读取本地题库失败，改用示例题库: {}", e);
                state.store = ExerciseStore::from_exercises(state.demo.load().await);
                true
            }
        };

        log_startup(state.store.len(), from_demo);
        state
    }

    // ========== 只读视图 ==========

    pub fn store(&self) -> &ExerciseStore {
        &self.store
    }

    pub fn exercises(&self) -> impl Iterator<Item = &Exercise> {
        self.store.get_all()
    }

    pub fn get(&self, id: &str) -> Option<&Exercise> {
        self.store.get(id)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    /// 按选择顺序取出题目
    pub fn selected(&self) -> Vec<&Exercise> {
        self.selection.materialize(&self.store)
    }

    pub fn filtered(&self, filters: &FilterState) -> Vec<&Exercise> {
        filter::apply(filters, self.store.get_all())
    }

    /// 按当前科目+年级重算可选 OA，已失效的 OA 条件被清空
    pub fn refresh_oa(&self, filters: &mut FilterState) -> Vec<String> {
        filter::refresh_oa(filters, self.store.get_all())
    }

    // ========== 题库修改 ==========

    /// 新增题目；ID 已存在时不做任何事
    pub async fn add_exercise(&mut self, exercise: Exercise) -> bool {
        let id = exercise.id.clone();
        if !self.store.add(exercise) {
            debug!("题目已存在，忽略: {}", id);
            return false;
        }

        if let Some(added) = self.store.get(&id) {
            if let Err(e) = self.storage.put(added).await {
                error!("❌ 保存题目失败 {}: {}", id, e);
            }
        }
        true
    }

    /// 删除题目，同时移出选择
    pub async fn delete_exercise(&mut self, id: &str) -> bool {
        let removed = self.store.remove(id).is_some();
        self.selection.remove(id);

        if removed {
            if let Err(e) = self.storage.delete(id).await {
                error!("❌ 删除题目失败 {}: {}", id, e);
            }
            info!("🗑️ 已删除题目: {}", id);
        }
        removed
    }

    pub async fn delete_all(&mut self) {
        self.store.clear();
        self.selection.clear();
        if let Err(e) = self.storage.clear().await {
            error!("❌ 清空本地题库失败: {}", e);
        }
        info!("🗑️ 已清空题库");
    }

    /// 用示例题库替换当前题库
    ///
    /// 存储先清空再写入示例题目，重启后看到的和内存中一致
    pub async fn restore_demo(&mut self) -> usize {
        let demo = self.demo.load().await;
        if let Err(e) = self.storage.clear().await {
            error!("❌ 清空本地题库失败: {}", e);
        }
        self.persist_all(&demo).await;
        self.store.replace_all(demo);
        self.selection.retain_existing(&self.store);
        info!("♻️ 已恢复示例题库: {} 道题目", self.store.len());
        self.store.len()
    }

    async fn persist_all(&self, exercises: &[Exercise]) {
        for exercise in exercises {
            if let Err(e) = self.storage.put(exercise).await {
                error!("❌ 保存题目失败 {}: {}", exercise.id, e);
            }
        }
    }

    // ========== 选择 ==========

    /// 切换选中状态；题库中没有的 ID 被忽略
    pub fn toggle_selection(&mut self, id: &str) -> bool {
        if !self.store.contains(id) {
            warn!("⚠️ 题目不存在，无法选择: {}", id);
            return false;
        }
        self.selection.toggle(id)
    }

    /// 选中当前筛选结果中的全部题目
    pub fn select_filtered(&mut self, filters: &FilterState) -> usize {
        let ids: Vec<String> = self
            .filtered(filters)
            .into_iter()
            .map(|ex| ex.id.clone())
            .collect();
        self.selection.select_all(ids.iter().map(String::as_str))
    }

    pub fn reorder_selection(&mut self, new_order: &[String]) {
        self.selection.reorder(new_order);
    }

    pub fn move_selected(&mut self, index: usize, direction: isize) -> bool {
        self.selection.move_adjacent(index, direction)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ========== 设置 ==========

    pub async fn update_settings(&mut self, patch: SettingsPatch) {
        self.settings.apply(patch);
        if let Some(settings_store) = &self.settings_store {
            if let Err(e) = settings_store.save(&self.settings).await {
                error!("❌ 保存设置失败: {}", e);
            }
        }
    }

    // ========== 导出与游戏 ==========

    /// 组装当前选择
    pub fn compose(&self, variant: Variant, meta: &ExamMeta) -> Result<DocumentTree, ComposeError> {
        let selected = self.selected();
        if selected.is_empty() {
            return Err(ComposeError::EmptySelection);
        }
        Ok(composer::compose(&selected, variant, &self.settings, meta))
    }

    /// 组装并写出 docx，返回文件路径
    pub async fn export(
        &self,
        variant: Variant,
        meta: &ExamMeta,
        output_dir: &Path,
    ) -> Result<PathBuf, ComposeError> {
        let tree = self.compose(variant, meta)?;
        let stem = composer::export_filename(&meta.title, variant);
        save_docx(&tree, output_dir, &stem).await
    }

    /// 用当前选择创建游戏
    pub fn game_session(&self, time_limit: u32) -> GameSession {
        let exercises = self.selected().into_iter().cloned().collect();
        GameSession::new(exercises, time_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::decoder::StandardDecoder;
    use crate::infrastructure::source::DirSource;
    use crate::infrastructure::storage::MemoryStorage;
    use crate::orchestrator::demo_loader::tests::write_demo_bank;
    use crate::workflow::store::tests::exercise;

    fn demo_at(path: &Path) -> DemoLoader {
        DemoLoader::new(Box::new(DirSource::new(path)), Box::new(StandardDecoder))
    }

    async fn state_with(exercises: Vec<Exercise>) -> AppState {
        let empty = tempfile::tempdir().unwrap();
        AppState::initialize(
            Box::new(MemoryStorage::with_exercises(exercises)),
            None,
            demo_at(empty.path()),
        )
        .await
    }

    #[tokio::test]
    async fn test_saved_exercises_win_over_demo() {
        let state = state_with(vec![exercise("b"), exercise("a")]).await;
        let ids: Vec<&str> = state.store().ids().collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_storage_loads_and_persists_demo() {
        let bank = tempfile::tempdir().unwrap();
        write_demo_bank(bank.path()).await;

        let data = tempfile::tempdir().unwrap();
        let state = AppState::initialize(
            Box::new(JsonDirStorage::new(data.path())),
            None,
            demo_at(bank.path()),
        )
        .await;
        assert_eq!(state.store().len(), 1);

        let persisted = JsonDirStorage::new(data.path()).get_all().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, "demo-matematicas-7-basico-ej1-txt");
    }

    #[tokio::test]
    async fn test_delete_cascades_to_selection() {
        let mut state = state_with(vec![exercise("a"), exercise("b")]).await;
        assert!(state.toggle_selection("a"));
        assert!(state.toggle_selection("b"));
        assert!(!state.toggle_selection("missing"));

        assert!(state.delete_exercise("a").await);
        assert_eq!(state.selection().ids(), ["b".to_string()]);
        assert!(!state.delete_exercise("a").await);

        state.delete_all().await;
        assert!(state.selection().is_empty());
        assert_eq!(state.store().len(), 0);
    }

    #[tokio::test]
    async fn test_add_exercise_is_newest_first() {
        let mut state = state_with(vec![exercise("a")]).await;
        assert!(state.add_exercise(exercise("z")).await);
        assert!(!state.add_exercise(exercise("z")).await);
        let ids: Vec<&str> = state.store().ids().collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn test_compose_requires_selection() {
        let mut state = state_with(vec![exercise("a")]).await;
        let meta = ExamMeta::default();
        assert!(matches!(
            state.compose(Variant::Student, &meta),
            Err(ComposeError::EmptySelection)
        ));

        state.toggle_selection("a");
        assert!(state.compose(Variant::Student, &meta).is_ok());
        assert_eq!(state.game_session(30).len(), 1);
    }

    #[tokio::test]
    async fn test_select_filtered() {
        let mut other = exercise("c");
        other.subject = "Historia".to_string();
        let mut state = state_with(vec![exercise("a"), exercise("b"), other]).await;

        state.toggle_selection("b");
        let filters = FilterState::new("Matemáticas", "1° Básico");
        assert_eq!(state.select_filtered(&filters), 1);
        assert_eq!(state.selection().ids(), ["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn test_update_settings_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("settings.toml");
        let mut state = AppState::initialize(
            Box::new(MemoryStorage::with_exercises(vec![exercise("a")])),
            Some(SettingsStore::new(&settings_path)),
            demo_at(dir.path()),
        )
        .await;

        state
            .update_settings(SettingsPatch {
                institution_name: Some("Escuela Rural".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(state.settings().institution_name, "Escuela Rural");

        let reloaded = SettingsStore::new(&settings_path).load().await.unwrap();
        assert_eq!(reloaded.institution_name, "Escuela Rural");
    }

    #[tokio::test]
    async fn test_refresh_oa_drops_stale_oa() {
        let mut other = exercise("b");
        other.oa = "OA 07".to_string();
        other.grade = "2° Básico".to_string();
        let state = state_with(vec![exercise("a"), other]).await;

        let mut filters = FilterState::new("Matemáticas", "1° Básico");
        filters.oa = Some("OA 07".to_string());
        assert_eq!(state.refresh_oa(&mut filters), vec!["OA 01".to_string()]);
        assert_eq!(filters.oa, None);
        assert_eq!(state.filtered(&filters).len(), 1);

        let mut filters = FilterState::new("Matemáticas", "2° Básico");
        filters.oa = Some("OA 07".to_string());
        state.refresh_oa(&mut filters);
        assert_eq!(filters.oa.as_deref(), Some("OA 07"));
    }
}
