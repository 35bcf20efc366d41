//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层持有全部可变状态和外部资源，是 CLI 唯一调用的入口。
//!
//! ## 模块划分
//!
//! ### `app_state` - 应用状态协调器
//! - 持有题库、选择、设置和存储
//! - 启动时决定数据来源（本地存储 / 示例题库）
//! - 所有修改都经过这里并镜像到存储
//! - 级联删除：题目删除后同步移出选择
//!
//! ### `upload` - 批量导入
//! - 顺序处理文件，逐个提交
//! - 统一套用批次分类（科目、年级、OA 等）
//! - 输出成功/失败统计
//!
//! ### `demo_loader` - 示例题库加载
//! - 读取 manifest.json
//! - 通过 `DocumentSource` 取回每个文档（本地目录或 HTTP）
//!
//! ## 层次关系
//!
//! ```text
//! app_state / upload / demo_loader
//!     ↓
//! workflow (store / selection / game)
//!     ↓
//! services (parser / filter / composer / llm)
//!     ↓
//! infrastructure (storage / decoder / source / docx_writer)
//! ```
//!
//! ## 设计原则
//!
//! 1. **唯一所有者**：只有 `AppState` 能修改题库和选择
//! 2. **失败不扩散**：存储失败只记日志，单个文件失败只跳过该文件
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod app_state;
pub mod demo_loader;
pub mod upload;

// 重新导出主要类型
pub use app_state::AppState;
pub use demo_loader::DemoLoader;
pub use upload::{import_files, BatchMetadata, UploadReport};
