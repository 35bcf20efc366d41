//! # Exam Generator
//!
//! 题库管理与试卷生成工具：导入题目、筛选组卷、导出学生版/教师版 docx、
//! 计时答题游戏和 AI 助手
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有外部资源（文件系统、HTTP、压缩包），只暴露能力
//! - `ExerciseStorage` - 题目持久化（JSON 目录 / 内存）
//! - `DocumentDecoder` - 原始文件解码
//! - `DocumentSource` - 示例题库来源
//! - `docx_writer` - 文档树写出为 docx
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 无状态的纯能力
//! - `parser` - 答案/能力元数据提取
//! - `filter` - 题目筛选
//! - `composer` - 试卷组装（学生版 / 教师版）
//! - `LlmService` / `Assistant` - AI 文本生成
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 有状态但不碰 I/O 的核心结构
//! - `ExerciseStore` - 有序题库
//! - `Selection` - 选题与排序
//! - `GameSession` / `GameRunner` - 答题游戏状态机和计时器
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app_state` - 唯一的状态所有者和修改入口
//! - `orchestrator/upload` - 批量导入
//! - `orchestrator/demo_loader` - 示例题库加载
//!
//! ## 模块结构

pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{DocumentTree, Exercise, ExerciseBody, GlobalSettings, Variant};
pub use orchestrator::AppState;
pub use services::composer::ExamMeta;
pub use workflow::{ExerciseStore, GameSession, Selection};
