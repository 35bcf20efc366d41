//! 基础设施层
//!
//! 持有外部资源（文件系统、HTTP、压缩包），对上层只暴露能力：
//!
//! - [`storage`]：题目持久化（`ExerciseStorage`）
//! - [`settings_store`]：全局设置持久化
//! - [`decoder`]：原始文件 → 纯文本 + 正文
//! - [`source`]：示例题库来源（本地目录 / HTTP）
//! - [`docx_writer`]：文档树 → docx 字节

pub mod decoder;
pub mod docx_writer;
pub mod settings_store;
pub mod source;
pub mod storage;

pub use decoder::{DecodedDocument, DocumentDecoder, StandardDecoder};
pub use docx_writer::{save_docx, write_docx};
pub use settings_store::SettingsStore;
pub use source::{DirSource, DocumentSource, HttpSource, MANIFEST_NAME};
pub use storage::{ExerciseStorage, JsonDirStorage, MemoryStorage};
