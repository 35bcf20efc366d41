use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 持久化存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 文档解码错误
    #[error("解码错误: {0}")]
    Decode(#[from] DecodeError),
    /// 文档组装/导出错误
    #[error("导出错误: {0}")]
    Compose(#[from] ComposeError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 游戏模式错误
    #[error("游戏错误: {0}")]
    Game(#[from] GameError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 持久化存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 读取失败
    #[error("读取失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入失败
    #[error("写入失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 删除失败
    #[error("删除失败 ({path}): {source}")]
    DeleteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 记录格式错误
    #[error("记录格式错误 ({path}): {source}")]
    Corrupted {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// 设置文件解析失败
    #[error("设置文件解析失败 ({path}): {message}")]
    SettingsParseFailed { path: String, message: String },
    /// 存储不可用
    #[error("存储不可用: {0}")]
    Unavailable(String),
}

/// 文档解码错误
#[derive(Debug, Error)]
pub enum DecodeError {
    /// 不支持的文件格式
    #[error("不支持的文件格式: {filename}")]
    UnsupportedFormat { filename: String },
    /// docx 压缩包损坏
    #[error("docx 压缩包损坏: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// docx 缺少必要部件
    #[error("docx 缺少部件: {part}")]
    MissingPart { part: String },
    /// XML 解析失败
    #[error("XML 解析失败: {0}")]
    Xml(#[from] quick_xml::Error),
    /// 文本编码错误
    #[error("文本不是有效的 UTF-8: {filename}")]
    InvalidUtf8 { filename: String },
    /// 读取来源失败
    #[error("读取失败 ({location}): {message}")]
    SourceFailed { location: String, message: String },
    /// data URL 格式错误
    #[error("data URL 格式错误: {0}")]
    DataUrl(String),
}

/// 文档组装/导出错误
#[derive(Debug, Error)]
pub enum ComposeError {
    /// 没有选中任何题目
    #[error("没有选中任何题目")]
    EmptySelection,
    /// 写入 docx 失败
    #[error("写入 docx 失败: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// XML 写入失败
    #[error("XML 写入失败: {0}")]
    Xml(String),
    /// 输出文件失败
    #[error("输出文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 未配置 API Key
    #[error("未配置 API Key")]
    MissingApiKey,
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 参数无效
    #[error("参数无效 ({name}): {message}")]
    InvalidArgument { name: String, message: String },
}

/// 游戏模式错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// 没有可玩的题目
    #[error("没有选中的题目，无法开始游戏")]
    NoExercises,
    /// 当前状态不允许此操作
    #[error("当前状态 {state} 不允许操作 {action}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(StorageError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(StorageError::Corrupted {
            path: String::new(),
            source: err,
        })
    }
}

impl From<quick_xml::Error> for ComposeError {
    fn from(err: quick_xml::Error) -> Self {
        ComposeError::Xml(err.to_string())
    }
}

impl From<std::io::Error> for ComposeError {
    fn from(err: std::io::Error) -> Self {
        ComposeError::WriteFailed {
            path: String::new(),
            source: err,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(err: std::io::Error) -> Self {
        DecodeError::SourceFailed {
            location: String::new(),
            message: err.to_string(),
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建 LLM API 调用错误
    pub fn llm_api_failed(model: impl Into<String>, message: impl std::fmt::Display) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            message: message.to_string(),
        })
    }

    /// 创建参数错误
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Config(ConfigError::InvalidArgument {
            name: name.into(),
            message: message.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
