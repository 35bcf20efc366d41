use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 数据目录（题目记录与 settings.toml）
    pub data_dir: PathBuf,
    /// 示例题库目录（包含 manifest.json）
    pub demo_bank_dir: PathBuf,
    /// 示例题库的远程地址，设置后优先于本地目录
    pub demo_bank_url: Option<String>,
    /// 导出文件目录
    pub output_dir: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 游戏模式每题默认秒数
    pub default_time_limit: u32,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            demo_bank_dir: PathBuf::from("banco-de-ejercicios"),
            demo_bank_url: None,
            output_dir: PathBuf::from("output"),
            verbose_logging: false,
            default_time_limit: 30,
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.5-flash".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量读取配置，未设置的项使用默认值
    ///
    /// 数值和布尔值写错时返回错误，而不是悄悄退回默认值
    pub fn from_env() -> Result<Self, ConfigError> {
        let default = Self::default();
        Ok(Self {
            data_dir: std::env::var("DATA_DIR").map(PathBuf::from).unwrap_or(default.data_dir),
            demo_bank_dir: std::env::var("DEMO_BANK_DIR").map(PathBuf::from).unwrap_or(default.demo_bank_dir),
            demo_bank_url: std::env::var("DEMO_BANK_URL").ok().filter(|v| !v.trim().is_empty()),
            output_dir: std::env::var("OUTPUT_DIR").map(PathBuf::from).unwrap_or(default.output_dir),
            verbose_logging: parse_var("VERBOSE_LOGGING", "bool")?.unwrap_or(default.verbose_logging),
            default_time_limit: parse_var("GAME_TIME_LIMIT", "u32")?.unwrap_or(default.default_time_limit),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
        })
    }

    /// 是否配置了 LLM
    pub fn llm_enabled(&self) -> bool {
        !self.llm_api_key.trim().is_empty()
    }

    pub fn exercises_dir(&self) -> PathBuf {
        self.data_dir.join("exercises")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.toml")
    }
}

fn parse_var<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var_name) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::EnvVarParseFailed {
                    var_name: var_name.to_string(),
                    value,
                    expected_type: expected_type.to_string(),
                })
        }
        _ => Ok(None),
    }
}
