use serde::{Deserialize, Serialize};
use std::fmt;

/// 元数据缺失时的占位值
pub const UNDEFINED_MARKER: &str = "No definida";

/// 题型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExerciseType {
    #[serde(rename = "Selección Única")]
    MultipleChoice,
    #[serde(rename = "Desarrollo")]
    Development,
    #[serde(rename = "Verdadero o Falso")]
    TrueFalse,
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 3] = [
        ExerciseType::MultipleChoice,
        ExerciseType::Development,
        ExerciseType::TrueFalse,
    ];

    /// 获取显示名称
    pub fn label(self) -> &'static str {
        match self {
            ExerciseType::MultipleChoice => "Selección Única",
            ExerciseType::Development => "Desarrollo",
            ExerciseType::TrueFalse => "Verdadero o Falso",
        }
    }

    /// 从显示名称或简写解析
    pub fn find(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "selección única" | "seleccion unica" | "multiple" | "alternativas" => {
                Some(ExerciseType::MultipleChoice)
            }
            "desarrollo" | "development" => Some(ExerciseType::Development),
            "verdadero o falso" | "vf" | "true-false" => Some(ExerciseType::TrueFalse),
            _ => None,
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// 难度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    #[serde(rename = "Básica")]
    Basic,
    #[serde(rename = "Media")]
    Medium,
    #[serde(rename = "Avanzada")]
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Basic, Difficulty::Medium, Difficulty::Advanced];

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Basic => "Básica",
            Difficulty::Medium => "Media",
            Difficulty::Advanced => "Avanzada",
        }
    }

    pub fn find(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "básica" | "basica" | "basic" => Some(Difficulty::Basic),
            "media" | "medium" => Some(Difficulty::Medium),
            "avanzada" | "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// 元数据提取结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedExercise {
    /// 学生可见的内容（已去掉答案/能力行）
    pub student_text: String,
    pub answer_key: String,
    pub skill: String,
    /// 是否成功提取到元数据
    pub extracted: bool,
}

impl Default for ParsedExercise {
    fn default() -> Self {
        Self {
            student_text: String::new(),
            answer_key: UNDEFINED_MARKER.to_string(),
            skill: UNDEFINED_MARKER.to_string(),
            extracted: false,
        }
    }
}

/// 题目正文的三种形态
///
/// 决定渲染、游戏展示和导出时以哪个字段为准：
/// - `Plain`：只有纯文本 `content`
/// - `RichText`：带内嵌图片(data URL)的 HTML，可附带原始 docx 字节
/// - `FixedLayout`：原始版式文件（如 PDF），只做透传
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "camelCase")]
pub enum ExerciseBody {
    Plain,
    RichText {
        html: String,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_opt")]
        original: Option<Vec<u8>>,
    },
    FixedLayout {
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
}

impl ExerciseBody {
    pub fn rich_html(&self) -> Option<&str> {
        match self {
            ExerciseBody::RichText { html, .. } => Some(html),
            ExerciseBody::Plain | ExerciseBody::FixedLayout { .. } => None,
        }
    }

    /// 原始二进制内容（用于透传预览/导出）
    pub fn binary(&self) -> Option<&[u8]> {
        match self {
            ExerciseBody::RichText { original, .. } => original.as_deref(),
            ExerciseBody::FixedLayout { bytes } => Some(bytes),
            ExerciseBody::Plain => None,
        }
    }

    pub fn format_name(&self) -> &'static str {
        match self {
            ExerciseBody::Plain => "plain",
            ExerciseBody::RichText { .. } => "richText",
            ExerciseBody::FixedLayout { .. } => "fixedLayout",
        }
    }
}

/// 题目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub filename: String,
    /// 纯文本内容（用于搜索和解析）
    pub content: String,
    pub body: ExerciseBody,
    pub parsed: ParsedExercise,
    pub subject: String,
    pub grade: String,
    pub oa: String,
    pub indicator: String,
    #[serde(rename = "type")]
    pub exercise_type: ExerciseType,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Exercise {
    /// 学生版文本
    ///
    /// 只含元数据的题目这里是空串，不能退回带答案的原文
    pub fn student_text(&self) -> &str {
        &self.parsed.student_text
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

mod base64_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => super::base64_bytes::serialize(b, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(s.as_bytes())
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
            None => Ok(None),
        }
    }
}
