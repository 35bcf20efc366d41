//! 导出文档的结构树
//!
//! 组装器只产出这棵树，写成具体二进制格式（docx）由
//! [`crate::infrastructure::docx_writer`] 负责

use serde::Serialize;

/// 文档版本：学生版 / 教师版（答案卷）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Variant {
    Student,
    Teacher,
}

impl Variant {
    /// 文件名后缀
    pub fn file_suffix(self) -> &'static str {
        match self {
            Variant::Student => "Estudiante",
            Variant::Teacher => "Pauta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Alignment {
    #[default]
    Left,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeadingLevel {
    Title,
    Heading1,
}

/// 段落中的一段内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Run {
    Text {
        text: String,
        bold: bool,
        /// 半磅单位，`None` 表示默认字号
        size: Option<u32>,
    },
    Image(ImageData),
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Run::Text {
            text: text.into(),
            bold: false,
            size: None,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Run::Text {
            text: text.into(),
            bold: true,
            size: None,
        }
    }
}

/// 内嵌图片
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ImageData {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// 像素
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("content_type", &self.content_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl ImageData {
    /// 文件扩展名（用于打包到 docx 的 media 目录）
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpeg",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub heading: Option<HeadingLevel>,
    pub alignment: Alignment,
    /// 段前/段后间距（twip）
    pub spacing_before: Option<u32>,
    pub spacing_after: Option<u32>,
}

impl Paragraph {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            runs: vec![Run::text(text)],
            ..Default::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn centered(mut self) -> Self {
        self.alignment = Alignment::Center;
        self
    }

    pub fn heading(mut self, level: HeadingLevel) -> Self {
        self.heading = Some(level);
        self
    }

    pub fn spacing(mut self, before: Option<u32>, after: Option<u32>) -> Self {
        self.spacing_before = before;
        self.spacing_after = after;
        self
    }

    /// 段落中所有文字拼接
    pub fn text(&self) -> String {
        self.runs
            .iter()
            .filter_map(|run| match run {
                Run::Text { text, .. } => Some(text.as_str()),
                Run::Image(_) => None,
            })
            .collect()
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageData> {
        self.runs.iter().filter_map(|run| match run {
            Run::Image(image) => Some(image),
            Run::Text { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCell {
    pub text: String,
    pub bold: bool,
    /// 列宽百分比
    pub width_percent: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Table {
    pub rows: Vec<Vec<TableCell>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    PageBreak,
}

/// 页眉（校徽 + 学校名称）
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Header {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentTree {
    pub variant: Variant,
    pub header: Option<Header>,
    pub blocks: Vec<Block>,
}

impl DocumentTree {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Paragraph(p) => Some(p),
            _ => None,
        })
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Table(t) => Some(t),
            _ => None,
        })
    }

    /// 所有图片（正文 + 页眉）
    pub fn images(&self) -> Vec<&ImageData> {
        let header = self
            .header
            .iter()
            .flat_map(|h| h.paragraphs.iter())
            .flat_map(Paragraph::images);
        header
            .chain(self.paragraphs().flat_map(Paragraph::images))
            .collect()
    }
}
