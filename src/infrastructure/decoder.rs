//! 文档解码 - 基础设施层
//!
//! 把上传/示例题库中的原始文件转换成纯文本 + 正文形态：
//!
//! | 扩展名 | 正文 | 纯文本 |
//! |---|---|---|
//! | `.docx` | `RichText`（HTML，图片内嵌为 data URL，附带原始字节） | 段落逐行拼接 |
//! | `.html` / `.htm` | `RichText` | 段落文字 |
//! | `.txt` / `.md` | `Plain` | 原文 |
//! | `.pdf` | `FixedLayout`（原样保存） | `Documento PDF: {文件名}` |

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::DecodeError;
use crate::models::exercise::ExerciseBody;
use crate::utils::data_url::{encode_data_url, image_content_type};

const DOCUMENT_PART: &str = "word/document.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";

/// 解码结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument {
    /// 纯文本（用于元数据提取和搜索）
    pub content: String,
    pub body: ExerciseBody,
}

/// 解码能力
pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, filename: &str, bytes: &[u8]) -> Result<DecodedDocument, DecodeError>;
}

/// 按扩展名分派的默认解码器
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl DocumentDecoder for StandardDecoder {
    fn decode(&self, filename: &str, bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "docx" => decode_docx(bytes),
            "html" | "htm" => decode_html(filename, bytes),
            "txt" | "md" => Ok(DecodedDocument {
                content: utf8(filename, bytes)?.to_string(),
                body: ExerciseBody::Plain,
            }),
            "pdf" => Ok(DecodedDocument {
                content: format!("Documento PDF: {}", filename),
                body: ExerciseBody::FixedLayout {
                    bytes: bytes.to_vec(),
                },
            }),
            _ => Err(DecodeError::UnsupportedFormat {
                filename: filename.to_string(),
            }),
        }
    }
}

fn utf8<'a>(filename: &str, bytes: &'a [u8]) -> Result<&'a str, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
        filename: filename.to_string(),
    })?;
    Ok(text.trim_start_matches('\u{feff}'))
}

fn decode_html(filename: &str, bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
    let html = utf8(filename, bytes)?.to_string();
    let content = html_to_text(&html);
    Ok(DecodedDocument {
        content,
        body: ExerciseBody::RichText {
            html,
            original: None,
        },
    })
}

/// HTML 的纯文本：有 `<p>` 时每段一行，否则取全部文字
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse("p, li, h1, h2, h3, h4, h5, h6").expect("block selector");
    let lines: Vec<String> = fragment
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect();
    if lines.is_empty() {
        fragment.root_element().text().collect::<String>().trim().to_string()
    } else {
        lines.join("\n")
    }
}

// ========== docx ==========

/// 段落中的一段
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text { text: String, bold: bool },
    Image { rel_id: String },
}

#[derive(Debug, Default)]
struct DocxParagraph {
    segments: Vec<Segment>,
}

impl DocxParagraph {
    fn push_text(&mut self, text: &str, bold: bool) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text { text: last, bold: last_bold }) = self.segments.last_mut() {
            if *last_bold == bold {
                last.push_str(text);
                return;
            }
        }
        self.segments.push(Segment::Text {
            text: text.to_string(),
            bold,
        });
    }

    fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text, .. } => Some(text.as_str()),
                Segment::Image { .. } => None,
            })
            .collect()
    }

    fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| match s {
            Segment::Text { text, .. } => text.trim().is_empty(),
            Segment::Image { .. } => false,
        })
    }
}

fn decode_docx(bytes: &[u8]) -> Result<DecodedDocument, DecodeError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let document = read_part(&mut archive, DOCUMENT_PART)?.ok_or_else(|| {
        DecodeError::MissingPart {
            part: DOCUMENT_PART.to_string(),
        }
    })?;
    let rels = match read_part(&mut archive, RELS_PART)? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let paragraphs = parse_document(&document)?;

    let mut images: HashMap<String, Option<String>> = HashMap::new();
    let mut html = String::new();
    let mut lines = Vec::new();

    for paragraph in paragraphs.iter().filter(|p| !p.is_empty()) {
        lines.push(paragraph.text());

        html.push_str("<p>");
        for segment in &paragraph.segments {
            match segment {
                Segment::Text { text, bold: true } => {
                    html.push_str("<strong>");
                    html.push_str(&escape(text.as_str()));
                    html.push_str("</strong>");
                }
                Segment::Text { text, bold: false } => html.push_str(&escape(text.as_str())),
                Segment::Image { rel_id } => {
                    let src = match images.get(rel_id) {
                        Some(src) => src.clone(),
                        None => {
                            let src = load_image(&mut archive, &rels, rel_id);
                            images.insert(rel_id.clone(), src.clone());
                            src
                        }
                    };
                    if let Some(src) = src {
                        html.push_str("<img src=\"");
                        html.push_str(&src);
                        html.push_str("\" />");
                    }
                }
            }
        }
        html.push_str("</p>");
    }

    debug!(
        "docx 解码完成: {} 个段落, {} 张图片",
        lines.len(),
        images.values().filter(|src| src.is_some()).count()
    );

    Ok(DecodedDocument {
        content: lines.join("\n"),
        body: ExerciseBody::RichText {
            html,
            original: Some(bytes.to_vec()),
        },
    })
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, DecodeError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|_| DecodeError::InvalidUtf8 {
            filename: name.to_string(),
        })?;
    Ok(Some(text))
}

/// 图片读取失败只跳过该图片
fn load_image(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    rels: &HashMap<String, String>,
    rel_id: &str,
) -> Option<String> {
    let Some(target) = rels.get(rel_id) else {
        warn!("⚠️ 图片关系 {} 不存在，已跳过", rel_id);
        return None;
    };
    let part = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("word/{}", target),
    };

    let mut bytes = Vec::new();
    let read = archive
        .by_name(&part)
        .map_err(|e| e.to_string())
        .and_then(|mut file| file.read_to_end(&mut bytes).map_err(|e| e.to_string()));
    match read {
        Ok(_) => Some(encode_data_url(image_content_type(&part), &bytes)),
        Err(e) => {
            warn!("⚠️ 无法读取图片 {}: {}", part, e);
            None
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// `document.xml.rels`：Id → Target
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, DecodeError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id"), attribute(&e, b"Target")) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

/// 实体引用（`&amp;`、`&#233;` 等）
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// 逐段读取 `document.xml`
///
/// 只关心 `w:p`、`w:r` 中的 `w:t`/`w:tab`/`w:br`、粗体 `w:b` 和图片 `a:blip`。
/// 文本框（`w:txbxContent`）里的段落嵌在外层段落中，按开始标签的顺序输出，
/// 外层段落在前，内层段落不会截断外层的文字。
fn parse_document(xml: &str) -> Result<Vec<DocxParagraph>, DecodeError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<DocxParagraph> = Vec::new();

    // 尚未结束的段落在 `paragraphs` 中的下标，栈顶是最内层
    let mut open: Vec<usize> = Vec::new();
    let mut in_text = false;
    let mut in_run_props = false;
    let mut bold = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.push(paragraphs.len());
                    paragraphs.push(DocxParagraph::default());
                }
                b"w:r" => bold = false,
                b"w:rPr" => in_run_props = true,
                b"w:t" => in_text = true,
                b"w:b" if in_run_props => bold = is_on(&e),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.push(DocxParagraph::default()),
                b"w:b" if in_run_props => bold = is_on(&e),
                b"w:tab" => push_text(&mut paragraphs, &open, "\t", bold),
                b"w:br" => push_text(&mut paragraphs, &open, "\n", bold),
                b"a:blip" => {
                    let current = open.last().and_then(|&i| paragraphs.get_mut(i));
                    if let (Some(p), Some(rel_id)) = (current, attribute(&e, b"r:embed")) {
                        p.segments.push(Segment::Image { rel_id });
                    }
                }
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => {
                    open.pop();
                }
                b"w:rPr" => in_run_props = false,
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                push_text(&mut paragraphs, &open, &String::from_utf8_lossy(&t), bold);
            }
            Event::GeneralRef(r) if in_text => {
                let name = String::from_utf8_lossy(&r).into_owned();
                if let Some(c) = resolve_entity(&name) {
                    push_text(&mut paragraphs, &open, c.encode_utf8(&mut [0; 4]), bold);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}

/// 文字写进最内层的未结束段落；段落外的文字丢弃
fn push_text(paragraphs: &mut [DocxParagraph], open: &[usize], text: &str, bold: bool) {
    if let Some(p) = open.last().and_then(|&i| paragraphs.get_mut(i)) {
        p.push_text(text, bold);
    }
}

/// `<w:b/>` 或 `<w:b w:val="true"/>` 为粗体，`w:val="0"/"false"` 不是
fn is_on(element: &BytesStart<'_>) -> bool {
    !matches!(
        attribute(element, b"w:val").as_deref(),
        Some("0") | Some("false") | Some("off")
    )
}
