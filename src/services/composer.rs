//! 试卷组装 - 业务能力层
//!
//! 把选中的题目组装成 [`DocumentTree`]，学生版和教师版（Pauta）走同一条路径，
//! 只在三处分叉：富文本段落过滤、纯文本来源、规格表。
//!
//! 纯函数：相同输入永远得到相等的树，写文件交给 `docx_writer`。

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};

use crate::models::document::{
    Block, DocumentTree, Header, HeadingLevel, ImageData, Paragraph, Run, Table, TableCell,
    Variant,
};
use crate::models::exercise::{Exercise, ExerciseBody};
use crate::models::settings::GlobalSettings;
use crate::services::parser;
use crate::utils::data_url::decode_data_url;

/// 学生版富文本中需要整段去掉的标记
const NAME_DATE_LINE: &str = "Nombre: ________________________________________  Fecha: ______________";
const SPEC_TABLE_TITLE: &str = "TABLA DE ESPECIFICACIONES";
const UNTITLED: &str = "Documento";
const MISSING_CELL: &str = "N/A";

const LOGO_SIZE: u32 = 50;
const IMAGE_WIDTH: u32 = 400;
const IMAGE_HEIGHT: u32 = 300;

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("img selector"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// 试卷抬头信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExamMeta {
    pub title: String,
    pub grade: String,
    pub subject: String,
}

/// 组装试卷
pub fn compose(
    selected: &[&Exercise],
    variant: Variant,
    settings: &GlobalSettings,
    meta: &ExamMeta,
) -> DocumentTree {
    let mut blocks = vec![
        Block::Paragraph(
            Paragraph::plain(meta.title.as_str())
                .heading(HeadingLevel::Title)
                .centered(),
        ),
        Block::Paragraph(
            Paragraph::plain(format!(
                "Curso: {} | Asignatura: {}",
                meta.grade, meta.subject
            ))
            .centered()
            .spacing(None, Some(400)),
        ),
        Block::Paragraph(Paragraph::plain(NAME_DATE_LINE).spacing(None, Some(400))),
    ];

    for (idx, exercise) in selected.iter().enumerate() {
        blocks.push(Block::Paragraph(question_label(idx + 1)));
        blocks.extend(exercise_blocks(exercise, variant));
        blocks.push(Block::Paragraph(Paragraph::empty().spacing(None, Some(200))));
    }

    if variant == Variant::Teacher && settings.include_spec_table {
        blocks.push(Block::PageBreak);
        blocks.push(Block::Paragraph(
            Paragraph::plain(SPEC_TABLE_TITLE)
                .heading(HeadingLevel::Heading1)
                .centered(),
        ));
        blocks.push(Block::Table(spec_table(selected)));
    }

    debug!(
        "📄 组装完成: {:?}, {} 道题, {} 个块",
        variant,
        selected.len(),
        blocks.len()
    );

    DocumentTree {
        variant,
        header: build_header(settings),
        blocks,
    }
}

/// 导出文件名（不含扩展名）
///
/// 空白压成一个 `_`；路径分隔符、控制字符和文件名里不允许的字符也换成 `_`
pub fn export_filename(title: &str, variant: Variant) -> String {
    let title = title.trim();
    let title = if title.is_empty() { UNTITLED } else { title };
    let stem: String = WHITESPACE_RE
        .replace_all(title, "_")
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    format!("{}_{}", stem, variant.file_suffix())
}

fn question_label(number: usize) -> Paragraph {
    Paragraph {
        runs: vec![Run::Text {
            text: format!("Pregunta {}:", number),
            bold: true,
            size: Some(24),
        }],
        ..Default::default()
    }
    .spacing(Some(200), Some(100))
}

/// 页眉：校徽 + 学校名称（大写、加粗、居中）
///
/// 两者都没有时不输出页眉；校徽解码失败只跳过校徽
fn build_header(settings: &GlobalSettings) -> Option<Header> {
    if !settings.has_header() {
        return None;
    }

    let mut paragraphs = Vec::new();

    if let Some(logo) = settings.logo.as_deref() {
        match decode_data_url(logo) {
            Ok(data) => paragraphs.push(Paragraph {
                runs: vec![Run::Image(ImageData {
                    bytes: data.bytes,
                    content_type: data.content_type,
                    width: LOGO_SIZE,
                    height: LOGO_SIZE,
                })],
                ..Default::default()
            }),
            Err(e) => warn!("⚠️ 校徽无法解码，已跳过: {}", e),
        }
    }

    let name = settings.institution_name.trim();
    if !name.is_empty() {
        paragraphs.push(
            Paragraph {
                runs: vec![Run::bold(name.to_uppercase())],
                ..Default::default()
            }
            .centered()
            .spacing(None, Some(200)),
        );
    }

    if paragraphs.is_empty() {
        None
    } else {
        Some(Header { paragraphs })
    }
}

fn exercise_blocks(exercise: &Exercise, variant: Variant) -> Vec<Block> {
    match &exercise.body {
        ExerciseBody::RichText { html, .. } => rich_paragraphs(html, variant, &exercise.id)
            .into_iter()
            .map(Block::Paragraph)
            .collect(),
        ExerciseBody::Plain | ExerciseBody::FixedLayout { .. } => {
            let text = match variant {
                Variant::Student => exercise.student_text(),
                Variant::Teacher => exercise.content.as_str(),
            };
            text_paragraphs(text, variant)
                .into_iter()
                .map(Block::Paragraph)
                .collect()
        }
    }
}

/// 纯文本：每个非空行一个段落，学生版跳过标签行
fn text_paragraphs(text: &str, variant: Variant) -> Vec<Paragraph> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && !hidden_for(variant, line))
        .map(|line| Paragraph::plain(line).spacing(None, Some(50)))
        .collect()
}

/// 富文本：遍历顶层节点
///
/// `<p>` 和裸文本节点各成一段；标题、列表项、表格行取文字成段；
/// `div` 等容器向下展开。学生版跳过含答案/能力标记的节点。
fn rich_paragraphs(html: &str, variant: Variant, exercise_id: &str) -> Vec<Paragraph> {
    let fragment = Html::parse_fragment(html);
    let mut out = Vec::new();
    collect_children(fragment.root_element(), variant, exercise_id, &mut out);
    out
}

fn collect_children(
    parent: ElementRef<'_>,
    variant: Variant,
    exercise_id: &str,
    out: &mut Vec<Paragraph>,
) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => {
                let text: &str = text;
                if !text.trim().is_empty() && !hidden_for(variant, text) {
                    out.push(Paragraph::plain(text));
                }
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    collect_element(element, variant, exercise_id, out);
                }
            }
            _ => {}
        }
    }
}

fn collect_element(
    element: ElementRef<'_>,
    variant: Variant,
    exercise_id: &str,
    out: &mut Vec<Paragraph>,
) {
    match element.value().name() {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" => {
            push_element(element, variant, exercise_id, out)
        }
        "tr" => {
            let cells: Vec<String> = element
                .children()
                .filter_map(ElementRef::wrap)
                .map(|cell| element_text(cell).trim().to_string())
                .collect();
            let line = cells.join(" | ");
            if !line.trim().is_empty() && !hidden_for(variant, &line) {
                out.push(Paragraph::plain(line));
            }
        }
        "div" | "section" | "article" | "body" | "ul" | "ol" | "table" | "thead" | "tbody"
        | "tfoot" | "blockquote" => collect_children(element, variant, exercise_id, out),
        "img" => {
            let runs = image_runs(std::iter::once(element), exercise_id);
            if !runs.is_empty() {
                out.push(Paragraph {
                    runs,
                    ..Default::default()
                });
            }
        }
        other => debug!("忽略元素 <{}> ({})", other, exercise_id),
    }
}

/// 段落类元素：文字 + 其中所有图片
fn push_element(
    element: ElementRef<'_>,
    variant: Variant,
    exercise_id: &str,
    out: &mut Vec<Paragraph>,
) {
    let text = element_text(element);
    if hidden_for(variant, &text) {
        return;
    }

    let images: Vec<ElementRef<'_>> = element.select(&IMG_SELECTOR).collect();
    if images.is_empty() {
        out.push(Paragraph::plain(text));
        return;
    }

    let mut runs = Vec::new();
    if !text.trim().is_empty() {
        runs.push(Run::text(text));
    }
    runs.extend(image_runs(images.into_iter(), exercise_id));
    out.push(Paragraph {
        runs,
        ..Default::default()
    });
}

fn image_runs<'a>(images: impl Iterator<Item = ElementRef<'a>>, exercise_id: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    for img in images {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        if !src.starts_with("data:image") {
            continue;
        }
        match decode_data_url(src) {
            Ok(data) => runs.push(Run::Image(ImageData {
                bytes: data.bytes,
                content_type: data.content_type,
                width: IMAGE_WIDTH,
                height: IMAGE_HEIGHT,
            })),
            Err(e) => warn!("⚠️ 题目 {} 中的图片无法解码，已跳过: {}", exercise_id, e),
        }
    }
    runs
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn hidden_for(variant: Variant, text: &str) -> bool {
    variant == Variant::Student && parser::has_metadata_label(text)
}

/// 规格表：表头 + 每题一行（序号、能力、答案）
fn spec_table(selected: &[&Exercise]) -> Table {
    let header = vec![
        header_cell("N°", 10),
        header_cell("Habilidad", 45),
        header_cell("Respuesta", 45),
    ];

    let mut rows = vec![header];
    for (idx, exercise) in selected.iter().enumerate() {
        rows.push(vec![
            body_cell((idx + 1).to_string()),
            body_cell(or_missing(&exercise.parsed.skill)),
            body_cell(or_missing(&exercise.parsed.answer_key)),
        ]);
    }
    Table { rows }
}

fn header_cell(text: &str, width: u8) -> TableCell {
    TableCell {
        text: text.to_string(),
        bold: true,
        width_percent: Some(width),
    }
}

fn body_cell(text: String) -> TableCell {
    TableCell {
        text,
        bold: false,
        width_percent: None,
    }
}

fn or_missing(value: &str) -> String {
    if value.is_empty() {
        MISSING_CELL.to_string()
    } else {
        value.to_string()
    }
}
