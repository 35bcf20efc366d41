//! docx 写出 - 基础设施层
//!
//! 把 [`DocumentTree`] 写成最小可用的 WordprocessingML 包：
//! 正文、样式（Title / Heading1）、可选页眉和内嵌图片。

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::ComposeError;
use crate::models::document::{
    Alignment, Block, DocumentTree, HeadingLevel, ImageData, Paragraph, Run, Table,
};

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_HEADER: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const CT_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
const CT_HEADER: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml";
const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// 每像素 EMU
const EMU_PER_PIXEL: u64 = 9525;
/// A4 版心宽度（twip），表格列宽按百分比折算
const CONTENT_WIDTH_TWIPS: u32 = 9026;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:docDefaults><w:rPrDefault><w:rPr><w:rFonts w:ascii="Calibri" w:hAnsi="Calibri" w:eastAsia="Calibri" w:cs="Calibri"/><w:sz w:val="22"/><w:lang w:val="es-CL"/></w:rPr></w:rPrDefault></w:docDefaults><w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:after="300"/></w:pPr><w:rPr><w:b/><w:sz w:val="56"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="120"/><w:outlineLvl w:val="0"/></w:pPr><w:rPr><w:b/><w:sz w:val="32"/></w:rPr></w:style><w:style w:type="table" w:default="1" w:styleId="TableNormal"><w:name w:val="Normal Table"/></w:style></w:styles>"#;

/// 写出 docx 字节
pub fn write_docx(tree: &DocumentTree) -> Result<Vec<u8>, ComposeError> {
    let mut media = MediaRegistry::default();

    let mut document_rels = Relationships::default();
    document_rels.add(REL_STYLES, "styles.xml");

    let header = match &tree.header {
        Some(header) => {
            let mut header_rels = Relationships::default();
            let xml = header_xml(&header.paragraphs, &mut header_rels, &mut media)?;
            let rel_id = document_rels.add(REL_HEADER, "header1.xml");
            Some((xml, header_rels, rel_id))
        }
        None => None,
    };
    let header_rel_id = header.as_ref().map(|(_, _, id)| id.clone());
    let document = document_xml(tree, header_rel_id.as_deref(), &mut document_rels, &mut media)?;

    let mut package = Package::new();
    package.add("[Content_Types].xml", content_types_xml(&media, header.is_some())?.as_bytes())?;
    package.add("_rels/.rels", root_rels_xml()?.as_bytes())?;
    package.add("word/document.xml", document.as_bytes())?;
    package.add("word/styles.xml", STYLES_XML.as_bytes())?;
    package.add("word/_rels/document.xml.rels", document_rels.to_xml()?.as_bytes())?;
    if let Some((xml, rels, _)) = &header {
        package.add("word/header1.xml", xml.as_bytes())?;
        package.add("word/_rels/header1.xml.rels", rels.to_xml()?.as_bytes())?;
    }
    for item in &media.items {
        package.add(&format!("word/media/{}", item.name), item.bytes)?;
    }
    package.finish()
}

/// 写出到 `{dir}/{file_stem}.docx`
pub async fn save_docx(
    tree: &DocumentTree,
    dir: &Path,
    file_stem: &str,
) -> Result<PathBuf, ComposeError> {
    let bytes = write_docx(tree)?;
    let path = dir.join(format!("{}.docx", file_stem));
    let write_failed = |e| ComposeError::WriteFailed {
        path: path.display().to_string(),
        source: e,
    };
    tokio::fs::create_dir_all(dir).await.map_err(write_failed)?;
    tokio::fs::write(&path, &bytes).await.map_err(write_failed)?;
    info!("✓ 已导出 {} ({} 字节)", path.display(), bytes.len());
    Ok(path)
}

// ========== 包结构 ==========

struct Package {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl Package {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default(),
        }
    }

    fn add(&mut self, name: &str, bytes: &[u8]) -> Result<(), ComposeError> {
        self.zip.start_file(name, self.options)?;
        self.zip
            .write_all(bytes)
            .map_err(|e| ComposeError::WriteFailed {
                path: name.to_string(),
                source: e,
            })
    }

    fn finish(self) -> Result<Vec<u8>, ComposeError> {
        Ok(self.zip.finish()?.into_inner())
    }
}

struct MediaItem<'a> {
    name: String,
    bytes: &'a [u8],
}

/// 整个包共用的图片编号
#[derive(Default)]
struct MediaRegistry<'a> {
    items: Vec<MediaItem<'a>>,
}

impl<'a> MediaRegistry<'a> {
    fn register(&mut self, image: &'a ImageData) -> (u32, String) {
        let number = self.items.len() as u32 + 1;
        let name = format!("image{}.{}", number, image.extension());
        self.items.push(MediaItem {
            name: name.clone(),
            bytes: &image.bytes,
        });
        (number, name)
    }

    fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self
            .items
            .iter()
            .filter_map(|item| item.name.rsplit_once('.').map(|(_, ext)| ext))
            .collect();
        exts.sort_unstable();
        exts.dedup();
        exts
    }
}

#[derive(Default)]
struct Relationships {
    items: Vec<(String, &'static str, String)>,
}

impl Relationships {
    fn add(&mut self, kind: &'static str, target: impl Into<String>) -> String {
        let id = format!("rId{}", self.items.len() + 1);
        self.items.push((id.clone(), kind, target.into()));
        id
    }

    fn to_xml(&self) -> Result<String, ComposeError> {
        let mut xml = XmlOut::new()?;
        xml.start("Relationships", &[("xmlns", NS_PKG_RELS)])?;
        for (id, kind, target) in &self.items {
            xml.empty(
                "Relationship",
                &[("Id", id.as_str()), ("Type", *kind), ("Target", target.as_str())],
            )?;
        }
        xml.end("Relationships")?;
        xml.finish()
    }
}

fn root_rels_xml() -> Result<String, ComposeError> {
    let mut rels = Relationships::default();
    rels.add(REL_OFFICE_DOCUMENT, "word/document.xml");
    rels.to_xml()
}

fn content_types_xml(media: &MediaRegistry<'_>, has_header: bool) -> Result<String, ComposeError> {
    let mut xml = XmlOut::new()?;
    xml.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    xml.empty("Default", &[("Extension", "rels"), ("ContentType", CT_RELS)])?;
    xml.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    for ext in media.extensions() {
        let content_type = format!("image/{}", ext);
        xml.empty(
            "Default",
            &[("Extension", ext), ("ContentType", content_type.as_str())],
        )?;
    }
    xml.empty(
        "Override",
        &[("PartName", "/word/document.xml"), ("ContentType", CT_DOCUMENT)],
    )?;
    xml.empty(
        "Override",
        &[("PartName", "/word/styles.xml"), ("ContentType", CT_STYLES)],
    )?;
    if has_header {
        xml.empty(
            "Override",
            &[("PartName", "/word/header1.xml"), ("ContentType", CT_HEADER)],
        )?;
    }
    xml.end("Types")?;
    xml.finish()
}

// ========== 正文 ==========

fn document_xml<'a>(
    tree: &'a DocumentTree,
    header_rel_id: Option<&str>,
    rels: &mut Relationships,
    media: &mut MediaRegistry<'a>,
) -> Result<String, ComposeError> {
    let mut xml = XmlOut::new()?;
    xml.start(
        "w:document",
        &[
            ("xmlns:w", NS_W),
            ("xmlns:r", NS_R),
            ("xmlns:wp", NS_WP),
            ("xmlns:a", NS_A),
            ("xmlns:pic", NS_PIC),
        ],
    )?;
    xml.start("w:body", &[])?;

    for block in &tree.blocks {
        match block {
            Block::Paragraph(p) => write_paragraph(&mut xml, p, rels, media)?,
            Block::Table(t) => write_table(&mut xml, t)?,
            Block::PageBreak => {
                xml.start("w:p", &[])?;
                xml.start("w:r", &[])?;
                xml.empty("w:br", &[("w:type", "page")])?;
                xml.end("w:r")?;
                xml.end("w:p")?;
            }
        }
    }

    xml.start("w:sectPr", &[])?;
    if let Some(id) = header_rel_id {
        xml.empty("w:headerReference", &[("w:type", "default"), ("r:id", id)])?;
    }
    xml.empty("w:pgSz", &[("w:w", "11906"), ("w:h", "16838")])?;
    xml.empty(
        "w:pgMar",
        &[
            ("w:top", "1440"),
            ("w:right", "1440"),
            ("w:bottom", "1440"),
            ("w:left", "1440"),
            ("w:header", "708"),
            ("w:footer", "708"),
            ("w:gutter", "0"),
        ],
    )?;
    xml.end("w:sectPr")?;

    xml.end("w:body")?;
    xml.end("w:document")?;
    xml.finish()
}

fn header_xml<'a>(
    paragraphs: &'a [Paragraph],
    rels: &mut Relationships,
    media: &mut MediaRegistry<'a>,
) -> Result<String, ComposeError> {
    let mut xml = XmlOut::new()?;
    xml.start(
        "w:hdr",
        &[
            ("xmlns:w", NS_W),
            ("xmlns:r", NS_R),
            ("xmlns:wp", NS_WP),
            ("xmlns:a", NS_A),
            ("xmlns:pic", NS_PIC),
        ],
    )?;
    for p in paragraphs {
        write_paragraph(&mut xml, p, rels, media)?;
    }
    xml.end("w:hdr")?;
    xml.finish()
}

fn write_paragraph<'a>(
    xml: &mut XmlOut,
    paragraph: &'a Paragraph,
    rels: &mut Relationships,
    media: &mut MediaRegistry<'a>,
) -> Result<(), ComposeError> {
    xml.start("w:p", &[])?;

    let has_props = paragraph.heading.is_some()
        || paragraph.alignment != Alignment::Left
        || paragraph.spacing_before.is_some()
        || paragraph.spacing_after.is_some();
    if has_props {
        xml.start("w:pPr", &[])?;
        if let Some(level) = paragraph.heading {
            let style = match level {
                HeadingLevel::Title => "Title",
                HeadingLevel::Heading1 => "Heading1",
            };
            xml.empty("w:pStyle", &[("w:val", style)])?;
        }
        if paragraph.spacing_before.is_some() || paragraph.spacing_after.is_some() {
            let before = paragraph.spacing_before.map(|v| v.to_string());
            let after = paragraph.spacing_after.map(|v| v.to_string());
            let mut attrs = Vec::new();
            if let Some(before) = before.as_deref() {
                attrs.push(("w:before", before));
            }
            if let Some(after) = after.as_deref() {
                attrs.push(("w:after", after));
            }
            xml.empty("w:spacing", &attrs)?;
        }
        if paragraph.alignment == Alignment::Center {
            xml.empty("w:jc", &[("w:val", "center")])?;
        }
        xml.end("w:pPr")?;
    }

    for run in &paragraph.runs {
        match run {
            Run::Text { text, bold, size } => write_text_run(xml, text, *bold, *size)?,
            Run::Image(image) => {
                let (number, name) = media.register(image);
                let rel_id = rels.add(REL_IMAGE, format!("media/{}", name));
                write_image_run(xml, image, number, &name, &rel_id)?;
            }
        }
    }

    xml.end("w:p")
}

fn write_text_run(
    xml: &mut XmlOut,
    text: &str,
    bold: bool,
    size: Option<u32>,
) -> Result<(), ComposeError> {
    xml.start("w:r", &[])?;
    if bold || size.is_some() {
        xml.start("w:rPr", &[])?;
        if bold {
            xml.empty("w:b", &[])?;
        }
        if let Some(size) = size {
            let size = size.to_string();
            xml.empty("w:sz", &[("w:val", size.as_str())])?;
        }
        xml.end("w:rPr")?;
    }
    xml.start("w:t", &[("xml:space", "preserve")])?;
    xml.text(text)?;
    xml.end("w:t")?;
    xml.end("w:r")
}

fn write_image_run(
    xml: &mut XmlOut,
    image: &ImageData,
    number: u32,
    name: &str,
    rel_id: &str,
) -> Result<(), ComposeError> {
    let cx = (image.width as u64 * EMU_PER_PIXEL).to_string();
    let cy = (image.height as u64 * EMU_PER_PIXEL).to_string();
    let id = number.to_string();
    let title = format!("Picture {}", number);

    xml.start("w:r", &[])?;
    xml.start("w:drawing", &[])?;
    xml.start(
        "wp:inline",
        &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
    )?;
    xml.empty("wp:extent", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
    xml.empty("wp:docPr", &[("id", id.as_str()), ("name", title.as_str())])?;
    xml.start("a:graphic", &[])?;
    xml.start("a:graphicData", &[("uri", NS_PIC)])?;
    xml.start("pic:pic", &[])?;

    xml.start("pic:nvPicPr", &[])?;
    xml.empty("pic:cNvPr", &[("id", id.as_str()), ("name", name)])?;
    xml.empty("pic:cNvPicPr", &[])?;
    xml.end("pic:nvPicPr")?;

    xml.start("pic:blipFill", &[])?;
    xml.empty("a:blip", &[("r:embed", rel_id)])?;
    xml.start("a:stretch", &[])?;
    xml.empty("a:fillRect", &[])?;
    xml.end("a:stretch")?;
    xml.end("pic:blipFill")?;

    xml.start("pic:spPr", &[])?;
    xml.start("a:xfrm", &[])?;
    xml.empty("a:off", &[("x", "0"), ("y", "0")])?;
    xml.empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
    xml.end("a:xfrm")?;
    xml.start("a:prstGeom", &[("prst", "rect")])?;
    xml.empty("a:avLst", &[])?;
    xml.end("a:prstGeom")?;
    xml.end("pic:spPr")?;

    xml.end("pic:pic")?;
    xml.end("a:graphicData")?;
    xml.end("a:graphic")?;
    xml.end("wp:inline")?;
    xml.end("w:drawing")?;
    xml.end("w:r")
}

fn write_table(xml: &mut XmlOut, table: &Table) -> Result<(), ComposeError> {
    let columns = table.rows.first().map(Vec::len).unwrap_or(0);
    let widths: Vec<u8> = match table.rows.first() {
        Some(row) if row.iter().all(|c| c.width_percent.is_some()) => {
            row.iter().filter_map(|c| c.width_percent).collect()
        }
        _ => vec![(100 / columns.max(1)) as u8; columns],
    };

    xml.start("w:tbl", &[])?;
    xml.start("w:tblPr", &[])?;
    xml.empty("w:tblW", &[("w:w", "5000"), ("w:type", "pct")])?;
    xml.start("w:tblBorders", &[])?;
    for side in ["w:top", "w:left", "w:bottom", "w:right", "w:insideH", "w:insideV"] {
        xml.empty(
            side,
            &[("w:val", "single"), ("w:sz", "4"), ("w:space", "0"), ("w:color", "000000")],
        )?;
    }
    xml.end("w:tblBorders")?;
    xml.end("w:tblPr")?;

    xml.start("w:tblGrid", &[])?;
    for pct in &widths {
        let twips = (CONTENT_WIDTH_TWIPS * *pct as u32 / 100).to_string();
        xml.empty("w:gridCol", &[("w:w", twips.as_str())])?;
    }
    xml.end("w:tblGrid")?;

    for row in &table.rows {
        xml.start("w:tr", &[])?;
        for (idx, cell) in row.iter().enumerate() {
            xml.start("w:tc", &[])?;
            let pct = cell.width_percent.or_else(|| widths.get(idx).copied());
            if let Some(pct) = pct {
                // 百分比以 1/50 为单位
                let width = (pct as u32 * 50).to_string();
                xml.start("w:tcPr", &[])?;
                xml.empty("w:tcW", &[("w:w", width.as_str()), ("w:type", "pct")])?;
                xml.end("w:tcPr")?;
            }
            xml.start("w:p", &[])?;
            write_text_run(xml, &cell.text, cell.bold, None)?;
            xml.end("w:p")?;
            xml.end("w:tc")?;
        }
        xml.end("w:tr")?;
    }

    xml.end("w:tbl")
}

// ========== XML 输出 ==========

/// quick-xml Writer 的薄封装，统一错误类型
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

fn xml_error(e: impl std::fmt::Display) -> ComposeError {
    ComposeError::Xml(e.to_string())
}

impl XmlOut {
    fn new() -> Result<Self, ComposeError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(xml_error)?;
        Ok(Self { writer })
    }

    fn element(name: &str, attrs: &[(&str, &str)]) -> BytesStart<'static> {
        let mut element = BytesStart::new(name.to_string());
        for attr in attrs {
            element.push_attribute(*attr);
        }
        element
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ComposeError> {
        self.writer
            .write_event(Event::Start(Self::element(name, attrs)))
            .map_err(xml_error)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), ComposeError> {
        self.writer
            .write_event(Event::Empty(Self::element(name, attrs)))
            .map_err(xml_error)
    }

    fn end(&mut self, name: &str) -> Result<(), ComposeError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name.to_string())))
            .map_err(xml_error)
    }

    fn text(&mut self, text: &str) -> Result<(), ComposeError> {
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)
    }

    fn finish(self) -> Result<String, ComposeError> {
        String::from_utf8(self.writer.into_inner()).map_err(xml_error)
    }
}
