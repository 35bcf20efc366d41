//! 题目元数据提取 - 业务能力层
//!
//! 从格式松散的题目文本中提取答案（Respuesta/Clave/Solución）和
//! 能力（Habilidad/Destreza），并生成学生可见的文本。
//!
//! ## 已知局限
//!
//! 这是尽力而为的正则匹配，不是严格语法：
//! - 标签出现在句子中间（如 "...la clave: A"）同样会被当成元数据
//! - 同一行同时出现两个标签时，两个匹配范围会被合并后一起删除
//! - 答案值只允许字母、数字、逗号和空白；"Respuesta: 3.5" 不会被识别

use std::borrow::Cow;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::exercise::{ParsedExercise, UNDEFINED_MARKER};

static ANSWER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Respuesta|Clave|Soluci[óo]n)[ \t]*:[ \t]*([\p{L}\p{N},][\p{L}\p{N}, \t]*)(?:\r?\n|$)",
    )
    .expect("answer regex")
});

static SKILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Habilidad|Destreza)[ \t]*:[ \t]*(\S[^\r\n]*)(?:\r?\n|$)").expect("skill regex")
});

static HTML_PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").expect("paragraph regex"));

static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Respuesta|Clave|Soluci[óo]n|Habilidad|Destreza)\s*:").expect("label regex")
});

/// 解析题目原文
///
/// 两个正则都在原文上独立匹配，最后一次性删除所有匹配范围，
/// 因此删除答案行不会影响能力行的识别，反之亦然。
pub fn parse(raw: &str) -> ParsedExercise {
    let mut spans: Vec<Range<usize>> = Vec::new();

    let answer_key = first_value(&ANSWER_RE, raw, &mut spans);
    let skill = first_value(&SKILL_RE, raw, &mut spans);

    let extracted = answer_key.is_some() || skill.is_some();
    let student_text = if extracted {
        remove_spans(raw, spans).trim().to_string()
    } else {
        raw.trim().to_string()
    };

    ParsedExercise {
        student_text,
        answer_key: answer_key.unwrap_or_else(|| UNDEFINED_MARKER.to_string()),
        skill: skill.unwrap_or_else(|| UNDEFINED_MARKER.to_string()),
        extracted,
    }
}

/// 取第一个匹配的值，并记录所有匹配的范围
///
/// 重复出现的标签行也一并删除，保证对学生文本再次解析时不会提取到元数据
fn first_value(re: &Regex, raw: &str, spans: &mut Vec<Range<usize>>) -> Option<String> {
    let mut value = None;
    for caps in re.captures_iter(raw) {
        let whole = caps.get(0).map(|m| m.range());
        let captured = caps.get(1).map(|m| m.as_str().trim().to_string());
        match (whole, captured) {
            (Some(range), Some(text)) => {
                spans.push(range);
                if value.is_none() {
                    value = Some(text);
                }
            }
            _ => continue,
        }
    }
    value
}

/// 删除范围（重叠的范围先合并）
fn remove_spans(raw: &str, mut spans: Vec<Range<usize>>) -> String {
    spans.sort_by_key(|r| r.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }

    let mut out = String::with_capacity(raw.len());
    let mut cursor = 0;
    for span in merged {
        out.push_str(&raw[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&raw[cursor..]);
    out
}

/// 删除 HTML 中包含答案/能力标签的 `<p>` 段落
///
/// 用于游戏模式的学生视图，直接作用在富文本上。逐段判断，
/// 不会因为标签出现在后面的段落而误删前面的段落。
pub fn strip_metadata_html(html: &str) -> String {
    HTML_PARAGRAPH_RE
        .replace_all(html, |caps: &regex::Captures| {
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let text = HTML_TAG_RE.replace_all(inner, "");
            if LABEL_RE.is_match(&text) {
                String::new()
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// 文本中是否带有答案/能力标签
pub fn has_metadata_label(text: &str) -> bool {
    LABEL_RE.is_match(text)
}

/// 删除仍带有答案/能力标签的行
///
/// 解析器没能取到值的标签行（如 `Respuesta: 3.5`）在学生文本里会原样保留，
/// 展示给学生前再按行过滤一次。没有标签时原样借用。
pub fn strip_metadata_lines(text: &str) -> Cow<'_, str> {
    if !LABEL_RE.is_match(text) {
        return Cow::Borrowed(text);
    }
    let kept: Vec<&str> = text.lines().filter(|line| !LABEL_RE.is_match(line)).collect();
    Cow::Owned(kept.join("\n").trim().to_string())
}
