//! data URL（`data:image/png;base64,...`）的编解码

use base64::Engine;

use crate::error::DecodeError;

/// 解码后的 data URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// 解码 base64 data URL
///
/// 只支持 `;base64` 编码，其余一律报错
pub fn decode_data_url(url: &str) -> Result<DataUrl, DecodeError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| DecodeError::DataUrl("缺少 data: 前缀".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| DecodeError::DataUrl("缺少逗号分隔符".to_string()))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| DecodeError::DataUrl(format!("不是 base64 编码: {}", meta)))?;

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| DecodeError::DataUrl(e.to_string()))?;

    Ok(DataUrl {
        content_type: if content_type.is_empty() {
            "application/octet-stream".to_string()
        } else {
            content_type.to_string()
        },
        bytes,
    })
}

/// 编码为 base64 data URL
pub fn encode_data_url(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// 按扩展名猜测图片类型
pub fn image_content_type(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".bmp") {
        "image/bmp"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else {
        "image/png"
    }
}
