//! 示例题库来源：本地目录或 HTTP
//!
//! 两者都按相对路径取字节，`manifest.json` 也是这样取到的

use std::path::PathBuf;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::error::DecodeError;

pub const MANIFEST_NAME: &str = "manifest.json";

pub trait DocumentSource: Send + Sync {
    /// 来源描述（用于日志）
    fn describe(&self) -> String;

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DecodeError>>;
}

/// 本地目录
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, DecodeError> {
        let full = self.root.join(path.trim_start_matches('/'));
        debug!("读取 {}", full.display());
        tokio::fs::read(&full)
            .await
            .map_err(|e| DecodeError::SourceFailed {
                location: full.display().to_string(),
                message: e.to_string(),
            })
    }
}

impl DocumentSource for DirSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DecodeError>> {
        self.read(path).boxed()
    }
}

/// 远程静态目录（如部署在 CDN 上的 `banco-de-ejercicios/`）
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, DecodeError> {
        let url = self.url_for(path);
        let failed = |message: String| DecodeError::SourceFailed {
            location: url.clone(),
            message,
        };

        debug!("下载 {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?
            .error_for_status()
            .map_err(|e| failed(e.to_string()))?;
        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl DocumentSource for HttpSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn fetch<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Vec<u8>, DecodeError>> {
        self.get(path).boxed()
    }
}
