// 媒体目录客户端实现
//
// 负责两个远端接口：
// - 按 (digest, size) 查重: GET /upload/media/sha1_{digest}_{size}/
// - 多部分表单上传:       POST /upload/file/
//
// 凭证走同源 Cookie，CSRF 令牌来自 csrftoken Cookie 并回填到
// X-CSRFToken 请求头

use crate::catalog::{MediaCheckResponse, MediaRecord, MediaTransport, UploadResponse};
use crate::config::CatalogConfig;
use crate::error::UploadError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::{Body, Client};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// 进度回调: (已发送字节, 总字节)
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// 上传请求
///
/// 携带的字段与上传接口的表单字段一一对应
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// 本地文件路径（发送前整体读入内存）
    pub local_path: PathBuf,
    /// 文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    /// MIME 类型
    pub mime_type: String,
    /// 最后修改时间 (Unix 毫秒)
    pub last_modified: i64,
    /// 内容摘要 (SHA-1 hex)
    pub digest: String,
}

/// 进度流的分块大小
const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// 媒体目录客户端
#[derive(Debug, Clone)]
pub struct CatalogClient {
    /// HTTP客户端
    client: Client,
    /// 目录服务基地址（不含结尾斜杠）
    base_url: String,
    /// 上传会话ID（每次构造生成，随每个上传请求发送）
    session_id: String,
    /// CSRF 令牌（csrftoken Cookie 的值）
    csrf_token: Option<String>,
}

impl CatalogClient {
    /// 创建新的目录客户端
    ///
    /// 启用自动 Cookie 管理；已有的会话 Cookie（sessionid / csrftoken）
    /// 在构造时手动初始化到 Cookie Jar
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        use reqwest::cookie::Jar;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let url = base_url
            .parse::<reqwest::Url>()
            .context(format!("目录服务地址无效: {}", base_url))?;

        let jar = Arc::new(Jar::default());

        if let Some(ref session_cookie) = config.session_cookie {
            jar.add_cookie_str(&format!("sessionid={}; Path=/", session_cookie), &url);
        }
        if let Some(ref csrf_token) = config.csrf_token {
            jar.add_cookie_str(&format!("csrftoken={}; Path=/", csrf_token), &url);
        }

        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        // 每次构造生成新的上传会话ID
        let session_id = uuid::Uuid::new_v4().simple().to_string();

        info!(
            "初始化目录客户端成功, base_url={}, session_id={}, csrf={}",
            base_url,
            session_id,
            if config.csrf_token.is_some() {
                "已设置"
            } else {
                "未设置"
            }
        );

        Ok(Self {
            client,
            base_url,
            session_id,
            csrf_token: config.csrf_token.clone(),
        })
    }

    /// 上传会话ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 构建查重接口 URL
    fn check_url(&self, digest: &str, size: u64) -> String {
        format!("{}/upload/media/sha1_{}_{}/", self.base_url, digest, size)
    }

    /// 构建上传接口 URL
    fn upload_url(&self) -> String {
        format!("{}/upload/file/", self.base_url)
    }

    /// 解析查重响应体
    fn parse_check_response(body: &str) -> Result<Option<MediaRecord>, UploadError> {
        let response: MediaCheckResponse = serde_json::from_str(body)
            .map_err(|e| UploadError::Server(format!("查重响应解析失败: {}", e)))?;
        Ok(response.media)
    }

    /// 解析上传响应体
    ///
    /// 先解析 JSON 并检查显式 error 字段，再看 HTTP 状态:
    /// 服务端可能在非 2xx 响应里携带具体错误信息
    fn parse_upload_response(status_ok: bool, body: &str) -> Result<MediaRecord, UploadError> {
        let response: UploadResponse = serde_json::from_str(body)
            .map_err(|_| UploadError::Server("上传失败".to_string()))?;

        if let Some(error) = response.error {
            return Err(UploadError::Server(error));
        }
        if !status_ok {
            return Err(UploadError::Server("上传失败".to_string()));
        }
        response
            .media
            .ok_or_else(|| UploadError::Server("上传响应缺少 media 字段".to_string()))
    }

    /// 把文件字节包装成会上报进度的流
    ///
    /// 分块交给传输层，每块被拉取时回调一次 (sent, total)
    fn progress_body(bytes: Vec<u8>, progress: Option<ProgressFn>) -> Body {
        let total = bytes.len() as u64;
        let chunks: Vec<Vec<u8>> = bytes
            .chunks(PROGRESS_CHUNK_SIZE)
            .map(|c| c.to_vec())
            .collect();

        let mut sent: u64 = 0;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            if let Some(ref callback) = progress {
                callback(sent, total);
            }
            Ok::<Vec<u8>, std::io::Error>(chunk)
        }));

        Body::wrap_stream(stream)
    }
}

#[async_trait]
impl MediaTransport for CatalogClient {
    /// 查询远端媒体索引
    ///
    /// 幂等查询，可安全重试；本方法自身不做重试（非目标）
    async fn check_media(
        &self,
        digest: &str,
        size: u64,
    ) -> Result<Option<MediaRecord>, UploadError> {
        let url = self.check_url(digest, size);
        debug!("远端查重: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UploadError::Network(format!("查重请求发送失败: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Server(format!("查重失败: HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(format!("读取查重响应失败: {}", e)))?;

        Self::parse_check_response(&body)
    }

    /// 执行上传
    ///
    /// 文件整体读入内存后分块发送；progress 为 None 时照常完成，
    /// 进度事件的缺失不影响完成上报
    async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<ProgressFn>,
    ) -> Result<MediaRecord, UploadError> {
        let bytes = tokio::fs::read(&request.local_path)
            .await
            .map_err(|e| UploadError::Io(format!("无法读取文件 {:?}: {}", request.local_path, e)))?;

        // 以实际读到的长度为准，文件在选中后可能被改写
        let content_length = bytes.len() as u64;
        let file_part = multipart::Part::stream_with_length(
            Self::progress_body(bytes, progress),
            content_length,
        )
        .file_name(request.name.clone())
        .mime_str(&request.mime_type)
        .map_err(|e| UploadError::Network(format!("非法 MIME 类型 {}: {}", request.mime_type, e)))?;

        let form = multipart::Form::new()
            .text("session_id", self.session_id.clone())
            .text("name", request.name.clone())
            .text("size", request.size.to_string())
            .text("type", request.mime_type.clone())
            .text("last_modified", request.last_modified.to_string())
            .text("sha1", request.digest.clone())
            .part("file", file_part);

        let mut builder = self.client.post(self.upload_url()).multipart(form);
        if let Some(ref csrf_token) = self.csrf_token {
            builder = builder.header("X-CSRFToken", csrf_token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UploadError::Network(format!("上传请求发送失败: {}", e)))?;

        let status_ok = response.status().is_success();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Network(format!("读取上传响应失败: {}", e)))?;

        let media = Self::parse_upload_response(status_ok, &body)?;

        debug!(
            "上传完成: name={}, sha1={}, media_id={}",
            request.name, request.digest, media.id
        );

        Ok(media)
    }
}
