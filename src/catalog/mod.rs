// 媒体目录接口模块
//
// 上传管线通过 MediaTransport 这个接缝访问远端：
// 生产环境用基于 reqwest 的 CatalogClient，测试里用脚本化的替身。
// 底层传输对象和 fetch 风格的高层实现必须表现一致:
// 进度事件在某些传输里是可选的，缺失不能破坏完成上报。

mod client;
mod types;

pub use client::{CatalogClient, ProgressFn, UploadRequest};
pub use types::{MediaCheckResponse, MediaRecord, UploadResponse};

use crate::error::UploadError;
use async_trait::async_trait;

/// 媒体传输接口
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// 按 (digest, size) 查询远端媒体索引
    ///
    /// 返回 Some(record) 表示同内容文件已在库中，应跳过上传
    async fn check_media(
        &self,
        digest: &str,
        size: u64,
    ) -> Result<Option<MediaRecord>, UploadError>;

    /// 上传文件，成功返回入库后的媒体记录
    ///
    /// progress 回调在每次可度量的传输进度变化时被调用 (sent, total)
    async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<ProgressFn>,
    ) -> Result<MediaRecord, UploadError>;
}
