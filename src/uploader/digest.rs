// 内容摘要引擎
//
// 对文件全部字节计算 SHA-1，hex 编码后作为去重标识。
// 整个文件会被一次性读入内存，对多 GB 的文件不可行，
// 流式摘要是明确的非目标，与服务端查重接口的语义保持一致。

use crate::error::UploadError;
use sha1::{Digest, Sha1};
use std::path::Path;
use tracing::debug;

/// 摘要引擎
pub struct DigestEngine;

impl DigestEngine {
    /// 计算文件内容的 SHA-1 摘要（hex 小写）
    ///
    /// 文件 I/O 和哈希都在阻塞线程池中执行，不阻塞调用方。
    /// 读取失败（如文件在选中后被删除）返回 `UploadError::Io`，
    /// 由编排器将对应任务标记为失败，不影响批次其余任务。
    pub async fn compute(path: &Path) -> Result<String, UploadError> {
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || Self::compute_sync(&path))
            .await
            .map_err(|e| UploadError::Io(format!("摘要计算任务执行失败: {}", e)))?
    }

    /// 同步计算（内部方法）
    fn compute_sync(path: &Path) -> Result<String, UploadError> {
        let bytes = std::fs::read(path)
            .map_err(|e| UploadError::Io(format!("无法读取文件 {:?}: {}", path, e)))?;

        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        debug!(
            "文件摘要计算完成: path={:?}, size={}, sha1={}",
            path,
            bytes.len(),
            digest
        );

        Ok(digest)
    }
}
