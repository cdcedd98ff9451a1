// 上传错误类型定义
//
// 所有错误都是任务级别的：一个文件失败不会中断整个批次，
// 队列会释放并发槽位并继续接纳剩余任务

use thiserror::Error;

/// 上传管线错误
///
/// 摘要读取失败和上传失败在管线边界走同一个错误漏斗，
/// 但各自携带不同的错误信息便于诊断
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// 文件不可读（如选择后文件已被移动/删除）
    #[error("文件读取失败: {0}")]
    Io(String),
    /// 请求未能完成（查重或上传请求发送失败）
    #[error("网络错误: {0}")]
    Network(String),
    /// 非 2xx 状态码，或响应体携带显式 error 字段
    #[error("服务端错误: {0}")]
    Server(String),
}

impl UploadError {
    /// 错误分类名（用于事件与日志）
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Io(_) => "io",
            UploadError::Network(_) => "network",
            UploadError::Server(_) => "server",
        }
    }
}
