// Photo Cloud Rust Library
// 私有照片云上传管线核心库

// 媒体目录接口模块
pub mod catalog;

// 配置管理模块
pub mod config;

// 错误类型模块
pub mod error;

// 事件模块
pub mod events;

// 日志模块
pub mod logging;

// 上传管线模块
pub mod uploader;

// 导出常用类型
pub use catalog::{CatalogClient, MediaRecord, MediaTransport, UploadRequest};
pub use config::AppConfig;
pub use error::UploadError;
pub use events::{BatchSummary, EventBus, EventPriority, ProgressThrottler, UploadEvent};
pub use uploader::{
    DroppedFile, EntryScanner, ScanOptions, UploadQueue, UploadTask, UploadTaskStatus,
};
