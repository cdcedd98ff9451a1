// 上传任务定义
//
// 一个任务对应一个文件从被选中到终态的完整旅程

use crate::catalog::MediaRecord;
use crate::uploader::classifier::{size_bucket, type_bucket};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 上传任务状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadTaskStatus {
    /// 排队中（尚未获得并发槽位）
    Queued,
    /// 摘要计算中
    Digesting,
    /// 查重中（先本地批内、后远端索引）
    CheckingDuplicate,
    /// 上传中
    Uploading,
    /// 已完成（上传成功，或远端已有同内容记录）
    Completed,
    /// 批内重复，跳过上传
    DuplicateSkipped,
    /// 失败
    Failed,
}

impl UploadTaskStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadTaskStatus::Completed
                | UploadTaskStatus::DuplicateSkipped
                | UploadTaskStatus::Failed
        )
    }
}

/// 上传任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    /// 任务ID（单调递增的序列号，分配一次，永不复用）
    pub id: u64,
    /// 本地文件路径
    pub local_path: PathBuf,
    /// 文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    /// MIME 类型
    pub mime_type: String,
    /// 最后修改时间 (Unix 毫秒)
    pub last_modified: i64,
    /// 大小分组（排序键）
    pub size_bucket: u8,
    /// 类型分组（排序键）
    pub type_bucket: u8,
    /// 内容摘要（SHA-1 hex），获准进入管线后才计算，至多设置一次
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// 是否为批内重复文件
    #[serde(default)]
    pub is_duplicate: bool,
    /// 关联的媒体记录（上传成功或远端已存在时设置）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRecord>,
    /// 错误信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 任务状态
    pub status: UploadTaskStatus,
    /// 创建时间 (Unix timestamp)
    pub created_at: i64,
}

impl UploadTask {
    /// 创建新的上传任务
    ///
    /// 分组在创建时即根据元数据算好，之后不再变化
    pub fn new(
        id: u64,
        local_path: PathBuf,
        name: String,
        size: u64,
        mime_type: String,
        last_modified: i64,
    ) -> Self {
        let size_bucket = size_bucket(size);
        let type_bucket = type_bucket(&mime_type);
        Self {
            id,
            local_path,
            name,
            size,
            mime_type,
            last_modified,
            size_bucket,
            type_bucket,
            digest: None,
            is_duplicate: false,
            media: None,
            error: None,
            status: UploadTaskStatus::Queued,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// 标记为摘要计算中
    pub fn mark_digesting(&mut self) {
        self.status = UploadTaskStatus::Digesting;
    }

    /// 标记为查重中
    pub fn mark_checking_duplicate(&mut self) {
        self.status = UploadTaskStatus::CheckingDuplicate;
    }

    /// 标记为上传中
    pub fn mark_uploading(&mut self) {
        self.status = UploadTaskStatus::Uploading;
    }

    /// 标记为已完成，关联媒体记录
    pub fn mark_completed(&mut self, media: MediaRecord) {
        self.status = UploadTaskStatus::Completed;
        self.media = Some(media);
    }

    /// 标记为批内重复
    ///
    /// 首个同摘要任务是权威任务；若其媒体记录已经产出则一并带上
    pub fn mark_duplicate(&mut self, media: Option<MediaRecord>) {
        self.status = UploadTaskStatus::DuplicateSkipped;
        self.is_duplicate = true;
        self.media = media;
    }

    /// 标记为失败
    pub fn mark_failed(&mut self, error: String) {
        self.status = UploadTaskStatus::Failed;
        self.error = Some(error);
    }
}
