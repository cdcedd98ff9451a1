//! 上传事件类型定义
//!
//! 展示层只消费这些事件，核心从不直接触碰渲染

use crate::catalog::MediaRecord;
use serde::{Deserialize, Serialize};

/// 事件优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    /// 低优先级：进度更新
    Low = 0,
    /// 中优先级：入队等状态类事件
    Medium = 1,
    /// 高优先级：完成、失败、批次排空等关键事件
    High = 2,
}

/// 批次汇总（批次排空时随事件发出）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    /// 成功完成的文件数（上传 + 远端复用；不含批内重复）
    pub uploaded_files: u64,
    /// 实际传输的字节数（远端复用与批内重复不计入）
    pub uploaded_bytes: u64,
    /// 批内重复而跳过的文件数
    pub duplicate_files: u64,
    /// 失败的文件数
    pub failed_files: u64,
    /// 批次耗时（毫秒）
    pub duration_ms: u64,
    /// 平均吞吐 (bytes/s)
    pub throughput_bps: u64,
}

/// 上传任务事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum UploadEvent {
    /// 任务入队
    Enqueued {
        task_id: u64,
        name: String,
        size: u64,
        size_bucket: u8,
        type_bucket: u8,
    },
    /// 进度更新
    Progress {
        task_id: u64,
        sent: u64,
        total: u64,
        percent: f64,
    },
    /// 批内重复，跳过上传
    Duplicate {
        task_id: u64,
        /// 权威任务（首个同摘要任务）的ID
        first_task_id: u64,
        /// 权威任务的媒体记录（其已完成时携带）
        #[serde(skip_serializing_if = "Option::is_none")]
        media: Option<MediaRecord>,
    },
    /// 任务完成
    Completed {
        task_id: u64,
        media: MediaRecord,
        /// 是否复用了远端已有记录（未实际传输字节）
        reused: bool,
        completed_at: i64,
    },
    /// 任务失败
    Failed {
        task_id: u64,
        error: String,
    },
    /// 批次排空
    BatchDrained { summary: BatchSummary },
}

impl UploadEvent {
    /// 获取任务 ID（批次级事件返回 None）
    pub fn task_id(&self) -> Option<u64> {
        match self {
            UploadEvent::Enqueued { task_id, .. } => Some(*task_id),
            UploadEvent::Progress { task_id, .. } => Some(*task_id),
            UploadEvent::Duplicate { task_id, .. } => Some(*task_id),
            UploadEvent::Completed { task_id, .. } => Some(*task_id),
            UploadEvent::Failed { task_id, .. } => Some(*task_id),
            UploadEvent::BatchDrained { .. } => None,
        }
    }

    /// 获取事件优先级
    pub fn priority(&self) -> EventPriority {
        match self {
            UploadEvent::Progress { .. } => EventPriority::Low,
            UploadEvent::Enqueued { .. } => EventPriority::Medium,
            UploadEvent::Duplicate { .. }
            | UploadEvent::Completed { .. }
            | UploadEvent::Failed { .. }
            | UploadEvent::BatchDrained { .. } => EventPriority::High,
        }
    }

    /// 获取事件类型名称
    pub fn event_type_name(&self) -> &'static str {
        match self {
            UploadEvent::Enqueued { .. } => "enqueued",
            UploadEvent::Progress { .. } => "progress",
            UploadEvent::Duplicate { .. } => "duplicate",
            UploadEvent::Completed { .. } => "completed",
            UploadEvent::Failed { .. } => "failed",
            UploadEvent::BatchDrained { .. } => "batch_drained",
        }
    }

    /// 是否为终态事件（done / error 各自恰好上报一次）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadEvent::Duplicate { .. }
                | UploadEvent::Completed { .. }
                | UploadEvent::Failed { .. }
        )
    }
}
