// 批内去重注册表
//
// 记录当前批次已见过的摘要，作用域为一个批次会话：
// 批次完全排空时清空。远端查重是独立的按 (digest, size) 幂等查询，
// 由管线在本地检查之后发起（本地检查更便宜，批内重复无需网络往返）。

use crate::catalog::MediaRecord;
use std::collections::HashMap;
use tracing::info;

/// 某个摘要的首见记录
#[derive(Debug, Clone)]
struct DedupEntry {
    /// 首个携带该摘要的任务ID（权威任务）
    first_task_id: u64,
    /// 权威任务产出的媒体记录（其完成后回填）
    media: Option<MediaRecord>,
}

/// 本地查重结果
#[derive(Debug, Clone)]
pub enum LocalCheckResult {
    /// 批内首见，已登记
    FirstSeen,
    /// 批内重复；若权威任务已完成则附带其媒体记录
    Duplicate {
        first_task_id: u64,
        media: Option<MediaRecord>,
    },
}

/// 去重注册表
#[derive(Debug, Default)]
pub struct DedupRegistry {
    by_digest: HashMap<String, DedupEntry>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 检查并登记摘要
    ///
    /// 首见的任务成为该摘要的权威任务，后续同摘要任务全部跳过上传
    pub fn check_and_register(&mut self, digest: &str, task_id: u64) -> LocalCheckResult {
        if let Some(entry) = self.by_digest.get(digest) {
            info!(
                "拦截批内重复上传: task={}, 权威任务={}, sha1={}",
                task_id, entry.first_task_id, digest
            );
            return LocalCheckResult::Duplicate {
                first_task_id: entry.first_task_id,
                media: entry.media.clone(),
            };
        }

        self.by_digest.insert(
            digest.to_string(),
            DedupEntry {
                first_task_id: task_id,
                media: None,
            },
        );
        LocalCheckResult::FirstSeen
    }

    /// 回填权威任务产出的媒体记录
    ///
    /// 之后检出的重复任务即可直接复用该记录
    pub fn record_media(&mut self, digest: &str, media: &MediaRecord) {
        if let Some(entry) = self.by_digest.get_mut(digest) {
            entry.media = Some(media.clone());
        }
    }

    /// 已登记的摘要数量
    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }

    /// 清空注册表（批次排空时调用）
    pub fn clear(&mut self) {
        self.by_digest.clear();
    }
}
