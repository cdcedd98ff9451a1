// 排序调度
//
// 高频多文件拖放时每插入一个文件就全量重排既浪费又造成视觉抖动。
// 策略是前沿立即执行的去抖：
// - 没有排序在计划/执行中 -> 立刻（零延迟）跑一次并置位 scheduled
// - 已有排序在计划/执行中 -> 只置位 run_again，不再起第二个定时器
// - 一次排序结束时若 run_again 被置位 -> 清掉它并在固定延迟后补一次排序
// - 只有在没有待补排序请求时才清掉 scheduled，且必须是排序的最后一步，
//   否则晚到的插入可能在排序仍在执行时看到"未调度"状态

use crate::uploader::UploadTask;
use std::cmp::Ordering;

/// 排序比较器：主键 size_bucket 升序，次键 type_bucket 升序
///
/// 两键都相等时返回 Equal，交给稳定排序保持插入顺序
pub fn compare_tasks(a: &UploadTask, b: &UploadTask) -> Ordering {
    a.size_bucket
        .cmp(&b.size_bucket)
        .then(a.type_bucket.cmp(&b.type_bucket))
}

/// 排序去抖状态机
///
/// 本身不持有待排序列表，只负责"现在该不该排"的决策；
/// 由队列在自己的锁内驱动
#[derive(Debug, Default)]
pub struct SortState {
    /// 是否已有排序被调度或正在执行
    scheduled: bool,
    /// 排序期间是否又有新插入
    run_again: bool,
}

/// `SortState::on_insert` 的决策结果
#[derive(Debug, PartialEq, Eq)]
pub enum SortAction {
    /// 立即执行一次排序
    RunNow,
    /// 已有排序在途，本次插入已被合并
    Coalesced,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入发生时调用
    pub fn on_insert(&mut self) -> SortAction {
        if !self.scheduled {
            self.scheduled = true;
            SortAction::RunNow
        } else {
            self.run_again = true;
            SortAction::Coalesced
        }
    }

    /// 一次排序完成时调用
    ///
    /// 返回 true 表示需要在延迟后补一次排序（scheduled 保持置位）；
    /// 返回 false 表示没有待补请求，scheduled 已清除
    pub fn on_sort_finished(&mut self) -> bool {
        if self.run_again {
            self.run_again = false;
            true
        } else {
            self.scheduled = false;
            false
        }
    }
}
