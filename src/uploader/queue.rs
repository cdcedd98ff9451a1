// 上传队列
//
// 有界并发的工作调度器：
// - 入队的任务按 (size_bucket, type_bucket) 排好序等待
// - 空出槽位或有新任务入队时，按当前排序 FIFO 接纳，
//   任意时刻在途任务数不超过 max_concurrent_tasks
// - 槽位释放与下一次接纳在同一把锁内完成，中间不会插入其他接纳
// - 批次排空时发出一次汇总事件，然后清空全部批内状态
//
// 原则上这里没有进程级可变状态：计数器、注册表、排序状态全部是
// 单个队列实例的字段，构造一次、排空时重置

use crate::catalog::MediaTransport;
use crate::config::UploadConfig;
use crate::events::{BatchSummary, EventBus, ProgressThrottler, UploadEvent};
use crate::uploader::dedup::{DedupRegistry, LocalCheckResult};
use crate::uploader::pipeline;
use crate::uploader::scanner::DroppedFile;
use crate::uploader::sorter::{compare_tasks, SortAction, SortState};
use crate::uploader::task::UploadTask;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// 批次统计
///
/// 起始时刻在首个非空入队时设置，批次排空时整体归零
#[derive(Debug, Default)]
struct BatchStats {
    /// 未到终态任务的字节总量
    pending_bytes: u64,
    /// 成功完成的文件数（上传 + 远端复用）
    uploaded_files: u64,
    /// 实际传输的字节数（复用与批内重复不计入）
    uploaded_bytes: u64,
    /// 批内重复而跳过的文件数
    duplicate_files: u64,
    /// 失败任务列表 (task_id, 错误信息)
    failed: Vec<(u64, String)>,
    /// 批次起始时刻
    started_at: Option<Instant>,
}

/// 队列内部状态
///
/// 所有状态迁移都在这一把锁内发生，锁内不做 I/O
struct QueueState {
    /// 等待接纳的任务（按当前排序，队首先接纳）
    pending: VecDeque<UploadTask>,
    /// 在途任务数
    in_flight: usize,
    /// 批内去重注册表
    registry: DedupRegistry,
    /// 批次统计
    stats: BatchStats,
    /// 排序去抖状态
    sort: SortState,
}

/// 在途任务的观测信息
#[derive(Debug, Clone)]
pub struct ActiveUpload {
    pub task_id: u64,
    pub name: String,
    pub size: u64,
    /// 已发送字节（进度回调更新）
    pub sent: Arc<AtomicU64>,
}

/// 终态结果（管线汇报给队列）
pub(crate) enum TaskOutcome {
    /// 上传成功或远端已有同内容记录
    Completed {
        media: crate::catalog::MediaRecord,
        reused: bool,
    },
    /// 批内重复
    Duplicate {
        first_task_id: u64,
        media: Option<crate::catalog::MediaRecord>,
    },
    /// 失败
    Failed { error: crate::error::UploadError },
}

/// 上传队列
pub struct UploadQueue {
    /// 媒体传输实现
    transport: Arc<dyn MediaTransport>,
    /// 事件总线
    events: EventBus,
    /// 上传配置
    config: UploadConfig,
    /// 任务ID序列（单调递增，永不复用）
    next_task_id: AtomicU64,
    /// 队列状态
    state: Mutex<QueueState>,
    /// 在途任务表（task_id -> 观测信息）
    active: DashMap<u64, ActiveUpload>,
}

impl UploadQueue {
    /// 创建上传队列
    pub fn new(transport: Arc<dyn MediaTransport>, config: UploadConfig) -> Arc<Self> {
        info!(
            "创建上传队列: 最大并发={}, 排序延迟={}ms, 进度节流={}ms",
            config.max_concurrent_tasks, config.sort_delay_ms, config.progress_throttle_ms
        );

        Arc::new(Self {
            transport,
            events: EventBus::new(),
            config,
            next_task_id: AtomicU64::new(0),
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: 0,
                registry: DedupRegistry::new(),
                stats: BatchStats::default(),
                sort: SortState::new(),
            }),
            active: DashMap::new(),
        })
    }

    /// 事件总线
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<UploadEvent> {
        self.events.subscribe()
    }

    /// 入队单个文件
    pub fn enqueue(self: &Arc<Self>, file: DroppedFile) -> u64 {
        self.enqueue_batch(vec![file])[0]
    }

    /// 批量入队
    ///
    /// 整批只触发一次排序调度和一轮接纳
    pub fn enqueue_batch(self: &Arc<Self>, files: Vec<DroppedFile>) -> Vec<u64> {
        let mut task_ids = Vec::with_capacity(files.len());
        let mut st = self.state.lock();

        for file in files {
            let id = self.next_task_id.fetch_add(1, Ordering::SeqCst) + 1;
            let task = UploadTask::new(
                id,
                file.path,
                file.name,
                file.size,
                file.mime_type,
                file.last_modified,
            );

            if st.stats.started_at.is_none() {
                st.stats.started_at = Some(Instant::now());
            }
            st.stats.pending_bytes += task.size;

            self.events.publish(UploadEvent::Enqueued {
                task_id: task.id,
                name: task.name.clone(),
                size: task.size,
                size_bucket: task.size_bucket,
                type_bucket: task.type_bucket,
            });

            debug!(
                "任务入队: id={}, name={}, size={}, bucket=({},{})",
                task.id, task.name, task.size, task.size_bucket, task.type_bucket
            );

            st.pending.push_back(task);
            task_ids.push(id);
        }

        self.schedule_sort_locked(&mut st);
        self.try_admit_locked(&mut st);

        task_ids
    }

    /// 移除尚未接纳的任务
    ///
    /// 在途上传不支持取消（非目标）；只有排队中的任务可以被移除
    pub fn remove_pending(self: &Arc<Self>, task_id: u64) -> bool {
        let mut st = self.state.lock();

        let pos = match st.pending.iter().position(|t| t.id == task_id) {
            Some(pos) => pos,
            None => return false,
        };

        let task = st.pending.remove(pos).expect("位置刚刚校验过");
        st.stats.pending_bytes -= task.size;
        info!("移除排队任务: id={}, name={}", task.id, task.name);

        // 移除也可能让队列彻底清空
        self.check_drained_locked(&mut st);
        true
    }

    /// 排队中的任务数
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// 在途任务数
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight
    }

    /// 队列是否空闲（没有排队也没有在途）
    pub fn is_idle(&self) -> bool {
        let st = self.state.lock();
        st.pending.is_empty() && st.in_flight == 0
    }

    /// 排队任务的ID快照（按当前顺序）
    pub fn pending_task_ids(&self) -> Vec<u64> {
        self.state.lock().pending.iter().map(|t| t.id).collect()
    }

    /// 在途任务的观测快照
    pub fn active_uploads(&self) -> Vec<ActiveUpload> {
        self.active.iter().map(|e| e.value().clone()).collect()
    }

    // =====================================================
    // 管线回调（pub(crate)）
    // =====================================================

    /// 媒体传输实现
    pub(crate) fn transport(&self) -> Arc<dyn MediaTransport> {
        Arc::clone(&self.transport)
    }

    /// 进度节流间隔
    pub(crate) fn progress_throttle_ms(&self) -> u64 {
        self.config.progress_throttle_ms
    }

    /// 本地批内查重（必须先于远端查重）
    pub(crate) fn check_local_duplicate(&self, digest: &str, task_id: u64) -> LocalCheckResult {
        self.state.lock().registry.check_and_register(digest, task_id)
    }

    /// 进度回调入口
    ///
    /// 经节流器限频后发布进度事件；在途观测表总是更新
    pub(crate) fn on_progress(
        &self,
        task_id: u64,
        sent: u64,
        total: u64,
        throttler: &ProgressThrottler,
    ) {
        if let Some(active) = self.active.get(&task_id) {
            active.sent.store(sent, Ordering::Relaxed);
        }

        if throttler.should_emit() {
            let percent = if total > 0 {
                100.0 * sent as f64 / total as f64
            } else {
                100.0
            };
            self.events.publish(UploadEvent::Progress {
                task_id,
                sent,
                total,
                percent,
            });
        }
    }

    /// 任务到达终态
    ///
    /// 释放槽位、更新计数、接纳后续任务；排空检查必须是最后一步，
    /// 且基于此刻的真实队列长度，排空期间新入队不会与重置竞争
    pub(crate) fn on_terminal(self: &Arc<Self>, task: UploadTask, outcome: TaskOutcome) {
        let mut st = self.state.lock();

        st.in_flight -= 1;
        self.active.remove(&task.id);
        st.stats.pending_bytes -= task.size;

        match outcome {
            TaskOutcome::Completed { media, reused } => {
                st.stats.uploaded_files += 1;
                if !reused {
                    st.stats.uploaded_bytes += task.size;
                }
                // 回填注册表，之后检出的同摘要任务直接复用该记录
                if let Some(ref digest) = task.digest {
                    st.registry.record_media(digest, &media);
                }
                info!(
                    "任务完成: id={}, name={}, media={}, 复用={}",
                    task.id, task.name, media.id, reused
                );
                self.events.publish(UploadEvent::Completed {
                    task_id: task.id,
                    media,
                    reused,
                    completed_at: chrono::Utc::now().timestamp(),
                });
            }
            TaskOutcome::Duplicate {
                first_task_id,
                media,
            } => {
                st.stats.duplicate_files += 1;
                self.events.publish(UploadEvent::Duplicate {
                    task_id: task.id,
                    first_task_id,
                    media,
                });
            }
            TaskOutcome::Failed { error } => {
                warn!("任务失败: id={}, name={}, 错误: {}", task.id, task.name, error);
                st.stats.failed.push((task.id, error.to_string()));
                self.events.publish(UploadEvent::Failed {
                    task_id: task.id,
                    error: error.to_string(),
                });
            }
        }

        self.try_admit_locked(&mut st);
        self.check_drained_locked(&mut st);
    }

    // =====================================================
    // 内部实现（调用方必须已持有状态锁）
    // =====================================================

    /// 尽可能接纳排队任务
    ///
    /// 在锁内完成计数与出队，被接纳任务的管线在后台执行
    fn try_admit_locked(self: &Arc<Self>, st: &mut QueueState) {
        while st.in_flight < self.config.max_concurrent_tasks {
            let task = match st.pending.pop_front() {
                Some(task) => task,
                None => break,
            };

            st.in_flight += 1;
            self.active.insert(
                task.id,
                ActiveUpload {
                    task_id: task.id,
                    name: task.name.clone(),
                    size: task.size,
                    sent: Arc::new(AtomicU64::new(0)),
                },
            );

            debug!(
                "接纳任务: id={}, name={}, 在途 {}/{}",
                task.id, task.name, st.in_flight, self.config.max_concurrent_tasks
            );

            let queue = Arc::clone(self);
            tokio::spawn(async move {
                pipeline::run(queue, task).await;
            });
        }
    }

    /// 排序调度决策
    fn schedule_sort_locked(self: &Arc<Self>, st: &mut QueueState) {
        match st.sort.on_insert() {
            SortAction::RunNow => {
                // 前沿立即执行：零延迟跑一次
                let queue = Arc::clone(self);
                tokio::spawn(async move {
                    queue.run_sort();
                });
            }
            SortAction::Coalesced => {}
        }
    }

    /// 执行一次排序
    fn run_sort(self: &Arc<Self>) {
        let mut st = self.state.lock();
        st.pending.make_contiguous().sort_by(compare_tasks);
        let rerun = st.sort.on_sort_finished();
        drop(st);

        if rerun {
            // 排序期间又有插入：固定延迟后补一次，合并突发
            let queue = Arc::clone(self);
            let delay = std::time::Duration::from_millis(self.config.sort_delay_ms);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                queue.run_sort();
            });
        }
    }

    /// 排空检查与批内状态重置
    fn check_drained_locked(&self, st: &mut QueueState) {
        if !st.pending.is_empty() || st.in_flight != 0 {
            return;
        }
        if st.stats.started_at.is_none() {
            // 批次从未启动（例如重复排空检查），没有可汇总的内容
            return;
        }

        let duration_ms = st
            .stats
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
            .max(1);
        let summary = BatchSummary {
            uploaded_files: st.stats.uploaded_files,
            uploaded_bytes: st.stats.uploaded_bytes,
            duplicate_files: st.stats.duplicate_files,
            failed_files: st.stats.failed.len() as u64,
            duration_ms,
            throughput_bps: st.stats.uploaded_bytes * 1000 / duration_ms,
        };

        info!(
            "批次排空: {} 个文件, {} 字节, {} 失败, 耗时 {}ms",
            summary.uploaded_files, summary.uploaded_bytes, summary.failed_files, duration_ms
        );

        // 清空全部批内状态，之后的入队开启新批次
        st.stats = BatchStats::default();
        st.registry.clear();

        self.events.publish(UploadEvent::BatchDrained { summary });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{MediaRecord, MediaTransport, ProgressFn, UploadRequest};
    use crate::error::UploadError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    /// 脚本化的传输替身
    ///
    /// 记录并发高水位和上传顺序，可按文件名注入失败、
    /// 按摘要模拟远端已存在
    struct MockTransport {
        delay: Duration,
        current: AtomicUsize,
        max_observed: AtomicUsize,
        upload_calls: AtomicUsize,
        uploaded_names: Mutex<Vec<String>>,
        remote_known: Mutex<HashSet<String>>,
        fail_names: Mutex<HashSet<String>>,
        next_media_id: AtomicU64,
    }

    impl MockTransport {
        fn new(delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                delay: Duration::from_millis(delay_ms),
                current: AtomicUsize::new(0),
                max_observed: AtomicUsize::new(0),
                upload_calls: AtomicUsize::new(0),
                uploaded_names: Mutex::new(Vec::new()),
                remote_known: Mutex::new(HashSet::new()),
                fail_names: Mutex::new(HashSet::new()),
                next_media_id: AtomicU64::new(100),
            })
        }

        fn mark_remote_known(&self, digest: &str) {
            self.remote_known.lock().insert(digest.to_string());
        }

        fn fail_on(&self, name: &str) {
            self.fail_names.lock().insert(name.to_string());
        }

        fn uploaded_names(&self) -> Vec<String> {
            self.uploaded_names.lock().clone()
        }
    }

    #[async_trait]
    impl MediaTransport for MockTransport {
        async fn check_media(
            &self,
            digest: &str,
            _size: u64,
        ) -> Result<Option<MediaRecord>, UploadError> {
            if self.remote_known.lock().contains(digest) {
                return Ok(Some(MediaRecord {
                    id: 9000,
                    thumbnail: Some("/thumb/9000.jpg".to_string()),
                }));
            }
            Ok(None)
        }

        async fn upload(
            &self,
            request: UploadRequest,
            progress: Option<ProgressFn>,
        ) -> Result<MediaRecord, UploadError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(now, Ordering::SeqCst);
            self.upload_calls.fetch_add(1, Ordering::SeqCst);

            if let Some(ref callback) = progress {
                callback(request.size / 2, request.size);
                callback(request.size, request.size);
            }

            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            if self.fail_names.lock().contains(&request.name) {
                return Err(UploadError::Server("mock 注入失败".to_string()));
            }

            self.uploaded_names.lock().push(request.name.clone());
            Ok(MediaRecord {
                id: self.next_media_id.fetch_add(1, Ordering::SeqCst),
                thumbnail: None,
            })
        }
    }

    /// 在临时目录写一个文件并包装成拖放条目
    fn drop_file(dir: &TempDir, name: &str, content: &[u8], mime: &str) -> DroppedFile {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        DroppedFile {
            path,
            name: name.to_string(),
            size: content.len() as u64,
            mime_type: mime.to_string(),
            last_modified: 1_700_000_000_000,
        }
    }

    fn test_config(max_concurrent: usize) -> UploadConfig {
        UploadConfig {
            max_concurrent_tasks: max_concurrent,
            sort_delay_ms: 50,
            progress_throttle_ms: 0,
            skip_hidden_files: false,
        }
    }

    /// 收集事件直到 BatchDrained（含），超时 panic
    async fn collect_until_drained(
        rx: &mut broadcast::Receiver<UploadEvent>,
    ) -> Vec<UploadEvent> {
        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("等待事件超时")
                .expect("事件通道关闭");
            let drained = matches!(event, UploadEvent::BatchDrained { .. });
            events.push(event);
            if drained {
                return events;
            }
        }
    }

    fn summary_of(events: &[UploadEvent]) -> BatchSummary {
        events
            .iter()
            .find_map(|e| match e {
                UploadEvent::BatchDrained { summary } => Some(summary.clone()),
                _ => None,
            })
            .expect("缺少 BatchDrained 事件")
    }

    #[tokio::test]
    async fn test_every_task_reports_terminal_exactly_once() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(10);
        let queue = UploadQueue::new(transport.clone(), test_config(3));
        let mut rx = queue.subscribe();

        let files: Vec<_> = (0..6)
            .map(|i| {
                drop_file(
                    &dir,
                    &format!("f{}.jpg", i),
                    format!("content-{}", i).as_bytes(),
                    "image/jpeg",
                )
            })
            .collect();
        let ids = queue.enqueue_batch(files);
        assert_eq!(ids.len(), 6);

        let events = collect_until_drained(&mut rx).await;

        // 每个任务恰好一个终态事件，不重复、不丢失
        for id in &ids {
            let terminal_count = events
                .iter()
                .filter(|e| e.is_terminal() && e.task_id() == Some(*id))
                .count();
            assert_eq!(terminal_count, 1, "任务 {} 的终态事件数不为 1", id);
        }

        let summary = summary_of(&events);
        assert_eq!(summary.uploaded_files, 6);
        assert_eq!(summary.failed_files, 0);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_cap() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(30);
        let queue = UploadQueue::new(transport.clone(), test_config(3));
        let mut rx = queue.subscribe();

        let files: Vec<_> = (0..8)
            .map(|i| {
                drop_file(
                    &dir,
                    &format!("burst{}.jpg", i),
                    format!("burst-{}", i).as_bytes(),
                    "image/jpeg",
                )
            })
            .collect();
        queue.enqueue_batch(files);

        let events = collect_until_drained(&mut rx).await;

        assert!(
            transport.max_observed.load(Ordering::SeqCst) <= 3,
            "并发高水位超过上限: {}",
            transport.max_observed.load(Ordering::SeqCst)
        );
        assert_eq!(summary_of(&events).uploaded_files, 8);
    }

    #[tokio::test]
    async fn test_intra_batch_duplicate_uploads_once_and_reuses_record() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(10);
        // 并发 1 保证权威任务先完成，重复任务接纳时记录已可复用
        let queue = UploadQueue::new(transport.clone(), test_config(1));
        let mut rx = queue.subscribe();

        let f1 = drop_file(&dir, "one.jpg", b"identical bytes", "image/jpeg");
        let f2 = drop_file(&dir, "two.jpg", b"identical bytes", "image/jpeg");
        let ids = queue.enqueue_batch(vec![f1, f2]);

        let events = collect_until_drained(&mut rx).await;

        // 恰好上传一次
        assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.uploaded_names(), vec!["one.jpg".to_string()]);

        // 第二个任务标记重复并复用首个任务的媒体记录
        let duplicate = events
            .iter()
            .find_map(|e| match e {
                UploadEvent::Duplicate {
                    task_id,
                    first_task_id,
                    media,
                } => Some((*task_id, *first_task_id, media.clone())),
                _ => None,
            })
            .expect("缺少 Duplicate 事件");
        assert_eq!(duplicate.0, ids[1]);
        assert_eq!(duplicate.1, ids[0]);
        let completed_media = events
            .iter()
            .find_map(|e| match e {
                UploadEvent::Completed { media, .. } => Some(media.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(duplicate.2.expect("重复任务应复用媒体记录"), completed_media);

        // 重复文件不计入上传数与字节数，单独计数
        let summary = summary_of(&events);
        assert_eq!(summary.uploaded_files, 1);
        assert_eq!(summary.uploaded_bytes, "identical bytes".len() as u64);
        assert_eq!(summary.duplicate_files, 1);
    }

    #[tokio::test]
    async fn test_remote_duplicate_skips_transfer_client() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(10);
        // echo -n 'known remote content' | sha1sum
        let file = drop_file(&dir, "known.jpg", b"known remote content", "image/jpeg");
        let digest = {
            use sha1::{Digest, Sha1};
            let mut hasher = Sha1::new();
            hasher.update(b"known remote content");
            hex::encode(hasher.finalize())
        };
        transport.mark_remote_known(&digest);

        let queue = UploadQueue::new(transport.clone(), test_config(3));
        let mut rx = queue.subscribe();
        queue.enqueue(file);

        let events = collect_until_drained(&mut rx).await;

        // 传输客户端从未被调用，任务直接以远端记录完成
        assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 0);
        let (media, reused) = events
            .iter()
            .find_map(|e| match e {
                UploadEvent::Completed { media, reused, .. } => Some((media.clone(), *reused)),
                _ => None,
            })
            .expect("缺少 Completed 事件");
        assert!(reused);
        assert_eq!(media.id, 9000);

        // 复用不产生传输字节
        let summary = summary_of(&events);
        assert_eq!(summary.uploaded_files, 1);
        assert_eq!(summary.uploaded_bytes, 0);
    }

    #[tokio::test]
    async fn test_failed_task_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(10);
        transport.fail_on("bad.jpg");

        let queue = UploadQueue::new(transport.clone(), test_config(2));
        let mut rx = queue.subscribe();

        let files = vec![
            drop_file(&dir, "ok1.jpg", b"ok one", "image/jpeg"),
            drop_file(&dir, "bad.jpg", b"will fail", "image/jpeg"),
            drop_file(&dir, "ok2.jpg", b"ok two", "image/jpeg"),
        ];
        queue.enqueue_batch(files);

        let events = collect_until_drained(&mut rx).await;

        let failed: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, UploadEvent::Failed { .. }))
            .collect();
        assert_eq!(failed.len(), 1);

        let summary = summary_of(&events);
        assert_eq!(summary.uploaded_files, 2);
        assert_eq!(summary.failed_files, 1);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_unreadable_file_fails_without_crashing_batch() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(5);
        let queue = UploadQueue::new(transport.clone(), test_config(2));
        let mut rx = queue.subscribe();

        let ok = drop_file(&dir, "ok.jpg", b"fine", "image/jpeg");
        // 选中后文件被删除的场景：路径存在于条目里但磁盘上没有
        let ghost = DroppedFile {
            path: dir.path().join("ghost.jpg"),
            name: "ghost.jpg".to_string(),
            size: 4,
            mime_type: "image/jpeg".to_string(),
            last_modified: 0,
        };
        queue.enqueue_batch(vec![ok, ghost]);

        let events = collect_until_drained(&mut rx).await;

        let error = events
            .iter()
            .find_map(|e| match e {
                UploadEvent::Failed { error, .. } => Some(error.clone()),
                _ => None,
            })
            .expect("缺少 Failed 事件");
        assert!(error.contains("文件读取失败"), "错误信息: {}", error);

        assert_eq!(summary_of(&events).uploaded_files, 1);
    }

    #[tokio::test]
    async fn test_drain_resets_state_for_next_batch() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(5);
        let queue = UploadQueue::new(transport.clone(), test_config(2));
        let mut rx = queue.subscribe();

        queue.enqueue(drop_file(&dir, "first.jpg", b"batch one", "image/jpeg"));
        let events = collect_until_drained(&mut rx).await;
        assert_eq!(summary_of(&events).uploaded_files, 1);
        assert!(queue.is_idle());

        // 注册表已清空：同内容文件在新批次里不是批内重复
        queue.enqueue(drop_file(&dir, "second.jpg", b"batch one", "image/jpeg"));
        let events = collect_until_drained(&mut rx).await;

        let summary = summary_of(&events);
        assert_eq!(summary.uploaded_files, 1, "新批次的计数必须从零开始");
        assert!(!events
            .iter()
            .any(|e| matches!(e, UploadEvent::Duplicate { .. })));
        assert_eq!(transport.upload_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_pending_tasks_admitted_in_sorted_order() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(60);
        let queue = UploadQueue::new(transport.clone(), test_config(1));
        let mut rx = queue.subscribe();

        // 占住唯一槽位，让后续文件全部留在排队区等待排序
        queue.enqueue(drop_file(&dir, "blocker.jpg", b"blocker", "image/jpeg"));

        // 逆序入队：other -> video -> image，同大小分组
        let files = vec![
            drop_file(&dir, "doc.pdf", b"doc bytes", "application/pdf"),
            drop_file(&dir, "clip.mp4", b"clip bytes", "video/mp4"),
            drop_file(&dir, "pic.jpg", b"pic bytes", "image/jpeg"),
        ];
        queue.enqueue_batch(files);

        collect_until_drained(&mut rx).await;

        // 接纳顺序遵循 (size_bucket, type_bucket) 升序
        assert_eq!(
            transport.uploaded_names(),
            vec![
                "blocker.jpg".to_string(),
                "pic.jpg".to_string(),
                "clip.mp4".to_string(),
                "doc.pdf".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_progress_events_carry_percent() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(5);
        let queue = UploadQueue::new(transport.clone(), test_config(1));
        let mut rx = queue.subscribe();

        queue.enqueue(drop_file(&dir, "p.jpg", b"0123456789", "image/jpeg"));
        let events = collect_until_drained(&mut rx).await;

        let percents: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                UploadEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect();
        assert!(!percents.is_empty(), "节流间隔为 0 时应有进度事件");
        assert!(percents.iter().all(|p| (0.0..=100.0).contains(p)));
    }

    #[tokio::test]
    async fn test_remove_pending_before_admission() {
        let dir = TempDir::new().unwrap();
        let transport = MockTransport::new(80);
        let queue = UploadQueue::new(transport.clone(), test_config(1));
        let mut rx = queue.subscribe();

        queue.enqueue(drop_file(&dir, "hold.jpg", b"hold", "image/jpeg"));
        let waiting_id = queue.enqueue(drop_file(&dir, "drop-me.jpg", b"drop", "image/jpeg"));

        assert!(queue.remove_pending(waiting_id));
        // 已不在排队区，二次移除失败
        assert!(!queue.remove_pending(waiting_id));

        collect_until_drained(&mut rx).await;

        // 被移除的任务从未到达传输层，也没有终态事件
        assert_eq!(transport.uploaded_names(), vec!["hold.jpg".to_string()]);
    }
}
