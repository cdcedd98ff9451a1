// 命令行入口
//
// 把参数里的文件/目录展开后灌入上传队列，订阅事件总线打印进度，
// 批次排空后退出；有失败任务时退出码非零

use anyhow::{Context, Result};
use photo_cloud_rust::{
    logging, AppConfig, CatalogClient, EntryScanner, ScanOptions, UploadEvent, UploadQueue,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// 默认配置文件路径
const CONFIG_PATH: &str = "config/app.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // 配置文件缺失或损坏时回落到默认配置
    let config = match AppConfig::load(CONFIG_PATH).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("未加载配置文件 ({}), 使用默认配置: {:#}", CONFIG_PATH, e);
            AppConfig::default()
        }
    };

    let _log_guard = logging::init_logging(&config.log);

    let paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("用法: photo-cloud-rust <文件或目录>...");
        std::process::exit(2);
    }

    // 展开拖放条目
    let scanner = EntryScanner::with_options(ScanOptions {
        skip_hidden: config.upload.skip_hidden_files,
        ..Default::default()
    });
    let files = scanner.expand(&paths).context("展开上传条目失败")?;

    if files.is_empty() {
        info!("没有可上传的文件");
        return Ok(());
    }

    let client = Arc::new(CatalogClient::new(&config.catalog).context("初始化目录客户端失败")?);
    let queue = UploadQueue::new(client, config.upload.clone());

    // 先订阅再入队，避免漏掉早期事件
    let mut rx = queue.subscribe();

    info!("开始上传 {} 个文件 -> {}", files.len(), config.catalog.base_url);
    queue.enqueue_batch(files);

    let failed_files = watch_events(&mut rx).await;

    if failed_files > 0 {
        warn!("{} 个文件上传失败", failed_files);
        std::process::exit(1);
    }

    Ok(())
}

/// 消费事件直到批次排空，返回失败文件数
async fn watch_events(rx: &mut broadcast::Receiver<UploadEvent>) -> u64 {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("事件消费滞后，丢弃 {} 条", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return 0,
        };

        match event {
            UploadEvent::Enqueued { task_id, name, .. } => {
                debug!("[{}] 入队: {}", task_id, name);
            }
            UploadEvent::Progress {
                task_id, percent, ..
            } => {
                debug!("[{}] 进度 {:.1}%", task_id, percent);
            }
            UploadEvent::Duplicate {
                task_id,
                first_task_id,
                ..
            } => {
                info!("[{}] 批内重复，跳过（与任务 {} 同内容）", task_id, first_task_id);
            }
            UploadEvent::Completed {
                task_id,
                media,
                reused,
                ..
            } => {
                if reused {
                    info!("[{}] 远端已存在，复用媒体 {}", task_id, media.id);
                } else {
                    info!("[{}] 上传完成，媒体 {}", task_id, media.id);
                }
            }
            UploadEvent::Failed { task_id, error } => {
                warn!("[{}] 失败: {}", task_id, error);
            }
            UploadEvent::BatchDrained { summary } => {
                info!(
                    "全部完成: {} 个文件, {} 字节, 失败 {}, 耗时 {:.1}s ({}/s)",
                    summary.uploaded_files,
                    summary.uploaded_bytes,
                    summary.failed_files,
                    summary.duration_ms as f64 / 1000.0,
                    summary.throughput_bps
                );
                return summary.failed_files;
            }
        }
    }
}
