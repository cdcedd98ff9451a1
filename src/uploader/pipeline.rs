// 单任务管线编排
//
// 摘要 -> 批内查重 -> 远端查重 -> 上传，显式顺序组合，
// 每一步返回 Result；任何一步出错都落入同一个漏斗，
// 由队列统一汇报失败并释放槽位，绝不冲出管线边界

use crate::catalog::{ProgressFn, UploadRequest};
use crate::error::UploadError;
use crate::events::ProgressThrottler;
use crate::uploader::dedup::LocalCheckResult;
use crate::uploader::digest::DigestEngine;
use crate::uploader::queue::{TaskOutcome, UploadQueue};
use crate::uploader::task::UploadTask;
use std::sync::Arc;
use tracing::debug;

/// 执行一个已获准进入管线的任务，直至终态汇报给队列
pub(crate) async fn run(queue: Arc<UploadQueue>, mut task: UploadTask) {
    let outcome = match run_stages(&queue, &mut task).await {
        Ok(outcome) => outcome,
        // 单一错误漏斗：摘要失败与上传失败在这里汇合，
        // 各自的错误信息已在构造时区分
        Err(error) => {
            task.mark_failed(error.to_string());
            TaskOutcome::Failed { error }
        }
    };

    queue.on_terminal(task, outcome);
}

/// 依次执行各阶段
async fn run_stages(
    queue: &Arc<UploadQueue>,
    task: &mut UploadTask,
) -> Result<TaskOutcome, UploadError> {
    // 1. 内容摘要（获准之后才算，排队任务不浪费算力）
    task.mark_digesting();
    let digest = DigestEngine::compute(&task.local_path).await?;
    task.digest = Some(digest.clone());

    // 2. 批内查重，先于远端查重（更便宜，批内重复无需网络往返）
    task.mark_checking_duplicate();
    if let LocalCheckResult::Duplicate {
        first_task_id,
        media,
    } = queue.check_local_duplicate(&digest, task.id)
    {
        task.mark_duplicate(media.clone());
        return Ok(TaskOutcome::Duplicate {
            first_task_id,
            media,
        });
    }

    // 3. 远端查重：库里已有同内容记录时直接带记录完成，不再上传
    if let Some(media) = queue.transport().check_media(&digest, task.size).await? {
        debug!(
            "远端已有同内容媒体: task={}, media={}, sha1={}",
            task.id, media.id, digest
        );
        task.mark_completed(media.clone());
        return Ok(TaskOutcome::Completed {
            media,
            reused: true,
        });
    }

    // 4. 上传
    task.mark_uploading();
    let progress = make_progress_callback(queue, task.id);
    let request = UploadRequest {
        local_path: task.local_path.clone(),
        name: task.name.clone(),
        size: task.size,
        mime_type: task.mime_type.clone(),
        last_modified: task.last_modified,
        digest: digest.clone(),
    };

    let media = queue.transport().upload(request, Some(progress)).await?;
    task.mark_completed(media.clone());

    Ok(TaskOutcome::Completed {
        media,
        reused: false,
    })
}

/// 组装进度回调
///
/// 节流器是任务级的；回调本身不感知队列细节
fn make_progress_callback(queue: &Arc<UploadQueue>, task_id: u64) -> ProgressFn {
    let queue = Arc::clone(queue);
    let throttler = ProgressThrottler::with_millis(queue.progress_throttle_ms());
    Arc::new(move |sent, total| {
        queue.on_progress(task_id, sent, total, &throttler);
    })
}
