// 拖放条目展开
//
// 负责:
// - 把拖入的文件/目录列表递归展开成单个文件条目
// - 每次调用做一次完整遍历，条目各自独立解析
// - 保持发现顺序，它是排序时同分组文件的稳定 tiebreak

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 展开得到的文件条目
#[derive(Debug, Clone)]
pub struct DroppedFile {
    /// 本地文件路径
    pub path: PathBuf,
    /// 文件名
    pub name: String,
    /// 文件大小（字节）
    pub size: u64,
    /// MIME 类型（按扩展名推断）
    pub mime_type: String,
    /// 最后修改时间 (Unix 毫秒)
    pub last_modified: i64,
}

/// 展开配置
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// 是否跟随符号链接
    pub follow_symlinks: bool,
    /// 跳过隐藏文件（以.开头的文件和文件夹）
    pub skip_hidden: bool,
}

/// 条目扫描器
pub struct EntryScanner {
    options: ScanOptions,
}

impl EntryScanner {
    /// 创建默认配置的扫描器
    pub fn new() -> Self {
        Self {
            options: ScanOptions::default(),
        }
    }

    /// 创建自定义配置的扫描器
    pub fn with_options(options: ScanOptions) -> Self {
        Self { options }
    }

    /// 展开一组拖放路径
    ///
    /// 文件直接解析；目录递归展开。单个条目的元数据读取失败只记
    /// 警告并跳过（条目之间互相独立），根路径不存在则返回错误。
    pub fn expand<P: AsRef<Path>>(&self, roots: &[P]) -> Result<Vec<DroppedFile>> {
        let mut files = Vec::new();

        for root in roots {
            let root = root.as_ref();
            if !root.exists() {
                anyhow::bail!("路径不存在: {}", root.display());
            }

            if root.is_dir() {
                self.expand_dir(root, &mut files)?;
            } else {
                self.resolve_file(root, &mut files);
            }
        }

        info!("条目展开完成: {} 个文件", files.len());

        Ok(files)
    }

    /// 递归展开目录
    fn expand_dir(&self, dir: &Path, files: &mut Vec<DroppedFile>) -> Result<()> {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("读取目录失败: {}", dir.display()))?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("读取目录条目失败: {}, 错误: {}", dir.display(), e);
                    continue;
                }
            };

            let path = entry.path();

            // 跳过隐藏文件
            if self.options.skip_hidden {
                if let Some(name) = entry.file_name().to_str() {
                    if name.starts_with('.') {
                        debug!("跳过隐藏条目: {}", path.display());
                        continue;
                    }
                }
            }

            let metadata = if self.options.follow_symlinks {
                std::fs::metadata(&path)
            } else {
                std::fs::symlink_metadata(&path)
            };

            let metadata = match metadata {
                Ok(m) => m,
                Err(e) => {
                    warn!("读取元数据失败: {}, 错误: {}", path.display(), e);
                    continue;
                }
            };

            if metadata.is_dir() {
                self.expand_dir(&path, files)?;
            } else if metadata.is_file() {
                self.resolve_file(&path, files);
            } else {
                debug!("跳过非常规文件: {}", path.display());
            }
        }

        Ok(())
    }

    /// 把单个文件路径解析为条目
    fn resolve_file(&self, path: &Path, files: &mut Vec<DroppedFile>) {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!("读取文件元数据失败: {}, 错误: {}", path.display(), e);
                return;
            }
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        let last_modified = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
            .unwrap_or(0);

        debug!(
            "展开文件: {} ({} bytes, {})",
            path.display(),
            metadata.len(),
            mime_type
        );

        files.push(DroppedFile {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            mime_type,
            last_modified,
        });
    }
}

impl Default for EntryScanner {
    fn default() -> Self {
        Self::new()
    }
}
