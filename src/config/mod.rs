// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 媒体目录服务配置
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// 上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 媒体目录服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// 目录服务基地址
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 会话 Cookie (sessionid)
    #[serde(default)]
    pub session_cookie: Option<String>,
    /// CSRF 令牌 (csrftoken Cookie 值)
    #[serde(default)]
    pub csrf_token: Option<String>,
    /// 请求超时（秒）。管线自身不设截止时间，超时完全交给传输层
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 最大同时上传文件数
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// 排序去抖的补排延迟（毫秒）
    #[serde(default = "default_sort_delay_ms")]
    pub sort_delay_ms: u64,
    /// 进度事件节流间隔（毫秒）
    #[serde(default = "default_progress_throttle_ms")]
    pub progress_throttle_ms: u64,
    /// 展开文件夹时是否跳过隐藏文件（以.开头的文件/文件夹）
    #[serde(default)]
    pub skip_hidden_files: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default)]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent_tasks() -> usize {
    3
}

fn default_sort_delay_ms() -> u64 {
    500
}

fn default_progress_throttle_ms() -> u64 {
    200
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: None,
            csrf_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            sort_delay_ms: default_sort_delay_ms(),
            progress_throttle_ms: default_progress_throttle_ms(),
            skip_hidden_files: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从 TOML 文件加载配置
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .context(format!("读取配置文件失败: {:?}", path))?;

        let config: AppConfig =
            toml::from_str(&content).context(format!("解析配置文件失败: {:?}", path))?;

        Ok(config)
    }

    /// 保存配置到 TOML 文件
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("创建配置目录失败: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content)
            .await
            .context(format!("写入配置文件失败: {:?}", path))?;

        Ok(())
    }
}
