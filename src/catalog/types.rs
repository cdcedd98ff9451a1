// 媒体目录接口类型定义

use serde::{Deserialize, Serialize};

/// 媒体记录
///
/// 服务端入库后的媒体行。Media.id 是硬标识，展示层不需要再用
/// 摘要等其他唯一值区分
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRecord {
    /// 媒体 ID
    pub id: u64,
    /// 缩略图地址（后台处理完成前可能为空）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// 查重接口响应: `{ "media": <record|null> }`
#[derive(Debug, Clone, Deserialize)]
pub struct MediaCheckResponse {
    pub media: Option<MediaRecord>,
}

/// 上传接口响应: 成功 `{ "media": <record> }`，失败 `{ "error": <string> }`
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub media: Option<MediaRecord>,
    #[serde(default)]
    pub error: Option<String>,
}
