// 文件分类器
//
// 根据文件元数据推导大小分组和类型分组，仅作为排序键使用，
// 不参与任何上传资格判断

/// 根据文件大小计算大小分组（0..=3）
///
/// 阈值与前端展示分级保持一致：
/// 小于 1MB 的缩略图级文件排最前，超过 20MB 的视频/原片排最后
pub fn size_bucket(size: u64) -> u8 {
    match size {
        0..=999_999 => 0,
        1_000_000..=6_999_999 => 1,
        7_000_000..=19_999_999 => 2,
        _ => 3,
    }
}

/// 根据 MIME 顶层类型计算类型分组（0..=2）
///
/// image -> 0, video -> 1, 其他 -> 2
pub fn type_bucket(mime_type: &str) -> u8 {
    match mime_type.split('/').next().unwrap_or("") {
        "image" => 0,
        "video" => 1,
        _ => 2,
    }
}
