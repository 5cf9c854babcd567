//! 目录差分：找出需要（重新）下载的话。
//!
//! 新旧目录按 `index` 匹配，而不是按数组位置：站点插入或删除话数时位置会整体偏移，
//! 但 `index` 不变。

use std::collections::HashMap;

use super::models::SubtitleRecord;

/// 返回 `latest` 中需要下载的条目，保持 `latest` 的顺序。
///
/// - 没有旧目录时（首次下载）返回全部。
/// - 旧目录中不存在同 `index` 的条目 → 新话。
/// - 标题或章名不同 → 需要更新。
/// - 更新时间：旧值为空时，新值非空即视为更新；否则新值按字符串比较严格大于旧值才视为更新。
pub fn update_body_check(
    old: Option<&[SubtitleRecord]>,
    latest: &[SubtitleRecord],
) -> Vec<SubtitleRecord> {
    let Some(old) = old else {
        return latest.to_vec();
    };

    // rev(): on a duplicated index the earliest entry wins.
    let by_index: HashMap<&str, &SubtitleRecord> =
        old.iter().rev().map(|s| (s.index.as_str(), s)).collect();

    latest
        .iter()
        .filter(|latest| match by_index.get(latest.index.as_str()) {
            None => true,
            Some(old) => is_changed(old, latest),
        })
        .cloned()
        .collect()
}

fn is_changed(old: &SubtitleRecord, latest: &SubtitleRecord) -> bool {
    if old.subtitle != latest.subtitle {
        return true;
    }
    if old.chapter != latest.chapter {
        return true;
    }
    if old.subupdate.is_empty() {
        return !latest.subupdate.is_empty();
    }
    // Timestamps stay strings; zero-padded site formats sort correctly.
    latest.subupdate > old.subupdate
}
