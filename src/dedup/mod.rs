//! 链接去重器 (Deduplicator)
//!
//! 按语义指纹保留首次出现的链接，输出保持输入顺序。

pub mod fingerprint;

use indexmap::IndexMap;
use tracing::info;

/// 去重统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    pub input: usize,
    pub kept: usize,
    pub dropped: usize,
}

/// 对链接序列去重
///
/// 指纹缺失的链接无法判定身份，直接丢弃。
pub fn dedupe(links: Vec<String>) -> (Vec<String>, DedupReport) {
    let input = links.len();
    let mut unique: IndexMap<String, String> = IndexMap::new();

    for link in links {
        let Some(fgp) = fingerprint::generate(&link) else {
            continue;
        };
        unique.entry(fgp).or_insert(link);
    }

    let kept = unique.len();
    let report = DedupReport {
        input,
        kept,
        dropped: input - kept,
    };
    info!(
        "Deduplication report: processed {}, kept {} unique, removed {}",
        report.input, report.kept, report.dropped
    );

    (unique.into_values().collect(), report)
}
