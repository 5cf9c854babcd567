//! 作品目录库：记录已镜像的作品及其最近一次更新。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub mod yaml_store;

pub use yaml_store::YamlCatalog;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid catalog {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("no catalog entry with id {0}")]
    UnknownId(u64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    #[serde(default)]
    pub author: String,
    pub title: String,
    pub file_title: String,
    pub toc_url: String,
    pub sitename: String,
    /// 1 = 连载，2 = 短篇。
    #[serde(default = "default_novel_type")]
    pub novel_type: u8,
    #[serde(default)]
    pub last_update: String,
    /// 最近一次出现新话（或首次登记）的时间。
    #[serde(default)]
    pub new_arrivals_date: String,
    #[serde(default)]
    pub frozen: bool,
}

fn default_novel_type() -> u8 {
    1
}

pub trait CatalogGateway {
    fn get(&self, id: u64) -> Option<&CatalogEntry>;
    fn find_by_toc_url(&self, toc_url: &str) -> Option<&CatalogEntry>;
    fn find_by_title(&self, title: &str) -> Option<&CatalogEntry>;
    /// 当前最大 id + 1；空库为 0。
    fn new_id(&self) -> u64;
    /// 按 id 升序。
    fn entries(&self) -> Vec<&CatalogEntry>;
    fn upsert(&mut self, entry: CatalogEntry);
    fn delete(&mut self, id: u64) -> Option<CatalogEntry>;
    fn save(&self) -> Result<(), CatalogError>;

    /// 冻结后 `update` 会跳过该作品。立即保存。
    fn freeze(&mut self, id: u64) -> Result<(), CatalogError>;
}

/// 目录库中使用的时间戳（RFC 3339，本地时区）。
pub fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn timestamps_are_rfc3339() {
        assert_eq!(
            timestamp(datetime!(2014-03-05 07:08:09 +09:00)),
            "2014-03-05T07:08:09+09:00"
        );
    }

    #[test]
    fn entry_defaults_for_older_records() {
        let entry: CatalogEntry = serde_yaml::from_str(
            "id: 3\ntitle: t\nfile_title: t\ntoc_url: https://example.com/n1/\nsitename: s\n",
        )
        .unwrap();
        assert_eq!(entry.novel_type, 1);
        assert!(!entry.frozen);
        assert!(entry.new_arrivals_date.is_empty());
    }
}
