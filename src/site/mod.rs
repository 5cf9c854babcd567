//! 站点定义：从目标 URL 解析作品定位信息，并从页面文本中抽取字段。

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;

pub mod registry;
pub mod setting;

pub use registry::SiteRegistry;
pub use setting::RegexSiteProfile;

#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid site definition {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("site `{site}`: invalid pattern `{field}`: {source}")]
    Regex {
        site: String,
        field: &'static str,
        source: regex::Error,
    },
    #[error("no site definition found in {0}")]
    NoSites(PathBuf),
}

/// 从目标 URL 解析出的作品定位值：`name`、`domain`、`top_url`、`ncode`、`toc_url`
/// 以及站点定义中的其他命名捕获。目录页抽取到的字段（如 `tcode`）也会合并进来。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkLocator {
    values: BTreeMap<String, String>,
}

impl WorkLocator {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 不存在时返回空字符串。
    pub fn value(&self, key: &str) -> &str {
        self.get(key).unwrap_or("")
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn toc_url(&self) -> &str {
        self.value("toc_url")
    }

    pub fn top_url(&self) -> &str {
        self.value("top_url")
    }

    pub fn ncode(&self) -> &str {
        self.value("ncode")
    }

    pub fn domain(&self) -> &str {
        self.value("domain")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteField {
    Title,
    Author,
    Story,
    Tcode,
    Subtitles,
}

impl SiteField {
    pub fn key(self) -> &'static str {
        match self {
            SiteField::Title => "title",
            SiteField::Author => "author",
            SiteField::Story => "story",
            SiteField::Tcode => "tcode",
            SiteField::Subtitles => "subtitles",
        }
    }
}

/// 一次字段匹配的命名捕获；未参与匹配的分组不出现。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMatch {
    pub values: HashMap<String, String>,
    /// 匹配结束位置（字节偏移）。
    pub end: usize,
}

impl FieldMatch {
    pub fn value(&self, key: &str) -> &str {
        self.values.get(key).map(String::as_str).unwrap_or("")
    }
}

pub trait SiteProfile {
    fn name(&self) -> &str;
    /// 页面的默认字符集。
    fn encoding(&self) -> &str;
    fn confirm_over18(&self) -> bool;
    fn narou_api_url(&self) -> Option<&str>;

    /// URL 不属于本站点时返回 `None`。
    fn locate(&self, url: &str) -> Option<WorkLocator>;

    /// 字段的第一个匹配；站点未定义该字段时返回 `Ok(None)`。
    fn match_field(
        &self,
        field: SiteField,
        text: &str,
        locator: &WorkLocator,
    ) -> Result<Option<FieldMatch>, SiteError>;

    /// 依次取出字段的所有不重叠匹配（用于各话列表）。
    fn match_all(
        &self,
        field: SiteField,
        text: &str,
        locator: &WorkLocator,
    ) -> Result<Vec<FieldMatch>, SiteError>;

    /// 文本下载地址；站点不支持时返回 `None`。
    fn txtdownload_url(&self, values: &BTreeMap<String, String>) -> Option<String>;
}
