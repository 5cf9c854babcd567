//! 同步相关的数据模型定义。
//!
//! 包含目录（TableOfContents）、章节条目（SubtitleRecord）、正文分段（SectionContent）
//! 以及一次同步的结果（SyncOutcome）。

use serde::{Deserialize, Serialize};

/// 站点目录页中的一话。`index` 是站点分配的序号，作为跨快照匹配的唯一键。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleRecord {
    pub index: String,
    pub href: String,
    #[serde(default)]
    pub chapter: String,
    pub subtitle: String,
    pub file_subtitle: String,
    #[serde(default)]
    pub subdate: String,
    #[serde(default)]
    pub subupdate: String,
}

impl SubtitleRecord {
    /// `<index> <file_subtitle>`，章节文件与原始数据文件共用的主干名。
    pub fn file_stem(&self) -> String {
        format!("{} {}", self.index, self.file_subtitle)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOfContents {
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub toc_url: String,
    #[serde(default)]
    pub story: String,
    #[serde(default)]
    pub subtitles: Vec<SubtitleRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionContent {
    pub introduction: String,
    pub body: String,
    pub postscript: String,
}

/// 落盘的单话记录：目录条目 + 分段正文。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRecord {
    #[serde(flatten)]
    pub info: SubtitleRecord,
    pub element: SectionContent,
}

/// 作品类型：连载 / 短篇。数值与元数据 API 的 `noveltype` 保持一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NovelType {
    Serial,
    ShortStory,
}

impl NovelType {
    pub fn from_code(code: u8) -> Self {
        if code == 2 {
            NovelType::ShortStory
        } else {
            NovelType::Serial
        }
    }

    pub fn code(self) -> u8 {
        match self {
            NovelType::Serial => 1,
            NovelType::ShortStory => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Failed,
    Canceled,
    NoChange,
    Ok,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// 忽略差分检测，全部重新下载。
    pub force: bool,
    /// 由 `download` 命令发起（只影响“新着”标记的显示）。
    pub from_download: bool,
}

/// 与已保存内容比较后的单话状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterStatus {
    New,
    Updated,
    Unchanged,
}
