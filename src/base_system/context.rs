//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息，以及文件名清理函数。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::book_parser::parser::{
    DEFAULT_INTRODUCTION_MARKER, DEFAULT_POSTSCRIPT_MARKER, SectionMarkers,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 路径配置
    #[serde(default)]
    pub save_path: String,
    #[serde(default = "default_site_setting_dir")]
    pub site_setting_dir: String,
    #[serde(default = "default_preset_dir")]
    pub preset_dir: String,

    // 网络配置
    #[serde(default = "default_download_interval")]
    pub download_interval: f64,
    #[serde(default = "default_retry_max_for_503")]
    pub retry_max_for_503: u32,
    #[serde(default = "default_retry_wait_for_503")]
    pub retry_wait_for_503: u64,
    #[serde(default = "default_burst_limited_domain")]
    pub burst_limited_domain: String,
    #[serde(default = "default_burst_pause")]
    pub burst_pause: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 正文分段
    #[serde(default = "default_introduction_marker")]
    pub introduction_marker: String,
    #[serde(default = "default_postscript_marker")]
    pub postscript_marker: String,

    // 年龄确认（留空表示每次询问）
    #[serde(default)]
    pub over18: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_path: String::new(),
            site_setting_dir: default_site_setting_dir(),
            preset_dir: default_preset_dir(),
            download_interval: default_download_interval(),
            retry_max_for_503: default_retry_max_for_503(),
            retry_wait_for_503: default_retry_wait_for_503(),
            burst_limited_domain: default_burst_limited_domain(),
            burst_pause: default_burst_pause(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            introduction_marker: default_introduction_marker(),
            postscript_marker: default_postscript_marker(),
            over18: None,
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 13] = [
            FieldMeta {
                name: "save_path",
                description: "作品保存根目录（留空为当前目录）",
            },
            FieldMeta {
                name: "site_setting_dir",
                description: "站点定义文件（*.yaml）所在目录",
            },
            FieldMeta {
                name: "preset_dir",
                description: "作品初始设置的预设目录，按 <domain>/<ncode>/ 查找",
            },
            FieldMeta {
                name: "download_interval",
                description: "每话下载间隔（秒），负数按 0 处理",
            },
            FieldMeta {
                name: "retry_max_for_503",
                description: "遇到 503 时的最大重试次数",
            },
            FieldMeta {
                name: "retry_wait_for_503",
                description: "遇到 503 时每次重试前的等待时间（秒）",
            },
            FieldMeta {
                name: "burst_limited_domain",
                description: "有连续下载限制的站点域名（每 10 话强制等待）",
            },
            FieldMeta {
                name: "burst_pause",
                description: "连续下载限制站点每 10 话的等待时间（秒）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "introduction_marker",
                description: "前書き分隔行的正则",
            },
            FieldMeta {
                name: "postscript_marker",
                description: "後書き分隔行的正则",
            },
            FieldMeta {
                name: "over18",
                description: "年龄确认结果（留空则在需要时询问）",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn section_markers(&self) -> Result<SectionMarkers, regex::Error> {
        SectionMarkers::new(&self.introduction_marker, &self.postscript_marker)
    }
}

/// 把标题转换为可安全用作文件名的形式：半角禁用字符替换为全角，去掉结尾的空格和点。
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|ch| match ch {
            ':' => '：',
            '"' => '”',
            '<' => '＜',
            '>' => '＞',
            '/' => '／',
            '\\' => '￥',
            '|' => '｜',
            '?' => '？',
            '*' => '＊',
            c if (c as u32) < 32 => replacement.chars().next().unwrap_or('_'),
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    let upper = cleaned.to_uppercase();
    if RESERVED.contains(&upper.as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符中间截断导致 panic
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
        if cleaned.is_empty() {
            cleaned.push_str("unnamed");
        }
    }

    cleaned
}

fn default_site_setting_dir() -> String {
    "webnovel".to_string()
}

fn default_preset_dir() -> String {
    "preset".to_string()
}

fn default_download_interval() -> f64 {
    0.0
}

fn default_retry_max_for_503() -> u32 {
    5
}

fn default_retry_wait_for_503() -> u64 {
    20
}

fn default_burst_limited_domain() -> String {
    "syosetu.com".to_string()
}

fn default_burst_pause() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36".to_string()
}

fn default_introduction_marker() -> String {
    DEFAULT_INTRODUCTION_MARKER.to_string()
}

fn default_postscript_marker() -> String {
    DEFAULT_POSTSCRIPT_MARKER.to_string()
}
