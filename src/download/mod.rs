//! 同步流程模块入口。
//!
//! 子模块：
//! - `models`       ：数据模型（TableOfContents / SubtitleRecord / SectionRecord 等）
//! - `update_check` ：新旧目录差分
//! - `digest`       ：话数减少时的摘要确认
//! - `cache`        ：差分缓存快照
//! - `progress`     ：CLI 进度条
//! - `downloader`   ：单个作品的同步主流程

pub mod cache;
pub mod digest;
pub mod downloader;
pub mod models;
pub(crate) mod progress;
pub mod update_check;
