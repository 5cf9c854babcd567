//! 单个作品的一次同步：取目录 → 差分 → 摘要确认 → 逐话下载 → 提交。
//!
//! 提交顺序：各话文件先写，目录库记录其次，`toc.yaml` 最后。中途失败或中断时旧目录保持不变，
//! 下次运行会重新检测出同样的差分。

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::cache::DiffCache;
use super::digest::{DecisionInput, DigestState, run_digest_guard};
use super::models::{
    ChapterStatus, NovelType, SectionRecord, SubtitleRecord, SyncOptions, SyncOutcome,
    TableOfContents,
};
use super::progress::ProgressReporter;
use super::update_check::update_body_check;
use crate::base_system::book_paths;
use crate::base_system::context::{Config, safe_fs_name};
use crate::base_system::interrupt::Interrupt;
use crate::base_system::scaffold::{LayoutScaffold, ScaffoldContext};
use crate::book_parser::book_manager::{BookManager, StoreError};
use crate::book_parser::html_utils::clean_story;
use crate::book_parser::parser::{ContentParser, SectionMarkers};
use crate::catalog::{CatalogEntry, CatalogError, CatalogGateway, now_local, timestamp};
use crate::network_parser::network::{FetchError, PageFetch};
use crate::site::{SiteError, SiteField, SiteProfile, SiteRegistry, WorkLocator};
use crate::third_party::metadata_api::{
    FIELDS_NOVEL_TYPE, FIELDS_SHORT_STORY, MetadataApi, MetadataError,
};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("下载已中断")]
    Interrupted,
    #[error("不支持的网址：{0}")]
    UnsupportedUrl(String),
    #[error("找不到指定的作品：{0}")]
    UnknownTarget(String),
    #[error("找不到站点定义：{0}")]
    UnknownSite(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// 同步时需要的全部用户交互：摘要确认与年龄确认。
pub trait Interaction: DecisionInput {
    /// 返回是否继续。记住答案由实现负责。
    fn confirm_over18(&mut self) -> io::Result<bool>;
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub download_interval: Duration,
    pub burst_limited_domain: String,
    pub burst_pause: Duration,
    pub markers: SectionMarkers,
    pub show_progress: bool,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Result<Self, regex::Error> {
        Ok(Self {
            download_interval: interval_from_secs(config.download_interval),
            burst_limited_domain: config.burst_limited_domain.clone(),
            burst_pause: Duration::from_secs(config.burst_pause),
            markers: config.section_markers()?,
            show_progress: true,
        })
    }
}

/// 负数与 NaN 按 0 处理，超出 `Duration` 范围的值取 `Duration::MAX`。
fn interval_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// 第 `i` 话（从 0 开始）下载前的等待时间。
///
/// 有连续下载限制的站点每 10 话强制等待 `burst_pause`，取代普通间隔。
pub fn politeness_delay(i: usize, domain: &str, settings: &SyncSettings) -> Duration {
    if i == 0 {
        return Duration::ZERO;
    }
    let limited =
        !settings.burst_limited_domain.is_empty() && domain.contains(&settings.burst_limited_domain);
    if limited && i >= 10 && i % 10 == 0 {
        settings.burst_pause
    } else {
        settings.download_interval
    }
}

/// 各话的下载地址：有文本下载码时用文本下载，`/` 开头相对站点首页，否则相对目录页。
pub fn chapter_url(
    site: &dyn SiteProfile,
    locator: &WorkLocator,
    subtitle: &SubtitleRecord,
) -> String {
    if !locator.value("tcode").is_empty() {
        let mut values: BTreeMap<String, String> = locator.values().clone();
        values.insert("index".into(), subtitle.index.clone());
        values.insert("href".into(), subtitle.href.clone());
        if let Some(url) = site.txtdownload_url(&values) {
            return url;
        }
    }
    if subtitle.href.starts_with('/') {
        format!("{}{}", locator.top_url(), subtitle.href)
    } else {
        format!("{}{}", locator.toc_url(), subtitle.href)
    }
}

/// 把命令行目标（URL / 目录库 id / 标题）解析为站点与定位信息。
pub fn resolve_target(
    registry: &SiteRegistry,
    catalog: &dyn CatalogGateway,
    target: &str,
) -> Result<(Arc<dyn SiteProfile>, WorkLocator), SyncError> {
    let target = target.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        return registry
            .find_by_url(target)
            .ok_or_else(|| SyncError::UnsupportedUrl(target.to_string()));
    }
    let entry = find_entry(registry, catalog, target)
        .ok_or_else(|| SyncError::UnknownTarget(target.to_string()))?;
    let site = registry
        .find_by_name(&entry.sitename)
        .ok_or_else(|| SyncError::UnknownSite(entry.sitename.clone()))?;
    let locator = site
        .locate(&entry.toc_url)
        .ok_or_else(|| SyncError::UnsupportedUrl(entry.toc_url.clone()))?;
    Ok((site, locator))
}

/// 在目录库中查找目标；URL 先解析出目录页地址再按地址查找。
pub fn find_entry(
    registry: &SiteRegistry,
    catalog: &dyn CatalogGateway,
    target: &str,
) -> Option<CatalogEntry> {
    let target = target.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        let (_, locator) = registry.find_by_url(target)?;
        return catalog.find_by_toc_url(locator.toc_url()).cloned();
    }
    if !target.is_empty() && target.chars().all(|c| c.is_ascii_digit()) {
        return target.parse().ok().and_then(|id| catalog.get(id)).cloned();
    }
    catalog.find_by_title(target).cloned()
}

struct LatestToc {
    toc: TableOfContents,
    novel_type: NovelType,
}

pub struct SyncOrchestrator<'a> {
    pub registry: &'a SiteRegistry,
    pub catalog: &'a mut dyn CatalogGateway,
    pub fetcher: &'a dyn PageFetch,
    pub metadata: &'a dyn MetadataApi,
    pub scaffold: &'a dyn LayoutScaffold,
    pub interaction: &'a mut dyn Interaction,
    pub interrupt: Interrupt,
    pub settings: SyncSettings,
    pub archive_root: PathBuf,
}

impl SyncOrchestrator<'_> {
    pub fn start_download(
        &mut self,
        site: Arc<dyn SiteProfile>,
        locator: WorkLocator,
        options: SyncOptions,
    ) -> Result<SyncOutcome, SyncError> {
        let (site, mut locator, source) = match self.fetch_toc_page(site, locator)? {
            Some(found) => found,
            None => return Ok(SyncOutcome::Failed),
        };

        let Some(latest) = self.parse_toc(site.as_ref(), &mut locator, &source)? else {
            error!(target: "sync", "{} 的目录数据解析失败", locator.toc_url());
            return Ok(SyncOutcome::Failed);
        };
        let LatestToc { toc, novel_type } = latest;

        if site.confirm_over18() && !self.interaction.confirm_over18()? {
            info!(target: "sync", "该作品仅限 18 岁以上阅读，已取消下载");
            return Ok(SyncOutcome::Canceled);
        }

        let file_title = book_paths::file_title(&toc.title);
        let book = BookManager::new(book_paths::work_dir(
            &self.archive_root,
            site.name(),
            &file_title,
        ));
        let old_toc = book.load_toc()?;
        let mut new_arrivals = false;
        if old_toc.is_none() {
            new_arrivals = true;
            self.scaffold.init_work_dir(&ScaffoldContext {
                work_dir: book.work_dir(),
                domain: locator.domain(),
                ncode: locator.ncode(),
                title: &toc.title,
                toc_url: &toc.toc_url,
            })?;
        }
        book.init_raw_dir()?;

        let targets = if options.force {
            toc.subtitles.clone()
        } else {
            update_body_check(
                old_toc.as_ref().map(|t| t.subtitles.as_slice()),
                &toc.subtitles,
            )
        };
        if targets.is_empty() {
            info!(target: "sync", "《{}》没有更新", toc.title);
            return Ok(SyncOutcome::NoChange);
        }

        if !options.force
            && let Some(old) = old_toc.as_ref()
        {
            let state = run_digest_guard(&old.subtitles, &toc, &mut *self.interaction)?;
            if state == DigestState::CancelAndFreeze {
                self.freeze_work(&toc.toc_url)?;
            }
            if state.blocks_update() {
                info!(target: "sync", "《{}》的更新已取消", toc.title);
                return Ok(SyncOutcome::Canceled);
            }
        }

        let mut cache = DiffCache::begin(book.work_dir(), old_toc.is_some(), now_local())?;
        let written = match self.download_sections(
            site.as_ref(),
            &locator,
            &book,
            &mut cache,
            &targets,
            novel_type,
            options,
            &mut new_arrivals,
        ) {
            Ok(written) => written,
            Err(SyncError::Interrupted) => {
                cache.discard()?;
                warn!(target: "sync", "下载已中断，本次差分缓存已删除，目录未更新");
                return Err(SyncError::Interrupted);
            }
            Err(err) => {
                // 已写入的话保留，对应的旧版本也留在快照中。
                cache.discard_if_empty(true)?;
                return Err(err);
            }
        };
        cache.discard_if_empty(written > 0)?;
        if written == 0 {
            return Ok(SyncOutcome::NoChange);
        }

        self.update_catalog(site.as_ref(), &toc, &file_title, novel_type, new_arrivals)?;
        book.save_toc(&toc)?;
        info!(target: "sync", "《{}》更新完成：{} 话", toc.title, written);
        Ok(SyncOutcome::Ok)
    }

    /// 取目录页。404 或 503 重试耗尽时返回 `None`（本次失败）。
    /// 被重定向时按最终地址重新解析站点。
    fn fetch_toc_page(
        &self,
        site: Arc<dyn SiteProfile>,
        locator: WorkLocator,
    ) -> Result<Option<(Arc<dyn SiteProfile>, WorkLocator, String)>, SyncError> {
        let toc_url = locator.toc_url().to_string();
        let fetched = match self.fetcher.fetch(&toc_url, site.encoding()) {
            Ok(fetched) => fetched,
            Err(err @ FetchError::NotFound { .. }) => {
                error!(target: "sync", "{}（作品可能已被删除）", err);
                return Ok(None);
            }
            Err(err @ FetchError::RetriesExhausted { .. }) => {
                error!(target: "sync", "{} 的目录数据获取失败：{}", toc_url, err);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let Some(to) = fetched.redirected_to else {
            return Ok(Some((site, locator, fetched.text)));
        };
        match self.registry.find_by_url(&to) {
            Some((site, locator)) => {
                info!(target: "sync", "目录页被重定向到 {}，按 {} 重新解析", to, site.name());
                Ok(Some((site, locator, fetched.text)))
            }
            None => {
                error!(target: "sync", "目录页被重定向到不支持的网址：{}", to);
                Ok(None)
            }
        }
    }

    fn parse_toc(
        &self,
        site: &dyn SiteProfile,
        locator: &mut WorkLocator,
        source: &str,
    ) -> Result<Option<LatestToc>, SyncError> {
        let Some(title_match) = site.match_field(SiteField::Title, source, locator)? else {
            return Ok(None);
        };
        let title = title_match.value("title").trim().to_string();
        locator.insert("title", title.clone());
        for field in [SiteField::Author, SiteField::Story, SiteField::Tcode] {
            if let Some(found) = site.match_field(field, source, locator)? {
                locator.insert(field.key(), found.value(field.key()));
            }
        }
        let mut story = locator.value("story").to_string();

        let novel_type = match site.narou_api_url() {
            Some(api_url) => match self.catalog.find_by_toc_url(locator.toc_url()) {
                Some(entry) => NovelType::from_code(entry.novel_type),
                None => {
                    let meta = self.metadata.fetch(api_url, locator.ncode(), FIELDS_NOVEL_TYPE)?;
                    NovelType::from_code(meta.novel_type.unwrap_or(1))
                }
            },
            None => NovelType::Serial,
        };

        let subtitles = match (novel_type, site.narou_api_url()) {
            (NovelType::ShortStory, Some(api_url)) => {
                let meta = self
                    .metadata
                    .fetch(api_url, locator.ncode(), FIELDS_SHORT_STORY)?;
                story = meta.story.clone().unwrap_or_default();
                vec![SubtitleRecord {
                    index: "1".into(),
                    href: "/".into(),
                    chapter: String::new(),
                    subtitle: title.clone(),
                    file_subtitle: safe_fs_name(&title, "_", 120),
                    subdate: meta.general_firstup.unwrap_or_default(),
                    subupdate: meta.novelupdated_at.unwrap_or_default(),
                }]
            }
            _ => site
                .match_all(SiteField::Subtitles, source, locator)?
                .into_iter()
                .map(|m| SubtitleRecord {
                    index: m.value("index").to_string(),
                    href: m.value("href").to_string(),
                    chapter: m.value("chapter").trim().to_string(),
                    subtitle: m.value("subtitle").trim().to_string(),
                    file_subtitle: safe_fs_name(m.value("subtitle").trim(), "_", 120),
                    subdate: m.value("subdate").trim().to_string(),
                    subupdate: m.value("subupdate").trim().to_string(),
                })
                .collect(),
        };

        Ok(Some(LatestToc {
            toc: TableOfContents {
                title,
                author: locator.value("author").trim().to_string(),
                toc_url: locator.toc_url().to_string(),
                story: clean_story(&story),
                subtitles,
            },
            novel_type,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn download_sections(
        &self,
        site: &dyn SiteProfile,
        locator: &WorkLocator,
        book: &BookManager,
        cache: &mut DiffCache,
        targets: &[SubtitleRecord],
        novel_type: NovelType,
        options: SyncOptions,
        new_arrivals: &mut bool,
    ) -> Result<usize, SyncError> {
        let total = targets.len();
        let mut progress = ProgressReporter::new(total, self.settings.show_progress);
        let mut written = 0usize;
        info!(target: "sync", total, "开始下载：{}", locator.value("title"));

        for (i, subtitle) in targets.iter().enumerate() {
            if self.interrupt.is_set() {
                return Err(SyncError::Interrupted);
            }
            let delay = politeness_delay(i, locator.domain(), &self.settings);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            let url = chapter_url(site, locator, subtitle);
            let text = self.fetcher.fetch(&url, site.encoding())?.text;
            book.save_raw_data(subtitle, &text)?;

            let record = SectionRecord {
                info: subtitle.clone(),
                element: ContentParser::extract_elements_in_section(
                    &text,
                    &subtitle.subtitle,
                    &self.settings.markers,
                ),
            };

            let status = chapter_status(book, &record, options.force)?;
            if status == ChapterStatus::New {
                *new_arrivals = true;
            }

            cache.archive_if_present(&BookManager::section_file_name(subtitle))?;
            book.save_section(&record)?;
            written += 1;

            if !subtitle.chapter.is_empty() {
                progress.println(&subtitle.chapter);
            }
            progress.println(&chapter_line(subtitle, novel_type, status, options, i, total));
            progress.inc();
            debug!(target: "sync", index = %subtitle.index, ?status, "保存完成");
        }

        progress.finish();
        Ok(written)
    }

    fn update_catalog(
        &mut self,
        site: &dyn SiteProfile,
        toc: &TableOfContents,
        file_title: &str,
        novel_type: NovelType,
        new_arrivals: bool,
    ) -> Result<(), SyncError> {
        let previous = self.catalog.find_by_toc_url(&toc.toc_url).cloned();
        let now = timestamp(now_local());
        let entry = CatalogEntry {
            id: previous
                .as_ref()
                .map(|e| e.id)
                .unwrap_or_else(|| self.catalog.new_id()),
            author: toc.author.clone(),
            title: toc.title.clone(),
            file_title: file_title.to_string(),
            toc_url: toc.toc_url.clone(),
            sitename: site.name().to_string(),
            novel_type: novel_type.code(),
            last_update: now.clone(),
            new_arrivals_date: if new_arrivals {
                now
            } else {
                previous
                    .as_ref()
                    .map(|e| e.new_arrivals_date.clone())
                    .unwrap_or_default()
            },
            frozen: previous.as_ref().is_some_and(|e| e.frozen),
        };
        self.catalog.upsert(entry);
        self.catalog.save()?;
        Ok(())
    }

    fn freeze_work(&mut self, toc_url: &str) -> Result<(), SyncError> {
        match self.catalog.find_by_toc_url(toc_url).map(|e| e.id) {
            Some(id) => self.catalog.freeze(id)?,
            None => warn!(target: "sync", "{} 不在目录库中，无法冻结", toc_url),
        }
        Ok(())
    }
}

/// 与已保存的内容比较。只有强制下载时才区分“有更新”和“无变化”。
fn chapter_status(
    book: &BookManager,
    record: &SectionRecord,
    force: bool,
) -> Result<ChapterStatus, StoreError> {
    if !book.section_exists(&record.info) {
        return Ok(ChapterStatus::New);
    }
    if force && book.load_section(&record.info)?.as_ref() == Some(record) {
        Ok(ChapterStatus::Unchanged)
    } else {
        Ok(ChapterStatus::Updated)
    }
}

fn chapter_line(
    subtitle: &SubtitleRecord,
    novel_type: NovelType,
    status: ChapterStatus,
    options: SyncOptions,
    i: usize,
    total: usize,
) -> String {
    let head = match novel_type {
        NovelType::Serial => format!("第{}部分", subtitle.index),
        NovelType::ShortStory => "短篇".to_string(),
    };
    let mark = match status {
        ChapterStatus::New if !options.from_download || options.force => " (新着)",
        ChapterStatus::Updated if options.force => " (有更新)",
        _ => "",
    };
    format!("{}　{} ({}/{}){}", head, subtitle.subtitle, i + 1, total, mark)
}
