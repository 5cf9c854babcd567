//! 小说网站作品的增量镜像工具。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/中断/路径/初始文件等基础设施
//! - `site`：站点定义（URL 解析与页面字段抽取）
//! - `network_parser`：带 503 重试的页面抓取
//! - `download`：差分检测、摘要确认、差分缓存与同步主流程
//! - `book_parser`：正文分段与落盘
//! - `catalog`：已镜像作品的目录库
//! - `third_party`：作品元数据 API
//! - `ui`：命令行交互

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

mod base_system;
mod book_parser;
mod catalog;
mod download;
mod network_parser;
mod site;
mod third_party;
mod ui;

use base_system::config::{config_path, load_or_create_with_base};
use base_system::context::Config;
use base_system::interrupt::Interrupt;
use base_system::logging::{LogOptions, LogSystem};
use base_system::scaffold::PresetScaffold;
use catalog::YamlCatalog;
use download::downloader::SyncSettings;
use network_parser::network::{FetchConfig, RetryingFetcher};
use site::SiteRegistry;
use third_party::metadata_api::NarouApiClient;
use ui::noui::Session;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "webnovel-mirror", version = VERSION)]
#[command(about = "小说网站作品的增量镜像工具")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs 等文件）
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 下载作品（URL / 目录库 ID / 标题）
    Download {
        #[arg(required = true)]
        targets: Vec<String>,
        /// 忽略差分，全部重新下载
        #[arg(long, short)]
        force: bool,
    },
    /// 更新目录库中的作品（不指定目标时更新全部）
    Update {
        targets: Vec<String>,
        #[arg(long, short)]
        force: bool,
    },
    /// 列出作品的差分缓存
    Cache { target: String },
    /// 从目录库中删除作品
    Remove {
        target: String,
        /// 同时删除作品目录
        #[arg(long)]
        with_file: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.as_deref();

    let interrupt = Interrupt::new();
    let _log = init_logging(cli.debug, data_dir, interrupt.clone())?;
    info!(target: "startup", "当前版本: v{}", VERSION);

    let config = load_or_create_with_base::<Config>(None, data_dir)
        .map_err(|e| anyhow!(e.to_string()))?;
    let mut session = build_session(config, data_dir, interrupt)?;

    match cli.command {
        Command::Download { targets, force } => {
            ui::noui::run_download(&mut session, &targets, force)
        }
        Command::Update { targets, force } => ui::noui::run_update(&mut session, &targets, force),
        Command::Cache { target } => ui::noui::run_cache_list(&session, &target),
        Command::Remove { target, with_file } => {
            ui::noui::run_remove(&mut session, &target, with_file)
        }
    }
}

fn init_logging(debug: bool, base_dir: Option<&Path>, interrupt: Interrupt) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        logs_dir: base_dir.map_or_else(|| PathBuf::from("logs"), |b| b.join("logs")),
        ..LogOptions::default()
    };
    LogSystem::init(opts, interrupt).map_err(|e| anyhow!(e))
}

/// 配置中的相对目录以数据目录为基准。
fn under_data_dir(data_dir: Option<&Path>, dir: &str) -> PathBuf {
    let path = PathBuf::from(dir);
    match data_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

fn build_session(config: Config, data_dir: Option<&Path>, interrupt: Interrupt) -> Result<Session> {
    let site_dir = under_data_dir(data_dir, &config.site_setting_dir);
    let registry = SiteRegistry::load_dir(&site_dir)
        .with_context(|| format!("载入站点定义失败: {}", site_dir.display()))?;
    info!(target: "startup", count = registry.len(), "已载入站点定义");

    let archive_root = config.default_save_dir();
    let catalog = YamlCatalog::open(YamlCatalog::default_path(&archive_root))?;
    let fetcher = RetryingFetcher::new(FetchConfig::from_config(&config))?;
    let metadata = NarouApiClient::new(
        Duration::from_secs(config.request_timeout),
        &config.user_agent,
    )?;
    let settings = SyncSettings::from_config(&config).context("正文分隔行的正则无效")?;

    Ok(Session {
        config_path: config_path::<Config>(data_dir),
        scaffold: PresetScaffold::new(under_data_dir(data_dir, &config.preset_dir)),
        config,
        registry,
        catalog,
        fetcher,
        metadata,
        settings,
        interrupt,
        archive_root,
    })
}
