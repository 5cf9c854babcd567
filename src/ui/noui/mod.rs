//! 命令行交互：子命令的执行，以及基于标准输入输出的确认提示。

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::Command;

use tracing::{info, warn};

use crate::base_system::config::write_with_comments;
use crate::base_system::context::Config;
use crate::base_system::interrupt::Interrupt;
use crate::base_system::scaffold::PresetScaffold;
use crate::catalog::YamlCatalog;
use crate::download::digest::DecisionInput;
use crate::download::models::SyncOutcome;
use crate::download::downloader::{Interaction, SyncOrchestrator, SyncSettings};
use crate::network_parser::network::RetryingFetcher;
use crate::site::SiteRegistry;
use crate::third_party::metadata_api::NarouApiClient;

mod download;
mod library;
mod update;

pub use download::run_download;
pub use library::{run_cache_list, run_remove};
pub use update::run_update;

/// 一次命令执行期间共享的组件。
pub struct Session {
    pub config: Config,
    pub config_path: PathBuf,
    pub registry: SiteRegistry,
    pub catalog: YamlCatalog,
    pub fetcher: RetryingFetcher,
    pub metadata: NarouApiClient,
    pub scaffold: PresetScaffold,
    pub settings: SyncSettings,
    pub interrupt: Interrupt,
    pub archive_root: PathBuf,
}

impl Session {
    pub(crate) fn orchestrator<'a>(
        &'a mut self,
        console: &'a mut Console,
    ) -> SyncOrchestrator<'a> {
        SyncOrchestrator {
            registry: &self.registry,
            catalog: &mut self.catalog,
            fetcher: &self.fetcher,
            metadata: &self.metadata,
            scaffold: &self.scaffold,
            interaction: console,
            interrupt: self.interrupt.clone(),
            settings: self.settings.clone(),
            archive_root: self.archive_root.clone(),
        }
    }

    pub(crate) fn console(&self) -> Console {
        Console {
            config: self.config.clone(),
            config_path: self.config_path.clone(),
        }
    }
}

/// 标准输入输出上的确认提示。年龄确认的肯定答案写回配置文件。
pub struct Console {
    config: Config,
    config_path: PathBuf,
}

impl DecisionInput for Console {
    fn present_menu(&mut self, title: &str, old_count: usize, latest_count: usize) {
        println!();
        println!("《{title}》的话数从 {old_count} 话减少到了 {latest_count} 话。");
        println!("作品可能已被改为摘要版，继续更新会覆盖已保存的正文。");
        println!("1: 继续更新");
        println!("2: 取消本次更新");
        println!("3: 取消更新并冻结该作品");
        println!("4: 查看最新简介");
        println!("5: 在浏览器中打开目录页");
        print!("请选择 (1-5)：");
        io::stdout().flush().ok();
    }

    fn read_choice(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let n = io::stdin().lock().read_line(&mut line)?;
        Ok((n > 0).then_some(line))
    }

    fn show_synopsis(&mut self, story: &str) {
        println!("\n━━ 简介 ━━\n{story}\n");
    }

    fn open_page(&mut self, url: &str) {
        let spawn_result = if cfg!(target_os = "windows") {
            Command::new("explorer")
                .arg(url)
                .spawn()
                .or_else(|_| Command::new("cmd").args(["/C", "start", url]).spawn())
        } else if cfg!(target_os = "macos") {
            Command::new("open").arg(url).spawn()
        } else {
            Command::new("xdg-open").arg(url).spawn()
        };
        match spawn_result {
            Ok(_) => println!("已尝试在浏览器打开: {url}"),
            Err(e) => println!("打开浏览器失败: {e}"),
        }
    }
}

impl Interaction for Console {
    fn confirm_over18(&mut self) -> io::Result<bool> {
        if let Some(answer) = self.config.over18 {
            return Ok(answer);
        }
        let line = read_line("年齢確認：你已年满 18 岁吗？[y/N]：")?;
        let yes = matches!(line.trim(), "y" | "Y" | "yes" | "YES");
        if yes {
            self.config.over18 = Some(true);
            match write_with_comments(&self.config, &self.config_path) {
                Ok(()) => info!(target: "config", "已记住年龄确认结果"),
                Err(err) => warn!(target: "config", "保存年龄确认结果失败: {err}"),
            }
        }
        Ok(yes)
    }
}

fn read_line(prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}

/// 单个目标的处理结果汇总。
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub ok: usize,
    pub no_change: usize,
    pub canceled: usize,
    pub failed: usize,
}

impl Tally {
    pub(crate) fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Ok => self.ok += 1,
            SyncOutcome::NoChange => self.no_change += 1,
            SyncOutcome::Canceled => self.canceled += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
    }

    pub(crate) fn print(&self) {
        println!(
            "完成：更新 {} / 无变化 {} / 取消 {} / 失败 {}",
            self.ok, self.no_change, self.canceled, self.failed
        );
    }
}
