use anyhow::{Context, Result};
use tracing::{error, info};

use super::{Session, Tally};
use crate::catalog::CatalogGateway;
use crate::download::downloader::{SyncError, resolve_target};
use crate::download::models::{SyncOptions, SyncOutcome};

/// `download` 子命令：逐个目标执行同步。无法解析的目标记为失败，
/// 致命错误（含中断）立即终止并返回错误。
pub fn run_download(session: &mut Session, targets: &[String], force: bool) -> Result<()> {
    let options = SyncOptions {
        force,
        from_download: true,
    };
    let mut console = session.console();
    let mut tally = Tally::default();

    for target in targets {
        if session.interrupt.is_set() {
            break;
        }
        let (site, locator) = match resolve_target(&session.registry, &session.catalog, target) {
            Ok(found) => found,
            Err(err @ (SyncError::UnsupportedUrl(_)
            | SyncError::UnknownTarget(_)
            | SyncError::UnknownSite(_))) => {
                error!(target: "cli", "{err}");
                tally.record(SyncOutcome::Failed);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        match session.catalog.find_by_toc_url(locator.toc_url()) {
            Some(entry) => info!(target: "cli", "ID:{}　{}", entry.id, entry.title),
            None => info!(target: "cli", "新作品：{}", locator.toc_url()),
        }
        let outcome = session
            .orchestrator(&mut console)
            .start_download(site, locator, options)
            .with_context(|| format!("下载 {target} 时出错"))?;
        tally.record(outcome);
    }

    tally.print();
    Ok(())
}
