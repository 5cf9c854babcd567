use anyhow::{Context, Result};
use tracing::{error, info};

use super::{Session, Tally};
use crate::catalog::CatalogGateway;
use crate::download::downloader::find_entry;
use crate::download::models::{SyncOptions, SyncOutcome};

/// `update` 子命令：目标为空时更新目录库中的全部作品。冻结的作品跳过。
pub fn run_update(session: &mut Session, targets: &[String], force: bool) -> Result<()> {
    let entries = if targets.is_empty() {
        session.catalog.entries().into_iter().cloned().collect()
    } else {
        let mut picked = Vec::with_capacity(targets.len());
        for target in targets {
            match find_entry(&session.registry, &session.catalog, target) {
                Some(entry) => picked.push(entry),
                None => error!(target: "cli", "{} 不在目录库中", target),
            }
        }
        picked
    };
    if entries.is_empty() {
        println!("没有可更新的作品");
        return Ok(());
    }

    let options = SyncOptions {
        force,
        from_download: false,
    };
    let mut console = session.console();
    let mut tally = Tally::default();
    let total = entries.len();

    for (i, entry) in entries.into_iter().enumerate() {
        if session.interrupt.is_set() {
            break;
        }
        if entry.frozen {
            info!(target: "cli", "ID:{} 《{}》已冻结，跳过", entry.id, entry.title);
            continue;
        }
        let located = session
            .registry
            .find_by_name(&entry.sitename)
            .and_then(|site| site.locate(&entry.toc_url).map(|loc| (site, loc)));
        let Some((site, locator)) = located else {
            error!(target: "cli", "ID:{} 找不到对应的站点定义：{}", entry.id, entry.sitename);
            tally.record(SyncOutcome::Failed);
            continue;
        };

        println!("({}/{}) ID:{}　{}", i + 1, total, entry.id, entry.title);
        let outcome = session
            .orchestrator(&mut console)
            .start_download(site, locator, options)
            .with_context(|| format!("更新 ID:{} 时出错", entry.id))?;
        tally.record(outcome);
    }

    tally.print();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book_parser::book_manager::BookManager;
    use crate::ui::noui::test_support::{register_work, session_in};

    #[test]
    fn frozen_works_are_skipped() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_in(root.path());
        let work = register_work(&mut session, true);
        let toc_before = BookManager::new(&work).load_toc().unwrap();

        // 站点指向关闭的端口：只要发出请求就会报错。
        run_update(&mut session, &[], false).unwrap();
        run_update(&mut session, &["0".to_string()], true).unwrap();
        assert_eq!(BookManager::new(&work).load_toc().unwrap(), toc_before);
        assert!(session.catalog.get(0).unwrap().frozen);
    }

    #[test]
    fn unfrozen_works_are_synced() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_in(root.path());
        register_work(&mut session, false);

        let err = run_update(&mut session, &[], false).unwrap_err();
        assert!(format!("{err:#}").contains("ID:0"));
    }

    #[test]
    fn unknown_targets_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_in(root.path());
        register_work(&mut session, false);
        run_update(&mut session, &["存在しない".to_string()], false).unwrap();
    }
}
