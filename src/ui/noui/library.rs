use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use super::Session;
use crate::base_system::book_paths;
use crate::book_parser::book_manager::BookManager;
use crate::catalog::{CatalogEntry, CatalogGateway};
use crate::download::cache::list_snapshots;
use crate::download::downloader::find_entry;

/// 作品的差分缓存快照，旧的在前。
pub(crate) fn cache_snapshots(session: &Session, target: &str) -> Result<(CatalogEntry, Vec<PathBuf>)> {
    let entry = find_entry(&session.registry, &session.catalog, target)
        .ok_or_else(|| anyhow!("{} 不在目录库中", target))?;
    let work_dir = book_paths::work_dir(&session.archive_root, &entry.sitename, &entry.file_title);
    let snapshots = list_snapshots(&work_dir)
        .with_context(|| format!("读取差分缓存失败: {}", work_dir.display()))?;
    Ok((entry, snapshots))
}

/// `cache` 子命令：列出作品的差分缓存快照。
pub fn run_cache_list(session: &Session, target: &str) -> Result<()> {
    let (entry, snapshots) = cache_snapshots(session, target)?;
    if snapshots.is_empty() {
        println!("《{}》没有差分缓存", entry.title);
        return Ok(());
    }
    println!("《{}》的差分缓存：", entry.title);
    for dir in snapshots {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let count = std::fs::read_dir(&dir).map(|it| it.count()).unwrap_or(0);
        println!("  {name}  ({count} 个文件)");
    }
    Ok(())
}

/// `remove` 子命令：从目录库中删除作品，并删除其 `toc.yaml`，之后的下载按首次下载处理。
/// `with_file` 时删除整个作品目录。
pub fn run_remove(session: &mut Session, target: &str, with_file: bool) -> Result<()> {
    let entry = find_entry(&session.registry, &session.catalog, target)
        .ok_or_else(|| anyhow!("{} 不在目录库中", target))?;
    let book = BookManager::new(book_paths::work_dir(
        &session.archive_root,
        &entry.sitename,
        &entry.file_title,
    ));

    if with_file {
        book.remove_work_dir()?;
        info!(target: "cli", "已删除作品目录：{}", book.work_dir().display());
    } else if book.remove_toc()? {
        info!(target: "cli", "已删除目录文件：{}", book.toc_path().display());
    }

    session.catalog.delete(entry.id);
    session.catalog.save()?;
    println!("已删除 ID:{}　{}", entry.id, entry.title);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::book_parser::book_manager::TOC_FILE_NAME;
    use crate::catalog::YamlCatalog;
    use crate::download::cache::cache_root;
    use crate::ui::noui::test_support::{TEST_TOC_URL, register_work, session_in};

    #[test]
    fn remove_drops_toc_and_catalog_entry_but_keeps_files() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_in(root.path());
        let work = register_work(&mut session, false);

        run_remove(&mut session, "0", false).unwrap();

        assert!(!work.join(TOC_FILE_NAME).exists());
        assert!(work.join("本文").join("1 第1話.yaml").is_file());
        assert!(session.catalog.get(0).is_none());
        let reopened = YamlCatalog::open(session.catalog.path()).unwrap();
        assert!(reopened.find_by_toc_url(TEST_TOC_URL).is_none());
        // 目录文件不存在，下次下载按首次下载处理。
        assert!(BookManager::new(&work).load_toc().unwrap().is_none());
    }

    #[test]
    fn remove_with_file_deletes_work_dir() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_in(root.path());
        let work = register_work(&mut session, false);

        run_remove(&mut session, TEST_TOC_URL, true).unwrap();

        assert!(!work.exists());
        assert!(session.catalog.entries().is_empty());
    }

    #[test]
    fn remove_unknown_target_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_in(root.path());
        register_work(&mut session, false);
        assert!(run_remove(&mut session, "9", false).is_err());
        assert_eq!(session.catalog.entries().len(), 1);
    }

    #[test]
    fn cache_lists_snapshots_oldest_first() {
        let root = tempfile::tempdir().unwrap();
        let mut session = session_in(root.path());
        let work = register_work(&mut session, false);

        let (_, empty) = cache_snapshots(&session, "テスト作品").unwrap();
        assert!(empty.is_empty());

        let cache = cache_root(&work);
        for name in ["2015.01.02@03;04;05", "2014.12.31@23;59;59"] {
            fs::create_dir_all(cache.join(name)).unwrap();
        }
        fs::write(cache.join("2014.12.31@23;59;59").join("1 第1話.yaml"), "old").unwrap();

        let (entry, snapshots) = cache_snapshots(&session, "テスト作品").unwrap();
        assert_eq!(entry.id, 0);
        let names: Vec<_> = snapshots
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["2014.12.31@23;59;59", "2015.01.02@03;04;05"]);
        run_cache_list(&session, "テスト作品").unwrap();
    }
}
