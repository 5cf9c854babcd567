//! 差分缓存：更新前的章节文件在被覆盖之前移入本次运行的快照目录。
//!
//! 快照位于 `<work>/本文/cache/<YYYY.MM.DD@HH;MM;SS>/`，以本次运行的开始时间命名。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

use crate::base_system::file_cleaner::{is_empty_dir, remove_dir_if_empty};
use crate::book_parser::book_manager::SECTION_SAVE_DIR_NAME;

pub const CACHE_SAVE_DIR_NAME: &str = "cache";

pub fn cache_root(work_dir: &Path) -> PathBuf {
    work_dir.join(SECTION_SAVE_DIR_NAME).join(CACHE_SAVE_DIR_NAME)
}

pub fn snapshot_name(started_at: OffsetDateTime) -> io::Result<String> {
    let format = format_description!("[year].[month].[day]@[hour];[minute];[second]");
    started_at.format(format).map_err(io::Error::other)
}

#[derive(Debug)]
pub struct DiffCache {
    section_dir: PathBuf,
    root: PathBuf,
    snapshot: Option<PathBuf>,
}

impl DiffCache {
    /// 仅当已有旧目录时才创建快照目录；首次下载没有可替换的文件。
    pub fn begin(
        work_dir: &Path,
        has_existing_toc: bool,
        started_at: OffsetDateTime,
    ) -> io::Result<Self> {
        let section_dir = work_dir.join(SECTION_SAVE_DIR_NAME);
        let root = cache_root(work_dir);
        let snapshot = if has_existing_toc {
            let dir = root.join(snapshot_name(started_at)?);
            fs::create_dir_all(&dir)?;
            debug!(target: "diff_cache", path = %dir.display(), "创建差分缓存");
            Some(dir)
        } else {
            None
        };
        Ok(Self {
            section_dir,
            root,
            snapshot,
        })
    }

    pub fn snapshot(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    /// 把 `本文/<file_name>` 移入快照。快照未启用或文件不存在时什么都不做。
    pub fn archive_if_present(&self, file_name: &str) -> io::Result<bool> {
        let Some(snapshot) = self.snapshot.as_deref() else {
            return Ok(false);
        };
        let src = self.section_dir.join(file_name);
        if !src.is_file() {
            return Ok(false);
        }
        fs::rename(&src, snapshot.join(file_name))?;
        Ok(true)
    }

    /// 本次没有写入任何章节，或者没有任何旧文件被移入时，删除快照。
    pub fn discard_if_empty(&mut self, any_writes: bool) -> io::Result<()> {
        let Some(snapshot) = self.snapshot.as_deref() else {
            return Ok(());
        };
        if !any_writes || is_empty_dir(snapshot)? {
            self.discard()?;
        }
        Ok(())
    }

    pub fn discard(&mut self) -> io::Result<()> {
        let Some(snapshot) = self.snapshot.take() else {
            return Ok(());
        };
        match fs::remove_dir_all(&snapshot) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        info!(target: "diff_cache", path = %snapshot.display(), "已删除差分缓存");
        remove_dir_if_empty(&self.root)?;
        Ok(())
    }
}

/// 列出作品的所有快照目录，按名称（即时间）升序。
pub fn list_snapshots(work_dir: &Path) -> io::Result<Vec<PathBuf>> {
    let root = cache_root(work_dir);
    let entries = match fs::read_dir(&root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
