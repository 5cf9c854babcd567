//! 单个作品目录的读写：目录文件、各话记录与原始文本。
//!
//! 目录布局：
//! ```text
//! <work>/toc.yaml
//! <work>/本文/<index> <file_subtitle>.yaml
//! <work>/本文/cache/<快照>/
//! <work>/raw/<index> <file_subtitle>.txt
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::download::models::{SectionRecord, SubtitleRecord, TableOfContents};

pub const SECTION_SAVE_DIR_NAME: &str = "本文";
pub const RAW_DATA_DIR_NAME: &str = "raw";
pub const TOC_FILE_NAME: &str = "toc.yaml";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub struct BookManager {
    work_dir: PathBuf,
}

impl BookManager {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn section_dir(&self) -> PathBuf {
        self.work_dir.join(SECTION_SAVE_DIR_NAME)
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.work_dir.join(RAW_DATA_DIR_NAME)
    }

    pub fn toc_path(&self) -> PathBuf {
        self.work_dir.join(TOC_FILE_NAME)
    }

    pub fn section_file_name(subtitle: &SubtitleRecord) -> String {
        format!("{}.yaml", subtitle.file_stem())
    }

    pub fn section_path(&self, subtitle: &SubtitleRecord) -> PathBuf {
        self.section_dir().join(Self::section_file_name(subtitle))
    }

    pub fn section_exists(&self, subtitle: &SubtitleRecord) -> bool {
        self.section_path(subtitle).is_file()
    }

    pub fn create_work_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.work_dir).map_err(io_err(&self.work_dir))
    }

    pub fn init_raw_dir(&self) -> Result<(), StoreError> {
        let dir = self.raw_dir();
        fs::create_dir_all(&dir).map_err(io_err(&dir))
    }

    /// 读取上次保存的目录；文件不存在时返回 `None`（视为首次下载）。
    pub fn load_toc(&self) -> Result<Option<TableOfContents>, StoreError> {
        read_yaml(&self.toc_path())
    }

    /// 目录文件是一次同步的提交点，经由同目录临时文件重命名写入。
    pub fn save_toc(&self, toc: &TableOfContents) -> Result<(), StoreError> {
        let path = self.toc_path();
        let yaml = to_yaml(toc, &path)?;
        self.create_work_dir()?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.work_dir).map_err(io_err(&path))?;
        tmp.write_all(yaml.as_bytes()).map_err(io_err(&path))?;
        tmp.as_file().sync_all().map_err(io_err(&path))?;
        tmp.persist(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        debug!(target: "book_manager", path = %path.display(), "目录已保存");
        Ok(())
    }

    pub fn remove_toc(&self) -> Result<bool, StoreError> {
        let path = self.toc_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    pub fn remove_work_dir(&self) -> Result<(), StoreError> {
        match fs::remove_dir_all(&self.work_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.work_dir)(e)),
        }
    }

    pub fn load_section(
        &self,
        subtitle: &SubtitleRecord,
    ) -> Result<Option<SectionRecord>, StoreError> {
        read_yaml(&self.section_path(subtitle))
    }

    pub fn save_section(&self, record: &SectionRecord) -> Result<(), StoreError> {
        let dir = self.section_dir();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let path = self.section_path(&record.info);
        let yaml = to_yaml(record, &path)?;
        fs::write(&path, yaml).map_err(io_err(&path))?;
        debug!(target: "book_manager", index = %record.info.index, "保存本文");
        Ok(())
    }

    pub fn save_raw_data(&self, subtitle: &SubtitleRecord, raw: &str) -> Result<(), StoreError> {
        let dir = self.raw_dir();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        let path = dir.join(format!("{}.txt", subtitle.file_stem()));
        fs::write(&path, raw).map_err(io_err(&path))
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    serde_yaml::from_str(&raw)
        .map(Some)
        .map_err(|source| StoreError::Yaml {
            path: path.to_path_buf(),
            source,
        })
}

fn to_yaml<T: Serialize>(value: &T, path: &Path) -> Result<String, StoreError> {
    serde_yaml::to_string(value).map_err(|source| StoreError::Yaml {
        path: path.to_path_buf(),
        source,
    })
}
