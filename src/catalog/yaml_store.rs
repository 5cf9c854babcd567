//! YAML 文件形式的目录库：`<archive_root>/.narou/database.yaml`。

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{CatalogEntry, CatalogError, CatalogGateway};

pub const CATALOG_DIR_NAME: &str = ".narou";
pub const CATALOG_FILE_NAME: &str = "database.yaml";

pub struct YamlCatalog {
    path: PathBuf,
    entries: BTreeMap<u64, CatalogEntry>,
}

impl YamlCatalog {
    pub fn default_path(archive_root: &Path) -> PathBuf {
        archive_root.join(CATALOG_DIR_NAME).join(CATALOG_FILE_NAME)
    }

    /// 文件不存在时得到空库，首次保存时创建。
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_yaml::from_str(&raw).map_err(|source| CatalogError::Yaml {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CatalogError::Io { path, source }),
        };
        debug!(target: "catalog", path = %path.display(), count = entries.len(), "载入目录库");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogGateway for YamlCatalog {
    fn get(&self, id: u64) -> Option<&CatalogEntry> {
        self.entries.get(&id)
    }

    fn find_by_toc_url(&self, toc_url: &str) -> Option<&CatalogEntry> {
        self.entries.values().find(|e| e.toc_url == toc_url)
    }

    fn find_by_title(&self, title: &str) -> Option<&CatalogEntry> {
        self.entries.values().find(|e| e.title == title)
    }

    fn new_id(&self) -> u64 {
        self.entries.keys().next_back().map_or(0, |max| max + 1)
    }

    fn entries(&self) -> Vec<&CatalogEntry> {
        self.entries.values().collect()
    }

    fn upsert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.id, entry);
    }

    fn delete(&mut self, id: u64) -> Option<CatalogEntry> {
        self.entries.remove(&id)
    }

    fn save(&self) -> Result<(), CatalogError> {
        let io_err = |source| CatalogError::Io {
            path: self.path.clone(),
            source,
        };
        let yaml = serde_yaml::to_string(&self.entries).map_err(|source| CatalogError::Yaml {
            path: self.path.clone(),
            source,
        })?;
        let dir = self.path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(yaml.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    fn freeze(&mut self, id: u64) -> Result<(), CatalogError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(CatalogError::UnknownId(id))?;
        entry.frozen = true;
        info!(target: "catalog", id, title = %entry.title, "已冻结");
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, title: &str) -> CatalogEntry {
        CatalogEntry {
            id,
            title: title.into(),
            file_title: title.into(),
            toc_url: format!("https://example.com/n{id}/"),
            sitename: "example".into(),
            novel_type: 1,
            ..Default::default()
        }
    }

    #[test]
    fn missing_file_is_an_empty_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = YamlCatalog::open(YamlCatalog::default_path(dir.path())).unwrap();
        assert!(catalog.entries().is_empty());
        assert_eq!(catalog.new_id(), 0);
    }

    #[test]
    fn entries_survive_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = YamlCatalog::default_path(dir.path());
        let mut catalog = YamlCatalog::open(&path).unwrap();
        catalog.upsert(entry(0, "一"));
        catalog.upsert(entry(4, "二"));
        catalog.save().unwrap();

        let reopened = YamlCatalog::open(&path).unwrap();
        assert_eq!(reopened.new_id(), 5);
        assert_eq!(reopened.find_by_title("二").map(|e| e.id), Some(4));
        assert_eq!(
            reopened.find_by_toc_url("https://example.com/n0/").map(|e| e.title.as_str()),
            Some("一")
        );
        let ids: Vec<u64> = reopened.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, [0, 4]);
    }

    #[test]
    fn freeze_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = YamlCatalog::default_path(dir.path());
        let mut catalog = YamlCatalog::open(&path).unwrap();
        catalog.upsert(entry(1, "作品"));
        catalog.freeze(1).unwrap();
        assert!(matches!(catalog.freeze(9), Err(CatalogError::UnknownId(9))));

        let reopened = YamlCatalog::open(&path).unwrap();
        assert!(reopened.get(1).unwrap().frozen);
    }

    #[test]
    fn delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = YamlCatalog::open(dir.path().join("db.yaml")).unwrap();
        catalog.upsert(entry(2, "x"));
        assert_eq!(catalog.delete(2).map(|e| e.id), Some(2));
        assert!(catalog.get(2).is_none());
    }
}
