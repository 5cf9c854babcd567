//! 已加载站点定义的集合。显式构造后注入使用方，没有全局状态。

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::{RegexSiteProfile, SiteError, SiteProfile, WorkLocator};

#[derive(Clone, Default)]
pub struct SiteRegistry {
    sites: Vec<Arc<dyn SiteProfile>>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<Arc<dyn SiteProfile>>) -> Self {
        Self { sites }
    }

    /// 读取目录下所有 `*.yaml`（按文件名排序）。一个都没有时报错。
    pub fn load_dir(dir: &Path) -> Result<Self, SiteError> {
        let entries = fs::read_dir(dir).map_err(|source| SiteError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "yaml"))
            .collect();
        paths.sort();

        let mut sites: Vec<Arc<dyn SiteProfile>> = Vec::with_capacity(paths.len());
        for path in paths {
            let profile = RegexSiteProfile::load_file(&path)?;
            debug!(target: "site", name = profile.name(), path = %path.display(), "载入站点定义");
            sites.push(Arc::new(profile));
        }
        if sites.is_empty() {
            return Err(SiteError::NoSites(dir.to_path_buf()));
        }
        Ok(Self { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// 第一个能解析该 URL 的站点。
    pub fn find_by_url(&self, url: &str) -> Option<(Arc<dyn SiteProfile>, WorkLocator)> {
        self.sites
            .iter()
            .find_map(|site| site.locate(url).map(|loc| (Arc::clone(site), loc)))
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn SiteProfile>> {
        self.sites.iter().find(|s| s.name() == name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped() -> SiteRegistry {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("webnovel");
        SiteRegistry::load_dir(&dir).unwrap()
    }

    #[test]
    fn loads_shipped_definitions() {
        let registry = shipped();
        assert_eq!(registry.len(), 2);
        assert!(registry.find_by_name("小説家になろう").is_some());
        assert!(registry.find_by_name("存在しない").is_none());
    }

    #[test]
    fn url_resolves_to_matching_site() {
        let registry = shipped();
        let (site, loc) = registry
            .find_by_url("https://novel18.syosetu.com/n9999z/")
            .unwrap();
        assert_eq!(site.name(), "ノクターン・ムーンライト");
        assert!(site.confirm_over18());
        assert_eq!(loc.toc_url(), "https://novel18.syosetu.com/n9999z/");
        assert!(registry.find_by_url("https://example.com/").is_none());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SiteRegistry::load_dir(dir.path()),
            Err(SiteError::NoSites(_))
        ));
    }
}
