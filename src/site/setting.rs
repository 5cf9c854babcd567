//! 基于 YAML 站点定义与正则表达式的 [`SiteProfile`] 实现。
//!
//! 模式与模板中可以用 `\k<name>` 引用已知的值：在正则中会被转义后代入，在 URL 模板中原样代入。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::Deserialize;

use super::{FieldMatch, SiteError, SiteField, SiteProfile, WorkLocator};

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\\k<(\w+)>").expect("valid placeholder regex"))
}

/// 把 `\k<name>` 替换为对应的值；未知的名字替换为空。
pub fn expand_placeholders(
    template: &str,
    values: &BTreeMap<String, String>,
    escape: bool,
) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let value = values.get(&caps[1]).map(String::as_str).unwrap_or("");
            if escape {
                regex::escape(value)
            } else {
                value.to_string()
            }
        })
        .into_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteDefinition {
    pub name: String,
    pub domain: String,
    /// 站点首页模板，可引用 `name` / `domain`。
    #[serde(default)]
    pub top_url: Option<String>,
    /// 匹配目标 URL 的正则，命名分组会成为定位值。
    pub url: String,
    pub toc_url: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub confirm_over18: bool,
    #[serde(default)]
    pub narou_api_url: Option<String>,
    #[serde(default)]
    pub txtdownload_url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub story: Option<String>,
    #[serde(default)]
    pub tcode: Option<String>,
    pub subtitles: String,
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

#[derive(Debug)]
pub struct RegexSiteProfile {
    def: SiteDefinition,
    base_values: BTreeMap<String, String>,
    url_re: Regex,
}

impl RegexSiteProfile {
    pub fn load_file(path: &Path) -> Result<Self, SiteError> {
        let raw = fs::read_to_string(path).map_err(|source| SiteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let def: SiteDefinition =
            serde_yaml::from_str(&raw).map_err(|source| SiteError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(def)
    }

    /// 编译 URL 模式并预先检查字段模式。字段模式依赖定位值，这里用空值代入做语法检查。
    pub fn new(def: SiteDefinition) -> Result<Self, SiteError> {
        let mut base_values = BTreeMap::new();
        base_values.insert("name".to_string(), def.name.clone());
        base_values.insert("domain".to_string(), def.domain.clone());
        if let Some(top) = def.top_url.as_deref() {
            let top = expand_placeholders(top, &base_values, false);
            base_values.insert("top_url".to_string(), top);
        }

        let url_re = Regex::new(&expand_placeholders(&def.url, &base_values, true)).map_err(
            |source| SiteError::Regex {
                site: def.name.clone(),
                field: "url",
                source,
            },
        )?;

        let profile = Self {
            def,
            base_values,
            url_re,
        };
        let empty = WorkLocator::default();
        for field in [
            SiteField::Title,
            SiteField::Author,
            SiteField::Story,
            SiteField::Tcode,
            SiteField::Subtitles,
        ] {
            profile.compile(field, &empty)?;
        }
        Ok(profile)
    }

    fn pattern(&self, field: SiteField) -> Option<&str> {
        match field {
            SiteField::Title => Some(&self.def.title),
            SiteField::Author => self.def.author.as_deref(),
            SiteField::Story => self.def.story.as_deref(),
            SiteField::Tcode => self.def.tcode.as_deref(),
            SiteField::Subtitles => Some(&self.def.subtitles),
        }
    }

    fn compile(&self, field: SiteField, locator: &WorkLocator) -> Result<Option<Regex>, SiteError> {
        let Some(pattern) = self.pattern(field) else {
            return Ok(None);
        };
        let expanded = expand_placeholders(pattern, locator.values(), true);
        Regex::new(&expanded)
            .map(Some)
            .map_err(|source| SiteError::Regex {
                site: self.def.name.clone(),
                field: field.key(),
                source,
            })
    }
}

fn to_field_match(re: &Regex, caps: &Captures) -> FieldMatch {
    let values = re
        .capture_names()
        .flatten()
        .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
        .collect();
    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    FieldMatch { values, end }
}

impl SiteProfile for RegexSiteProfile {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn encoding(&self) -> &str {
        &self.def.encoding
    }

    fn confirm_over18(&self) -> bool {
        self.def.confirm_over18
    }

    fn narou_api_url(&self) -> Option<&str> {
        self.def.narou_api_url.as_deref()
    }

    fn locate(&self, url: &str) -> Option<WorkLocator> {
        let caps = self.url_re.captures(url)?;
        let mut values = self.base_values.clone();
        for name in self.url_re.capture_names().flatten() {
            if let Some(m) = caps.name(name) {
                values.insert(name.to_string(), m.as_str().to_string());
            }
        }
        let toc_url = expand_placeholders(&self.def.toc_url, &values, false);
        values.insert("toc_url".to_string(), toc_url);
        Some(WorkLocator::new(values))
    }

    fn match_field(
        &self,
        field: SiteField,
        text: &str,
        locator: &WorkLocator,
    ) -> Result<Option<FieldMatch>, SiteError> {
        let Some(re) = self.compile(field, locator)? else {
            return Ok(None);
        };
        Ok(re.captures(text).map(|caps| to_field_match(&re, &caps)))
    }

    fn match_all(
        &self,
        field: SiteField,
        text: &str,
        locator: &WorkLocator,
    ) -> Result<Vec<FieldMatch>, SiteError> {
        let Some(re) = self.compile(field, locator)? else {
            return Ok(Vec::new());
        };
        Ok(re
            .captures_iter(text)
            .map(|caps| to_field_match(&re, &caps))
            .collect())
    }

    fn txtdownload_url(&self, values: &BTreeMap<String, String>) -> Option<String> {
        let template = self.def.txtdownload_url.as_deref()?;
        Some(expand_placeholders(template, values, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAROU: &str = include_str!("../../webnovel/ncode.syosetu.com.yaml");

    const TOC_HTML: &str = r#"<html><head><title>テスト作品</title></head>
<body>
<div class="novel_writername">作者：<a href="https://mypage.syosetu.com/1/">作者名</a></div>
<a href="/txtdownload/top/ncode/123456/">TXT</a>
<div id="novel_ex">一行目<br />
二行目</div>
<div class="index_box">
<div class="chapter_title">第一章</div>
<dl class="novel_sublist2">
<dd class="subtitle"><a href="/n0001a/1/">プロローグ</a></dd>
<dt class="long_update">2014/01/01 00:00</dt>
</dl>
<dl class="novel_sublist2">
<dd class="subtitle"><a href="/n0001a/2/">第1話</a></dd>
<dt class="long_update">2014/01/02 00:00<span title="2014/02/01 12:00 改稿">（<u>改</u>）</span></dt>
</dl>
</div>
</body></html>"#;

    fn narou() -> RegexSiteProfile {
        let def: SiteDefinition = serde_yaml::from_str(NAROU).unwrap();
        RegexSiteProfile::new(def).unwrap()
    }

    #[test]
    fn placeholders_are_escaped_only_in_patterns() {
        let mut values = BTreeMap::new();
        values.insert("domain".to_string(), "a.b".to_string());
        assert_eq!(expand_placeholders(r"x\k<domain>", &values, true), r"xa\.b");
        assert_eq!(expand_placeholders(r"x\k<domain>", &values, false), "xa.b");
        assert_eq!(expand_placeholders(r"\k<missing>/", &values, false), "/");
    }

    #[test]
    fn locates_work_from_any_page_url() {
        let site = narou();
        let loc = site.locate("https://ncode.syosetu.com/n0001a/5/").unwrap();
        assert_eq!(loc.ncode(), "n0001a");
        assert_eq!(loc.top_url(), "https://ncode.syosetu.com");
        assert_eq!(loc.toc_url(), "https://ncode.syosetu.com/n0001a/");
        assert_eq!(loc.domain(), "ncode.syosetu.com");
        assert!(site.locate("https://example.com/n0001a/").is_none());
    }

    #[test]
    fn extracts_toc_fields() {
        let site = narou();
        let loc = site.locate("https://ncode.syosetu.com/n0001a/").unwrap();
        let title = site.match_field(SiteField::Title, TOC_HTML, &loc).unwrap().unwrap();
        assert_eq!(title.value("title"), "テスト作品");
        let author = site.match_field(SiteField::Author, TOC_HTML, &loc).unwrap().unwrap();
        assert_eq!(author.value("author"), "作者名");
        let story = site.match_field(SiteField::Story, TOC_HTML, &loc).unwrap().unwrap();
        assert_eq!(story.value("story"), "一行目<br />\n二行目");
        let tcode = site.match_field(SiteField::Tcode, TOC_HTML, &loc).unwrap().unwrap();
        assert_eq!(tcode.value("tcode"), "123456");
    }

    #[test]
    fn subtitles_are_matched_in_order_with_optional_groups() {
        let site = narou();
        let loc = site.locate("https://ncode.syosetu.com/n0001a/").unwrap();
        let subs = site.match_all(SiteField::Subtitles, TOC_HTML, &loc).unwrap();
        assert_eq!(subs.len(), 2);

        assert_eq!(subs[0].value("index"), "1");
        assert_eq!(subs[0].value("chapter"), "第一章");
        assert_eq!(subs[0].value("subtitle"), "プロローグ");
        assert_eq!(subs[0].value("subdate"), "2014/01/01 00:00");
        assert_eq!(subs[0].value("subupdate"), "");

        assert_eq!(subs[1].value("index"), "2");
        assert_eq!(subs[1].value("href"), "/n0001a/2/");
        assert_eq!(subs[1].value("chapter"), "");
        assert_eq!(subs[1].value("subupdate"), "2014/02/01 12:00");
        assert!(subs[1].end > subs[0].end);
    }

    #[test]
    fn txtdownload_url_uses_merged_values() {
        let site = narou();
        let mut loc = site.locate("https://ncode.syosetu.com/n0001a/").unwrap();
        loc.insert("tcode", "123456");
        loc.insert("index", "2");
        let url = site.txtdownload_url(loc.values()).unwrap();
        assert!(url.starts_with("https://ncode.syosetu.com/txtdownload/dlstart/ncode/123456/"));
        assert!(url.contains("no=2"));
    }

    #[test]
    fn broken_pattern_is_rejected_at_load() {
        let yaml = NAROU.replace("subtitles: '", "subtitles: '(unclosed");
        let def: SiteDefinition = serde_yaml::from_str(&yaml).unwrap();
        let err = RegexSiteProfile::new(def).unwrap_err();
        assert!(matches!(err, SiteError::Regex { field: "subtitles", .. }));
    }
}
