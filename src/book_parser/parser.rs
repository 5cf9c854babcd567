//! 正文分段：把一话的文本拆成前書き / 本文 / 後書き。

use regex::Regex;

use crate::download::models::SectionContent;

/// 前書き / 後書き分隔行的匹配规则，由配置提供。
#[derive(Debug, Clone)]
pub struct SectionMarkers {
    pub introduction: Regex,
    pub postscript: Regex,
}

pub const DEFAULT_INTRODUCTION_MARKER: &str = r"^[ 　\t]*[\*＊]{44}[ 　\t]*$";
pub const DEFAULT_POSTSCRIPT_MARKER: &str = r"^[ 　\t]*[\*＊]{48}[ 　\t]*$";

impl SectionMarkers {
    pub fn new(introduction: &str, postscript: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            introduction: Regex::new(introduction)?,
            postscript: Regex::new(postscript)?,
        })
    }
}

impl Default for SectionMarkers {
    fn default() -> Self {
        Self {
            introduction: Regex::new(DEFAULT_INTRODUCTION_MARKER)
                .expect("compile DEFAULT_INTRODUCTION_MARKER"),
            postscript: Regex::new(DEFAULT_POSTSCRIPT_MARKER)
                .expect("compile DEFAULT_POSTSCRIPT_MARKER"),
        }
    }
}

pub struct ContentParser;

impl ContentParser {
    /// 拆分正文。正文开头若重复了本话标题，则去掉标题行（以及紧随其后的空行）。
    pub fn extract_elements_in_section(
        section: &str,
        subtitle: &str,
        markers: &SectionMarkers,
    ) -> SectionContent {
        let mut lines: Vec<String> = section
            .trim()
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect();

        let introduction = Self::slice_introduction(&mut lines, &markers.introduction);
        let postscript = Self::slice_postscript(&mut lines, &markers.postscript);

        if lines.first().map(String::as_str) == Some(subtitle.trim()) {
            let drop = if lines.get(1).is_some_and(|l| l.is_empty()) {
                2
            } else {
                1
            };
            lines.drain(..drop);
        }

        SectionContent {
            introduction,
            body: lines.join("\n"),
            postscript,
        }
    }

    fn slice_introduction(lines: &mut Vec<String>, marker: &Regex) -> String {
        let Some(pos) = lines.iter().position(|l| marker.is_match(l)) else {
            return String::new();
        };
        lines.remove(pos);
        lines.drain(..pos).collect::<Vec<_>>().join("\n")
    }

    fn slice_postscript(lines: &mut Vec<String>, marker: &Regex) -> String {
        let Some(pos) = lines.iter().position(|l| marker.is_match(l)) else {
            return String::new();
        };
        lines.remove(pos);
        lines.drain(pos..).collect::<Vec<_>>().join("\n")
    }
}
