//! 抓取文本的预处理工具。
//!
//! 实体解码、换行统一、简介清理等纯文本操作。

use std::borrow::Cow;

// ── 实体解码 ────────────────────────────────────────────────────

/// 固定的命名实体表。按此顺序依次替换。
const ENTITIES: [(&str, &str); 6] = [
    ("&quot;", "\""),
    ("&amp;", "&"),
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&copy;", "(c)"),
];

/// 将固定集合内的命名实体还原为字面字符。
pub fn restore_entities(s: &str) -> Cow<'_, str> {
    if !ENTITIES.iter().any(|(entity, _)| s.contains(entity)) {
        return Cow::Borrowed(s);
    }

    let mut out = s.to_string();
    for (entity, literal) in ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, literal);
        }
    }
    Cow::Owned(out)
}

/// 所有抓取结果在进入解析前都要经过这里：实体还原 + 去掉 `\r`。
pub fn pretreatment_source(raw: &str) -> String {
    restore_entities(raw).replace('\r', "")
}

// ── 简介清理 ────────────────────────────────────────────────────

pub fn clean_story(story: &str) -> String {
    story.replace("<br />", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_every_entity_in_table() {
        let raw = "&quot;a&quot; &amp; b&nbsp;&lt;c&gt; &copy;2013";
        assert_eq!(restore_entities(raw), "\"a\" & b <c> (c)2013");
    }

    #[test]
    fn leaves_unknown_entities_alone() {
        assert_eq!(restore_entities("&hellip;&#12354;"), "&hellip;&#12354;");
        assert!(matches!(restore_entities("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn decoding_is_idempotent_once_no_entities_remain() {
        let samples = [
            "&lt;p&gt;本文&lt;/p&gt;",
            "Tom &amp; Jerry",
            "&nbsp;&nbsp;indent",
            "no entities here",
        ];
        for s in samples {
            let once = restore_entities(s).into_owned();
            let twice = restore_entities(&once).into_owned();
            assert_eq!(once, twice, "sample: {s}");
        }
    }

    #[test]
    fn pretreatment_strips_carriage_returns() {
        assert_eq!(pretreatment_source("a\r\nb&amp;c\r\n"), "a\nb&c\n");
    }

    #[test]
    fn story_br_tags_are_removed() {
        assert_eq!(clean_story("一行目<br />\n二行目"), "一行目\n二行目");
    }
}
