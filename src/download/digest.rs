//! 话数减少（疑似被改为摘要版）时的确认流程。
//!
//! 状态转移是纯函数；输入输出全部通过 [`DecisionInput`] 注入，便于脚本化测试。

use std::io;

use tracing::{info, warn};

use super::models::{SubtitleRecord, TableOfContents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestState {
    Prompting,
    Proceed,
    Cancel,
    CancelAndFreeze,
}

impl DigestState {
    pub fn is_terminal(self) -> bool {
        self != DigestState::Prompting
    }

    /// 是否应当中止本次更新。
    pub fn blocks_update(self) -> bool {
        matches!(self, DigestState::Cancel | DigestState::CancelAndFreeze)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestChoice {
    Proceed,
    Cancel,
    CancelAndFreeze,
    ShowSynopsis,
    OpenPage,
    Invalid,
}

impl DigestChoice {
    /// 只看输入的第一个字符。
    pub fn parse(input: &str) -> Self {
        match input.chars().next() {
            Some('1') => DigestChoice::Proceed,
            Some('2') => DigestChoice::Cancel,
            Some('3') => DigestChoice::CancelAndFreeze,
            Some('4') => DigestChoice::ShowSynopsis,
            Some('5') => DigestChoice::OpenPage,
            _ => DigestChoice::Invalid,
        }
    }
}

pub fn transition(state: DigestState, choice: DigestChoice) -> DigestState {
    if state.is_terminal() {
        return state;
    }
    match choice {
        DigestChoice::Proceed => DigestState::Proceed,
        DigestChoice::Cancel => DigestState::Cancel,
        DigestChoice::CancelAndFreeze => DigestState::CancelAndFreeze,
        DigestChoice::ShowSynopsis | DigestChoice::OpenPage | DigestChoice::Invalid => {
            DigestState::Prompting
        }
    }
}

/// 摘要确认所需的交互能力。
pub trait DecisionInput {
    /// 显示标题、新旧话数与选项菜单。
    fn present_menu(&mut self, title: &str, old_count: usize, latest_count: usize);
    /// 读取一行输入；输入结束（EOF）时返回 `Ok(None)`。
    fn read_choice(&mut self) -> io::Result<Option<String>>;
    fn show_synopsis(&mut self, story: &str);
    fn open_page(&mut self, url: &str);
}

pub fn is_digest_suspected(old: &[SubtitleRecord], latest: &[SubtitleRecord]) -> bool {
    latest.len() < old.len()
}

/// 话数未减少时直接返回 `Proceed`，否则循环提示直到得到 1/2/3 之一。
/// 提示过程中输入结束按 `Cancel` 处理。
pub fn run_digest_guard<I: DecisionInput + ?Sized>(
    old: &[SubtitleRecord],
    latest: &TableOfContents,
    input: &mut I,
) -> io::Result<DigestState> {
    if !is_digest_suspected(old, &latest.subtitles) {
        return Ok(DigestState::Proceed);
    }

    let old_count = old.len();
    let latest_count = latest.subtitles.len();
    warn!(
        target: "digest",
        "《{}》更新后的话数（{}）少于已保存的话数（{}），可能已被改为摘要版",
        latest.title, latest_count, old_count
    );

    let mut state = DigestState::Prompting;
    while !state.is_terminal() {
        input.present_menu(&latest.title, old_count, latest_count);
        let Some(line) = input.read_choice()? else {
            info!(target: "digest", "输入已结束，取消更新");
            return Ok(DigestState::Cancel);
        };
        let choice = DigestChoice::parse(&line);
        match choice {
            DigestChoice::ShowSynopsis => input.show_synopsis(&latest.story),
            DigestChoice::OpenPage => input.open_page(&latest.toc_url),
            _ => {}
        }
        state = transition(state, choice);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Scripted {
        lines: VecDeque<String>,
        menus: usize,
        synopses: Vec<String>,
        opened: Vec<String>,
    }

    impl Scripted {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl DecisionInput for Scripted {
        fn present_menu(&mut self, _title: &str, _old: usize, _latest: usize) {
            self.menus += 1;
        }
        fn read_choice(&mut self) -> io::Result<Option<String>> {
            Ok(self.lines.pop_front())
        }
        fn show_synopsis(&mut self, story: &str) {
            self.synopses.push(story.to_string());
        }
        fn open_page(&mut self, url: &str) {
            self.opened.push(url.to_string());
        }
    }

    fn records(n: usize) -> Vec<SubtitleRecord> {
        (1..=n)
            .map(|i| SubtitleRecord {
                index: i.to_string(),
                subtitle: format!("第{i}話"),
                ..Default::default()
            })
            .collect()
    }

    fn toc(n: usize) -> TableOfContents {
        TableOfContents {
            title: "作品".into(),
            toc_url: "https://example.com/n0001a/".into(),
            story: "あらすじ".into(),
            subtitles: records(n),
            ..Default::default()
        }
    }

    #[test]
    fn not_triggered_when_count_does_not_shrink() {
        let mut input = Scripted::new(&[]);
        for n in [5, 6] {
            let state = run_digest_guard(&records(5), &toc(n), &mut input).unwrap();
            assert_eq!(state, DigestState::Proceed);
        }
        assert_eq!(input.menus, 0);
    }

    #[test]
    fn only_first_character_matters() {
        assert_eq!(DigestChoice::parse("1abc"), DigestChoice::Proceed);
        assert_eq!(DigestChoice::parse("2\n"), DigestChoice::Cancel);
        assert_eq!(DigestChoice::parse("35"), DigestChoice::CancelAndFreeze);
        assert_eq!(DigestChoice::parse(" 1"), DigestChoice::Invalid);
        assert_eq!(DigestChoice::parse(""), DigestChoice::Invalid);
    }

    #[test]
    fn terminal_states_are_sticky() {
        for state in [
            DigestState::Proceed,
            DigestState::Cancel,
            DigestState::CancelAndFreeze,
        ] {
            assert_eq!(transition(state, DigestChoice::Proceed), state);
        }
    }

    #[test]
    fn reprompts_until_a_terminal_choice() {
        let mut input = Scripted::new(&["x", "4", "5", "9", "3"]);
        let state = run_digest_guard(&records(5), &toc(3), &mut input).unwrap();
        assert_eq!(state, DigestState::CancelAndFreeze);
        assert!(state.blocks_update());
        assert_eq!(input.menus, 5);
        assert_eq!(input.synopses, ["あらすじ"]);
        assert_eq!(input.opened, ["https://example.com/n0001a/"]);
    }

    #[test]
    fn proceed_and_cancel() {
        let mut input = Scripted::new(&["1"]);
        let state = run_digest_guard(&records(2), &toc(1), &mut input).unwrap();
        assert_eq!(state, DigestState::Proceed);
        assert!(!state.blocks_update());

        let mut input = Scripted::new(&["2"]);
        let state = run_digest_guard(&records(2), &toc(1), &mut input).unwrap();
        assert_eq!(state, DigestState::Cancel);
    }

    #[test]
    fn end_of_input_cancels() {
        let mut input = Scripted::new(&["4"]);
        let state = run_digest_guard(&records(2), &toc(1), &mut input).unwrap();
        assert_eq!(state, DigestState::Cancel);
        assert_eq!(input.menus, 2);
    }
}
