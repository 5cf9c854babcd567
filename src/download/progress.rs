//! 逐话下载的 CLI 进度条。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

pub(crate) struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub(crate) fn new(total: usize, enabled: bool) -> Self {
        if !enabled || total == 0 {
            return Self { bar: None };
        }
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        bar.set_style(style);
        bar.set_prefix("本文下载");
        Self { bar: Some(bar) }
    }

    pub(crate) fn inc(&self) {
        if let Some(bar) = self.bar.as_ref() {
            bar.inc(1);
        }
    }

    /// 在进度条上方输出一行，不打乱进度条。
    pub(crate) fn println(&self, line: &str) {
        match self.bar.as_ref() {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}
