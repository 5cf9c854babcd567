//! 首次下载时初始化作品目录：按站点与作品编号查找预设文件，否则写入默认模板。
//! 已存在的文件一律不覆盖。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

pub const SETTING_FILE_NAME: &str = "setting.ini";
pub const REPLACE_FILE_NAME: &str = "replace.txt";

const SCAFFOLD_FILES: [&str; 2] = [SETTING_FILE_NAME, REPLACE_FILE_NAME];

pub struct ScaffoldContext<'a> {
    pub work_dir: &'a Path,
    pub domain: &'a str,
    pub ncode: &'a str,
    pub title: &'a str,
    pub toc_url: &'a str,
}

pub trait LayoutScaffold {
    fn init_work_dir(&self, ctx: &ScaffoldContext<'_>) -> io::Result<()>;
}

pub struct PresetScaffold {
    preset_dir: PathBuf,
}

impl PresetScaffold {
    pub fn new(preset_dir: impl Into<PathBuf>) -> Self {
        Self {
            preset_dir: preset_dir.into(),
        }
    }

    fn template(file_name: &str, ctx: &ScaffoldContext<'_>) -> String {
        match file_name {
            SETTING_FILE_NAME => format!(
                "; {}\n; {}\n;\n; 作品单独的转换设置。\n",
                ctx.title, ctx.toc_url
            ),
            _ => "; 置换规则：每行一条，`置换前<TAB>置换后`。\n".to_string(),
        }
    }
}

impl LayoutScaffold for PresetScaffold {
    fn init_work_dir(&self, ctx: &ScaffoldContext<'_>) -> io::Result<()> {
        fs::create_dir_all(ctx.work_dir)?;
        let special = self.preset_dir.join(ctx.domain).join(ctx.ncode);

        for file_name in SCAFFOLD_FILES {
            let dest = ctx.work_dir.join(file_name);
            if dest.exists() {
                continue;
            }
            let preset = special.join(file_name);
            if !ctx.ncode.is_empty() && preset.is_file() {
                debug!(target: "scaffold", from = %preset.display(), "复制预设文件");
                fs::copy(&preset, &dest)?;
            } else {
                fs::write(&dest, Self::template(file_name, ctx))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(work_dir: &'a Path, ncode: &'a str) -> ScaffoldContext<'a> {
        ScaffoldContext {
            work_dir,
            domain: "ncode.syosetu.com",
            ncode,
            title: "作品",
            toc_url: "https://ncode.syosetu.com/n0001a/",
        }
    }

    #[test]
    fn writes_templates_without_preset() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        PresetScaffold::new(root.path().join("preset"))
            .init_work_dir(&ctx(&work, "n0001a"))
            .unwrap();
        let setting = fs::read_to_string(work.join(SETTING_FILE_NAME)).unwrap();
        assert!(setting.contains("作品"));
        assert!(work.join(REPLACE_FILE_NAME).is_file());
    }

    #[test]
    fn preset_files_take_priority_per_file() {
        let root = tempfile::tempdir().unwrap();
        let preset = root.path().join("preset");
        let special = preset.join("ncode.syosetu.com").join("n0001a");
        fs::create_dir_all(&special).unwrap();
        fs::write(special.join(REPLACE_FILE_NAME), "a\tb\n").unwrap();

        let work = root.path().join("work");
        PresetScaffold::new(&preset)
            .init_work_dir(&ctx(&work, "n0001a"))
            .unwrap();
        assert_eq!(fs::read_to_string(work.join(REPLACE_FILE_NAME)).unwrap(), "a\tb\n");
        assert!(
            fs::read_to_string(work.join(SETTING_FILE_NAME))
                .unwrap()
                .starts_with("; 作品")
        );
    }

    #[test]
    fn existing_files_are_never_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join(SETTING_FILE_NAME), "mine").unwrap();
        PresetScaffold::new(root.path().join("preset"))
            .init_work_dir(&ctx(&work, "n0001a"))
            .unwrap();
        assert_eq!(fs::read_to_string(work.join(SETTING_FILE_NAME)).unwrap(), "mine");
    }
}
