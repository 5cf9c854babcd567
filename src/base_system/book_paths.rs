use std::path::{Path, PathBuf};

use crate::base_system::context::safe_fs_name;

/// 作品目录：`<archive_root>/<sitename>/<file_title>`。
pub fn work_dir(archive_root: &Path, sitename: &str, file_title: &str) -> PathBuf {
    archive_root
        .join(safe_fs_name(sitename, "_", 120))
        .join(file_title)
}

/// 目录中使用的作品名：标题经文件名安全处理并去掉首尾空白。
pub fn file_title(title: &str) -> String {
    safe_fs_name(title.trim(), "_", 120)
}
