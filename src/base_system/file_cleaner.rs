//! 空目录清理。

use std::fs;
use std::io;
use std::path::Path;

pub fn is_empty_dir(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    let mut entries = fs::read_dir(path)?;
    Ok(entries.next().is_none())
}

/// 目录存在且为空时删除它，返回是否删除。
pub fn remove_dir_if_empty(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    if !path.is_dir() || !is_empty_dir(path)? {
        return Ok(false);
    }
    fs::remove_dir(path)?;
    Ok(true)
}
