//! 页面抓取：503 重试、字符集解码与重定向检测。

pub mod network;
