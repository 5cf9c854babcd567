//! 交互层入口。
//!
//! 只有命令行一套实现（`noui`）。

pub mod noui;
