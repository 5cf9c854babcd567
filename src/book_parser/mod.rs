//! 目录与正文的解析和落盘。

pub mod book_manager;
pub mod html_utils;
pub mod parser;
