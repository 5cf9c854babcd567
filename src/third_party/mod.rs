//! 站点之外的辅助服务。

pub mod metadata_api;
