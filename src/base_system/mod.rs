pub mod book_paths;
pub mod config;
pub mod context;
pub mod file_cleaner;
pub mod interrupt;
pub mod logging;
pub mod scaffold;
