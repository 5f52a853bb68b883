//! CLI 参数处理

pub mod args;

pub use args::*;
