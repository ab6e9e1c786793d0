pub mod core;
pub mod models;
pub mod render;
pub mod themes;
pub mod utils;

// Re-export commonly used types and traits
pub use crate::core::{BuildSummary, ContentStore, Engine, PageSpec, Reporter, Schema};
pub use crate::models::{Block, Config, Node, Post, PostTag};
pub use crate::themes::{BlockTheme, DocTheme, PostTheme, Theme, ThemeError, ThemeManager};
