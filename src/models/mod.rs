pub mod config;
pub mod types;

pub use config::{BlockThemeOptions, Config, DocThemeOptions, PostThemeOptions, ThemesConfig};
pub use types::{Block, Node, NodeId, NodeInternal, Post, PostTag};
