use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};

use crate::themes::ThemeError;
use crate::utils::normalize_base_path;

/// 站点配置文件名
pub const CONFIG_FILE: &str = "_config.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_title")]
    pub title: String,
    pub description: Option<String>,
    /// 输出目录，默认 `public`
    pub public_dir: Option<String>,
    /// 自定义模板目录，默认 `layouts`
    pub layout_dir: Option<String>,
    /// 启用的主题及其选项
    #[serde(default)]
    pub themes: ThemesConfig,
}

fn default_title() -> String {
    "My Site".to_string()
}

/// 主题选项；显式给出 `themes` 时未列出的主题不启用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemesConfig {
    pub post: Option<PostThemeOptions>,
    pub block: Option<BlockThemeOptions>,
    pub doc: Option<DocThemeOptions>,
}

impl Default for ThemesConfig {
    fn default() -> Self {
        Self {
            post: Some(PostThemeOptions::default()),
            block: Some(BlockThemeOptions::default()),
            doc: Some(DocThemeOptions::default()),
        }
    }
}

/// 文章主题选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostThemeOptions {
    #[serde(default = "default_post_content_path")]
    pub content_path: String,
    #[serde(default = "default_post_base_path")]
    pub base_path: String,
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: usize,
}

fn default_post_content_path() -> String {
    "content/posts".to_string()
}

fn default_post_base_path() -> String {
    "/blog".to_string()
}

fn default_posts_per_page() -> usize {
    6
}

impl Default for PostThemeOptions {
    fn default() -> Self {
        Self {
            content_path: default_post_content_path(),
            base_path: default_post_base_path(),
            posts_per_page: default_posts_per_page(),
        }
    }
}

impl PostThemeOptions {
    /// 校验并规范化选项
    pub fn with_defaults(self) -> Result<Self, ThemeError> {
        if self.posts_per_page == 0 {
            return Err(ThemeError::Config {
                theme: "post".to_string(),
                message: "postsPerPage must be at least 1".to_string(),
            });
        }
        if self.content_path.trim().is_empty() {
            return Err(ThemeError::Config {
                theme: "post".to_string(),
                message: "contentPath must not be empty".to_string(),
            });
        }
        Ok(Self {
            base_path: normalize_base_path(&self.base_path),
            ..self
        })
    }
}

/// 内容块主题选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockThemeOptions {
    #[serde(default = "default_block_content_path")]
    pub content_path: String,
}

fn default_block_content_path() -> String {
    "content/blocks".to_string()
}

impl Default for BlockThemeOptions {
    fn default() -> Self {
        Self { content_path: default_block_content_path() }
    }
}

impl BlockThemeOptions {
    pub fn with_defaults(self) -> Result<Self, ThemeError> {
        if self.content_path.trim().is_empty() {
            return Err(ThemeError::Config {
                theme: "block".to_string(),
                message: "contentPath must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}

/// 文档主题没有选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocThemeOptions {}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: default_title(),
            description: None,
            public_dir: None,
            layout_dir: None,
            themes: ThemesConfig::default(),
        }
    }
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // 空文件视为默认配置
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// 加载站点目录下的配置，文件不存在时使用默认值
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(CONFIG_FILE);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn public_dir(&self) -> &str {
        self.public_dir.as_deref().unwrap_or("public")
    }

    pub fn layout_dir(&self) -> &str {
        self.layout_dir.as_deref().unwrap_or("layouts")
    }
}
