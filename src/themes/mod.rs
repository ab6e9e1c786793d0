// 内容主题：文章、内容块、文档样式
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Result};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::pages::PageRegistry;
use crate::core::reporter::Reporter;
use crate::core::resolver::ResolverTable;
use crate::core::schema::Schema;
use crate::core::source::ContentSource;
use crate::core::store::ContentStore;
use crate::models::types::{FILE_TYPE, MDX_TYPE};
use crate::models::{Node, ThemesConfig};

mod error;
pub use error::{ThemeError, ThemeHook};

pub mod block;
pub mod doc;
pub mod post;

pub use block::BlockTheme;
pub use doc::DocTheme;
pub use post::PostTheme;

/// 构建前阶段的上下文
pub struct BuildContext<'a> {
    pub base_dir: &'a Path,
    pub reporter: &'a Reporter,
}

/// 派生节点阶段的上下文
pub struct NodeContext<'a> {
    pub store: &'a mut ContentStore,
    pub reporter: &'a Reporter,
}

/// 规划页面阶段的上下文：此时所有节点都已存在
pub struct PageContext<'a> {
    pub store: &'a ContentStore,
    pub schema: &'a Schema,
    pub reporter: &'a Reporter,
}

/// 主题特征，由构建驱动按固定顺序调用
pub trait Theme: Send + Sync {
    /// 主题名称，同时作为节点 ID 的命名空间
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 需要扫描的内容目录
    fn source(&self) -> Option<ContentSource> {
        None
    }

    /// 构建前校验
    fn validate(&self, _ctx: &BuildContext<'_>) -> Result<()> {
        Ok(())
    }

    /// 声明节点类型
    fn declare_schema(&self, _schema: &mut Schema) -> Result<()> {
        Ok(())
    }

    /// 处理一个源节点
    fn derive_node(&self, _node: &Node, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    /// 注册字段解析函数
    fn register_resolvers(&self, _resolvers: &mut ResolverTable) {}

    /// 规划页面
    fn plan_pages(&self, _ctx: &PageContext<'_>, _pages: &mut PageRegistry) -> Result<()> {
        Ok(())
    }

    /// 样式覆盖
    fn style(&self) -> Option<Value> {
        None
    }
}

/// 确保内容目录存在，不存在时创建
pub fn ensure_content_path(path: &Path, reporter: &Reporter) -> Result<(), ThemeError> {
    if path.is_dir() {
        return Ok(());
    }
    if path.exists() {
        let message = format!("{} exists but is not a directory", path.display());
        reporter.panic_on_build(message.clone());
        return Err(ThemeError::ContentPath { path: path.display().to_string(), message });
    }

    reporter.info(format!("creating the {} directory", path.display()));
    fs::create_dir_all(path).map_err(|e| {
        let message = format!("could not create {}: {}", path.display(), e);
        reporter.panic_on_build(message.clone());
        ThemeError::ContentPath { path: path.display().to_string(), message }
    })
}

/// 找到 Mdx 节点对应的文件节点，仅当文件来自 `source_name` 目录时返回
pub fn mdx_source_file<'a>(
    node: &Node,
    store: &'a ContentStore,
    source_name: &str,
) -> Option<&'a Node> {
    if node.node_type() != MDX_TYPE {
        return None;
    }
    let parent = node.parent.as_deref().and_then(|id| store.get_node(id))?;
    if parent.node_type() != FILE_TYPE
        || parent.field_str("sourceInstanceName") != Some(source_name)
    {
        return None;
    }
    Some(parent)
}

/// 主题管理器，负责按阶段调用所有主题
#[derive(Default)]
pub struct ThemeManager {
    themes: Vec<Box<dyn Theme>>,
}

impl ThemeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按配置创建启用的主题
    pub fn from_config(config: &ThemesConfig) -> Result<Self, ThemeError> {
        let mut manager = Self::new();
        if let Some(options) = &config.post {
            manager.register(Box::new(PostTheme::new(options.clone())?));
        }
        if let Some(options) = &config.block {
            manager.register(Box::new(BlockTheme::new(options.clone())?));
        }
        if config.doc.is_some() {
            manager.register(Box::new(DocTheme::new()));
        }
        Ok(manager)
    }

    pub fn register(&mut self, theme: Box<dyn Theme>) {
        info!("注册主题: {} - {}", theme.name(), theme.description());
        self.themes.push(theme);
    }

    pub fn themes(&self) -> impl Iterator<Item = &dyn Theme> {
        self.themes.iter().map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.themes.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.themes.is_empty()
    }

    /// 对每个主题执行一个阶段，汇总失败
    fn run_hook<F>(&self, hook: ThemeHook, mut f: F) -> Result<()>
    where
        F: FnMut(&dyn Theme) -> Result<()>,
    {
        let mut errors = Vec::new();
        let mut failed = Vec::new();

        for theme in &self.themes {
            if let Err(e) = f(theme.as_ref()) {
                warn!("主题 {} 执行 {} 失败: {:#}", theme.name(), hook, e);
                failed.push(theme.name().to_string());
                errors.push(format!("{:#}", e));
            }
        }

        match failed.len() {
            0 => Ok(()),
            1 => Err(anyhow!(ThemeError::HookError {
                theme_name: failed.remove(0),
                hook,
                message: errors.join("; "),
            })),
            _ => Err(anyhow!(ThemeError::HookError {
                theme_name: failed.join(", "),
                hook,
                message: errors.join("; "),
            })),
        }
    }

    pub fn validate(&self, ctx: &BuildContext<'_>) -> Result<()> {
        self.run_hook(ThemeHook::PreBootstrap, |theme| theme.validate(ctx))
    }

    pub fn declare_schema(&self, schema: &mut Schema) -> Result<()> {
        self.run_hook(ThemeHook::CreateSchemaCustomization, |theme| theme.declare_schema(schema))
    }

    pub fn sources(&self) -> Vec<ContentSource> {
        self.themes.iter().filter_map(|t| t.source()).collect()
    }

    pub fn derive_node(&self, node: &Node, ctx: &mut NodeContext<'_>) -> Result<()> {
        debug!("派生节点: {} ({})", node.id, node.node_type());
        self.run_hook(ThemeHook::OnCreateNode, |theme| theme.derive_node(node, ctx))
    }

    pub fn register_resolvers(&self, resolvers: &mut ResolverTable) {
        for theme in &self.themes {
            theme.register_resolvers(resolvers);
        }
    }

    pub fn plan_pages(&self, ctx: &PageContext<'_>, pages: &mut PageRegistry) -> Result<()> {
        self.run_hook(ThemeHook::CreatePages, |theme| theme.plan_pages(ctx, pages))
    }

    /// 收集各主题的样式覆盖，键为主题名称
    pub fn styles(&self) -> Map<String, Value> {
        self.themes
            .iter()
            .filter_map(|t| t.style().map(|style| (t.name().to_string(), style)))
            .collect()
    }
}
