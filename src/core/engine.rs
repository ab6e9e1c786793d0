use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::pages::{PageRegistry, PageSpec};
use crate::core::reporter::{ReportLevel, Reporter};
use crate::core::resolver::ResolverTable;
use crate::core::schema::Schema;
use crate::core::source::source_filesystem;
use crate::core::store::ContentStore;
use crate::models::Config;
use crate::render::{RenderSource, SiteRenderer};
use crate::themes::{BuildContext, NodeContext, PageContext, ThemeManager};

/// 一次构建的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub nodes: usize,
    pub pages: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} pages, {} errors, {} warnings",
            self.nodes, self.pages, self.errors, self.warnings
        )
    }
}

/// 构建驱动：按阶段调用主题并输出站点
pub struct Engine {
    /// 站点目录
    pub base_dir: PathBuf,
    /// 输出目录
    pub public_dir: PathBuf,
    /// 站点配置
    pub config: Config,
    store: ContentStore,
    schema: Schema,
    resolvers: ResolverTable,
    pages: PageRegistry,
    reporter: Reporter,
    themes: ThemeManager,
}

impl Engine {
    /// 读取站点目录下的 `_config.yml` 创建引擎
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        info!("工作目录: {}", base_dir.display());
        let config = Config::load(&base_dir)?;
        Self::with_config(base_dir, config)
    }

    pub fn with_config(base_dir: PathBuf, config: Config) -> Result<Self> {
        let themes = ThemeManager::from_config(&config.themes)?;
        Ok(Self::with_themes(base_dir, config, themes))
    }

    /// 使用自定义的主题集合
    pub fn with_themes(base_dir: PathBuf, config: Config, themes: ThemeManager) -> Self {
        let public_dir = base_dir.join(config.public_dir());
        Self {
            base_dir,
            public_dir,
            config,
            store: ContentStore::new(),
            schema: Schema::new(),
            resolvers: ResolverTable::new(),
            pages: PageRegistry::new(),
            reporter: Reporter::new(),
            themes,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn pages(&self) -> &PageRegistry {
        &self.pages
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn themes(&self) -> &ThemeManager {
        &self.themes
    }

    /// 校验、声明类型、加载内容并派生节点
    pub fn bootstrap(&mut self) -> Result<()> {
        self.store = ContentStore::new();
        self.schema = Schema::new();
        self.resolvers = ResolverTable::new();
        self.pages = PageRegistry::new();
        self.reporter.clear();

        let ctx = BuildContext { base_dir: &self.base_dir, reporter: &self.reporter };
        self.themes.validate(&ctx)?;
        if self.reporter.has_fatal() {
            bail!("构建前校验失败");
        }

        self.themes.declare_schema(&mut self.schema)?;

        let mut mdx_ids = Vec::new();
        for source in self.themes.sources() {
            mdx_ids.extend(source_filesystem(&source, &self.base_dir, &mut self.store)?);
        }

        for id in &mdx_ids {
            let node = match self.store.get_node(id) {
                Some(node) => node.clone(),
                None => continue,
            };
            let mut ctx = NodeContext { store: &mut self.store, reporter: &self.reporter };
            self.themes.derive_node(&node, &mut ctx)?;
        }

        self.themes.register_resolvers(&mut self.resolvers);
        info!("加载完成: {} 个节点", self.store.len());
        Ok(())
    }

    /// 所有节点就绪后规划页面
    pub fn plan_pages(&mut self) -> Result<()> {
        let ctx = PageContext {
            store: &self.store,
            schema: &self.schema,
            reporter: &self.reporter,
        };
        self.themes.plan_pages(&ctx, &mut self.pages)?;
        info!("规划了 {} 个页面", self.pages.len());
        Ok(())
    }

    /// 将页面写入输出目录，同时写出 `pages.json` 与 `styles.json`
    pub fn render(&self) -> Result<usize> {
        fs::create_dir_all(&self.public_dir)
            .with_context(|| format!("创建目录失败: {}", self.public_dir.display()))?;

        let styles = self.themes.styles();
        let source = RenderSource {
            store: &self.store,
            schema: &self.schema,
            resolvers: &self.resolvers,
            config: &self.config,
            styles: &styles,
        };

        let mut renderer = SiteRenderer::new(&self.base_dir.join(self.config.layout_dir()))?;
        renderer.register_blocks(SiteRenderer::render_blocks(&source)?);

        self.pages
            .pages()
            .par_iter()
            .map(|page| -> Result<()> {
                let html = renderer.render_page(page, &source)?;
                let path = self.output_path(page);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .with_context(|| format!("创建目录失败: {}", parent.display()))?;
                }
                fs::write(&path, html)
                    .with_context(|| format!("写入文件失败: {}", path.display()))?;
                debug!("生成 {}", path.display());
                Ok(())
            })
            .collect::<Result<Vec<_>>>()?;

        write_json(&self.public_dir.join("pages.json"), self.pages.pages())?;
        write_json(&self.public_dir.join("styles.json"), &styles)?;

        Ok(self.pages.len())
    }

    /// 完整构建
    pub fn build(&mut self) -> Result<BuildSummary> {
        self.bootstrap()?;
        self.plan_pages()?;
        let pages = self.render()?;

        Ok(BuildSummary {
            nodes: self.store.len(),
            pages,
            errors: self.reporter.count(ReportLevel::Error),
            warnings: self.reporter.count(ReportLevel::Warn),
        })
    }

    /// 按需解析节点字段
    pub fn resolve_field(&self, node_id: &str, field: &str) -> Result<Value> {
        let node = self
            .store
            .get_node(node_id)
            .ok_or_else(|| anyhow!("节点不存在: {}", node_id))?;
        Ok(self.resolvers.resolve(&self.store, node, field)?)
    }

    /// 各主题的样式覆盖
    pub fn styles(&self) -> Map<String, Value> {
        self.themes.styles()
    }

    /// 删除输出目录
    pub fn clean(&self) -> Result<()> {
        if self.public_dir.exists() {
            fs::remove_dir_all(&self.public_dir)
                .with_context(|| format!("删除目录失败: {}", self.public_dir.display()))?;
            info!("已删除 {}", self.public_dir.display());
        }
        Ok(())
    }

    fn output_path(&self, page: &PageSpec) -> PathBuf {
        let relative = page.path.trim_matches('/');
        if relative.is_empty() {
            self.public_dir.join("index.html")
        } else {
            self.public_dir.join(relative).join("index.html")
        }
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("写入文件失败: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_nest_index_files() {
        let engine = Engine::with_config(PathBuf::from("/site"), Config::default()).unwrap();
        assert_eq!(
            engine.output_path(&PageSpec::new("/blog/page/2", "posts-template")),
            PathBuf::from("/site/public/blog/page/2/index.html")
        );
        assert_eq!(
            engine.output_path(&PageSpec::new("/", "posts-template")),
            PathBuf::from("/site/public/index.html")
        );
    }

    #[test]
    fn resolving_unknown_nodes_fails() {
        let engine = Engine::with_config(PathBuf::from("/site"), Config::default()).unwrap();
        assert!(engine.resolve_field("missing", "body").is_err());
    }

    #[test]
    fn summary_display() {
        let summary = BuildSummary { nodes: 4, pages: 2, errors: 0, warnings: 1 };
        assert_eq!(summary.to_string(), "4 nodes, 2 pages, 0 errors, 1 warnings");
    }
}
