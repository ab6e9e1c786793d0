use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::core::pages::{page_path, paginate, PageRegistry, PageSpec, Paginate};
use crate::core::query::Sort;
use crate::core::resolver::{mdx_resolver_passthrough, ResolverTable};
use crate::core::schema::{FieldType, Schema, TypeDefinition};
use crate::core::source::ContentSource;
use crate::models::types::{fields_of, POST_TAG_TYPE, POST_TYPE};
use crate::models::{Node, Post, PostTag, PostThemeOptions};
use crate::themes::{
    ensure_content_path, mdx_source_file, BuildContext, NodeContext, PageContext, Theme,
    ThemeError,
};
use crate::utils::digest::{create_content_digest, create_node_id};
use crate::utils::markdown::{self, EXCERPT_PRUNE_LENGTH};
use crate::utils::{
    ensure_leading_slash, join_path, parse_date, path_to_slug, strip_extension, to_slug,
};

/// 文章列表模板
pub const POSTS_TEMPLATE: &str = "posts-template";
/// 文章详情模板
pub const POST_TEMPLATE: &str = "post-template";
/// 标签模板
pub const TAG_TEMPLATE: &str = "tag-template";

/// 页面规划只需要的文章字段
#[derive(Debug, Deserialize)]
struct PostRef {
    id: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct TagRef {
    name: String,
    slug: String,
}

/// 文章主题：派生 `Post` 与 `PostTag`，生成分页列表、文章页与标签页
pub struct PostTheme {
    options: PostThemeOptions,
}

impl PostTheme {
    pub fn new(options: PostThemeOptions) -> Result<Self, ThemeError> {
        Ok(Self { options: options.with_defaults()? })
    }

    pub fn options(&self) -> &PostThemeOptions {
        &self.options
    }

    /// 标签路由，创建标签节点与规划标签页都使用它
    pub fn tag_slug(&self, name: &str) -> String {
        join_path(&self.options.base_path, &format!("tags/{}", to_slug(name)))
    }

    pub fn tag_id(&self, name: &str) -> String {
        create_node_id(&format!("{}-{}", POST_TAG_TYPE, name), self.name())
    }

    fn post_slug(&self, front: &Map<String, Value>, relative_path: &str) -> String {
        if let Some(slug) = front.get("slug").and_then(Value::as_str).map(str::trim) {
            if !slug.is_empty() {
                let slug = slug.trim_end_matches('/');
                return if slug.is_empty() { "/".to_string() } else { ensure_leading_slash(slug) };
            }
        }

        let stripped = strip_extension(relative_path);
        // `hello/index.mdx` 与 `hello.mdx` 使用同一路由；根目录的 `index.mdx` 不能占用列表页
        let stripped = match stripped.rsplit_once('/') {
            Some((dir, "index")) => dir,
            _ => stripped,
        };
        join_path(&self.options.base_path, &path_to_slug(stripped))
    }

    /// 从 Mdx 节点与其文件节点构造文章
    pub fn post_from_mdx(&self, mdx: &Node, file: &Node) -> Post {
        let empty = Map::new();
        let front = mdx.field("frontmatter").and_then(Value::as_object).unwrap_or(&empty);
        let body = mdx.field_str("body").unwrap_or_default();
        let relative_path = file.field_str("relativePath").unwrap_or_default();

        let text = |key: &str| {
            front
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let flag = |key: &str| front.get(key).and_then(Value::as_bool);

        let title = text("title").unwrap_or_else(|| {
            Path::new(relative_path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Untitled")
                .to_string()
        });

        let date = match front.get("date") {
            Some(Value::String(raw)) => {
                let parsed = parse_date(raw);
                if parsed.is_none() {
                    warn!("无法解析文章日期 {}: {}", relative_path, raw);
                }
                parsed
            }
            Some(Value::Null) | None => None,
            Some(other) => {
                warn!("无法解析文章日期 {}: {}", relative_path, other);
                None
            }
        };

        let excerpt = text("excerpt").or_else(|| {
            let generated = markdown::excerpt(body, EXCERPT_PRUNE_LENGTH);
            (!generated.is_empty()).then_some(generated)
        });

        let mut tags: Vec<String> = Vec::new();
        let raw_tags = match front.get("tags") {
            Some(Value::Array(items)) => items.clone(),
            Some(single @ Value::String(_)) => vec![single.clone()],
            _ => Vec::new(),
        };
        for item in raw_tags {
            let name = match item {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !name.is_empty() && !tags.contains(&name) {
                tags.push(name);
            }
        }

        Post {
            id: create_node_id(&format!("{}-{}", POST_TYPE, file.id), self.name()),
            title,
            excerpt,
            date,
            slug: self.post_slug(front, relative_path),
            image: text("image"),
            caption: text("caption"),
            featured: flag("featured"),
            status: flag("status"),
            author: text("author"),
            tags,
        }
    }
}

impl Theme for PostTheme {
    fn name(&self) -> &str {
        "post"
    }

    fn description(&self) -> &str {
        "博客文章、标签与分页列表"
    }

    fn source(&self) -> Option<ContentSource> {
        Some(ContentSource::new(POST_TYPE, &self.options.content_path))
    }

    fn validate(&self, ctx: &BuildContext<'_>) -> Result<()> {
        ensure_content_path(&ctx.base_dir.join(&self.options.content_path), ctx.reporter)?;
        Ok(())
    }

    fn declare_schema(&self, schema: &mut Schema) -> Result<()> {
        schema.create_types(vec![
            TypeDefinition::new(POST_TYPE)
                .field("title", FieldType::String)
                .field("excerpt", FieldType::String)
                .field("date", FieldType::Date)
                .field("slug", FieldType::String)
                .field("body", FieldType::String)
                .field("image", FieldType::String)
                .field("caption", FieldType::String)
                .field("timeToRead", FieldType::Int)
                .field("featured", FieldType::Boolean)
                .field("status", FieldType::Boolean)
                .field("author", FieldType::link("Profile", "name"))
                .field("tags", FieldType::link_list(POST_TAG_TYPE, "name")),
            TypeDefinition::new(POST_TAG_TYPE)
                .field("name", FieldType::String)
                .field("slug", FieldType::String),
        ])?;
        Ok(())
    }

    fn derive_node(&self, node: &Node, ctx: &mut NodeContext<'_>) -> Result<()> {
        let mut post = match mdx_source_file(node, ctx.store, POST_TYPE) {
            Some(file) => self.post_from_mdx(node, file),
            None => return Ok(()),
        };

        let mut tags: Vec<String> = Vec::with_capacity(post.tags.len());
        for name in &post.tags {
            let slug = self.tag_slug(name);
            // 别名相同的标签只创建一次，文章引用最先出现的名称
            let existing = ctx
                .store
                .nodes_of_type(POST_TAG_TYPE)
                .into_iter()
                .find(|tag| tag.field_str("slug") == Some(slug.as_str()))
                .and_then(|tag| tag.field_str("name"))
                .map(str::to_string);

            let canonical = match existing {
                Some(existing) => {
                    if existing != *name {
                        debug!("标签 {} 与 {} 别名相同，已合并", name, existing);
                    }
                    existing
                }
                None => {
                    let tag = PostTag { id: self.tag_id(name), name: name.clone(), slug };
                    let mut tag_node = Node::new(
                        tag.id.clone(),
                        POST_TAG_TYPE,
                        create_content_digest(&format!("{}-{}", POST_TAG_TYPE, name)),
                        self.name(),
                    );
                    tag_node.fields = fields_of(&tag);
                    ctx.store.create_node(tag_node)?;
                    name.clone()
                }
            };
            if !tags.contains(&canonical) {
                tags.push(canonical);
            }
        }
        post.tags = tags;

        let mut post_node = Node::new(
            post.id.clone(),
            POST_TYPE,
            create_content_digest(&node.internal.content_digest),
            self.name(),
        )
        .with_parent(&node.id);
        post_node.fields = fields_of(&post);

        debug!("派生文章 {} -> {}", post.title, post.slug);
        ctx.store.create_node(post_node)?;
        Ok(())
    }

    fn register_resolvers(&self, resolvers: &mut ResolverTable) {
        resolvers.register(POST_TYPE, "body", mdx_resolver_passthrough("body"));
        resolvers.register(POST_TYPE, "timeToRead", mdx_resolver_passthrough("timeToRead"));
    }

    fn plan_pages(&self, ctx: &PageContext<'_>, pages: &mut PageRegistry) -> Result<()> {
        let result = ctx
            .store
            .query_all::<PostRef>(ctx.schema, POST_TYPE, Some(&Sort::desc("date")));
        if result.has_errors() {
            ctx.reporter.error("There was an error fetching blog posts.", &result.errors);
        }

        let posts = result.data;
        if posts.is_empty() {
            return Ok(());
        }

        let base_path = self.options.base_path.clone();
        let index_prefix = |page_number: usize| {
            if page_number == 0 {
                base_path.clone()
            } else {
                join_path(&base_path, "page")
            }
        };

        let mut context = Map::new();
        context.insert("total".to_string(), Value::from(posts.len()));
        let index_pages = paginate(
            pages,
            Paginate {
                total_items: posts.len(),
                items_per_page: self.options.posts_per_page,
                component: POSTS_TEMPLATE,
                context,
            },
            &index_prefix,
        );
        let index_routes: HashSet<String> = (0..index_pages)
            .map(|page_number| page_path(&index_prefix(page_number), page_number))
            .collect();

        for (index, post) in posts.iter().enumerate() {
            let prev = match index {
                0 => Value::Null,
                i => Value::String(posts[i - 1].id.clone()),
            };
            let next = posts
                .get(index + 1)
                .map(|p| Value::String(p.id.clone()))
                .unwrap_or(Value::Null);

            // 列表页的路由不能被文章页覆盖
            if index_routes.contains(&post.slug) {
                ctx.reporter.error(
                    format!("Post {} uses the slug {} of a listing page.", post.id, post.slug),
                    &[] as &[String],
                );
                continue;
            }

            pages.create_page(
                PageSpec::new(&post.slug, POST_TEMPLATE)
                    .with_context("id", post.id.as_str())
                    .with_context("prev", prev)
                    .with_context("next", next),
            );
        }

        let tags = ctx
            .store
            .query_all::<TagRef>(ctx.schema, POST_TAG_TYPE, Some(&Sort::asc("name")));
        if tags.has_errors() {
            ctx.reporter.error("There was an error fetching tags.", &tags.errors);
        }
        for tag in &tags.data {
            pages.create_page(
                PageSpec::new(&tag.slug, TAG_TEMPLATE).with_context("name", tag.name.as_str()),
            );
        }

        info!(
            "文章主题规划了 {} 个列表页、{} 个文章页、{} 个标签页",
            index_pages,
            posts.len(),
            tags.data.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reporter::{ReportLevel, Reporter};
    use crate::core::store::ContentStore;
    use crate::models::types::{FILE_TYPE, MDX_TYPE};
    use serde_json::json;

    fn theme(per_page: usize) -> PostTheme {
        PostTheme::new(PostThemeOptions { posts_per_page: per_page, ..Default::default() }).unwrap()
    }

    /// 向仓库写入一对文件 / Mdx 节点，返回 Mdx 节点
    fn add_source(
        store: &mut ContentStore,
        source: &str,
        path: &str,
        front: Value,
        body: &str,
    ) -> Node {
        let file_id = format!("file-{}-{}", source, path);
        store
            .create_node(
                Node::new(file_id.clone(), FILE_TYPE, format!("d-{}", path), "source-filesystem")
                    .with_field("sourceInstanceName", source)
                    .with_field("relativePath", path),
            )
            .unwrap();
        let mdx = Node::new(format!("mdx-{}", file_id), MDX_TYPE, format!("m-{}", path), "mdx")
            .with_parent(&file_id)
            .with_field("frontmatter", front)
            .with_field("body", body);
        store.create_node(mdx.clone()).unwrap();
        mdx
    }

    fn derive(theme: &PostTheme, store: &mut ContentStore, mdx: &Node) {
        let reporter = Reporter::new();
        let mut ctx = NodeContext { store, reporter: &reporter };
        theme.derive_node(mdx, &mut ctx).unwrap();
    }

    /// 声明类型并规划页面
    fn plan(theme: &PostTheme, store: &ContentStore) -> (PageRegistry, Reporter) {
        let mut schema = Schema::new();
        theme.declare_schema(&mut schema).unwrap();
        let reporter = Reporter::new();
        let mut pages = PageRegistry::new();
        let ctx = PageContext { store, schema: &schema, reporter: &reporter };
        theme.plan_pages(&ctx, &mut pages).unwrap();
        (pages, reporter)
    }

    fn component<'a>(pages: &'a PageRegistry, path: &str) -> Option<&'a str> {
        pages.get(path).map(|page| page.component.as_str())
    }

    #[test]
    fn derives_post_fields_from_front_matter() {
        let theme = theme(6);
        let mut store = ContentStore::new();
        let mdx = add_source(
            &mut store,
            "Post",
            "2021/Hello World.mdx",
            json!({
                "title": "Hello",
                "date": "2021-05-01",
                "tags": ["Rust", " Rust ", "Web Dev"],
                "featured": true,
                "author": "Ada",
            }),
            "Some body text.",
        );
        derive(&theme, &mut store, &mdx);

        let post_node = store.nodes_of_type(POST_TYPE)[0].clone();
        assert_eq!(post_node.parent.as_deref(), Some(mdx.id.as_str()));
        assert_eq!(post_node.field_str("slug"), Some("/blog/2021/hello-world"));
        assert_eq!(post_node.field_str("title"), Some("Hello"));
        assert_eq!(post_node.field_str("excerpt"), Some("Some body text."));
        assert_eq!(post_node.field("featured"), Some(&json!(true)));
        assert_eq!(post_node.field("tags"), Some(&json!(["Rust", "Web Dev"])));
        assert_eq!(
            post_node.internal.content_digest,
            create_content_digest("m-2021/Hello World.mdx")
        );

        let tag_slugs: Vec<_> = store
            .nodes_of_type(POST_TAG_TYPE)
            .iter()
            .filter_map(|t| t.field_str("slug").map(str::to_string))
            .collect();
        assert_eq!(tag_slugs, vec!["/blog/tags/rust", "/blog/tags/web-dev"]);
    }

    #[test]
    fn post_ids_are_deterministic() {
        let theme = theme(6);
        let mut first = ContentStore::new();
        let mut second = ContentStore::new();
        let a = add_source(&mut first, "Post", "a.mdx", json!({}), "");
        let b = add_source(&mut second, "Post", "a.mdx", json!({}), "");
        derive(&theme, &mut first, &a);
        derive(&theme, &mut second, &b);

        assert_eq!(
            first.nodes_of_type(POST_TYPE)[0].id,
            second.nodes_of_type(POST_TYPE)[0].id
        );
    }

    #[test]
    fn shared_tags_are_created_once() {
        let theme = theme(6);
        let mut store = ContentStore::new();
        let a = add_source(&mut store, "Post", "a.mdx", json!({ "tags": ["Rust"] }), "");
        let b = add_source(&mut store, "Post", "b.mdx", json!({ "tags": "Rust" }), "");
        derive(&theme, &mut store, &a);
        derive(&theme, &mut store, &b);

        assert_eq!(store.nodes_of_type(POST_TYPE).len(), 2);
        assert_eq!(store.nodes_of_type(POST_TAG_TYPE).len(), 1);
    }

    #[test]
    fn ignores_files_from_other_sources() {
        let theme = theme(6);
        let mut store = ContentStore::new();
        let mdx = add_source(&mut store, "Block", "hero.mdx", json!({ "title": "Hero" }), "");
        derive(&theme, &mut store, &mdx);
        assert!(store.nodes_of_type(POST_TYPE).is_empty());
    }

    #[test]
    fn slug_rules() {
        let theme = theme(6);
        let front = |v: Value| v.as_object().cloned().unwrap();

        assert_eq!(
            theme.post_slug(&front(json!({ "slug": "custom/path/" })), "x.mdx"),
            "/custom/path"
        );
        assert_eq!(theme.post_slug(&front(json!({})), "hello/index.mdx"), "/blog/hello");
        assert_eq!(theme.post_slug(&front(json!({})), "index.mdx"), "/blog/index");
        assert_eq!(theme.tag_slug("  Rust Lang "), "/blog/tags/rust-lang");

        let root =
            PostTheme::new(PostThemeOptions { base_path: "/".into(), ..Default::default() })
                .unwrap();
        assert_eq!(root.tag_slug("Go"), "/tags/go");
        assert_eq!(root.post_slug(&front(json!({})), "first.mdx"), "/first");
    }

    #[test]
    fn missing_title_falls_back_to_the_file_name() {
        let theme = theme(6);
        let mut store = ContentStore::new();
        let front = json!({ "date": "soon" });
        let mdx = add_source(&mut store, "Post", "notes/draft-idea.md", front, "");
        let file = store.get_node(mdx.parent.as_deref().unwrap()).unwrap();
        let post = theme.post_from_mdx(&mdx, file);
        assert_eq!(post.title, "draft-idea");
        assert_eq!(post.date, None);
        assert_eq!(post.excerpt, None);
    }

    #[test]
    fn root_index_file_does_not_replace_the_listing() {
        let theme = theme(6);
        let mut store = ContentStore::new();
        let index = add_source(&mut store, "Post", "index.mdx", json!({ "title": "Home" }), "");
        let other = add_source(&mut store, "Post", "other.md", json!({ "title": "Other" }), "");
        derive(&theme, &mut store, &index);
        derive(&theme, &mut store, &other);

        let (pages, reporter) = plan(&theme, &store);
        assert_eq!(component(&pages, "/blog"), Some(POSTS_TEMPLATE));
        assert_eq!(component(&pages, "/blog/index"), Some(POST_TEMPLATE));
        assert_eq!(component(&pages, "/blog/other"), Some(POST_TEMPLATE));
        assert_eq!(reporter.count(ReportLevel::Error), 0);
    }

    #[test]
    fn slugs_that_claim_a_listing_route_are_reported() {
        let theme = theme(1);
        let mut store = ContentStore::new();
        let a = add_source(&mut store, "Post", "a.md", json!({ "slug": "/blog/page/2" }), "");
        let b = add_source(&mut store, "Post", "b.md", json!({}), "");
        derive(&theme, &mut store, &a);
        derive(&theme, &mut store, &b);

        let (pages, reporter) = plan(&theme, &store);
        assert_eq!(component(&pages, "/blog"), Some(POSTS_TEMPLATE));
        assert_eq!(component(&pages, "/blog/page/2"), Some(POSTS_TEMPLATE));
        assert_eq!(component(&pages, "/blog/b"), Some(POST_TEMPLATE));
        assert_eq!(reporter.count(ReportLevel::Error), 1);
    }

    #[test]
    fn tags_sharing_a_slug_merge_into_the_first_name() {
        let theme = theme(6);
        let mut store = ContentStore::new();
        let a = add_source(&mut store, "Post", "a.md", json!({ "tags": ["Rust"] }), "");
        let b = add_source(&mut store, "Post", "b.md", json!({ "tags": ["rust", "RUST "] }), "");
        derive(&theme, &mut store, &a);
        derive(&theme, &mut store, &b);

        let tags = store.nodes_of_type(POST_TAG_TYPE);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].field_str("name"), Some("Rust"));

        for post in store.nodes_of_type(POST_TYPE) {
            assert_eq!(post.field("tags"), Some(&json!(["Rust"])));
        }

        let (pages, _) = plan(&theme, &store);
        let tag_page = pages.get("/blog/tags/rust").unwrap();
        assert_eq!(tag_page.context["name"], "Rust");
    }

    #[test]
    fn query_errors_are_reported_and_planning_continues() {
        let theme = theme(6);
        let mut store = ContentStore::new();
        let good = add_source(&mut store, "Post", "good.md", json!({ "title": "Good" }), "");
        derive(&theme, &mut store, &good);
        store
            .create_node(
                Node::new("broken".into(), POST_TYPE, "d".into(), "post")
                    .with_field("title", "Broken")
                    .with_field("slug", "/blog/broken")
                    .with_field("featured", "yes"),
            )
            .unwrap();

        let (pages, reporter) = plan(&theme, &store);
        assert_eq!(reporter.count(ReportLevel::Error), 1);
        assert!(!reporter.has_fatal());
        assert_eq!(component(&pages, "/blog"), Some(POSTS_TEMPLATE));
        assert_eq!(pages.get("/blog").unwrap().context["total"], 1);
        assert_eq!(component(&pages, "/blog/good"), Some(POST_TEMPLATE));
        assert!(pages.get("/blog/broken").is_none());
    }
}
