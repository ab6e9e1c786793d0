use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use chrono::format::{Item, StrftimeItems};
use serde::Serialize;
use serde_json::{Map, Value};
use tera::{Context as TeraContext, Tera};
use tracing::{debug, error, info};

use crate::core::pages::PageSpec;
use crate::core::query::Sort;
use crate::core::resolver::ResolverTable;
use crate::core::schema::Schema;
use crate::core::store::ContentStore;
use crate::models::types::{BLOCK_TYPE, POST_TYPE};
use crate::models::{Config, Post};
use crate::themes::post::{POSTS_TEMPLATE, POST_TEMPLATE, TAG_TEMPLATE};
use crate::utils::parse_date;

const BASE_LAYOUT: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{% block title %}{{ site.title }}{% endblock title %}</title>
</head>
<body>
  <header><a href="/">{{ site.title }}</a></header>
  <main>{% block content %}{% endblock content %}</main>
</body>
</html>
"#;

const POST_CARD: &str = r#"{% macro card(post) %}
<article class="post-card">
  <h2><a href="{{ post.slug }}">{{ post.title }}</a></h2>
  {% if post.date %}<time datetime="{{ post.date }}">{{ post.date | date_format }}</time>{% endif %}
  {% if post.excerpt %}<p>{{ post.excerpt }}</p>{% endif %}
  {% if post.tags %}<ul class="tags">{% for tag in post.tags %}<li><a href="{{ tag.slug }}">{{ tag.name }}</a></li>{% endfor %}</ul>{% endif %}
</article>
{% endmacro card %}
"#;

const POSTS_LAYOUT: &str = r#"{% extends "base.html" %}
{% import "macros.html" as macros %}
{% block content %}
<section class="posts">
  {% for post in posts %}{{ macros::card(post=post) }}{% endfor %}
</section>
<nav class="pagination">
  {% if page.previousPagePath %}<a rel="prev" href="{{ page.previousPagePath }}">Newer</a>{% endif %}
  <span>Page {{ page.humanPageNumber }} of {{ page.numberOfPages }} ({{ page.total }} posts)</span>
  {% if page.nextPagePath %}<a rel="next" href="{{ page.nextPagePath }}">Older</a>{% endif %}
</nav>
{% endblock content %}
"#;

const POST_LAYOUT: &str = r#"{% extends "base.html" %}
{% block title %}{{ post.title }} | {{ site.title }}{% endblock title %}
{% block content %}
<article class="post">
  <h1>{{ post.title }}</h1>
  {% if post.date %}<time datetime="{{ post.date }}">{{ post.date | date_format }}</time>{% endif %}
  {% if post.timeToRead %}<span class="time-to-read">{{ post.timeToRead }} min read</span>{% endif %}
  {% if post.image %}<figure><img src="{{ post.image }}" alt="{{ post.caption | default(value=post.title) }}">{% if post.caption %}<figcaption>{{ post.caption }}</figcaption>{% endif %}</figure>{% endif %}
  <div class="body">{{ post.body | safe }}</div>
  {% if post.tags %}<ul class="tags">{% for tag in post.tags %}<li><a href="{{ tag.slug }}">{{ tag.name }}</a></li>{% endfor %}</ul>{% endif %}
</article>
<nav class="post-nav">
  {% if prev %}<a rel="prev" href="{{ prev.slug }}">{{ prev.title }}</a>{% endif %}
  {% if next %}<a rel="next" href="{{ next.slug }}">{{ next.title }}</a>{% endif %}
</nav>
{% endblock content %}
"#;

const TAG_LAYOUT: &str = r#"{% extends "base.html" %}
{% import "macros.html" as macros %}
{% block title %}{{ name }} | {{ site.title }}{% endblock title %}
{% block content %}
<h1>Posts tagged "{{ name }}"</h1>
<section class="posts">
  {% for post in posts %}{{ macros::card(post=post) }}{% endfor %}
</section>
{% endblock content %}
"#;

const PAGE_LAYOUT: &str = r#"{% extends "base.html" %}
{% block content %}<pre>{{ page | json_encode(pretty=true) }}</pre>{% endblock content %}
"#;

/// 模板中使用的标签
#[derive(Debug, Clone, Serialize)]
struct TagView {
    name: String,
    slug: String,
}

/// 模板中使用的文章
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    id: String,
    title: String,
    slug: String,
    date: Option<String>,
    excerpt: Option<String>,
    image: Option<String>,
    caption: Option<String>,
    featured: Option<bool>,
    author: Option<String>,
    tags: Vec<TagView>,
    body: Option<String>,
    time_to_read: Option<u64>,
}

/// 渲染所需的数据来源
pub struct RenderSource<'a> {
    pub store: &'a ContentStore,
    pub schema: &'a Schema,
    pub resolvers: &'a ResolverTable,
    pub config: &'a Config,
    pub styles: &'a Map<String, Value>,
}

impl RenderSource<'_> {
    fn all_posts(&self) -> Vec<Post> {
        // 查询错误已在规划页面时报告过
        self.store
            .query_all::<Post>(self.schema, POST_TYPE, Some(&Sort::desc("date")))
            .data
    }

    fn post_view(&self, post: &Post, with_body: bool) -> Result<PostView> {
        let node = self
            .store
            .get_node(&post.id)
            .ok_or_else(|| anyhow!("文章节点不存在: {}", post.id))?;

        let tags = self
            .schema
            .resolve_link(self.store, node, "tags")?
            .into_iter()
            .filter_map(|tag| {
                Some(TagView {
                    name: tag.field_str("name")?.to_string(),
                    slug: tag.field_str("slug")?.to_string(),
                })
            })
            .collect();

        let (body, time_to_read) = if with_body {
            let body = self.resolvers.resolve(self.store, node, "body")?;
            let minutes = self.resolvers.resolve(self.store, node, "timeToRead")?;
            (body.as_str().map(str::to_string), minutes.as_u64())
        } else {
            (None, None)
        };

        Ok(PostView {
            id: post.id.clone(),
            title: post.title.clone(),
            slug: post.slug.clone(),
            date: post.date.map(|d| d.to_rfc3339()),
            excerpt: post.excerpt.clone(),
            image: post.image.clone(),
            caption: post.caption.clone(),
            featured: post.featured,
            author: post.author.clone(),
            tags,
            body,
            time_to_read,
        })
    }

    fn post_view_by_id(
        &self,
        id: Option<&str>,
        posts: &[Post],
        with_body: bool,
    ) -> Result<Option<PostView>> {
        match id.and_then(|id| posts.iter().find(|p| p.id == id)) {
            Some(post) => self.post_view(post, with_body).map(Some),
            None => Ok(None),
        }
    }
}

/// 站点渲染器：内置模板，可被站点的布局目录覆盖
pub struct SiteRenderer {
    tera: Tera,
}

impl SiteRenderer {
    /// 创建渲染器；`layout_dir` 中的 `*.html` 按文件名覆盖内置模板
    pub fn new(layout_dir: &Path) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("base.html", BASE_LAYOUT),
            ("macros.html", POST_CARD),
            ("posts-template.html", POSTS_LAYOUT),
            ("post-template.html", POST_LAYOUT),
            ("tag-template.html", TAG_LAYOUT),
            ("page.html", PAGE_LAYOUT),
        ])?;

        if layout_dir.is_dir() {
            let entries = fs::read_dir(layout_dir).with_context(|| {
                format!("Failed to read layout directory: {}", layout_dir.display())
            })?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("html") {
                    continue;
                }
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    info!("使用自定义模板: {}", path.display());
                    tera.add_template_file(&path, Some(name))?;
                }
            }
        }

        tera.register_filter("date_format", date_format_filter);

        Ok(Self { tera })
    }

    /// 注册 `block(src=...)` 模板函数，返回已渲染的内容块
    pub fn register_blocks(&mut self, blocks: HashMap<String, String>) {
        self.tera.register_function(
            "block",
            move |args: &HashMap<String, Value>| -> tera::Result<Value> {
                let src = args
                    .get("src")
                    .and_then(Value::as_str)
                    .ok_or_else(|| tera::Error::msg("缺少必要的参数: src"))?;
                Ok(Value::String(blocks.get(src).cloned().unwrap_or_default()))
            },
        );
    }

    pub fn has_layout(&self, component: &str) -> bool {
        let name = format!("{}.html", component);
        self.tera.get_template_names().any(|n| n == name)
    }

    /// 渲染单个页面
    pub fn render_page(&self, page: &PageSpec, source: &RenderSource<'_>) -> Result<String> {
        let mut ctx = TeraContext::new();
        ctx.insert("site", &serde_json::json!({
            "title": source.config.title,
            "description": source.config.description,
        }));
        ctx.insert("styles", source.styles);

        let mut page_value = page.context.clone();
        page_value.insert("path".to_string(), Value::String(page.path.clone()));
        ctx.insert("page", &page_value);

        let context_str = |key: &str| page.context.get(key).and_then(Value::as_str);

        match page.component.as_str() {
            POSTS_TEMPLATE => {
                let skip = page.context.get("skip").and_then(Value::as_u64).unwrap_or(0) as usize;
                let limit = page
                    .context
                    .get("limit")
                    .and_then(Value::as_u64)
                    .unwrap_or(u64::MAX) as usize;
                let posts = source
                    .all_posts()
                    .iter()
                    .skip(skip)
                    .take(limit)
                    .map(|p| source.post_view(p, false))
                    .collect::<Result<Vec<_>>>()?;
                ctx.insert("posts", &posts);
            }
            POST_TEMPLATE => {
                let posts = source.all_posts();
                let post = source
                    .post_view_by_id(context_str("id"), &posts, true)?
                    .ok_or_else(|| anyhow!("页面 {} 引用的文章不存在", page.path))?;
                ctx.insert("post", &post);
                ctx.insert("prev", &source.post_view_by_id(context_str("prev"), &posts, false)?);
                ctx.insert("next", &source.post_view_by_id(context_str("next"), &posts, false)?);
            }
            TAG_TEMPLATE => {
                let name = context_str("name").unwrap_or_default();
                let posts = source
                    .all_posts()
                    .iter()
                    .filter(|p| p.tags.iter().any(|t| t == name))
                    .map(|p| source.post_view(p, false))
                    .collect::<Result<Vec<_>>>()?;
                ctx.insert("name", name);
                ctx.insert("posts", &posts);
            }
            other => debug!("组件 {} 没有专门的数据，使用页面上下文渲染", other),
        }

        let template = if self.has_layout(&page.component) {
            format!("{}.html", page.component)
        } else {
            "page.html".to_string()
        };

        self.tera.render(&template, &ctx).map_err(|e| {
            error!("模板渲染失败: {} ({})", page.path, e);
            anyhow!(e)
        })
    }

    /// 渲染所有内容块，键为 `src`
    pub fn render_blocks(source: &RenderSource<'_>) -> Result<HashMap<String, String>> {
        let mut blocks = HashMap::new();
        for node in source.store.nodes_of_type(BLOCK_TYPE) {
            let Some(src) = node.field_str("src") else { continue };
            let body = source.resolvers.resolve(source.store, node, "body")?;
            blocks.insert(src.to_string(), body.as_str().unwrap_or_default().to_string());
        }
        Ok(blocks)
    }
}

fn date_format_filter(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    match value.as_str().and_then(parse_date) {
        Some(date) => {
            let format = args
                .get("format")
                .and_then(Value::as_str)
                .unwrap_or("%B %d, %Y");
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(tera::Error::msg(format!("无效的日期格式: {}", format)));
            }

            let mut out = String::new();
            write!(out, "{}", date.format(format))
                .map_err(|_| tera::Error::msg(format!("日期格式化失败: {}", format)))?;
            Ok(Value::String(out))
        }
        None => Ok(value.clone()),
    }
}
