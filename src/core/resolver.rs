use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::core::store::ContentStore;
use crate::models::types::MDX_TYPE;
use crate::models::Node;
use crate::utils::markdown;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("节点 {id} 没有父节点")]
    MissingParent { id: String },

    #[error("节点 {id} 的父节点类型为 {node_type}，不是 Mdx")]
    NotMdx { id: String, node_type: String },

    #[error("无法解析字段: {field}")]
    UnknownField { field: String },

    #[error("渲染失败: {0}")]
    Render(String),
}

/// 字段解析函数：只读，按需调用
pub type ResolveFn = Arc<dyn Fn(&Node, &ContentStore) -> Result<Value, ResolveError> + Send + Sync>;

/// 字段解析表：`类型 -> 字段 -> 解析函数`
#[derive(Clone, Default)]
pub struct ResolverTable {
    resolvers: HashMap<String, HashMap<String, ResolveFn>>,
}

impl ResolverTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, type_name: &str, field: &str, resolver: ResolveFn) {
        self.resolvers
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), resolver);
    }

    /// 解析字段；没有注册解析函数的字段直接读取节点上的值
    pub fn resolve(
        &self,
        store: &ContentStore,
        node: &Node,
        field: &str,
    ) -> Result<Value, ResolveError> {
        if field == "id" {
            return Ok(Value::String(node.id.clone()));
        }
        match self.resolvers.get(node.node_type()).and_then(|fields| fields.get(field)) {
            Some(resolver) => resolver(node, store),
            None => Ok(node.field(field).cloned().unwrap_or(Value::Null)),
        }
    }
}

/// 从父 Mdx 节点计算字段
pub fn mdx_resolver_passthrough(field: &str) -> ResolveFn {
    let field = field.to_string();
    Arc::new(move |node: &Node, store: &ContentStore| {
        let parent = node
            .parent
            .as_deref()
            .and_then(|id| store.get_node(id))
            .ok_or_else(|| ResolveError::MissingParent { id: node.id.clone() })?;

        if parent.node_type() != MDX_TYPE {
            return Err(ResolveError::NotMdx {
                id: node.id.clone(),
                node_type: parent.node_type().to_string(),
            });
        }

        resolve_mdx_field(parent, &field)
    })
}

/// 计算 Mdx 节点的派生字段
pub fn resolve_mdx_field(mdx: &Node, field: &str) -> Result<Value, ResolveError> {
    let body = mdx.field_str("body").unwrap_or_default();
    match field {
        "body" | "html" => markdown::render(body)
            .map(Value::String)
            .map_err(|e| ResolveError::Render(e.to_string())),
        "timeToRead" => Ok(Value::from(markdown::time_to_read(body))),
        "wordCount" => Ok(Value::from(markdown::word_count(body))),
        "excerpt" => Ok(Value::String(markdown::excerpt(body, markdown::EXCERPT_PRUNE_LENGTH))),
        "rawBody" => Ok(mdx.field("rawBody").cloned().unwrap_or(Value::Null)),
        other => Err(ResolveError::UnknownField { field: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_post() -> (ContentStore, Node) {
        let mut store = ContentStore::new();
        store
            .create_node(Node::new("file".into(), "File", "f".into(), "source"))
            .unwrap();
        store
            .create_node(
                Node::new("mdx".into(), MDX_TYPE, "m".into(), "source")
                    .with_parent("file")
                    .with_field("body", "# Hello\n\nSome words here.")
                    .with_field("rawBody", "---\ntitle: Hello\n---\n# Hello\n\nSome words here."),
            )
            .unwrap();
        let post = Node::new("post".into(), "Post", "p".into(), "post")
            .with_parent("mdx")
            .with_field("slug", "/blog/hello");
        store.create_node(post.clone()).unwrap();
        (store, post)
    }

    #[test]
    fn passthrough_reads_from_parent_mdx() {
        let (store, post) = store_with_post();
        let mut table = ResolverTable::new();
        table.register("Post", "body", mdx_resolver_passthrough("body"));
        table.register("Post", "timeToRead", mdx_resolver_passthrough("timeToRead"));

        let body = table.resolve(&store, &post, "body").unwrap();
        assert!(body.as_str().unwrap().contains("<h1>Hello</h1>"));
        assert_eq!(table.resolve(&store, &post, "timeToRead").unwrap(), Value::from(1u64));
    }

    #[test]
    fn unregistered_fields_read_the_node() {
        let (store, post) = store_with_post();
        let table = ResolverTable::new();
        assert_eq!(table.resolve(&store, &post, "slug").unwrap(), "/blog/hello");
        assert_eq!(table.resolve(&store, &post, "missing").unwrap(), Value::Null);
        assert_eq!(table.resolve(&store, &post, "id").unwrap(), "post");
    }

    #[test]
    fn passthrough_requires_an_mdx_parent() {
        let (store, _) = store_with_post();
        let resolver = mdx_resolver_passthrough("body");

        let orphan = Node::new("o".into(), "Post", "p".into(), "post");
        assert!(matches!(resolver(&orphan, &store), Err(ResolveError::MissingParent { .. })));

        let wrong = Node::new("w".into(), "Post", "p".into(), "post").with_parent("file");
        assert!(matches!(resolver(&wrong, &store), Err(ResolveError::NotMdx { .. })));

        let mdx = store.get_node("mdx").unwrap();
        assert!(matches!(
            resolve_mdx_field(mdx, "tableOfContents"),
            Err(ResolveError::UnknownField { .. })
        ));
    }
}
