use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 节点 ID
pub type NodeId = String;

/// 文件节点类型名
pub const FILE_TYPE: &str = "File";
/// MDX 节点类型名
pub const MDX_TYPE: &str = "Mdx";
/// 文章节点类型名
pub const POST_TYPE: &str = "Post";
/// 标签节点类型名
pub const POST_TAG_TYPE: &str = "PostTag";
/// 内容块节点类型名
pub const BLOCK_TYPE: &str = "Block";

/// 节点内部元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    /// 节点类型
    #[serde(rename = "type")]
    pub node_type: String,
    /// 内容摘要
    pub content_digest: String,
    /// 创建该节点的主题
    pub owner: String,
}

/// 内容仓库中的通用节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    pub internal: NodeInternal,
    /// 其余字段
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Node {
    pub fn new(id: NodeId, node_type: &str, content_digest: String, owner: &str) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            internal: NodeInternal {
                node_type: node_type.to_string(),
                content_digest,
                owner: owner.to_string(),
            },
            fields: Map::new(),
        }
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn node_type(&self) -> &str {
        &self.internal.node_type
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// 博客文章
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: NodeId,
    pub title: String,
    pub excerpt: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub slug: String,
    pub image: Option<String>,
    pub caption: Option<String>,
    pub featured: Option<bool>,
    pub status: Option<bool>,
    /// 作者名称，查询时按 `Profile.name` 关联
    pub author: Option<String>,
    /// 标签名称，查询时按 `PostTag.name` 关联
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 文章标签
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTag {
    pub id: NodeId,
    pub name: String,
    pub slug: String,
}

/// 通用内容块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub src: String,
}

/// 将类型化的字段写入节点
pub(crate) fn fields_of<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(mut map)) => {
            map.remove("id");
            // 缺省字段不写入节点
            map.retain(|_, v| !v.is_null());
            map
        }
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_serializes_fields_flat() {
        let node = Node::new("n1".into(), POST_TYPE, "d".into(), "post")
            .with_parent("m1")
            .with_field("slug", "/blog/a");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["slug"], "/blog/a");
        assert_eq!(json["internal"]["type"], "Post");
        assert_eq!(json["internal"]["contentDigest"], "d");
    }

    #[test]
    fn fields_of_skips_id_and_nulls() {
        let tag = PostTag { id: "x".into(), name: "Rust".into(), slug: "/tags/rust".into() };
        let fields = fields_of(&tag);
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["name"], "Rust");

        let block = Block { id: "b".into(), src: "hero".into() };
        assert_eq!(fields_of(&block).len(), 1);
    }
}
