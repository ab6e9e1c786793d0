use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::models::{Node, NodeId};

/// 内容仓库错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("节点已存在: {id} ({node_type})")]
    DuplicateId { id: NodeId, node_type: String },

    #[error("父节点不存在: {parent} (子节点 {id})")]
    MissingParent { id: NodeId, parent: NodeId },
}

/// 单次构建的内容仓库
///
/// 只追加；ID 重复的节点会被拒绝，不做合并。
#[derive(Debug, Default, Clone)]
pub struct ContentStore {
    nodes: HashMap<NodeId, Node>,
    /// 插入顺序，查询结果在排序键相同时保持该顺序
    order: Vec<NodeId>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建节点；若指定了父节点，则把新节点登记为其子节点
    pub fn create_node(&mut self, node: Node) -> Result<(), StoreError> {
        if self.nodes.contains_key(&node.id) {
            return Err(StoreError::DuplicateId {
                id: node.id.clone(),
                node_type: node.internal.node_type.clone(),
            });
        }

        if let Some(parent_id) = &node.parent {
            match self.nodes.get_mut(parent_id) {
                Some(parent) => parent.children.push(node.id.clone()),
                None => {
                    return Err(StoreError::MissingParent {
                        id: node.id.clone(),
                        parent: parent_id.clone(),
                    })
                }
            }
        }

        debug!("创建节点 {} ({})", node.id, node.internal.node_type);
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// 按插入顺序返回指定类型的节点
    pub fn nodes_of_type(&self, node_type: &str) -> Vec<&Node> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.internal.node_type == node_type)
            .collect()
    }

    /// 按插入顺序返回全部节点
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, node_type: &str) -> Node {
        Node::new(id.to_string(), node_type, format!("digest-{}", id), "test")
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut store = ContentStore::new();
        store.create_node(node("a", "File")).unwrap();

        let err = store.create_node(node("a", "Mdx")).unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateId { id: "a".into(), node_type: "Mdx".into() }
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_node("a").unwrap().node_type(), "File");
    }

    #[test]
    fn links_children_to_parents() {
        let mut store = ContentStore::new();
        store.create_node(node("file", "File")).unwrap();
        store.create_node(node("mdx", "Mdx").with_parent("file")).unwrap();

        assert_eq!(store.get_node("file").unwrap().children, vec!["mdx".to_string()]);
        assert!(matches!(
            store.create_node(node("orphan", "Mdx").with_parent("nope")),
            Err(StoreError::MissingParent { .. })
        ));
        assert!(!store.contains("orphan"));
    }

    #[test]
    fn iterates_by_type_in_insertion_order() {
        let mut store = ContentStore::new();
        for id in ["c", "a", "b"] {
            store.create_node(node(id, "Post")).unwrap();
        }
        store.create_node(node("t", "PostTag")).unwrap();

        let ids: Vec<_> = store.nodes_of_type("Post").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(store.nodes().count(), 4);
    }
}
