use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::schema::{FieldType, Schema};
use crate::core::store::ContentStore;
use crate::utils::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// 排序条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

impl Sort {
    pub fn asc(field: &str) -> Self {
        Self { field: field.to_string(), order: SortOrder::Asc }
    }

    pub fn desc(field: &str) -> Self {
        Self { field: field.to_string(), order: SortOrder::Desc }
    }
}

/// 查询中单个节点的错误，不影响其他节点
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{node_type} {node_id}: {message}")]
pub struct QueryError {
    pub node_type: String,
    pub node_id: String,
    pub message: String,
}

/// 查询结果：成功的数据与错误并存
#[derive(Debug, Clone)]
pub struct QueryResult<T> {
    pub data: Vec<T>,
    pub errors: Vec<QueryError>,
}

impl<T> QueryResult<T> {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// 比较两个字段值；只有声明为 `Date` 的字段按时间比较
fn compare_values(a: &Value, b: &Value, is_date: bool) -> Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) if is_date => {
            match (parse_date(x), parse_date(y)) {
                (Some(dx), Some(dy)) => dx.cmp(&dy),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => x.cmp(y),
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// 按字段排序；缺失值无论升降序都排在最后，相等时保持原顺序
fn sort_projected(rows: &mut [Map<String, Value>], sort: &Sort, is_date: bool) {
    rows.sort_by(|a, b| {
        let ka = a.get(&sort.field).filter(|v| !v.is_null());
        let kb = b.get(&sort.field).filter(|v| !v.is_null());
        match (ka, kb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ordering = compare_values(x, y, is_date);
                match sort.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
        }
    });
}

impl ContentStore {
    /// 查询某类型的全部节点（相当于 `allPost(sort: ...)`）
    ///
    /// 投影或反序列化失败的节点记为错误并跳过，其余节点照常返回。
    pub fn query_all<T: DeserializeOwned>(
        &self,
        schema: &Schema,
        node_type: &str,
        sort: Option<&Sort>,
    ) -> QueryResult<T> {
        let mut errors = Vec::new();

        let mut rows: Vec<Map<String, Value>> = self
            .nodes_of_type(node_type)
            .into_iter()
            .filter_map(|node| match schema.project(node) {
                Ok(row) => Some(row),
                Err(message) => {
                    errors.push(QueryError {
                        node_type: node_type.to_string(),
                        node_id: node.id.clone(),
                        message,
                    });
                    None
                }
            })
            .collect();

        if let Some(sort) = sort {
            let is_date = schema
                .get_type(node_type)
                .and_then(|def| def.get_field(&sort.field))
                .map(|field| field.ty == FieldType::Date)
                .unwrap_or(false);
            sort_projected(&mut rows, sort, is_date);
        }

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let node_id = row.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
            match serde_json::from_value::<T>(Value::Object(row)) {
                Ok(item) => data.push(item),
                Err(e) => errors.push(QueryError {
                    node_type: node_type.to_string(),
                    node_id,
                    message: e.to_string(),
                }),
            }
        }

        QueryResult { data, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{FieldType, TypeDefinition};
    use crate::models::Node;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Row {
        id: String,
        slug: String,
    }

    fn fixture() -> (Schema, ContentStore) {
        let mut schema = Schema::new();
        schema
            .create_types(vec![TypeDefinition::new("Post")
                .field("date", FieldType::Date)
                .field("slug", FieldType::String)])
            .unwrap();

        let mut store = ContentStore::new();
        let rows = [
            ("a", Some("2020-01-01T00:00:00Z"), Some("/a")),
            ("b", None, Some("/b")),
            ("c", Some("2021-06-01"), Some("/c")),
            ("d", Some("2020-01-01T00:00:00Z"), Some("/d")),
            ("e", Some("2019-01-01"), None),
        ];
        for (id, date, slug) in rows {
            let mut node = Node::new(id.to_string(), "Post", "d".into(), "post");
            if let Some(date) = date {
                node = node.with_field("date", date);
            }
            if let Some(slug) = slug {
                node = node.with_field("slug", slug);
            }
            store.create_node(node).unwrap();
        }
        (schema, store)
    }

    #[test]
    fn sorts_descending_with_missing_values_last() {
        let (schema, store) = fixture();
        let result = store.query_all::<Row>(&schema, "Post", Some(&Sort::desc("date")));

        let ids: Vec<_> = result.data.iter().map(|r| r.id.as_str()).collect();
        // a 与 d 日期相同，保持插入顺序
        assert_eq!(ids, vec!["c", "a", "d", "b"]);
        assert_eq!(result.data[0].slug, "/c");
    }

    #[test]
    fn rows_that_fail_to_deserialize_become_errors() {
        let (schema, store) = fixture();
        let result = store.query_all::<Row>(&schema, "Post", Some(&Sort::asc("date")));

        assert!(result.has_errors());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].node_id, "e");
        assert_eq!(result.data.len(), 4);
        assert_eq!(result.data.last().map(|r| r.id.as_str()), Some("b"));
    }

    #[test]
    fn string_fields_sort_lexically_even_when_they_look_like_dates() {
        let mut schema = Schema::new();
        schema
            .create_types(vec![
                TypeDefinition::new("PostTag").field("name", FieldType::String)
            ])
            .unwrap();

        let mut store = ContentStore::new();
        // 按时间比较时第二个标签更早
        let tags = [("t1", "2021-05-01"), ("t2", "2021-05-01T00:00:00+02:00"), ("t3", "Rust")];
        for (id, name) in tags {
            let node = Node::new(id.into(), "PostTag", "d".into(), "post").with_field("name", name);
            store.create_node(node).unwrap();
        }

        let result = store.query_all::<Value>(&schema, "PostTag", Some(&Sort::asc("name")));
        let names: Vec<_> = result
            .data
            .iter()
            .map(|row| row["name"].as_str().unwrap_or_default())
            .collect();
        assert_eq!(names, vec!["2021-05-01", "2021-05-01T00:00:00+02:00", "Rust"]);
    }

    #[test]
    fn undeclared_types_report_every_node() {
        let (schema, mut store) = fixture();
        store
            .create_node(Node::new("x".into(), "Profile", "d".into(), "other"))
            .unwrap();
        let result = store.query_all::<Value>(&schema, "Profile", None);
        assert!(result.data.is_empty());
        assert_eq!(result.errors.len(), 1);
    }
}
