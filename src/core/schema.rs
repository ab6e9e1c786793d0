use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::store::ContentStore;
use crate::models::Node;
use crate::utils::parse_date;

/// 字段类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Id,
    String,
    Int,
    Boolean,
    Date,
    /// 通过目标类型的 `by` 字段关联到其他节点
    Link { target: String, by: String, list: bool },
}

impl FieldType {
    pub fn link(target: &str, by: &str) -> Self {
        FieldType::Link { target: target.to_string(), by: by.to_string(), list: false }
    }

    pub fn link_list(target: &str, by: &str) -> Self {
        FieldType::Link { target: target.to_string(), by: by.to_string(), list: true }
    }

    /// 校验存储的值是否符合字段类型
    fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match self {
            FieldType::Id | FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Date => value.as_str().map(|s| parse_date(s).is_some()).unwrap_or(false),
            FieldType::Link { list: false, .. } => value.is_string(),
            FieldType::Link { list: true, .. } => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("expected {}, found {}", self, value))
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Id => write!(f, "ID"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Boolean => write!(f, "Boolean"),
            FieldType::Date => write!(f, "Date"),
            FieldType::Link { target, by, list: false } => {
                write!(f, "{} @link(by: \"{}\")", target, by)
            }
            FieldType::Link { target, by, list: true } => {
                write!(f, "[{}] @link(by: \"{}\")", target, by)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
}

/// 节点类型声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

impl TypeDefinition {
    /// 新类型带有必填的 `id`；字段不做推断，查询只暴露声明过的字段
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: vec![FieldDefinition {
                name: "id".to_string(),
                ty: FieldType::Id,
                required: true,
            }],
        }
    }

    pub fn field(mut self, name: &str, ty: FieldType) -> Self {
        self.fields.push(FieldDefinition { name: name.to_string(), ty, required: false });
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type {} implements Node @dontInfer {{", self.name)?;
        for field in &self.fields {
            let bang = if field.required { "!" } else { "" };
            match &field.ty {
                // 指令放在非空标记之后
                FieldType::Link { target, by, list } => {
                    let ty = if *list { format!("[{}]", target) } else { target.clone() };
                    writeln!(f, "  {}: {}{} @link(by: \"{}\")", field.name, ty, bang, by)?;
                }
                ty => writeln!(f, "  {}: {}{}", field.name, ty, bang)?,
            }
        }
        write!(f, "}}")
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("类型 {name} 已存在且定义不同")]
    Conflict { name: String },

    #[error("未知类型: {name}")]
    UnknownType { name: String },

    #[error("{type_name}.{field} 不是关联字段")]
    NotALink { type_name: String, field: String },
}

/// 已声明的节点类型
#[derive(Debug, Default, Clone)]
pub struct Schema {
    types: BTreeMap<String, TypeDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册类型；重复注册相同定义不报错
    pub fn create_types(&mut self, defs: Vec<TypeDefinition>) -> Result<(), SchemaError> {
        for def in defs {
            match self.types.get(&def.name) {
                Some(existing) if *existing == def => continue,
                Some(_) => return Err(SchemaError::Conflict { name: def.name }),
                None => {
                    self.types.insert(def.name.clone(), def);
                }
            }
        }
        Ok(())
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    /// 按类型声明投影节点字段
    ///
    /// 只保留声明过的字段；类型不符的字段返回错误。
    pub fn project(&self, node: &Node) -> Result<Map<String, Value>, String> {
        let def = self
            .get_type(node.node_type())
            .ok_or_else(|| format!("type {} is not declared", node.node_type()))?;

        let mut out = Map::new();
        out.insert("id".to_string(), Value::String(node.id.clone()));

        for field in def.fields.iter().filter(|f| f.name != "id") {
            match node.fields.get(&field.name) {
                Some(Value::Null) | None => {}
                Some(value) => {
                    field
                        .ty
                        .check(value)
                        .map_err(|e| format!("field {}: {}", field.name, e))?;
                    out.insert(field.name.clone(), value.clone());
                }
            }
        }

        Ok(out)
    }

    /// 解析关联字段，按存储的值顺序返回目标节点；找不到的名称被忽略
    pub fn resolve_link<'a>(
        &self,
        store: &'a ContentStore,
        node: &Node,
        field: &str,
    ) -> Result<Vec<&'a Node>, SchemaError> {
        let def = self
            .get_type(node.node_type())
            .ok_or_else(|| SchemaError::UnknownType { name: node.node_type().to_string() })?;

        let (target, by) = match def.get_field(field).map(|f| &f.ty) {
            Some(FieldType::Link { target, by, .. }) => (target, by),
            _ => {
                return Err(SchemaError::NotALink {
                    type_name: def.name.clone(),
                    field: field.to_string(),
                })
            }
        };

        let keys: Vec<&str> = match node.field(field) {
            Some(Value::String(s)) => vec![s.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };

        Ok(keys
            .into_iter()
            .filter_map(|key| {
                store
                    .nodes_of_type(target)
                    .into_iter()
                    .find(|candidate| candidate.field_str(by) == Some(key))
            })
            .collect())
    }
}
