use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gray_matter::engine::YAML;
use gray_matter::{Matter, Pod};
use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::store::ContentStore;
use crate::models::types::{FILE_TYPE, MDX_TYPE};
use crate::models::{Node, NodeId};
use crate::utils::digest::{create_content_digest, create_node_id, digest_bytes};

const SOURCE_OWNER: &str = "source-filesystem";
const MDX_OWNER: &str = "mdx";

/// 一个需要扫描的内容目录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSource {
    /// 来源名称，写入文件节点的 `sourceInstanceName`
    pub name: String,
    /// 相对站点目录的路径
    pub path: PathBuf,
}

impl ContentSource {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self { name: name.to_string(), path: path.into() }
    }
}

/// 检查文件是否为 Markdown / MDX 文件
pub fn is_mdx_file<P: AsRef<Path>>(path: P) -> bool {
    matches!(
        path.as_ref().extension().and_then(|e| e.to_str()),
        Some("md") | Some("mdx") | Some("markdown")
    )
}

fn pod_to_value(pod: Pod) -> Value {
    match pod {
        Pod::String(s) => Value::String(s),
        Pod::Integer(i) => Value::from(i),
        Pod::Float(f) => Value::from(f),
        Pod::Boolean(b) => Value::Bool(b),
        Pod::Array(arr) => Value::Array(arr.into_iter().map(pod_to_value).collect()),
        Pod::Hash(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, pod_to_value(v))).collect())
        }
        Pod::Null => Value::Null,
    }
}

/// 解析前置数据，返回 `(frontmatter, body)`
pub fn parse_front_matter(raw: &str) -> (Map<String, Value>, String) {
    let matter = Matter::<YAML>::new();
    let parsed = matter.parse(raw);

    let front_matter = match parsed.data.map(pod_to_value) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    (front_matter, parsed.content)
}

struct SourcedFile {
    relative_path: String,
    absolute_path: PathBuf,
    bytes: Vec<u8>,
}

fn file_node(source: &ContentSource, file: &SourcedFile) -> Node {
    let relative = &file.relative_path;
    let path = Path::new(relative);
    let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or_default();

    Node::new(
        create_node_id(&format!("{}:{}", source.name, relative), SOURCE_OWNER),
        FILE_TYPE,
        digest_bytes(&[file.bytes.as_slice(), relative.as_bytes()]),
        SOURCE_OWNER,
    )
    .with_field("sourceInstanceName", source.name.as_str())
    .with_field("relativePath", relative.as_str())
    .with_field("absolutePath", file.absolute_path.to_string_lossy().into_owned())
    .with_field("name", name)
    .with_field("extension", extension)
}

fn mdx_node(file: &Node, raw: &str) -> Node {
    let (front_matter, body) = parse_front_matter(raw);

    Node::new(
        create_node_id(&format!("{}-mdx", file.id), MDX_OWNER),
        MDX_TYPE,
        create_content_digest(raw),
        MDX_OWNER,
    )
    .with_parent(&file.id)
    .with_field("frontmatter", Value::Object(front_matter))
    .with_field("rawBody", raw)
    .with_field("body", body)
    .with_field("fileAbsolutePath", file.field("absolutePath").cloned().unwrap_or(Value::Null))
}

/// 扫描内容目录，创建文件节点与 Mdx 子节点
///
/// 文件读取并行进行；节点按相对路径排序后依次写入仓库，保证顺序稳定。
/// 返回新建 Mdx 节点的 ID。
pub fn source_filesystem(
    source: &ContentSource,
    base_dir: &Path,
    store: &mut ContentStore,
) -> Result<Vec<NodeId>> {
    let root = base_dir.join(&source.path);
    if !root.is_dir() {
        warn!("内容目录不存在，跳过: {}", root.display());
        return Ok(Vec::new());
    }

    info!("从 {} 加载 {} 内容", root.display(), source.name);

    let mut paths: Vec<PathBuf> = WalkDir::new(&root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    paths.sort();

    let files: Vec<SourcedFile> = paths
        .par_iter()
        .map(|path| -> Result<SourcedFile> {
            let bytes =
                fs::read(path).with_context(|| format!("读取文件失败: {}", path.display()))?;
            let relative_path = path
                .strip_prefix(&root)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            Ok(SourcedFile { relative_path, absolute_path: path.clone(), bytes })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut mdx_ids = Vec::new();
    for file in &files {
        let node = file_node(source, file);
        let file_id = node.id.clone();
        store.create_node(node)?;

        if !is_mdx_file(&file.relative_path) {
            continue;
        }

        match std::str::from_utf8(&file.bytes) {
            Ok(raw) => {
                let parent = store.get_node(&file_id).cloned();
                if let Some(parent) = parent {
                    let mdx = mdx_node(&parent, raw);
                    debug!("解析 {} -> {}", file.relative_path, mdx.id);
                    mdx_ids.push(mdx.id.clone());
                    store.create_node(mdx)?;
                }
            }
            Err(e) => warn!("跳过非 UTF-8 文件 {}: {}", file.relative_path, e),
        }
    }

    info!("{} 个文件，{} 个 Mdx 节点", files.len(), mdx_ids.len());
    Ok(mdx_ids)
}
