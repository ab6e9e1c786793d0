use anyhow::Result;
use tracing::debug;

use crate::core::resolver::{mdx_resolver_passthrough, ResolverTable};
use crate::core::schema::{FieldType, Schema, TypeDefinition};
use crate::core::source::ContentSource;
use crate::models::types::{fields_of, BLOCK_TYPE};
use crate::models::{Block, BlockThemeOptions, Node};
use crate::themes::{
    ensure_content_path, mdx_source_file, BuildContext, NodeContext, Theme, ThemeError,
};
use crate::utils::digest::{create_content_digest, create_node_id};
use crate::utils::strip_extension;

/// 内容块主题：每个 MDX 文件对应一个 `Block` 节点
pub struct BlockTheme {
    options: BlockThemeOptions,
}

impl BlockTheme {
    pub fn new(options: BlockThemeOptions) -> Result<Self, ThemeError> {
        Ok(Self { options: options.with_defaults()? })
    }
}

impl Theme for BlockTheme {
    fn name(&self) -> &str {
        "block"
    }

    fn description(&self) -> &str {
        "可复用的 MDX 内容块"
    }

    fn source(&self) -> Option<ContentSource> {
        Some(ContentSource::new(BLOCK_TYPE, &self.options.content_path))
    }

    fn validate(&self, ctx: &BuildContext<'_>) -> Result<()> {
        ensure_content_path(&ctx.base_dir.join(&self.options.content_path), ctx.reporter)?;
        Ok(())
    }

    fn declare_schema(&self, schema: &mut Schema) -> Result<()> {
        schema.create_types(vec![TypeDefinition::new(BLOCK_TYPE)
            .field("src", FieldType::String)
            .field("body", FieldType::String)])?;
        Ok(())
    }

    fn derive_node(&self, node: &Node, ctx: &mut NodeContext<'_>) -> Result<()> {
        let (file_id, src) = match mdx_source_file(node, ctx.store, BLOCK_TYPE) {
            Some(file) => (
                file.id.clone(),
                strip_extension(file.field_str("relativePath").unwrap_or_default()).to_string(),
            ),
            None => return Ok(()),
        };

        let block = Block {
            id: create_node_id(&format!("{}-{}", BLOCK_TYPE, file_id), self.name()),
            src,
        };
        let mut block_node = Node::new(
            block.id.clone(),
            BLOCK_TYPE,
            create_content_digest(&node.internal.content_digest),
            self.name(),
        )
        .with_parent(&node.id);
        block_node.fields = fields_of(&block);

        debug!("派生内容块 {}", block.src);
        ctx.store.create_node(block_node)?;
        Ok(())
    }

    fn register_resolvers(&self, resolvers: &mut ResolverTable) {
        resolvers.register(BLOCK_TYPE, "body", mdx_resolver_passthrough("body"));
    }
}
