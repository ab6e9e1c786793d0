use serde_json::{json, Value};

use crate::themes::Theme;

/// 文档区域的样式覆盖，没有节点与页面
#[derive(Debug, Default)]
pub struct DocTheme;

impl DocTheme {
    pub fn new() -> Self {
        Self
    }
}

impl Theme for DocTheme {
    fn name(&self) -> &str {
        "doc"
    }

    fn description(&self) -> &str {
        "文档区域的标题样式"
    }

    fn style(&self) -> Option<Value> {
        Some(json!({
            "heading": {
                "scrollMarginTop": ["130px", "40px", "40px", "50px"],
            },
            "h2": {
                "borderTopWidth": "1px",
                "pt": 6,
                "mt": 6,
                "fontSize": "4xl",
            },
        }))
    }
}
