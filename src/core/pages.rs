use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::utils::{ensure_leading_slash, join_path};

/// 待渲染的页面：路由、模板与上下文
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSpec {
    pub path: String,
    pub component: String,
    pub context: Map<String, Value>,
}

impl PageSpec {
    pub fn new(path: &str, component: &str) -> Self {
        Self {
            path: ensure_leading_slash(path),
            component: component.to_string(),
            context: Map::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// 已登记的页面，按登记顺序保存
#[derive(Debug, Default, Clone)]
pub struct PageRegistry {
    pages: Vec<PageSpec>,
    by_path: HashMap<String, usize>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记页面；路由已存在时用新页面替换旧页面
    pub fn create_page(&mut self, mut page: PageSpec) {
        page.path = ensure_leading_slash(&page.path);
        match self.by_path.get(&page.path) {
            Some(&index) => {
                warn!("页面路由重复，覆盖旧页面: {}", page.path);
                self.pages[index] = page;
            }
            None => {
                debug!("创建页面 {} ({})", page.path, page.component);
                self.by_path.insert(page.path.clone(), self.pages.len());
                self.pages.push(page);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&PageSpec> {
        self.by_path.get(path).map(|&index| &self.pages[index])
    }

    pub fn pages(&self) -> &[PageSpec] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// 分页参数
#[derive(Debug, Clone)]
pub struct Paginate<'a> {
    pub total_items: usize,
    pub items_per_page: usize,
    pub component: &'a str,
    /// 附加到每一页的上下文
    pub context: Map<String, Value>,
}

/// 第 `page_number` 页（从 0 开始）的路由
///
/// 第 0 页使用前缀本身，其后各页使用人类可读的页码：第二页为 `{prefix}/2`。
pub fn page_path(prefix: &str, page_number: usize) -> String {
    if page_number == 0 {
        join_path(prefix, "")
    } else {
        join_path(prefix, &(page_number + 1).to_string())
    }
}

/// 将列表切分为固定大小的页面并逐一登记
///
/// `path_prefix` 接收页码（从 0 开始）并返回该页的路由前缀。返回创建的页数。
pub fn paginate<F>(registry: &mut PageRegistry, options: Paginate<'_>, path_prefix: F) -> usize
where
    F: Fn(usize) -> String,
{
    let per_page = options.items_per_page.max(1);
    let number_of_pages = options.total_items.div_ceil(per_page);

    let path_for = |n: usize| page_path(&path_prefix(n), n);

    for page_number in 0..number_of_pages {
        let previous = if page_number == 0 {
            Value::Null
        } else {
            Value::String(path_for(page_number - 1))
        };
        let next = if page_number + 1 == number_of_pages {
            Value::Null
        } else {
            Value::String(path_for(page_number + 1))
        };

        let mut page = PageSpec::new(&path_for(page_number), options.component)
            .with_context("pageNumber", page_number)
            .with_context("humanPageNumber", page_number + 1)
            .with_context("skip", page_number * per_page)
            .with_context("limit", per_page)
            .with_context("numberOfPages", number_of_pages)
            .with_context("previousPagePath", previous)
            .with_context("nextPagePath", next);

        for (key, value) in &options.context {
            page.context.insert(key.clone(), value.clone());
        }

        registry.create_page(page);
    }

    number_of_pages
}
