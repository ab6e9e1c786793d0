use std::fmt;
use thiserror::Error;

/// 主题错误类型
#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("配置错误: {theme} - {message}")]
    Config {
        theme: String,
        message: String,
    },

    #[error("内容目录不可用: {path} - {message}")]
    ContentPath {
        path: String,
        message: String,
    },

    #[error("执行钩子失败: 主题 {theme_name} 在执行 {hook} 时出错: {message}")]
    HookError {
        theme_name: String,
        hook: ThemeHook,
        message: String,
    },
}

/// 构建阶段，按执行顺序排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeHook {
    /// 校验内容目录
    PreBootstrap,
    /// 声明节点类型
    CreateSchemaCustomization,
    /// 从源节点派生节点
    OnCreateNode,
    /// 规划页面
    CreatePages,
}

impl fmt::Display for ThemeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThemeHook::PreBootstrap => "onPreBootstrap",
            ThemeHook::CreateSchemaCustomization => "createSchemaCustomization",
            ThemeHook::OnCreateNode => "onCreateNode",
            ThemeHook::CreatePages => "createPages",
        };
        f.write_str(name)
    }
}
