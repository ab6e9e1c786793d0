use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Result};
use axum::{http::StatusCode, routing::get_service, Router};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 预览服务器，提供输出目录中的静态文件
pub struct Server {
    /// 输出目录
    public_dir: PathBuf,
    /// 端口
    port: u16,
}

impl Server {
    pub fn new(public_dir: PathBuf, port: u16) -> Self {
        Self { public_dir, port }
    }

    fn router(&self) -> Router {
        let files = ServeDir::new(&self.public_dir).append_index_html_on_directories(true);
        let serve_dir = get_service(files).handle_error(|_| async move {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        });

        Router::new().fallback_service(serve_dir).layer(TraceLayer::new_for_http())
    }

    /// 启动服务器，直到进程退出
    pub async fn start(self) -> Result<()> {
        if !self.public_dir.is_dir() {
            bail!("输出目录不存在: {}，请先运行 build", self.public_dir.display());
        }

        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.port).parse()?;
        info!("Server started at http://localhost:{}", self.port);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_to_serve_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::new(dir.path().join("public"), 0);
        assert!(server.start().await.is_err());
    }
}
