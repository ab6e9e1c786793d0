use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::{error, Level};
use tracing_subscriber::fmt;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let cli = cli::Cli::parse();

    // 初始化日志系统
    fmt()
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    println!("{} {}", "Reflex".bright_cyan(), env!("CARGO_PKG_VERSION").bright_green());
    println!("{}", "Post, block and doc content themes for static sites".bright_white());
    println!();

    // 执行命令
    if let Err(e) = cli::execute(cli).await {
        error!("Error: {}", e);

        // 打印错误链
        for cause in e.chain().skip(1) {
            error!("Caused by: {}", cause);
        }

        std::process::exit(1);
    }

    Ok(())
}
