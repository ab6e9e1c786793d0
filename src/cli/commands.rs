use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use reflex_themes::core::{Engine, ReportLevel, Server};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 指定站点目录
    #[arg(short, long, default_value = ".", global = true)]
    pub path: PathBuf,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 生成静态文件
    Build,

    /// 列出将要生成的页面
    Routes,

    /// 打印节点类型声明
    Schema,

    /// 启动本地服务器
    Serve(ServeArgs),

    /// 清理生成的文件
    Clean,
}

#[derive(Args)]
pub struct ServeArgs {
    /// 服务器端口
    #[arg(short, long, default_value = "8000")]
    pub port: u16,
}

pub async fn execute(cli: Cli) -> Result<()> {
    let mut engine = Engine::new(cli.path.clone())?;

    match cli.command {
        Commands::Build => build(&mut engine)?,
        Commands::Routes => {
            engine.bootstrap()?;
            engine.plan_pages()?;
            for page in engine.pages().pages() {
                println!("{:<40} {}", page.path.bright_white(), page.component.bright_black());
            }
            println!(
                "{} {}",
                engine.pages().len().to_string().bright_green(),
                "pages".bright_white()
            );
        }
        Commands::Schema => {
            engine.bootstrap()?;
            for def in engine.schema().types() {
                println!("{}", def);
            }
        }
        Commands::Serve(args) => {
            build(&mut engine)?;
            Server::new(engine.public_dir.clone(), args.port).start().await?;
        }
        Commands::Clean => {
            engine.clean()?;
            println!("{}", "Cleaned the public directory.".bright_green());
        }
    }

    Ok(())
}

fn build(engine: &mut Engine) -> Result<()> {
    let summary = engine.build()?;

    for report in engine.reporter().reports() {
        match report.level {
            ReportLevel::Warn => println!("{} {}", "warn".yellow(), report.message),
            ReportLevel::Error | ReportLevel::Fatal => {
                println!("{} {}", "error".red(), report.message)
            }
            ReportLevel::Info => {}
        }
    }

    if engine.reporter().has_fatal() {
        bail!("build failed: {}", summary);
    }

    info!("输出目录: {}", engine.public_dir.display());
    println!("{} {}", "Built".bright_green(), summary.to_string().bright_white());
    Ok(())
}
