// apps/ln_cli/src/main.rs

//! LatNet 命令行界面
//!
//! 训练数据管线的命令行工具：生成数据点、查看索引、验证配置、提取子域。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// LatNet 训练数据管线命令行工具
#[derive(Parser)]
#[command(name = "ln_cli")]
#[command(author = "LatNet Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "LatNet training data pipeline", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 生成数据点
    Generate(commands::generate::GenerateArgs),
    /// 显示索引信息
    Info(commands::info::InfoArgs),
    /// 验证配置
    Validate(commands::validate::ValidateArgs),
    /// 从 .npy 文件提取子域
    Extract(commands::extract::ExtractArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令
    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args),
        Commands::Info(args) => commands::info::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Extract(args) => commands::extract::execute(args),
    }
}
