// apps/ln_cli/src/commands/info.rs

//! 索引信息命令
//!
//! 汇总训练域两份索引的内容。

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ln_config::DomainConfig;
use ln_core::DataPoint;
use ln_workflow::{Domain, PointKind};

/// 信息参数
#[derive(Args)]
pub struct InfoArgs {
    /// 域配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 列出前若干个数据点
    #[arg(long, default_value = "0")]
    pub show: usize,
}

/// 执行信息命令
pub fn execute(args: InfoArgs) -> Result<()> {
    info!("=== LatNet 索引信息 ===");

    let config = DomainConfig::from_file(&args.config)
        .with_context(|| format!("无法加载配置文件 {}", args.config.display()))?;
    let domain = Domain::from_config(config).context("无法创建训练域")?;
    domain.load_points().context("无法加载索引")?;

    println!("域: {} ({})", domain.name(), domain.backend().kind());
    println!("保存目录: {}", domain.config().save_dir.display());
    println!("模拟尺寸: {:?}", domain.config().sim_shape);

    for kind in [PointKind::State, PointKind::Compressed] {
        let points = domain.index(kind).snapshot();
        println!("\n=== {} 数据点 ===", kind);
        println!("索引文件: {}", domain.index(kind).path().display());
        print_summary(&points);
        for point in points.iter().take(args.show) {
            println!("  {}", point.to_index_line().trim_end());
        }
    }

    Ok(())
}

fn print_summary(points: &[DataPoint]) {
    println!("数量: {}", points.len());
    let Some(first) = points.first() else {
        return;
    };
    let min_step = points.iter().map(|p| p.index()).min().unwrap_or(0);
    let max_step = points.iter().map(|p| p.index()).max().unwrap_or(0);
    println!("起始步范围: {} ..= {}", min_step, max_step);
    println!("序列长度: {}", first.sequence_length());
    println!("完整状态窗口尺寸: {:?}", first.full_state_subdomain().size());
    println!("序列窗口尺寸: {:?}", first.sequence_subdomain().size());
    println!("压缩窗口尺寸: {:?}", first.compressed_subdomain().size());
}
