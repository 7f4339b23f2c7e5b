// apps/ln_cli/src/commands/generate.rs

//! 生成数据点命令
//!
//! 按配置构建训练域，运行（或续用）数据来源，生成状态数据点并保存索引。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use ln_config::DomainConfig;
use ln_workflow::{Domain, LoggingListener, PointKind, WorkerPool};

/// 生成参数
#[derive(Args)]
pub struct GenerateArgs {
    /// 域配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 覆盖配置中的数据点数
    #[arg(short = 'n', long)]
    pub num_points: Option<usize>,

    /// 覆盖配置中的工作线程数
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// 覆盖配置中的随机种子
    #[arg(long)]
    pub seed: Option<u64>,

    /// 在已有索引之后追加，而不是沿用
    #[arg(long)]
    pub append: bool,

    /// 每提交多少个数据点输出一次进度
    #[arg(long, default_value = "100")]
    pub progress_every: usize,
}

/// 执行生成命令
pub fn execute(args: GenerateArgs) -> Result<()> {
    info!("=== LatNet 数据点生成 ===");

    let mut config = DomainConfig::from_file(&args.config)
        .with_context(|| format!("无法加载配置文件 {}", args.config.display()))?;
    if let Some(n) = args.num_points {
        config.generation.num_points = n;
    }
    if let Some(w) = args.workers {
        config.generation.num_workers = w;
    }
    if args.seed.is_some() {
        config.generation.seed = args.seed;
    }

    let domain = Domain::from_config(config).context("无法创建训练域")?;
    domain.events().add_listener(Arc::new(
        LoggingListener::new(domain.name().to_string()).with_progress_every(args.progress_every),
    ));

    let start = Instant::now();
    domain.prepare().context("准备模拟数据失败")?;

    let pool = WorkerPool::with_config(domain.pool_config())?;
    let mut rng = domain.rng();

    let total = if args.append {
        let (existing, _) = domain.load_points()?;
        info!("已有 {} 个数据点，追加生成", existing);
        domain.add_rand_dps(domain.config().generation.num_points, &pool, &mut rng)?;
        domain.index(PointKind::State).len()
    } else {
        domain.create_data_points(&pool, &mut rng)?
    };

    let stats = pool.stats();
    println!("\n=== 生成完成 ===");
    println!("域: {}", domain.name());
    println!("索引: {}", domain.index(PointKind::State).path().display());
    println!("数据点: {}", total);
    println!(
        "任务: 提交 {} / 完成 {} / 失败 {} / 跳过 {}",
        stats.submitted, stats.completed, stats.failed, stats.skipped
    );
    println!("平均任务耗时: {:.1} ms", stats.average_job_time_ms);
    println!("总耗时: {:.1} s", start.elapsed().as_secs_f64());

    Ok(())
}
