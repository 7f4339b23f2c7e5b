// apps/ln_cli/src/commands/validate.rs

//! 配置验证命令
//!
//! 验证域配置并打印换算出的窗口尺寸与抽样范围。

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use tracing::{error, info, warn};

use ln_config::{BackendConfig, DomainConfig};
use ln_foundation::SubDomain;
use ln_workflow::DataPointGenerator;

/// 验证参数
#[derive(Args)]
pub struct ValidateArgs {
    /// 域配置文件路径
    #[arg(short, long)]
    pub config: PathBuf,

    /// 严格模式（警告也视为错误）
    #[arg(long)]
    pub strict: bool,
}

/// 验证结果
#[derive(Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn is_ok(&self, strict: bool) -> bool {
        self.errors.is_empty() && (!strict || self.warnings.is_empty())
    }
}

/// 执行验证命令
pub fn execute(args: ValidateArgs) -> Result<()> {
    info!("=== LatNet 配置验证 ===");
    println!("\n检查配置文件: {}", args.config.display());

    let mut result = ValidationResult::default();
    match DomainConfig::from_file(&args.config) {
        Ok(config) => {
            println!("  ✓ 配置文件有效");
            check_geometry(&config, &mut result);
            check_backend(&config, &mut result);
        }
        Err(e) => result.add_error(e.to_string()),
    }

    print_validation_result(&result, args.strict)
}

fn check_geometry(config: &DomainConfig, result: &mut ValidationResult) {
    let geometry = match config.point_geometry() {
        Ok(g) => g,
        Err(e) => {
            result.add_error(e.to_string());
            return;
        }
    };

    let origin = SubDomain::new(&vec![0; config.rank()], &config.network.input_cshape);
    match geometry.derive(0, config.sequence_length, origin) {
        Ok(point) => {
            println!("\n=== 窗口尺寸 ===");
            println!("压缩窗口: {:?}", point.compressed_subdomain().size());
            println!("完整状态窗口: {:?}", point.full_state_subdomain().size());
            println!("序列窗口: {:?}", point.sequence_subdomain().size());
            println!(
                "编码器总步长: {}",
                geometry.state_converter().total_stride()
            );
        }
        Err(e) => result.add_error(e.to_string()),
    }

    match DataPointGenerator::from_config(config, geometry, config.num_sim_steps) {
        Ok(generator) => {
            println!("\n=== 抽样范围 ===");
            let steps = generator.index_range();
            println!("起始步: {} .. {}", steps.start, steps.end);
            for axis in 0..config.rank() {
                if let Some(range) = generator.position_range(axis) {
                    println!("轴 {} 压缩位置: {} ..= {}", axis, range.start(), range.end());
                }
            }
            if steps.end - steps.start < 10 {
                result.add_warning(format!("可选起始步只有 {} 个", steps.end - steps.start));
            }
        }
        Err(e) => result.add_error(e.to_string()),
    }
}

fn check_backend(config: &DomainConfig, result: &mut ValidationResult) {
    match &config.backend {
        BackendConfig::LocalSolver(local) => {
            if !local.script.exists() {
                result.add_warning(format!("求解器脚本不存在: {}", local.script.display()));
            }
        }
        BackendConfig::RemoteDataset(remote) => {
            if !remote.base_url.starts_with("http://") && !remote.base_url.starts_with("https://") {
                result.add_warning(format!("远程地址不是 HTTP 地址: {}", remote.base_url));
            }
            if remote.max_attempts.is_none() {
                result.add_warning("下载失败将无限重试");
            }
        }
    }
}

fn print_validation_result(result: &ValidationResult, strict: bool) -> Result<()> {
    println!("\n=== 验证结果 ===");

    if !result.errors.is_empty() {
        println!("\n错误 ({}):", result.errors.len());
        for err in &result.errors {
            error!("  ✗ {}", err);
            println!("  ✗ {}", err);
        }
    }

    if !result.warnings.is_empty() {
        println!("\n警告 ({}):", result.warnings.len());
        for warning in &result.warnings {
            warn!("  ⚠ {}", warning);
            println!("  ⚠ {}", warning);
        }
    }

    if result.is_ok(strict) {
        println!("\n✓ 验证通过");
        Ok(())
    } else {
        println!("\n✗ 验证失败");
        bail!(
            "验证失败：发现 {} 个错误，{} 个警告",
            result.errors.len(),
            result.warnings.len()
        )
    }
}
