// apps/ln_cli/src/commands/extract.rs

//! 子域提取命令
//!
//! 从一个 `.npy` 数组中按周期/补零策略取出窗口，写入另一个 `.npy` 文件。

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use ln_core::PeriodicExtractor;
use ln_foundation::{policies_from_flags, PaddingPolicy, SubDomain};
use ln_io::{read_array, write_array};

/// 提取参数
#[derive(Args)]
pub struct ExtractArgs {
    /// 输入 .npy 文件
    #[arg(short, long)]
    pub input: PathBuf,

    /// 输出 .npy 文件
    #[arg(short, long)]
    pub output: PathBuf,

    /// 窗口起点，逗号分隔
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
    pub pos: Vec<i64>,

    /// 窗口尺寸，逗号分隔
    #[arg(long, value_delimiter = ',', required = true)]
    pub size: Vec<i64>,

    /// 各轴是否周期，逗号分隔；缺省全部补零
    #[arg(long, value_delimiter = ',')]
    pub periodic: Vec<bool>,

    /// 填充掩码输出文件
    #[arg(long)]
    pub mask: Option<PathBuf>,
}

/// 执行提取命令
pub fn execute(args: ExtractArgs) -> Result<()> {
    if args.pos.len() != args.size.len() {
        bail!("pos 有 {} 个分量而 size 有 {} 个", args.pos.len(), args.size.len());
    }
    let subdomain = SubDomain::new(&args.pos, &args.size);
    let policies = resolve_policies(&args.periodic, subdomain.rank())?;

    let array = read_array(&args.input)
        .with_context(|| format!("无法读取 {}", args.input.display()))?;
    info!(
        "extracting {} from {} with shape {:?}",
        subdomain,
        args.input.display(),
        array.shape()
    );

    let extracted = PeriodicExtractor::new(&policies).extract(array.view(), &subdomain)?;
    write_array(&args.output, &extracted.window)?;
    if let Some(mask) = &args.mask {
        write_array(mask, &extracted.pad_mask)?;
    }

    println!("窗口: {}", subdomain);
    println!("输出形状: {:?}", extracted.window.shape());
    println!("填充格点: {}", extracted.padded_cells());
    Ok(())
}

fn resolve_policies(periodic: &[bool], rank: usize) -> Result<Vec<PaddingPolicy>> {
    if periodic.is_empty() {
        return Ok(vec![PaddingPolicy::Zero; rank]);
    }
    if periodic.len() != rank {
        bail!("periodic 需要 {} 个分量，得到 {} 个", rank, periodic.len());
    }
    Ok(policies_from_flags(periodic).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_policies() {
        assert_eq!(
            resolve_policies(&[], 2).unwrap(),
            vec![PaddingPolicy::Zero, PaddingPolicy::Zero]
        );
        assert_eq!(
            resolve_policies(&[true, false], 2).unwrap(),
            vec![PaddingPolicy::Periodic, PaddingPolicy::Zero]
        );
        assert!(resolve_policies(&[true], 2).is_err());
    }
}
