// crates/ln_workflow/src/solver.rs

//! 外部格子玻尔兹曼求解器
//!
//! 求解器以独立进程运行，把检查点 `flow.<solver_iter>.0.cpoint.npy` 与边界
//! 文件 `flow_geometry.npy` 写到 `<save_dir>/store/` 下，运行结束后再移入
//! 保存目录。求解器步数 = 训练步 × `lb_to_ln`。

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use ln_io::BOUNDARY_FILE;

use crate::error::{WorkflowError, WorkflowResult};

const CPOINT_PREFIX: &str = "flow.";
const CPOINT_SUFFIX: &str = ".0.cpoint.npy";

/// 一次求解器调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverInvocation {
    /// 可执行脚本
    pub program: PathBuf,
    /// 命令行参数
    pub args: Vec<String>,
    /// 附加环境变量
    pub envs: Vec<(String, String)>,
    /// 输出目录（`--train_sim_dir` 的父目录）
    pub store_dir: PathBuf,
}

impl SolverInvocation {
    /// 可读的命令行
    pub fn command_line(&self) -> String {
        let mut line = String::new();
        for (key, value) in &self.envs {
            line.push_str(&format!("{}='{}' ", key, value));
        }
        line.push_str(&self.program.display().to_string());
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// 求解器运行接口
pub trait SolverRunner: Send + Sync {
    /// 运行至结束；非零退出视为失败
    fn run(&self, invocation: &SolverInvocation) -> WorkflowResult<()>;
}

/// 以子进程运行求解器
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSolver;

impl SolverRunner for ProcessSolver {
    fn run(&self, invocation: &SolverInvocation) -> WorkflowResult<()> {
        let command = invocation.command_line();
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k, v)))
            .status()
            .map_err(|source| WorkflowError::SolverSpawn {
                command: command.clone(),
                source,
            })?;
        if !status.success() {
            return Err(WorkflowError::SolverFailed {
                command,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// 解析检查点文件名中的求解器步数
pub fn parse_cpoint_name(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix(CPOINT_PREFIX)?
        .strip_suffix(CPOINT_SUFFIX)?
        .parse()
        .ok()
}

/// 检查点文件名
pub fn cpoint_name(solver_iter: u64) -> String {
    format!("{}{:06}{}", CPOINT_PREFIX, solver_iter, CPOINT_SUFFIX)
}

/// 保存目录中的检查点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// 训练步
    pub iteration: u64,
    /// 求解器步
    pub solver_iter: u64,
    /// 文件路径
    pub path: PathBuf,
}

impl Checkpoint {
    /// 作为 `--restore_from` 参数的路径（去掉 `.0.cpoint.npy`）
    pub fn restore_stem(&self) -> String {
        let text = self.path.display().to_string();
        text.strip_suffix(CPOINT_SUFFIX).map(str::to_string).unwrap_or(text)
    }
}

/// 检查点目录
#[derive(Debug, Clone)]
pub struct CheckpointDir {
    dir: PathBuf,
    lb_to_ln: u64,
}

impl CheckpointDir {
    /// 创建
    pub fn new(dir: impl Into<PathBuf>, lb_to_ln: u64) -> Self {
        Self {
            dir: dir.into(),
            lb_to_ln: lb_to_ln.max(1),
        }
    }

    /// 目录
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 求解器输出暂存目录
    pub fn store_dir(&self) -> PathBuf {
        self.dir.join("store")
    }

    /// 边界文件路径
    pub fn boundary_path(&self) -> PathBuf {
        self.dir.join(BOUNDARY_FILE)
    }

    /// 训练步 → 求解器步
    pub fn to_solver_iter(&self, iteration: u64) -> u64 {
        iteration * self.lb_to_ln
    }

    /// 求解器步 → 训练步
    pub fn to_iteration(&self, solver_iter: u64) -> u64 {
        solver_iter / self.lb_to_ln
    }

    /// 全部检查点，按步数升序
    pub fn list_cpoints(&self) -> WorkflowResult<Vec<Checkpoint>> {
        let mut cpoints = Vec::new();
        if !self.dir.is_dir() {
            return Ok(cpoints);
        }
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let solver_iter = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_cpoint_name);
            if let Some(solver_iter) = solver_iter {
                cpoints.push(Checkpoint {
                    iteration: self.to_iteration(solver_iter),
                    solver_iter,
                    path,
                });
            }
        }
        cpoints.sort_by_key(|c| c.solver_iter);
        Ok(cpoints)
    }

    /// 最早的检查点
    pub fn first_cpoint(&self) -> WorkflowResult<Option<Checkpoint>> {
        Ok(self.list_cpoints()?.into_iter().next())
    }

    /// 最新的检查点
    pub fn last_cpoint(&self) -> WorkflowResult<Option<Checkpoint>> {
        Ok(self.list_cpoints()?.pop())
    }

    /// 训练步对应的检查点路径（若存在）
    pub fn cpoint_path(&self, iteration: u64) -> WorkflowResult<Option<PathBuf>> {
        let target = self.to_solver_iter(iteration);
        Ok(self
            .list_cpoints()?
            .into_iter()
            .find(|c| c.solver_iter == target)
            .map(|c| c.path))
    }

    /// 能否从已有检查点续算
    pub fn is_restorable(&self) -> WorkflowResult<bool> {
        Ok(self.last_cpoint()?.is_some() && self.boundary_path().is_file())
    }

    /// 清空暂存目录
    pub fn clean_store(&self) -> WorkflowResult<()> {
        let store = self.store_dir();
        if store.exists() {
            std::fs::remove_dir_all(&store)?;
        }
        std::fs::create_dir_all(&store)?;
        Ok(())
    }

    /// 删除保存目录中的检查点与边界文件
    pub fn remove_outputs(&self) -> WorkflowResult<usize> {
        let cpoints = self.list_cpoints()?;
        let count = cpoints.len();
        for cpoint in cpoints {
            std::fs::remove_file(&cpoint.path)?;
        }
        let boundary = self.boundary_path();
        if boundary.is_file() {
            std::fs::remove_file(boundary)?;
        }
        Ok(count)
    }

    /// 把暂存目录中的文件移入保存目录，返回移动数
    pub fn collect_store(&self) -> WorkflowResult<usize> {
        let store = self.store_dir();
        let mut moved = 0;
        if !store.is_dir() {
            return Ok(moved);
        }
        for entry in std::fs::read_dir(&store)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::rename(entry.path(), self.dir.join(entry.file_name()))?;
                moved += 1;
            }
        }
        debug!("moved {} solver outputs into {}", moved, self.dir.display());
        Ok(moved)
    }
}
