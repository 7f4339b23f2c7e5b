// apps/ln_cli/src/commands/mod.rs

//! 子命令

pub mod extract;
pub mod generate;
pub mod info;
pub mod validate;
