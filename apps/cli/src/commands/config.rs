//! 配置管理命令
//!
//! 生成、检查和显示遥操作配置文件。

use super::{default_config_path, load_config};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::PathBuf;
use teleop_sdk::TeleopConfig;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置（TOML）
    Show {
        /// 配置文件路径
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 校验配置文件
    Check {
        /// 配置文件路径（默认 ~/.config/teleop/config.toml）
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 写出默认配置
    Init {
        /// 目标路径（默认 ~/.config/teleop/config.toml）
        path: Option<PathBuf>,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { config } => {
                let config = load_config(config.as_deref())?;
                print!("{}", config.to_toml_string()?);
                Ok(())
            },

            ConfigCommand::Check { config } => {
                let path = match config {
                    Some(path) => path,
                    None => default_config_path().context("Cannot determine config directory")?,
                };
                TeleopConfig::load_from_file(&path)
                    .with_context(|| format!("Invalid config {}", path.display()))?;
                println!("✅ {} 有效", path.display());
                Ok(())
            },

            ConfigCommand::Init { path, force } => {
                let path = match path {
                    Some(path) => path,
                    None => default_config_path().context("Cannot determine config directory")?,
                };
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    fs::create_dir_all(parent).context("Failed to create config directory")?;
                }
                TeleopConfig::default()
                    .save_to_file(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("✅ 已写入默认配置: {}", path.display());
                Ok(())
            },
        }
    }
}
