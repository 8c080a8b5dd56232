/// cli.rs - 命令行接口定义模块
/// 职责：使用 clap 定义 demo 驱动程序的参数和子命令

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::utils::version;

#[derive(Parser)]
#[command(author, version = version(), about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    /// 配置文件路径
    ///
    /// 也可通过 `WLR_TRAMPOLINE_CONFIG` 环境变量设置，命令行参数优先。
    /// 都未设置时使用默认配置。
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub subcommand: Option<Sub>,
}

#[derive(Subcommand)]
pub enum Sub {
    /// 验证配置文件
    Validate {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 在 headless 后端上驱动三种 trampoline 并输出收到的回调（默认）
    Demo,

    /// 生成 shell 自动补全脚本
    Completions { shell: Shell },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_validate() {
        let cli = Cli::try_parse_from(["wlr-trampoline", "validate", "-c", "a.json"]).unwrap();
        match cli.subcommand {
            Some(Sub::Validate { config }) => assert_eq!(config, Some(PathBuf::from("a.json"))),
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn no_subcommand_means_demo() {
        let cli = Cli::try_parse_from(["wlr-trampoline", "--config", "b.json"]).unwrap();
        assert!(cli.subcommand.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("b.json")));
    }
}
