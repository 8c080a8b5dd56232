#[macro_use]
extern crate tracing;

use std::env;
use std::io;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;
use wlr_trampoline::backend::Backend;
use wlr_trampoline::cli::{Cli, Sub};
use wlr_trampoline::config::{config_path, Config, CONFIG_PATH_ENV};
use wlr_trampoline::utils::version;

// 默认日志过滤规则：本库 debug，原生日志 info
const DEFAULT_LOG_FILTER: &str = "wlr_trampoline=debug,wlroots=info";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if env::var_os("RUST_BACKTRACE").is_none() {
        env::set_var("RUST_BACKTRACE", "1");
    }

    let directives = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_owned());
    let env_filter = EnvFilter::builder().parse_lossy(directives);
    tracing_subscriber::fmt()
        .compact()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .init();

    let cli = Cli::parse();

    match cli.subcommand {
        Some(Sub::Validate { config }) => {
            let Some(path) = config_path(config.or(cli.config)) else {
                warn!("no config path given (use --config or {CONFIG_PATH_ENV})");
                return Ok(());
            };
            Config::load(&path)?;
            info!("config is valid");
            return Ok(());
        }
        Some(Sub::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "wlr-trampoline", &mut io::stdout());
            return Ok(());
        }
        Some(Sub::Demo) | None => (),
    }

    info!("starting version {}", &version());

    // 配置加载失败时退回默认配置
    let config = match config_path(cli.config) {
        Some(path) => Config::load(&path)
            .map_err(|err| warn!("{err:?}"))
            .unwrap_or_default(),
        None => Config::default(),
    };

    let backend = Backend::default();
    config.apply(&backend);

    let report = wlr_trampoline::demo::run(&backend)?;
    info!(
        "visited {} surfaces, delivered {} notifications",
        report.surfaces_visited, report.notifications
    );

    Ok(())
}
