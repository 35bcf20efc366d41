use anyhow::Result;
use clap::Parser;
use exam_generator::cli::{self, Cli};
use exam_generator::utils::logging;
use exam_generator::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::from_env()?;

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);

    cli::run(cli, config).await
}
