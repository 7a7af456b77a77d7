use anyhow::Result;
use call_insight_extract::utils::logging;
use call_insight_extract::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置，缺少必填项直接退出
    let config = Config::from_env()?;

    // 初始化日志
    logging::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
