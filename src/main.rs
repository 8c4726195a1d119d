use anyhow::Context;
use level_renderer::{app::LevelViewer, config::ViewerConfig, logging};

fn main() -> anyhow::Result<()> {
    let config = ViewerConfig::from_args();
    logging::init(config.log_file.as_deref()).context("failed to open log file")?;

    log::info!("Starting level viewer with {} level(s)", config.levels.len());
    LevelViewer::new(config)?.run()
}
