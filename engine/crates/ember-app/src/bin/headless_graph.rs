use std::path::PathBuf;

use ember_app::app_config::HeadlessAppConfig;
use ember_app::headless_app::HeadlessGraphApp;

fn main() -> anyhow::Result<()> {
    ember_crate_tools::init_log::init_log();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = HeadlessAppConfig::load(config_path.as_deref())?;

    let mut app = HeadlessGraphApp::new(config)?;
    app.run()?;
    Ok(())
}
