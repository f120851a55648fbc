// =============================================================================
// LAUNCHER
// =============================================================================
//
// init -> run -> terminate. Any init failure is reported and the process
// exits non-zero; the engine has already released what it built.

use anyhow::{Context, Result};
use vk_bootstrap_engine::{Config, Engine, VulkanBackend, WinitWindow};

fn main() -> Result<()> {
    init_logging();

    let config = Config::load();
    let engine_config = config.engine();
    log::info!(
        "Window: {}x{} '{}' (validation {})",
        engine_config.window.width,
        engine_config.window.height,
        engine_config.window.title,
        if engine_config.enable_validation { "on" } else { "off" }
    );

    let mut engine = Engine::new(engine_config, WinitWindow::new(), VulkanBackend::new());
    engine.init().context("Failed to initialize engine")?;

    let result = engine.run().context("Frame loop failed");
    engine.terminate();
    result
}

// =============================================================================
// LOGGING
// =============================================================================

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    // RUST_LOG still wins over the default filter
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_default_env();
    builder.init();
}
