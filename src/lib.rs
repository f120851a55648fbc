// =============================================================================
// VULKAN BOOTSTRAP ENGINE
// =============================================================================
//
// Brings up a Vulkan 1.3 rendering context for one window and tears it down
// again in reverse order:
//
//   window -> instance (+ debug messenger) -> surface -> physical device
//          -> logical device -> swapchain (+ image views)
//
// `Engine` owns the lifecycle. The graphics API sits behind
// `backend::GraphicsBackend` and the windowing library behind
// `window::WindowSurfaceProvider`, so the lifecycle runs the same against
// ash/winit and against the test doubles.
//
// =============================================================================

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod window;

#[cfg(test)]
mod testing;

pub use backend::{GraphicsBackend, VulkanBackend};
pub use config::{Config, EngineConfig};
pub use engine::{Engine, EngineState, InitPhase};
pub use error::EngineError;
pub use window::{WindowSurfaceProvider, WinitWindow};
