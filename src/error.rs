// Error taxonomy
//
// One variant per initialization step. Every step failure is fatal to
// `Engine::init`; the message names the step that failed.

use ash::vk;
use thiserror::Error;

use crate::engine::EngineState;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("window creation failed: {0}")]
    WindowCreation(#[from] WindowCreationError),
    #[error("instance creation failed: {0}")]
    InstanceCreation(#[from] InstanceCreationError),
    #[error("surface creation failed: {0}")]
    SurfaceCreation(#[from] SurfaceCreationError),
    #[error("no suitable GPU: {0}")]
    NoSuitableDevice(#[from] NoSuitableDeviceError),
    #[error("logical device creation failed: {0}")]
    DeviceCreation(#[from] DeviceCreationError),
    #[error("swapchain creation failed: {0}")]
    SwapchainCreation(#[from] SwapchainCreationError),
    #[error("operation not allowed while engine is {0:?}")]
    InvalidState(EngineState),
}

#[derive(Debug, Error)]
pub enum WindowCreationError {
    #[error("could not start the windowing event loop: {0}")]
    EventLoop(String),
    #[error("the OS refused to create the window: {0}")]
    Os(String),
    #[error("the event loop exited before a window was created")]
    NotResumed,
    #[error("window already created")]
    AlreadyCreated,
}

#[derive(Debug, Error)]
pub enum InstanceCreationError {
    #[error("could not load the Vulkan library: {0}")]
    Loading(String),
    #[error("application name contains an interior NUL byte")]
    InvalidAppName,
    #[error("window does not expose a display handle: {0}")]
    DisplayHandle(#[from] raw_window_handle::HandleError),
    #[error("Vulkan {available} is available but {required} is required")]
    UnsupportedApiVersion {
        required: crate::backend::ApiVersion,
        available: crate::backend::ApiVersion,
    },
    #[error("validation requested but VK_LAYER_KHRONOS_validation is not installed")]
    MissingValidationLayer,
    #[error("{0}")]
    Vulkan(#[from] vk::Result),
}

#[derive(Debug, Error)]
pub enum SurfaceCreationError {
    #[error("window does not expose a raw handle: {0}")]
    Handle(#[from] raw_window_handle::HandleError),
    #[error("{0}")]
    Vulkan(#[from] vk::Result),
}

#[derive(Debug, Error)]
pub enum NoSuitableDeviceError {
    #[error("the instance exposes no physical devices")]
    NoDevices,
    #[error("none of the {0} physical device(s) meet the requirements")]
    NoneQualified(usize),
    #[error("{0}")]
    Vulkan(#[from] vk::Result),
}

#[derive(Debug, Error)]
pub enum DeviceCreationError {
    #[error("{0}")]
    Vulkan(#[from] vk::Result),
}

#[derive(Debug, Error)]
pub enum SwapchainCreationError {
    #[error("surface does not support {0:?}")]
    FormatUnsupported(vk::SurfaceFormatKHR),
    #[error("surface does not support image usage {0:?}")]
    UsageUnsupported(vk::ImageUsageFlags),
    #[error("surface reported a zero-sized extent")]
    ZeroExtent,
    #[error("{0}")]
    Vulkan(#[from] vk::Result),
}
