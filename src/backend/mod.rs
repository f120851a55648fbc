// Backend module - graphics API abstraction layer
//
// The lifecycle controller only talks to `GraphicsBackend`. `VulkanBackend`
// is the ash implementation; tests drive the same code with a mock.

pub mod device;
pub mod instance;
pub mod swapchain;
pub mod vulkan;

use ash::vk;
use std::fmt;

use crate::error::{
    DeviceCreationError, InstanceCreationError, NoSuitableDeviceError, SurfaceCreationError,
    SwapchainCreationError,
};
use crate::window::WindowSurfaceProvider;

pub use device::{DeviceCandidate, DeviceFeatures, DeviceKind, DeviceRequirements};
pub use instance::InstanceDesc;
pub use swapchain::{RawSwapchain, SwapchainBundle, SwapchainDesc};
pub use vulkan::VulkanBackend;

/// Packed Vulkan API version (variant 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion(u32);

impl ApiVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self(vk::make_api_version(0, major, minor, patch))
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u32 {
        vk::api_version_major(self.0)
    }

    pub const fn minor(self) -> u32 {
        vk::api_version_minor(self.0)
    }

    pub const fn patch(self) -> u32 {
        vk::api_version_patch(self.0)
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())
    }
}

/// Swapchain bundle type produced by a given backend.
pub type BackendSwapchain<B> = SwapchainBundle<
    <B as GraphicsBackend>::Swapchain,
    <B as GraphicsBackend>::Image,
    <B as GraphicsBackend>::ImageView,
>;

/// Every graphics API call the engine makes.
///
/// Handles are plain values owned by the caller. Create calls either return
/// a valid handle or a typed error and never leave anything half-built
/// behind. Destroy calls consume the handle; calling them out of dependency
/// order is a programming error.
pub trait GraphicsBackend {
    type Instance;
    type DebugMessenger;
    type Surface;
    type PhysicalDevice: Copy + fmt::Debug;
    type Device;
    type Swapchain;
    type Image: Copy;
    type ImageView;

    fn create_instance<W: WindowSurfaceProvider>(
        &mut self,
        window: &W,
        desc: &InstanceDesc<'_>,
    ) -> Result<Self::Instance, InstanceCreationError>;

    fn create_debug_messenger(
        &mut self,
        instance: &Self::Instance,
    ) -> Result<Self::DebugMessenger, InstanceCreationError>;

    fn create_surface<W: WindowSurfaceProvider>(
        &mut self,
        instance: &Self::Instance,
        window: &W,
    ) -> Result<Self::Surface, SurfaceCreationError>;

    /// Describe every physical device the instance exposes, including
    /// whether it can present to `surface`.
    fn enumerate_physical_devices(
        &mut self,
        instance: &Self::Instance,
        surface: &Self::Surface,
    ) -> Result<Vec<DeviceCandidate<Self::PhysicalDevice>>, NoSuitableDeviceError>;

    fn create_device(
        &mut self,
        instance: &Self::Instance,
        physical_device: Self::PhysicalDevice,
        features: &DeviceFeatures,
    ) -> Result<Self::Device, DeviceCreationError>;

    fn create_swapchain_handle(
        &mut self,
        instance: &Self::Instance,
        device: &Self::Device,
        surface: &Self::Surface,
        physical_device: Self::PhysicalDevice,
        desc: &SwapchainDesc,
    ) -> Result<RawSwapchain<Self::Swapchain, Self::Image>, SwapchainCreationError>;

    fn create_image_view(
        &mut self,
        device: &Self::Device,
        image: Self::Image,
        format: vk::Format,
    ) -> Result<Self::ImageView, SwapchainCreationError>;

    /// Block until the device has no work in flight. Failures are logged.
    fn wait_idle(&mut self, device: &Self::Device);

    fn destroy_image_view(&mut self, device: &Self::Device, view: Self::ImageView);
    fn destroy_swapchain_handle(&mut self, device: &Self::Device, swapchain: Self::Swapchain);
    fn destroy_device(&mut self, device: Self::Device);
    fn destroy_surface(&mut self, instance: &Self::Instance, surface: Self::Surface);
    fn destroy_debug_messenger(&mut self, instance: &Self::Instance, messenger: Self::DebugMessenger);
    fn destroy_instance(&mut self, instance: Self::Instance);
}
