// Vulkan backend - ash implementation of `GraphicsBackend`
//
// Handles wrap the ash loaders they need so each destroy call is
// self-contained. Nothing here destroys anything implicitly: no Drop impls,
// the lifecycle controller decides the order.

use ash::vk;

use super::device::{create_vk_device, enumerate_vk_devices};
use super::instance::{create_vk_debug_messenger, create_vk_instance};
use super::swapchain::{create_vk_image_view, create_vk_swapchain};
use super::{DeviceCandidate, DeviceFeatures, GraphicsBackend, InstanceDesc, RawSwapchain, SwapchainDesc};
use crate::error::{
    DeviceCreationError, InstanceCreationError, NoSuitableDeviceError, SurfaceCreationError,
    SwapchainCreationError,
};
use crate::window::WindowSurfaceProvider;

pub struct VulkanInstance {
    pub instance: ash::Instance,
    pub surface_loader: ash::khr::surface::Instance,
    // Keeps libvulkan loaded; must outlive `instance`
    pub(crate) entry: ash::Entry,
}

pub struct VulkanDebugMessenger {
    pub(crate) loader: ash::ext::debug_utils::Instance,
    pub(crate) messenger: vk::DebugUtilsMessengerEXT,
}

/// Selected GPU plus the graphics/present queue family found for it.
#[derive(Debug, Clone, Copy)]
pub struct VulkanPhysicalDevice {
    pub raw: vk::PhysicalDevice,
    pub queue_family: u32,
}

pub struct VulkanDevice {
    pub device: ash::Device,
    pub swapchain_loader: ash::khr::swapchain::Device,
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,
}

#[derive(Debug, Default)]
pub struct VulkanBackend;

impl VulkanBackend {
    pub fn new() -> Self {
        Self
    }
}

impl GraphicsBackend for VulkanBackend {
    type Instance = VulkanInstance;
    type DebugMessenger = VulkanDebugMessenger;
    type Surface = vk::SurfaceKHR;
    type PhysicalDevice = VulkanPhysicalDevice;
    type Device = VulkanDevice;
    type Swapchain = vk::SwapchainKHR;
    type Image = vk::Image;
    type ImageView = vk::ImageView;

    fn create_instance<W: WindowSurfaceProvider>(
        &mut self,
        window: &W,
        desc: &InstanceDesc<'_>,
    ) -> Result<VulkanInstance, InstanceCreationError> {
        let (display, _) = window.raw_handles()?;
        create_vk_instance(display, desc)
    }

    fn create_debug_messenger(
        &mut self,
        instance: &VulkanInstance,
    ) -> Result<VulkanDebugMessenger, InstanceCreationError> {
        create_vk_debug_messenger(instance)
    }

    fn create_surface<W: WindowSurfaceProvider>(
        &mut self,
        instance: &VulkanInstance,
        window: &W,
    ) -> Result<vk::SurfaceKHR, SurfaceCreationError> {
        let (display, window_handle) = window.raw_handles()?;
        // SAFETY: both handles come from a live window that outlives the surface
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                display,
                window_handle,
                None,
            )
        }?;
        Ok(surface)
    }

    fn enumerate_physical_devices(
        &mut self,
        instance: &VulkanInstance,
        surface: &vk::SurfaceKHR,
    ) -> Result<Vec<DeviceCandidate<VulkanPhysicalDevice>>, NoSuitableDeviceError> {
        enumerate_vk_devices(instance, *surface)
    }

    fn create_device(
        &mut self,
        instance: &VulkanInstance,
        physical_device: VulkanPhysicalDevice,
        features: &DeviceFeatures,
    ) -> Result<VulkanDevice, DeviceCreationError> {
        create_vk_device(instance, physical_device, features)
    }

    fn create_swapchain_handle(
        &mut self,
        instance: &VulkanInstance,
        device: &VulkanDevice,
        surface: &vk::SurfaceKHR,
        physical_device: VulkanPhysicalDevice,
        desc: &SwapchainDesc,
    ) -> Result<RawSwapchain<vk::SwapchainKHR, vk::Image>, SwapchainCreationError> {
        create_vk_swapchain(instance, device, *surface, physical_device, desc)
    }

    fn create_image_view(
        &mut self,
        device: &VulkanDevice,
        image: vk::Image,
        format: vk::Format,
    ) -> Result<vk::ImageView, SwapchainCreationError> {
        create_vk_image_view(device, image, format)
    }

    fn wait_idle(&mut self, device: &VulkanDevice) {
        if let Err(e) = unsafe { device.device.device_wait_idle() } {
            log::warn!("vkDeviceWaitIdle failed: {}", e);
        }
    }

    fn destroy_image_view(&mut self, device: &VulkanDevice, view: vk::ImageView) {
        unsafe { device.device.destroy_image_view(view, None) };
    }

    fn destroy_swapchain_handle(&mut self, device: &VulkanDevice, swapchain: vk::SwapchainKHR) {
        unsafe { device.swapchain_loader.destroy_swapchain(swapchain, None) };
    }

    fn destroy_device(&mut self, device: VulkanDevice) {
        log::debug!("Destroying logical device");
        unsafe { device.device.destroy_device(None) };
    }

    fn destroy_surface(&mut self, instance: &VulkanInstance, surface: vk::SurfaceKHR) {
        log::debug!("Destroying surface");
        unsafe { instance.surface_loader.destroy_surface(surface, None) };
    }

    fn destroy_debug_messenger(&mut self, _instance: &VulkanInstance, messenger: VulkanDebugMessenger) {
        log::debug!("Destroying debug messenger");
        unsafe {
            messenger
                .loader
                .destroy_debug_utils_messenger(messenger.messenger, None)
        };
    }

    fn destroy_instance(&mut self, instance: VulkanInstance) {
        log::debug!("Destroying instance");
        // SAFETY: every child object has been destroyed by now; `entry` drops after this
        unsafe { instance.instance.destroy_instance(None) };
    }
}
