// Swapchain - Window presentation
//
// Fixed policy: B8G8R8A8_UNORM / SRGB_NONLINEAR, FIFO (vsync), and
// TRANSFER_DST usage so frames can be blitted straight into the images.
// One image view per image, created eagerly and destroyed before the
// swapchain itself.

use ash::vk;

use super::vulkan::{VulkanDevice, VulkanInstance, VulkanPhysicalDevice};
use super::{BackendSwapchain, GraphicsBackend};
use crate::error::SwapchainCreationError;

pub const SWAPCHAIN_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

pub const PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::FIFO;

pub const SWAPCHAIN_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::TRANSFER_DST.as_raw(),
);

/// What the backend is asked to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub extent: vk::Extent2D,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub usage: vk::ImageUsageFlags,
}

impl SwapchainDesc {
    pub fn fixed(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            format: SWAPCHAIN_FORMAT,
            present_mode: PRESENT_MODE,
            usage: SWAPCHAIN_USAGE,
        }
    }
}

/// Swapchain handle plus its images, before views exist.
#[derive(Debug)]
pub struct RawSwapchain<S, I> {
    pub handle: S,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<I>,
}

/// A live swapchain: `image_views[i]` views `images[i]`.
#[derive(Debug)]
pub struct SwapchainBundle<S, I, V> {
    pub handle: S,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<I>,
    pub image_views: Vec<V>,
}

pub fn create_swapchain<B: GraphicsBackend>(
    backend: &mut B,
    instance: &B::Instance,
    physical_device: B::PhysicalDevice,
    device: &B::Device,
    surface: &B::Surface,
    extent: vk::Extent2D,
) -> Result<BackendSwapchain<B>, SwapchainCreationError> {
    let desc = SwapchainDesc::fixed(extent);
    let raw = backend.create_swapchain_handle(instance, device, surface, physical_device, &desc)?;

    let mut image_views = Vec::with_capacity(raw.images.len());
    for &image in &raw.images {
        match backend.create_image_view(device, image, raw.format.format) {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views {
                    backend.destroy_image_view(device, view);
                }
                backend.destroy_swapchain_handle(device, raw.handle);
                return Err(e);
            }
        }
    }

    log::info!(
        "Created swapchain {}x{} with {} images ({:?}, {:?})",
        raw.extent.width,
        raw.extent.height,
        raw.images.len(),
        raw.format.format,
        raw.present_mode
    );

    Ok(SwapchainBundle {
        handle: raw.handle,
        format: raw.format,
        present_mode: raw.present_mode,
        extent: raw.extent,
        images: raw.images,
        image_views,
    })
}

/// Destroy views in index order, then the swapchain. Call exactly once per
/// successful `create_swapchain`, with no image in flight.
pub fn destroy_swapchain<B: GraphicsBackend>(
    backend: &mut B,
    device: &B::Device,
    bundle: BackendSwapchain<B>,
) {
    log::debug!("Destroying swapchain ({} views)", bundle.image_views.len());
    for view in bundle.image_views {
        backend.destroy_image_view(device, view);
    }
    backend.destroy_swapchain_handle(device, bundle.handle);
}

/// Rebuild for a new extent: idle the device, destroy the old chain, create
/// a new one.
pub fn recreate_swapchain<B: GraphicsBackend>(
    backend: &mut B,
    instance: &B::Instance,
    physical_device: B::PhysicalDevice,
    device: &B::Device,
    surface: &B::Surface,
    old: BackendSwapchain<B>,
    extent: vk::Extent2D,
) -> Result<BackendSwapchain<B>, SwapchainCreationError> {
    log::info!(
        "Recreating swapchain: {}x{} -> {}x{}",
        old.extent.width,
        old.extent.height,
        extent.width,
        extent.height
    );
    backend.wait_idle(device);
    destroy_swapchain(backend, device, old);
    create_swapchain(backend, instance, physical_device, device, surface, extent)
}

/// The surface dictates the extent unless it reports the "any" sentinel.
fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, requested: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: requested
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: requested
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        image_count.min(caps.max_image_count)
    } else {
        image_count
    }
}

pub(crate) fn create_vk_swapchain(
    instance: &VulkanInstance,
    device: &VulkanDevice,
    surface: vk::SurfaceKHR,
    physical_device: VulkanPhysicalDevice,
    desc: &SwapchainDesc,
) -> Result<RawSwapchain<vk::SwapchainKHR, vk::Image>, SwapchainCreationError> {
    let surface_loader = &instance.surface_loader;

    let caps = unsafe {
        surface_loader.get_physical_device_surface_capabilities(physical_device.raw, surface)
    }?;
    let formats = unsafe {
        surface_loader.get_physical_device_surface_formats(physical_device.raw, surface)
    }?;

    if !formats.contains(&desc.format) {
        return Err(SwapchainCreationError::FormatUnsupported(desc.format));
    }
    if !caps.supported_usage_flags.contains(desc.usage) {
        return Err(SwapchainCreationError::UsageUnsupported(desc.usage));
    }

    let extent = choose_extent(&caps, desc.extent);
    if extent.width == 0 || extent.height == 0 {
        return Err(SwapchainCreationError::ZeroExtent);
    }

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface)
        .min_image_count(choose_image_count(&caps))
        .image_format(desc.format.format)
        .image_color_space(desc.format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(desc.usage)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(caps.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(desc.present_mode)
        .clipped(true);

    let handle = unsafe { device.swapchain_loader.create_swapchain(&create_info, None) }?;

    let images = match unsafe { device.swapchain_loader.get_swapchain_images(handle) } {
        Ok(images) => images,
        Err(e) => {
            unsafe { device.swapchain_loader.destroy_swapchain(handle, None) };
            return Err(e.into());
        }
    };

    Ok(RawSwapchain {
        handle,
        format: desc.format,
        present_mode: desc.present_mode,
        extent,
        images,
    })
}

pub(crate) fn create_vk_image_view(
    device: &VulkanDevice,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView, SwapchainCreationError> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    Ok(unsafe { device.device.create_image_view(&create_info, None) }?)
}
