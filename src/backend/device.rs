// Device Selector + Logical Device Manager
//
// Selection is a pure function over enumerated candidates so the policy can
// be tested without a GPU:
// - API version at least the minimum
// - every required 1.2 / 1.3 feature bit exposed
// - able to present to the window's surface
// Survivors are scored by device type (prefer discrete GPU).

use ash::vk;
use std::ffi::CStr;

use super::vulkan::{VulkanDevice, VulkanInstance, VulkanPhysicalDevice};
use super::{ApiVersion, GraphicsBackend};
use crate::error::{DeviceCreationError, NoSuitableDeviceError};

/// The feature bits the engine cares about, split across the 1.3 and 1.2
/// feature tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFeatures {
    // Vulkan 1.3
    pub dynamic_rendering: bool,
    pub synchronization2: bool,
    // Vulkan 1.2
    pub buffer_device_address: bool,
    pub descriptor_indexing: bool,
}

impl DeviceFeatures {
    pub const REQUIRED: Self = Self {
        dynamic_rendering: true,
        synchronization2: true,
        buffer_device_address: true,
        descriptor_indexing: true,
    };

    /// Names of the bits set in `required` but not in `self`.
    pub fn missing(&self, required: &Self) -> Vec<&'static str> {
        let checks = [
            (required.dynamic_rendering, self.dynamic_rendering, "dynamicRendering"),
            (required.synchronization2, self.synchronization2, "synchronization2"),
            (required.buffer_device_address, self.buffer_device_address, "bufferDeviceAddress"),
            (required.descriptor_indexing, self.descriptor_indexing, "descriptorIndexing"),
        ];
        checks
            .into_iter()
            .filter(|&(wanted, have, _)| wanted && !have)
            .map(|(_, _, name)| name)
            .collect()
    }

    pub fn contains(&self, required: &Self) -> bool {
        self.missing(required).is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl DeviceKind {
    /// Higher is better. Dedicated GPUs always beat integrated ones.
    pub fn score(self) -> u32 {
        match self {
            DeviceKind::Discrete => 1000,
            DeviceKind::Integrated => 100,
            DeviceKind::Virtual => 10,
            DeviceKind::Cpu | DeviceKind::Other => 1,
        }
    }
}

impl From<vk::PhysicalDeviceType> for DeviceKind {
    fn from(device_type: vk::PhysicalDeviceType) -> Self {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => DeviceKind::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceKind::Integrated,
            vk::PhysicalDeviceType::VIRTUAL_GPU => DeviceKind::Virtual,
            vk::PhysicalDeviceType::CPU => DeviceKind::Cpu,
            _ => DeviceKind::Other,
        }
    }
}

/// One enumerated GPU. `handle` is borrowed from the instance, never owned.
#[derive(Debug, Clone)]
pub struct DeviceCandidate<P> {
    pub handle: P,
    pub name: String,
    pub kind: DeviceKind,
    pub api_version: ApiVersion,
    pub features: DeviceFeatures,
    pub can_present: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceRequirements {
    pub min_api_version: ApiVersion,
    pub features: DeviceFeatures,
}

impl DeviceRequirements {
    pub fn new(min_api_version: ApiVersion) -> Self {
        Self {
            min_api_version,
            features: DeviceFeatures::REQUIRED,
        }
    }

    /// Why `candidate` is unusable, or `None` if it qualifies.
    fn rejection<P>(&self, candidate: &DeviceCandidate<P>) -> Option<String> {
        if candidate.api_version < self.min_api_version {
            return Some(format!(
                "supports Vulkan {}, needs {}",
                candidate.api_version, self.min_api_version
            ));
        }
        let missing = candidate.features.missing(&self.features);
        if !missing.is_empty() {
            return Some(format!("missing features: {}", missing.join(", ")));
        }
        if !candidate.can_present {
            return Some("cannot present to the window surface".to_string());
        }
        None
    }
}

/// Pick the best qualifying candidate. Ties go to the earliest enumerated.
pub fn pick_best<P>(
    candidates: Vec<DeviceCandidate<P>>,
    requirements: &DeviceRequirements,
) -> Result<DeviceCandidate<P>, NoSuitableDeviceError> {
    if candidates.is_empty() {
        return Err(NoSuitableDeviceError::NoDevices);
    }
    let total = candidates.len();

    let mut best: Option<DeviceCandidate<P>> = None;
    for candidate in candidates {
        if let Some(reason) = requirements.rejection(&candidate) {
            log::debug!("Skipping GPU '{}': {}", candidate.name, reason);
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |current| candidate.kind.score() > current.kind.score());
        if better {
            best = Some(candidate);
        }
    }

    best.ok_or(NoSuitableDeviceError::NoneQualified(total))
}

/// Enumerate the instance's GPUs and select one for `surface`.
pub fn select_physical_device<B: GraphicsBackend>(
    backend: &mut B,
    instance: &B::Instance,
    surface: &B::Surface,
    requirements: &DeviceRequirements,
) -> Result<DeviceCandidate<B::PhysicalDevice>, NoSuitableDeviceError> {
    let candidates = backend.enumerate_physical_devices(instance, surface)?;
    let selected = pick_best(candidates, requirements)?;
    log::info!(
        "Selected GPU: {} ({:?}, Vulkan {})",
        selected.name,
        selected.kind,
        selected.api_version
    );
    Ok(selected)
}

/// Build the logical device with the required feature set enabled.
pub fn create_logical_device<B: GraphicsBackend>(
    backend: &mut B,
    instance: &B::Instance,
    physical_device: &DeviceCandidate<B::PhysicalDevice>,
) -> Result<B::Device, DeviceCreationError> {
    let device = backend.create_device(instance, physical_device.handle, &DeviceFeatures::REQUIRED)?;
    log::info!("Created logical device on {}", physical_device.name);
    Ok(device)
}

pub(crate) fn enumerate_vk_devices(
    instance: &VulkanInstance,
    surface: vk::SurfaceKHR,
) -> Result<Vec<DeviceCandidate<VulkanPhysicalDevice>>, NoSuitableDeviceError> {
    let devices = unsafe { instance.instance.enumerate_physical_devices() }?;
    let described = devices
        .into_iter()
        .map(|device| describe_vk_device(instance, surface, device));
    Ok(skip_failed_queries(described))
}

/// Drop devices whose capability queries failed; the rest stay eligible.
fn skip_failed_queries<C>(described: impl IntoIterator<Item = Result<C, vk::Result>>) -> Vec<C> {
    described
        .into_iter()
        .enumerate()
        .filter_map(|(index, result)| match result {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                log::debug!("Skipping GPU #{}: capability query failed: {}", index, e);
                None
            }
        })
        .collect()
}

fn describe_vk_device(
    instance: &VulkanInstance,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> Result<DeviceCandidate<VulkanPhysicalDevice>, vk::Result> {
    let properties = unsafe { instance.instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    let api_version = ApiVersion::from_raw(properties.api_version);

    // The 1.2/1.3 feature structs are only valid to query on a 1.3 device
    let features = if api_version >= ApiVersion::new(1, 3, 0) {
        query_vk_features(instance, device)
    } else {
        DeviceFeatures::default()
    };

    let queue_family = find_present_queue_family(instance, surface, device)?;
    let has_swapchain = supports_swapchain(instance, device)?;

    Ok(DeviceCandidate {
        handle: VulkanPhysicalDevice {
            raw: device,
            queue_family: queue_family.unwrap_or(0),
        },
        name,
        kind: DeviceKind::from(properties.device_type),
        api_version,
        features,
        can_present: queue_family.is_some() && has_swapchain,
    })
}

fn query_vk_features(instance: &VulkanInstance, device: vk::PhysicalDevice) -> DeviceFeatures {
    let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
    let mut features2 = vk::PhysicalDeviceFeatures2::default()
        .push_next(&mut features12)
        .push_next(&mut features13);
    unsafe { instance.instance.get_physical_device_features2(device, &mut features2) };

    DeviceFeatures {
        dynamic_rendering: features13.dynamic_rendering == vk::TRUE,
        synchronization2: features13.synchronization2 == vk::TRUE,
        buffer_device_address: features12.buffer_device_address == vk::TRUE,
        descriptor_indexing: features12.descriptor_indexing == vk::TRUE,
    }
}

/// First queue family that does graphics and can present to `surface`.
fn find_present_queue_family(
    instance: &VulkanInstance,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> Result<Option<u32>, vk::Result> {
    let families = unsafe {
        instance
            .instance
            .get_physical_device_queue_family_properties(device)
    };

    for (index, family) in families.iter().enumerate() {
        if !family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            continue;
        }
        let index = index as u32;
        let supported = unsafe {
            instance
                .surface_loader
                .get_physical_device_surface_support(device, index, surface)
        }?;
        if supported {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn supports_swapchain(instance: &VulkanInstance, device: vk::PhysicalDevice) -> Result<bool, vk::Result> {
    let extensions = unsafe { instance.instance.enumerate_device_extension_properties(device) }?;
    Ok(has_swapchain_extension(&extensions))
}

fn has_swapchain_extension(extensions: &[vk::ExtensionProperties]) -> bool {
    extensions
        .iter()
        .any(|ext| ext.extension_name_as_c_str() == Ok(ash::khr::swapchain::NAME))
}

pub(crate) fn create_vk_device(
    instance: &VulkanInstance,
    physical_device: VulkanPhysicalDevice,
    features: &DeviceFeatures,
) -> Result<VulkanDevice, DeviceCreationError> {
    let mut features12 = vk::PhysicalDeviceVulkan12Features::default()
        .buffer_device_address(features.buffer_device_address)
        .descriptor_indexing(features.descriptor_indexing);
    let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(features.dynamic_rendering)
        .synchronization2(features.synchronization2);

    let queue_priorities = [1.0];
    let queue_create_info = vk::DeviceQueueCreateInfo::default()
        .queue_family_index(physical_device.queue_family)
        .queue_priorities(&queue_priorities);

    let extensions = [ash::khr::swapchain::NAME.as_ptr()];

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(std::slice::from_ref(&queue_create_info))
        .enabled_extension_names(&extensions)
        .push_next(&mut features12)
        .push_next(&mut features13);

    let device = unsafe {
        instance
            .instance
            .create_device(physical_device.raw, &create_info, None)
    }?;

    let graphics_queue = unsafe { device.get_device_queue(physical_device.queue_family, 0) };
    let swapchain_loader = ash::khr::swapchain::Device::new(&instance.instance, &device);

    Ok(VulkanDevice {
        device,
        swapchain_loader,
        graphics_queue,
        graphics_queue_family: physical_device.queue_family,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, kind: DeviceKind, features: DeviceFeatures) -> DeviceCandidate<u32> {
        DeviceCandidate {
            handle: 0,
            name: name.to_string(),
            kind,
            api_version: ApiVersion::new(1, 3, 0),
            features,
            can_present: true,
        }
    }

    fn requirements() -> DeviceRequirements {
        DeviceRequirements::new(ApiVersion::new(1, 3, 0))
    }

    #[test]
    fn no_device_with_required_features_fails() {
        let only_sync2 = DeviceFeatures {
            synchronization2: true,
            ..Default::default()
        };
        let pool = vec![
            candidate("a", DeviceKind::Discrete, DeviceFeatures::default()),
            candidate("b", DeviceKind::Integrated, only_sync2),
        ];
        let result = pick_best(pool, &requirements());
        assert!(matches!(result, Err(NoSuitableDeviceError::NoneQualified(2))));
    }

    #[test]
    fn single_qualifying_device_is_selected() {
        let mut almost = DeviceFeatures::REQUIRED;
        almost.descriptor_indexing = false;
        let mut pool = vec![
            candidate("missing-indexing", DeviceKind::Discrete, almost),
            candidate("good", DeviceKind::Integrated, DeviceFeatures::REQUIRED),
            candidate("old", DeviceKind::Discrete, DeviceFeatures::REQUIRED),
        ];
        pool[1].handle = 1;
        pool[2].api_version = ApiVersion::new(1, 2, 0);
        let selected = pick_best(pool, &requirements()).unwrap();
        assert_eq!(selected.name, "good");
        assert_eq!(selected.handle, 1);
    }

    #[test]
    fn discrete_beats_integrated() {
        let pool = vec![
            candidate("igpu", DeviceKind::Integrated, DeviceFeatures::REQUIRED),
            candidate("dgpu", DeviceKind::Discrete, DeviceFeatures::REQUIRED),
        ];
        assert_eq!(pick_best(pool, &requirements()).unwrap().name, "dgpu");
    }

    #[test]
    fn ties_keep_first_enumerated() {
        let pool = vec![
            candidate("first", DeviceKind::Discrete, DeviceFeatures::REQUIRED),
            candidate("second", DeviceKind::Discrete, DeviceFeatures::REQUIRED),
        ];
        assert_eq!(pick_best(pool, &requirements()).unwrap().name, "first");
    }

    #[test]
    fn device_without_presentation_is_rejected() {
        let mut gpu = candidate("headless", DeviceKind::Discrete, DeviceFeatures::REQUIRED);
        gpu.can_present = false;
        assert!(pick_best(vec![gpu], &requirements()).is_err());
    }

    #[test]
    fn empty_pool_reports_no_devices() {
        let result = pick_best(Vec::<DeviceCandidate<u32>>::new(), &requirements());
        assert!(matches!(result, Err(NoSuitableDeviceError::NoDevices)));
    }

    #[test]
    fn missing_lists_feature_names() {
        let have = DeviceFeatures {
            dynamic_rendering: true,
            buffer_device_address: true,
            ..Default::default()
        };
        assert_eq!(
            have.missing(&DeviceFeatures::REQUIRED),
            vec!["synchronization2", "descriptorIndexing"]
        );
        assert!(DeviceFeatures::REQUIRED.contains(&have));
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        vk::ExtensionProperties::default()
            .extension_name(name)
            .unwrap()
    }

    #[test]
    fn swapchain_extension_is_detected_by_name() {
        let with = [
            extension(c"VK_KHR_maintenance1"),
            extension(ash::khr::swapchain::NAME),
        ];
        let without = [extension(c"VK_KHR_maintenance1"), extension(c"VK_KHR_swapchain_mutable_format")];
        assert!(has_swapchain_extension(&with));
        assert!(!has_swapchain_extension(&without));
        assert!(!has_swapchain_extension(&[]));
    }

    #[test]
    fn failed_capability_query_skips_only_that_device() {
        let described = vec![
            Err(vk::Result::ERROR_SURFACE_LOST_KHR),
            Ok(candidate("second", DeviceKind::Discrete, DeviceFeatures::REQUIRED)),
        ];
        let candidates = skip_failed_queries(described);
        assert_eq!(candidates.len(), 1);
        assert_eq!(pick_best(candidates, &requirements()).unwrap().name, "second");
    }

    #[test]
    fn device_type_maps_to_kind() {
        assert_eq!(DeviceKind::from(vk::PhysicalDeviceType::DISCRETE_GPU), DeviceKind::Discrete);
        assert_eq!(DeviceKind::from(vk::PhysicalDeviceType::OTHER), DeviceKind::Other);
        assert!(DeviceKind::Discrete.score() > DeviceKind::Integrated.score());
    }
}
