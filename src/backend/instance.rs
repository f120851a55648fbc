// Instance Manager
//
// Creates the API instance and, with validation on, the debug messenger.
// Validation is all-or-nothing: a missing layer or messenger fails the step.

use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{CStr, CString};

use super::vulkan::{VulkanDebugMessenger, VulkanInstance};
use super::{ApiVersion, GraphicsBackend};
use crate::error::InstanceCreationError;
use crate::window::WindowSurfaceProvider;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"vk-bootstrap-engine";

#[derive(Debug, Clone, Copy)]
pub struct InstanceDesc<'a> {
    pub app_name: &'a str,
    pub enable_validation: bool,
    pub min_api_version: ApiVersion,
}

/// Create the instance and its optional debug messenger.
///
/// The messenger exists iff `enable_validation` is set. If it cannot be
/// created the instance is destroyed again before the error is returned.
pub fn create_instance<B: GraphicsBackend, W: WindowSurfaceProvider>(
    backend: &mut B,
    window: &W,
    app_name: &str,
    enable_validation: bool,
    min_api_version: ApiVersion,
) -> Result<(B::Instance, Option<B::DebugMessenger>), InstanceCreationError> {
    let desc = InstanceDesc {
        app_name,
        enable_validation,
        min_api_version,
    };
    let instance = backend.create_instance(window, &desc)?;
    log::info!(
        "Created instance for '{}' (Vulkan {}+, validation {})",
        app_name,
        min_api_version,
        if enable_validation { "on" } else { "off" }
    );

    if !enable_validation {
        return Ok((instance, None));
    }

    match backend.create_debug_messenger(&instance) {
        Ok(messenger) => {
            log::debug!("Debug messenger attached");
            Ok((instance, Some(messenger)))
        }
        Err(e) => {
            backend.destroy_instance(instance);
            Err(e)
        }
    }
}

pub(crate) fn create_vk_instance(
    display: RawDisplayHandle,
    desc: &InstanceDesc<'_>,
) -> Result<VulkanInstance, InstanceCreationError> {
    let entry = unsafe { ash::Entry::load() }
        .map_err(|e| InstanceCreationError::Loading(e.to_string()))?;

    let available = unsafe { entry.try_enumerate_instance_version() }?
        .map(ApiVersion::from_raw)
        .unwrap_or(ApiVersion::new(1, 0, 0));
    if available < desc.min_api_version {
        return Err(InstanceCreationError::UnsupportedApiVersion {
            required: desc.min_api_version,
            available,
        });
    }

    let app_name = CString::new(desc.app_name).map_err(|_| InstanceCreationError::InvalidAppName)?;
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(ENGINE_NAME)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(desc.min_api_version.raw());

    // Surface extensions for whatever platform the window lives on
    let mut extensions = ash_window::enumerate_required_extensions(display)?.to_vec();

    let mut layers = Vec::new();
    if desc.enable_validation {
        let installed = unsafe { entry.enumerate_instance_layer_properties() }?;
        let has_layer = installed
            .iter()
            .any(|layer| layer.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
        if !has_layer {
            return Err(InstanceCreationError::MissingValidationLayer);
        }
        layers.push(VALIDATION_LAYER.as_ptr());
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&create_info, None) }?;
    let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

    Ok(VulkanInstance {
        instance,
        surface_loader,
        entry,
    })
}

pub(crate) fn create_vk_debug_messenger(
    instance: &VulkanInstance,
) -> Result<VulkanDebugMessenger, InstanceCreationError> {
    let loader = ash::ext::debug_utils::Instance::new(&instance.entry, &instance.instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;

    Ok(VulkanDebugMessenger { loader, messenger })
}

/// The messenger only subscribes to WARNING and ERROR.
fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else {
        log::Level::Warn
    }
}

fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "GENERAL",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "VALIDATION",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "PERFORMANCE",
        _ => "UNKNOWN",
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || unsafe { (*p_callback_data).p_message.is_null() } {
        return vk::FALSE;
    }
    // SAFETY: the loader hands us a valid callback struct for the duration of the call
    let message = unsafe { CStr::from_ptr((*p_callback_data).p_message) }.to_string_lossy();
    let label = message_type_label(message_type);

    log::log!(severity_level(message_severity), "[Vulkan/{}] {}", label, message);

    vk::FALSE
}
