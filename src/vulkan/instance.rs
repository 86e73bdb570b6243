use std::ffi::CStr;

use ash::{ext::debug_utils, khr::surface, vk, Entry, Instance};
use log::{debug, info};

use crate::config::RendererConfig;
use crate::vulkan::surface::SurfaceProvider;
use crate::{RendererError, Result};

/// Owns the global Vulkan instance, the optional validation machinery,
/// and the presentation surface. Destroyed last among the GPU objects.
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
    debug_utils: Option<debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    pub fn new<S: SurfaceProvider>(provider: &S, config: &RendererConfig) -> Result<Self> {
        unsafe {
            let entry = Entry::load().map_err(|e| {
                RendererError::DeviceInitFailed(format!("Failed to load Vulkan entry: {e:?}"))
            })?;

            let validation_layers = if config.enable_validation {
                Self::check_validation_layers(&entry, config)?
            } else {
                Vec::new()
            };

            let mut extensions = provider.required_extensions()?;
            if config.enable_validation {
                extensions.push(debug_utils::NAME.as_ptr());
            }

            let app_info = vk::ApplicationInfo::default()
                .application_name(c"PBR Renderer")
                .application_version(vk::make_api_version(0, 0, 1, 0))
                .engine_name(c"PBR Renderer")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_1);

            let mut create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_extension_names(&extensions)
                .enabled_layer_names(&validation_layers);

            let mut debug_create_info =
                config.enable_validation.then_some(Self::debug_messenger_create_info());
            if let Some(ref mut debug_info) = debug_create_info {
                create_info = create_info.push_next(debug_info);
            }

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                RendererError::DeviceInitFailed(format!("Failed to create Vulkan instance: {e:?}"))
            })?;

            let debug_utils_loader = config
                .enable_validation
                .then(|| debug_utils::Instance::new(&entry, &instance));

            let debug_messenger = match debug_utils_loader {
                Some(ref utils) => {
                    let messenger_info = Self::debug_messenger_create_info();
                    Some(
                        utils
                            .create_debug_utils_messenger(&messenger_info, None)
                            .map_err(|e| {
                                RendererError::DeviceInitFailed(format!(
                                    "Failed to create debug messenger: {e:?}"
                                ))
                            })?,
                    )
                }
                None => None,
            };

            let surface = provider.create_surface(&entry, &instance)?;
            let surface_loader = surface::Instance::new(&entry, &instance);

            info!(
                "Vulkan instance created (validation: {})",
                config.enable_validation
            );

            Ok(Self {
                entry,
                instance,
                surface_loader,
                surface,
                debug_utils: debug_utils_loader,
                debug_messenger,
            })
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn surface_loader(&self) -> &surface::Instance {
        &self.surface_loader
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Verifies every requested validation layer is installed. A missing
    /// layer is a fatal setup error, not a downgrade.
    fn check_validation_layers(
        entry: &Entry,
        config: &RendererConfig,
    ) -> Result<Vec<*const i8>> {
        unsafe {
            let available = entry.enumerate_instance_layer_properties().map_err(|e| {
                RendererError::DeviceInitFailed(format!(
                    "Failed to enumerate instance layers: {e:?}"
                ))
            })?;

            let mut enabled = Vec::with_capacity(config.validation_layers.len());
            for layer in &config.validation_layers {
                let found = available
                    .iter()
                    .any(|props| CStr::from_ptr(props.layer_name.as_ptr()) == layer.as_c_str());
                if !found {
                    return Err(RendererError::DeviceInitFailed(format!(
                        "Validation layer {layer:?} requested but not available"
                    )));
                }
                enabled.push(layer.as_ptr());
            }

            Ok(enabled)
        }
    }

    fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let (Some(utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger) {
                utils.destroy_debug_utils_messenger(messenger, None);
            }

            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
                self.surface = vk::SurfaceKHR::null();
            }

            self.instance.destroy_instance(None);
        }
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if !callback_data.is_null() {
        CStr::from_ptr((*callback_data).p_message)
            .to_string_lossy()
            .into_owned()
    } else {
        String::from("<null>")
    };

    debug!(
        target: "vulkan",
        "[{message_types:?}][{message_severity:?}] {message}"
    );

    vk::FALSE
}
