use std::collections::BTreeSet;
use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use log::info;

use crate::config::RendererConfig;
use crate::vulkan::instance::VulkanInstance;
use crate::{RendererError, Result};

/// Graphics and presentation queue family indices. The two families may
/// alias on most hardware.
#[derive(Clone, Copy, Debug)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    fn unique(&self) -> BTreeSet<u32> {
        BTreeSet::from([self.graphics, self.present])
    }
}

/// The GPU connection: physical device, logical device, and queue
/// handles. Every other component borrows this context explicitly; it is
/// created first and dropped last.
pub struct VulkanDevice {
    pub instance: Arc<VulkanInstance>,
    pub physical_device: vk::PhysicalDevice,
    pub device: Arc<ash::Device>,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub properties: vk::PhysicalDeviceProperties,
}

impl VulkanDevice {
    pub fn new(instance: Arc<VulkanInstance>, config: &RendererConfig) -> Result<Self> {
        unsafe {
            let (physical_device, queue_families) = Self::pick_physical_device(&instance, config)?;

            let properties = instance
                .instance()
                .get_physical_device_properties(physical_device);
            let device_name = CStr::from_ptr(properties.device_name.as_ptr());
            info!("Selected GPU: {device_name:?}");

            let queue_priorities = [1.0f32];
            let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
                .unique()
                .into_iter()
                .map(|family| {
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(family)
                        .queue_priorities(&queue_priorities)
                })
                .collect();

            let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
            let extension_names: Vec<*const i8> = config
                .device_extensions
                .iter()
                .map(|ext| ext.as_ptr())
                .collect();

            let create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&extension_names)
                .enabled_features(&features);

            let device = instance
                .instance()
                .create_device(physical_device, &create_info, None)
                .map_err(|e| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to create logical device: {e:?}"
                    ))
                })?;

            let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
            let present_queue = device.get_device_queue(queue_families.present, 0);

            info!(
                "Logical device created (graphics family {}, present family {})",
                queue_families.graphics, queue_families.present
            );

            Ok(Self {
                instance,
                physical_device,
                device: Arc::new(device),
                queue_families,
                graphics_queue,
                present_queue,
                properties,
            })
        }
    }

    unsafe fn pick_physical_device(
        instance: &VulkanInstance,
        config: &RendererConfig,
    ) -> Result<(vk::PhysicalDevice, QueueFamilies)> {
        let devices = instance
            .instance()
            .enumerate_physical_devices()
            .map_err(|e| {
                RendererError::DeviceInitFailed(format!(
                    "Failed to enumerate physical devices: {e:?}"
                ))
            })?;

        if devices.is_empty() {
            return Err(RendererError::DeviceInitFailed(
                "No GPU with Vulkan support found".into(),
            ));
        }

        for device in devices {
            if !Self::supports_extensions(instance, device, config)? {
                continue;
            }
            if let Some(families) = Self::find_queue_families(instance, device)? {
                return Ok((device, families));
            }
        }

        Err(RendererError::DeviceInitFailed(
            "No suitable GPU found (missing queue families or required extensions)".into(),
        ))
    }

    unsafe fn supports_extensions(
        instance: &VulkanInstance,
        device: vk::PhysicalDevice,
        config: &RendererConfig,
    ) -> Result<bool> {
        let available = instance
            .instance()
            .enumerate_device_extension_properties(device)
            .map_err(|e| {
                RendererError::DeviceInitFailed(format!(
                    "Failed to enumerate device extensions: {e:?}"
                ))
            })?;

        Ok(config.device_extensions.iter().all(|required| {
            available
                .iter()
                .any(|ext| CStr::from_ptr(ext.extension_name.as_ptr()) == required.as_c_str())
        }))
    }

    unsafe fn find_queue_families(
        instance: &VulkanInstance,
        device: vk::PhysicalDevice,
    ) -> Result<Option<QueueFamilies>> {
        let families = instance
            .instance()
            .get_physical_device_queue_family_properties(device);

        let mut graphics = None;
        let mut present = None;

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics.get_or_insert(index);
            }

            let supports_present = instance
                .surface_loader()
                .get_physical_device_surface_support(device, index, instance.surface())
                .map_err(|e| {
                    RendererError::DeviceInitFailed(format!(
                        "Failed to query surface support: {e:?}"
                    ))
                })?;
            if supports_present {
                present.get_or_insert(index);
            }

            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        Ok(match (graphics, present) {
            (Some(graphics), Some(present)) => Some(QueueFamilies { graphics, present }),
            _ => None,
        })
    }

    /// First depth format with optimal-tiling depth attachment support.
    pub fn find_depth_format(&self) -> Result<vk::Format> {
        let candidates = [
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
        ];

        for format in candidates {
            let props = unsafe {
                self.instance
                    .instance()
                    .get_physical_device_format_properties(self.physical_device, format)
            };
            if props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
            {
                return Ok(format);
            }
        }

        Err(RendererError::DeviceInitFailed(
            "No supported depth attachment format".into(),
        ))
    }

    pub fn max_sampler_anisotropy(&self) -> f32 {
        self.properties.limits.max_sampler_anisotropy
    }

    /// Full GPU drain. Only used at swapchain rebuild and shutdown.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}
