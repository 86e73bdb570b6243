use std::path::Path;
use std::sync::Arc;

use ash::vk;
use log::debug;

use crate::vulkan::{Allocator, CommandPool, ImageBarrier, VulkanDevice};
use crate::{RendererError, Result};

/// Number of mip levels for a full chain over `size` texels.
pub fn mip_level_count(size: u32) -> u32 {
    if size == 0 {
        return 1;
    }
    32 - size.leading_zeros()
}

/// Extent of mip level `level` for a base extent of `size`, clamped to
/// one texel (floor division at every step).
pub fn mip_extent(size: u32, level: u32) -> u32 {
    (size >> level).max(1)
}

/// Decoded image pixels ready for upload.
#[derive(Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// 1x1 RGBA8 texel, used as the neutral fallback for material slots.
    pub fn solid_color(rgba: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: rgba.to_vec(),
        }
    }
}

/// Description of an empty GPU texture (render/compute target).
#[derive(Clone, Copy, Debug)]
pub struct TextureSpec {
    pub width: u32,
    pub height: u32,
    /// 6 layers makes a cube-compatible image with a cube view.
    pub layers: u32,
    pub format: vk::Format,
    /// 0 selects a full mip chain over the larger extent.
    pub mip_levels: u32,
    pub usage: vk::ImageUsageFlags,
}

/// Extra image view over an existing texture, scoped to a mip level.
/// Used to give the compute stage a storage view of mip 0 only.
pub struct TextureView {
    device: Arc<ash::Device>,
    view: vk::ImageView,
}

impl TextureView {
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for TextureView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

/// Sampled GPU texture: image, default view, sampler, and the layout the
/// image currently sits in.
pub struct Texture {
    device: Arc<ash::Device>,
    allocator: Arc<Allocator>,
    image: vk::Image,
    allocation: vk_mem::Allocation,
    view: vk::ImageView,
    sampler: vk::Sampler,
    pub layout: vk::ImageLayout,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub layers: u32,
    pub format: vk::Format,
}

impl Texture {
    /// Decode an image file and upload it. `format` selects the decode
    /// path: float formats load as 32-bit HDR, everything else as RGBA8.
    pub fn from_file(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        command_pool: &CommandPool,
        path: &Path,
        format: vk::Format,
    ) -> Result<Self> {
        let decoded = image::open(path)?;

        let data = if format == vk::Format::R32G32B32A32_SFLOAT {
            let hdr = decoded.to_rgba32f();
            TextureData {
                width: hdr.width(),
                height: hdr.height(),
                pixels: bytemuck::cast_slice(hdr.as_raw()).to_vec(),
            }
        } else {
            let rgba = decoded.to_rgba8();
            TextureData {
                width: rgba.width(),
                height: rgba.height(),
                pixels: rgba.into_raw(),
            }
        };

        debug!(
            "Loaded image {} ({}x{}, {:?})",
            path.display(),
            data.width,
            data.height,
            format
        );

        Self::from_data(device, allocator, command_pool, &data, format)
    }

    /// Upload decoded in-memory pixels as a sampled 2D texture.
    pub fn from_data(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        command_pool: &CommandPool,
        data: &TextureData,
        format: vk::Format,
    ) -> Result<Self> {
        let mut texture = Self::from_spec(
            device,
            allocator,
            TextureSpec {
                width: data.width,
                height: data.height,
                layers: 1,
                format,
                mip_levels: 1,
                usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            },
        )?;

        texture.upload_pixels(device, allocator, command_pool, &data.pixels)?;
        Ok(texture)
    }

    /// Create an empty texture from a raw dimension/format/usage spec.
    /// Layout starts undefined; the caller transitions it before use.
    pub fn from_spec(
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        spec: TextureSpec,
    ) -> Result<Self> {
        let mip_levels = if spec.mip_levels == 0 {
            mip_level_count(spec.width.max(spec.height))
        } else {
            spec.mip_levels
        };

        let is_cube = spec.layers == 6;
        let flags = if is_cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let image_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(spec.format)
            .extent(vk::Extent3D {
                width: spec.width,
                height: spec.height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(spec.layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(spec.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        unsafe {
            let (image, mut allocation) =
                allocator.create_image(&image_info, vk_mem::MemoryUsage::AutoPreferDevice)?;

            let view_type = if is_cube {
                vk::ImageViewType::CUBE
            } else {
                vk::ImageViewType::TYPE_2D
            };
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(view_type)
                .format(spec.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: mip_levels,
                    base_array_layer: 0,
                    layer_count: spec.layers,
                });

            let view = match device.device.create_image_view(&view_info, None) {
                Ok(view) => view,
                Err(e) => {
                    allocator.destroy_image(image, &mut allocation);
                    return Err(e.into());
                }
            };

            let address_mode = if is_cube {
                vk::SamplerAddressMode::CLAMP_TO_EDGE
            } else {
                vk::SamplerAddressMode::REPEAT
            };
            let sampler_info = vk::SamplerCreateInfo::default()
                .mag_filter(vk::Filter::LINEAR)
                .min_filter(vk::Filter::LINEAR)
                .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
                .address_mode_u(address_mode)
                .address_mode_v(address_mode)
                .address_mode_w(address_mode)
                .anisotropy_enable(true)
                .max_anisotropy(device.max_sampler_anisotropy())
                .min_lod(0.0)
                .max_lod(vk::LOD_CLAMP_NONE)
                .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK);

            let sampler = match device.device.create_sampler(&sampler_info, None) {
                Ok(sampler) => sampler,
                Err(e) => {
                    device.device.destroy_image_view(view, None);
                    allocator.destroy_image(image, &mut allocation);
                    return Err(e.into());
                }
            };

            Ok(Self {
                device: Arc::clone(&device.device),
                allocator: Arc::clone(allocator),
                image,
                allocation,
                view,
                sampler,
                layout: vk::ImageLayout::UNDEFINED,
                width: spec.width,
                height: spec.height,
                mip_levels,
                layers: spec.layers,
                format: spec.format,
            })
        }
    }

    fn upload_pixels(
        &mut self,
        device: &VulkanDevice,
        allocator: &Arc<Allocator>,
        command_pool: &CommandPool,
        pixels: &[u8],
    ) -> Result<()> {
        unsafe {
            let staging_info = vk::BufferCreateInfo::default()
                .size(pixels.len() as vk::DeviceSize)
                .usage(vk::BufferUsageFlags::TRANSFER_SRC)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);
            let (staging, mut staging_allocation, mapped) =
                allocator.create_mapped_buffer(&staging_info)?;
            std::ptr::copy_nonoverlapping(pixels.as_ptr(), mapped, pixels.len());

            let result = (|| -> Result<()> {
                let cmd = command_pool.begin_one_time()?;

                ImageBarrier::new(
                    self.image,
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )
                .mip_levels(0, 1)
                .array_layers(0, self.layers)
                .record(
                    &device.device,
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::TRANSFER,
                );

                let region = vk::BufferImageCopy {
                    buffer_offset: 0,
                    buffer_row_length: 0,
                    buffer_image_height: 0,
                    image_subresource: vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: self.layers,
                    },
                    image_offset: vk::Offset3D::default(),
                    image_extent: vk::Extent3D {
                        width: self.width,
                        height: self.height,
                        depth: 1,
                    },
                };
                device.device.cmd_copy_buffer_to_image(
                    cmd,
                    staging,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );

                ImageBarrier::new(
                    self.image,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::SHADER_READ,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )
                .mip_levels(0, 1)
                .array_layers(0, self.layers)
                .record(
                    &device.device,
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                );

                command_pool.submit_one_time(cmd, device.graphics_queue)
            })();

            allocator.destroy_buffer(staging, &mut staging_allocation);
            result?;
        }

        self.layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        Ok(())
    }

    pub fn image(&self) -> vk::Image {
        self.image
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn descriptor(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.view,
            image_layout: self.layout,
        }
    }

    /// Storage-image view of a single mip level. For cube textures the
    /// view is a 2D array so a compute shader can address the six faces
    /// by layer index.
    pub fn storage_view(&self, mip_level: u32) -> Result<TextureView> {
        let view_type = if self.layers == 6 {
            vk::ImageViewType::TYPE_2D_ARRAY
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: mip_level,
                level_count: 1,
                base_array_layer: 0,
                layer_count: self.layers,
            });

        let view = unsafe {
            self.device
                .create_image_view(&view_info, None)
                .map_err(|e| {
                    RendererError::VulkanError(format!("Failed to create storage view: {e:?}"))
                })?
        };

        Ok(TextureView {
            device: Arc::clone(&self.device),
            view,
        })
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
            self.allocator
                .destroy_image(self.image, &mut self.allocation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mip_chain_length() {
        assert_eq!(mip_level_count(1), 1);
        assert_eq!(mip_level_count(2), 2);
        assert_eq!(mip_level_count(256), 9);
        assert_eq!(mip_level_count(1024), 11);
        // Non-power-of-two sizes floor at each halving.
        assert_eq!(mip_level_count(96), 7);
    }

    #[test]
    fn mip_extent_halves_with_floor_division() {
        for level in 0..11 {
            assert_eq!(mip_extent(1024, level), 1024 >> level);
        }
        assert_eq!(mip_extent(96, 1), 48);
        assert_eq!(mip_extent(96, 5), 3);
        assert_eq!(mip_extent(96, 6), 1);
    }

    #[test]
    fn mip_extent_never_reaches_zero() {
        assert_eq!(mip_extent(4, 10), 1);
    }
}
