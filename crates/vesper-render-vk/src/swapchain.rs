// SPDX-License-Identifier: CEPL-1.0
use crate::context::DeviceContext;
use crate::device::QueueFamilyIndices;
use crate::error::{VkCall, VkError};
use crate::surface::{choose_extent, choose_present_mode, choose_surface_format, SurfaceSupport};
use anyhow::{Context, Result};
use ash::vk;
use tracing::{debug, info};
use vesper_render::{PresentMode, RenderSize, WindowHost};

/// One more than the minimum so the driver never has to wait on us for an
/// image, capped by the maximum (0 = unbounded).
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        wanted
    } else {
        wanted.min(caps.max_image_count)
    }
}

/// Images are shared concurrently between two distinct families and owned
/// exclusively otherwise. Concurrent sharing with a single family is
/// rejected by some drivers.
pub fn sharing_mode(queues: QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    if queues.is_shared() {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, queues.unique())
    }
}

/// Blocks on window events while the drawable has no area (minimized) and
/// returns the first non-empty size.
pub fn wait_for_drawable(host: &mut dyn WindowHost) -> RenderSize {
    let mut size = host.drawable_size();
    if size.is_zero_area() {
        debug!("drawable is {size}; waiting for events before rebuilding");
    }
    while size.is_zero_area() {
        host.wait_events();
        size = host.drawable_size();
    }
    size
}

/// Presentable images plus one view each. Rebuilt wholesale, never patched.
#[derive(Debug, Default)]
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
}

impl Swapchain {
    pub unsafe fn build(
        ctx: &DeviceContext,
        desired: PresentMode,
        drawable: RenderSize,
    ) -> Result<Self> {
        let surface = ctx.instance.surface;
        let support =
            SurfaceSupport::query(&ctx.instance.surface_loader, ctx.gpu.physical, surface)?;
        let caps = &support.capabilities;

        let format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, desired);
        let extent = choose_extent(caps, drawable);
        let min_image_count = choose_image_count(caps);
        let (image_sharing_mode, families) = sharing_mode(ctx.gpu.queues);

        let pre_transform = if caps
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            caps.current_transform
        };

        let create_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface,
            min_image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode,
            queue_family_index_count: families.len() as u32,
            p_queue_family_indices: families.as_ptr(),
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            // The previous chain is destroyed before a rebuild starts.
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };

        let mut chain = Swapchain {
            handle: ctx
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .call("vkCreateSwapchainKHR")?,
            format,
            present_mode,
            extent,
            ..Default::default()
        };
        if let Err(e) = chain.create_views(ctx) {
            chain.destroy(ctx);
            return Err(e).context("swapchain image views");
        }

        info!(
            "swapchain: {:?} / {:?}, {:?} (wanted {desired}), {}x{}, {} images (min {}), {:?} sharing",
            format.format,
            format.color_space,
            present_mode,
            extent.width,
            extent.height,
            chain.images.len(),
            caps.min_image_count,
            image_sharing_mode,
        );
        Ok(chain)
    }

    unsafe fn create_views(&mut self, ctx: &DeviceContext) -> Result<(), VkError> {
        self.images = ctx
            .swapchain_loader
            .get_swapchain_images(self.handle)
            .call("vkGetSwapchainImagesKHR")?;
        self.views.reserve(self.images.len());

        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo {
                s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
                image,
                view_type: vk::ImageViewType::TYPE_2D,
                format: self.format.format,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                },
                ..Default::default()
            };
            let view = ctx
                .device
                .create_image_view(&view_info, None)
                .call("vkCreateImageView")?;
            self.views.push(view);
        }
        Ok(())
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Views first, then the chain. Idempotent; the caller must have
    /// idled the device.
    pub unsafe fn destroy(&mut self, ctx: &DeviceContext) {
        for view in self.views.drain(..) {
            ctx.device.destroy_image_view(view, None);
        }
        self.images.clear();
        if self.handle != vk::SwapchainKHR::null() {
            ctx.swapchain_loader.destroy_swapchain(self.handle, None);
            self.handle = vk::SwapchainKHR::null();
        }
    }
}
