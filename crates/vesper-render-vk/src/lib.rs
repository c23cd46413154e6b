// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device selection, surface negotiation, swapchain and
//! frame pipeline management, and the two-slot frame synchronizer.
use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;
use tracing::{debug, info};
use vesper_render::{BackendSlot, RenderSettings, Renderer, WindowHost};

mod context;
mod debug;
mod device;
mod error;
mod pipeline;
mod surface;
mod swapchain;
mod sync;

pub use context::{DeviceContext, InstanceContext};
pub use device::{
    assess, select_device, supports_extensions, ApiVersion, QueueFamilyIndices, Rejection,
    SelectedDevice, REQUIRED_DEVICE_EXTENSIONS,
};
pub use error::VkError;
pub use pipeline::{FramePipeline, ShaderSet, FRAGMENT_SHADER, TRIANGLE_VERTEX_COUNT, VERTEX_SHADER};
pub use surface::{
    choose_extent, choose_present_mode, choose_surface_format, vk_present_mode, SurfaceSupport,
};
pub use swapchain::{choose_image_count, sharing_mode, wait_for_drawable, Swapchain};
pub use sync::{
    FrameQueue, FrameStatus, FrameSynchronizer, InFlightFrame, SlotState, SyncObjects,
    MAX_FRAMES_IN_FLIGHT,
};

/// [`Renderer`] over Vulkan. Holds at most one backend at a time.
#[derive(Default)]
pub struct VkRenderer {
    slot: BackendSlot<VkBackend>,
}

impl VkRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for VkRenderer {
    fn init(&mut self, host: &dyn WindowHost, settings: &RenderSettings) -> Result<()> {
        self.slot
            .init_with(|| unsafe { VkBackend::new(host, settings) })?;
        Ok(())
    }

    fn notify_resized(&mut self) {
        if let Ok(backend) = self.slot.get_mut() {
            backend.sync.notify_resized();
        }
    }

    fn draw_frame(&mut self, host: &mut dyn WindowHost) -> Result<()> {
        let backend = self.slot.get_mut()?;
        if let FrameStatus::Stale = backend.draw(host)? {
            debug!("frame skipped: swapchain was out of date");
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(backend) = self.slot.take() {
            drop(backend);
            info!("vulkan backend released");
        }
    }
}

// STRICT TEARDOWN ORDER (see Drop):
// device idle, sync objects, frame pipeline, swapchain, then `ctx` drops
// the command pool, device, debug messenger, surface and instance.
struct VkBackend {
    sync: FrameSynchronizer,
    sync_objects: SyncObjects,
    pipeline: FramePipeline,
    swapchain: Swapchain,
    settings: RenderSettings,
    ctx: DeviceContext,
}

impl VkBackend {
    unsafe fn new(host: &dyn WindowHost, settings: &RenderSettings) -> Result<Self> {
        let instance = InstanceContext::new(host, settings.debug).context("instance and surface")?;
        let ctx = DeviceContext::new(instance).context("device")?;

        // Filled in place so a failure part-way releases what exists.
        let mut backend = VkBackend {
            sync: FrameSynchronizer::new([InFlightFrame::default(); MAX_FRAMES_IN_FLIGHT]),
            sync_objects: SyncObjects::empty(&ctx.device),
            pipeline: FramePipeline::default(),
            swapchain: Swapchain::default(),
            settings: settings.clone(),
            ctx,
        };
        backend.swapchain =
            Swapchain::build(&backend.ctx, settings.present_mode, host.drawable_size())
                .context("swapchain")?;
        backend.pipeline = FramePipeline::build(&backend.ctx, &backend.swapchain, settings)
            .context("frame pipeline")?;
        backend.sync_objects.create().context("sync objects")?;
        backend.sync = FrameSynchronizer::new(backend.sync_objects.frames());

        info!("vulkan backend ready");
        Ok(backend)
    }

    fn draw(&mut self, host: &mut dyn WindowHost) -> Result<FrameStatus> {
        let VkBackend {
            sync,
            pipeline,
            swapchain,
            settings,
            ctx,
            ..
        } = self;
        let mut presenter = Presenter {
            ctx,
            swapchain,
            pipeline,
            settings,
            host,
        };
        sync.draw_frame(&mut presenter)
    }
}

impl Drop for VkBackend {
    fn drop(&mut self) {
        unsafe {
            self.ctx.wait_idle().ok();
            self.sync_objects.destroy();
            self.pipeline.destroy(&self.ctx);
            self.swapchain.destroy(&self.ctx);
        }
    }
}

/// [`FrameQueue`] over the live device and swapchain for one frame.
struct Presenter<'a> {
    ctx: &'a DeviceContext,
    swapchain: &'a mut Swapchain,
    pipeline: &'a mut FramePipeline,
    settings: &'a RenderSettings,
    host: &'a mut dyn WindowHost,
}

impl FrameQueue for Presenter<'_> {
    fn wait_for_fence(&mut self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.ctx.device.wait_for_fences(&[fence], true, u64::MAX) }
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.ctx.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(&mut self, signal: vk::Semaphore) -> VkResult<(u32, bool)> {
        unsafe {
            self.ctx.swapchain_loader.acquire_next_image(
                self.swapchain.handle,
                u64::MAX,
                signal,
                vk::Fence::null(),
            )
        }
    }

    fn submit(
        &mut self,
        image_index: u32,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let cmd = self.pipeline.command_buffers[image_index as usize];
        let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            p_wait_dst_stage_mask: &wait_stage,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &signal,
            ..Default::default()
        };
        unsafe {
            self.ctx
                .device
                .queue_submit(self.ctx.graphics_queue, std::slice::from_ref(&submit), fence)
        }
    }

    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> VkResult<bool> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &self.swapchain.handle,
            p_image_indices: &image_index,
            ..Default::default()
        };
        unsafe {
            self.ctx
                .swapchain_loader
                .queue_present(self.ctx.present_queue, &present)
        }
    }

    // STRICT ORDER: non-empty drawable, device idle, pipeline objects,
    // swapchain, then build both again against the new size.
    fn rebuild_swapchain(&mut self) -> Result<()> {
        let drawable = wait_for_drawable(&mut *self.host);
        unsafe {
            self.ctx.wait_idle()?;
            self.pipeline.destroy(self.ctx);
            self.swapchain.destroy(self.ctx);

            *self.swapchain = Swapchain::build(self.ctx, self.settings.present_mode, drawable)
                .context("rebuild swapchain")?;
            *self.pipeline = FramePipeline::build(self.ctx, self.swapchain, self.settings)
                .context("rebuild frame pipeline")?;
        }
        debug!(
            "rebuilt for drawable {drawable}: extent {}x{}",
            self.swapchain.extent.width, self.swapchain.extent.height
        );
        Ok(())
    }
}
