// SPDX-License-Identifier: CEPL-1.0
//! Two-slot frames-in-flight ring and the per-frame acquire / submit /
//! present protocol.
use crate::error::{VkCall, VkError};
use anyhow::Result;
use ash::prelude::VkResult;
use ash::vk;
use std::collections::HashMap;
use tracing::debug;

/// Frames the CPU may run ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Synchronization primitives owned by one ring slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InFlightFrame {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    /// Created signaled so the first wait returns immediately.
    pub in_flight: vk::Fence,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Idle,
    Acquiring,
    Submitted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The image was submitted and queued for presentation.
    Presented { image_index: u32, rebuilt: bool },
    /// Acquire found the swapchain out of date; it was rebuilt and nothing
    /// was submitted.
    Stale,
}

/// The GPU operations a frame needs, in the order [`FrameSynchronizer`]
/// issues them. Implemented over a real device and swapchain by the
/// backend; tests substitute a recording model.
pub trait FrameQueue {
    fn wait_for_fence(&mut self, fence: vk::Fence) -> VkResult<()>;

    fn reset_fence(&mut self, fence: vk::Fence) -> VkResult<()>;

    /// Returns the image index and whether the chain is suboptimal.
    fn acquire_next_image(&mut self, signal: vk::Semaphore) -> VkResult<(u32, bool)>;

    /// Submits the prerecorded command buffer for `image_index`, waiting on
    /// `wait` at color-attachment output.
    fn submit(
        &mut self,
        image_index: u32,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()>;

    /// Returns true when the chain is suboptimal.
    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> VkResult<bool>;

    /// Tears down and rebuilds every swapchain-sized object. Must retire all
    /// outstanding GPU work before destroying anything.
    fn rebuild_swapchain(&mut self) -> Result<()>;
}

fn is_stale(result: vk::Result) -> bool {
    matches!(
        result,
        vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR
    )
}

pub struct FrameSynchronizer {
    frames: [InFlightFrame; MAX_FRAMES_IN_FLIGHT],
    states: [SlotState; MAX_FRAMES_IN_FLIGHT],
    /// Swapchain image index -> ring slot whose submission last used it.
    images_in_flight: HashMap<u32, usize>,
    current_frame: usize,
    resize_pending: bool,
}

impl FrameSynchronizer {
    pub fn new(frames: [InFlightFrame; MAX_FRAMES_IN_FLIGHT]) -> Self {
        Self {
            frames,
            states: [SlotState::Idle; MAX_FRAMES_IN_FLIGHT],
            images_in_flight: HashMap::new(),
            current_frame: 0,
            resize_pending: false,
        }
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn slot_state(&self, slot: usize) -> SlotState {
        self.states[slot]
    }

    pub fn image_owner(&self, image_index: u32) -> Option<usize> {
        self.images_in_flight.get(&image_index).copied()
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Coalesced: any number of calls before the next frame cause one
    /// rebuild.
    pub fn notify_resized(&mut self) {
        self.resize_pending = true;
    }

    pub fn draw_frame<Q: FrameQueue + ?Sized>(&mut self, queue: &mut Q) -> Result<FrameStatus> {
        let slot = self.current_frame;
        let frame = self.frames[slot];

        queue
            .wait_for_fence(frame.in_flight)
            .call("vkWaitForFences")?;
        self.states[slot] = SlotState::Acquiring;

        let (image_index, acquired_suboptimal) =
            match queue.acquire_next_image(frame.image_available) {
                Ok(pair) => pair,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("acquire: swapchain out of date");
                    // The fence was not reset, so this slot stays reusable.
                    self.states[slot] = SlotState::Idle;
                    self.rebuild(queue)?;
                    return Ok(FrameStatus::Stale);
                }
                Err(result) => return Err(VkError::Call {
                    op: "vkAcquireNextImageKHR",
                    result,
                }
                .into()),
            };

        if let Some(other) = self.image_owner(image_index) {
            if other != slot {
                queue
                    .wait_for_fence(self.frames[other].in_flight)
                    .call("vkWaitForFences")?;
                self.states[other] = SlotState::Idle;
            }
        }
        self.images_in_flight.insert(image_index, slot);

        queue.reset_fence(frame.in_flight).call("vkResetFences")?;
        queue
            .submit(
                image_index,
                frame.image_available,
                frame.render_finished,
                frame.in_flight,
            )
            .call("vkQueueSubmit")?;
        self.states[slot] = SlotState::Submitted;

        let present_stale = match queue.present(image_index, frame.render_finished) {
            Ok(suboptimal) => suboptimal,
            Err(result) if is_stale(result) => true,
            Err(result) => {
                return Err(VkError::Call {
                    op: "vkQueuePresentKHR",
                    result,
                }
                .into())
            }
        };

        let rebuilt = present_stale || acquired_suboptimal || self.resize_pending;
        if rebuilt {
            debug!(
                "rebuild after present (stale={present_stale}, suboptimal acquire={acquired_suboptimal}, resize={})",
                self.resize_pending
            );
            self.rebuild(queue)?;
        }

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(FrameStatus::Presented {
            image_index,
            rebuilt,
        })
    }

    fn rebuild<Q: FrameQueue + ?Sized>(&mut self, queue: &mut Q) -> Result<()> {
        queue.rebuild_swapchain()?;
        // The rebuild idled the device, so every submission has retired.
        self.states = [SlotState::Idle; MAX_FRAMES_IN_FLIGHT];
        self.images_in_flight.clear();
        self.resize_pending = false;
        Ok(())
    }
}

/// Owns the ring's semaphores and fences. They outlive swapchain rebuilds
/// and are released only at shutdown.
pub struct SyncObjects {
    device: ash::Device,
    frames: [InFlightFrame; MAX_FRAMES_IN_FLIGHT],
}

impl SyncObjects {
    /// No objects yet; see [`SyncObjects::create`].
    pub fn empty(device: &ash::Device) -> Self {
        Self {
            device: device.clone(),
            frames: [InFlightFrame::default(); MAX_FRAMES_IN_FLIGHT],
        }
    }

    pub unsafe fn create(&mut self) -> Result<(), VkError> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        for frame in self.frames.iter_mut() {
            frame.image_available = self
                .device
                .create_semaphore(&semaphore_info, None)
                .call("vkCreateSemaphore")?;
            frame.render_finished = self
                .device
                .create_semaphore(&semaphore_info, None)
                .call("vkCreateSemaphore")?;
            frame.in_flight = self
                .device
                .create_fence(&fence_info, None)
                .call("vkCreateFence")?;
        }
        Ok(())
    }

    pub fn frames(&self) -> [InFlightFrame; MAX_FRAMES_IN_FLIGHT] {
        self.frames
    }

    /// Idempotent. The device must be idle.
    pub unsafe fn destroy(&mut self) {
        for frame in self.frames.iter_mut() {
            if frame.in_flight != vk::Fence::null() {
                self.device.destroy_fence(frame.in_flight, None);
            }
            for sem in [frame.image_available, frame.render_finished] {
                if sem != vk::Semaphore::null() {
                    self.device.destroy_semaphore(sem, None);
                }
            }
            *frame = InFlightFrame::default();
        }
    }
}

impl Drop for SyncObjects {
    fn drop(&mut self) {
        unsafe { self.destroy() }
    }
}
