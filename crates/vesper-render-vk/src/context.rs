// SPDX-License-Identifier: CEPL-1.0
//! Instance- and device-scoped Vulkan objects as nested guards. Each guard
//! releases its own objects on drop and then lets its inner guard go, so
//! teardown always runs in reverse creation order.
use crate::debug::{DebugMessenger, VALIDATION_LAYER};
use crate::device::{select_device, supports_extensions, SelectedDevice, REQUIRED_DEVICE_EXTENSIONS};
use crate::error::{VkCall, VkError};
use anyhow::{anyhow, Context, Result};
use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::{c_char, CStr};
use tracing::{info, warn};
use vesper_render::WindowHost;

const APP_NAME: &CStr = c"vesper";

/// Loader, instance, optional debug messenger and the window surface.
pub struct InstanceContext {
    pub entry: Entry,
    pub instance: ash::Instance,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
    debug: Option<DebugMessenger>,
}

impl InstanceContext {
    pub unsafe fn new(host: &dyn WindowHost, debug: bool) -> Result<Self> {
        let display = host
            .display_handle()
            .map_err(|e| anyhow!("display handle: {e}"))?
            .as_raw();
        let window = host
            .window_handle()
            .map_err(|e| anyhow!("window handle: {e}"))?
            .as_raw();

        let entry = Entry::load().map_err(VkError::from)?;
        let (instance, debug_utils_enabled) =
            create_instance(&entry, display, debug).context("create_instance")?;
        let surface_loader = surface::Instance::new(&entry, &instance);

        // From here on a failure drops `ctx`, which releases the instance.
        let mut ctx = InstanceContext {
            entry,
            instance,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
            debug: None,
        };
        if debug_utils_enabled {
            ctx.debug = Some(DebugMessenger::new(&ctx.entry, &ctx.instance)?);
        }
        ctx.surface = ash_window::create_surface(&ctx.entry, &ctx.instance, display, window, None)
            .call("vkCreateSurfaceKHR")?;
        Ok(ctx)
    }
}

impl Drop for InstanceContext {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.debug.take() {
                messenger.destroy();
            }
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn has_layer(layers: &[vk::LayerProperties], want: &CStr) -> bool {
    layers
        .iter()
        .any(|l| l.layer_name_as_c_str().is_ok_and(|name| name == want))
}

/// Returns the instance and whether the debug-utils extension was enabled.
unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    debug: bool,
) -> Result<(ash::Instance, bool)> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: vk::make_api_version(0, 0, 1, 0),
        p_engine_name: APP_NAME.as_ptr(),
        engine_version: vk::make_api_version(0, 0, 1, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
        .call("enumerate_required_extensions")?
        .to_vec();
    let mut layers: Vec<*const c_char> = Vec::new();
    let mut debug_utils_enabled = false;

    if debug {
        let available = entry
            .enumerate_instance_extension_properties(None)
            .call("vkEnumerateInstanceExtensionProperties")?;
        if supports_extensions(&available, &[debug_utils::NAME]) {
            extensions.push(debug_utils::NAME.as_ptr());
            debug_utils_enabled = true;
        } else {
            warn!("VK_EXT_debug_utils unavailable; validation messages will not be forwarded");
        }

        let installed = entry
            .enumerate_instance_layer_properties()
            .call("vkEnumerateInstanceLayerProperties")?;
        if has_layer(&installed, VALIDATION_LAYER) {
            layers.push(VALIDATION_LAYER.as_ptr());
            info!("validation enabled");
        } else {
            warn!("{} not installed; continuing without validation", VALIDATION_LAYER.to_string_lossy());
        }
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        ..Default::default()
    };
    let instance = entry
        .create_instance(&create_info, None)
        .call("vkCreateInstance")?;
    Ok((instance, debug_utils_enabled))
}

/// Logical device, its queues and the command pool, on top of the instance.
pub struct DeviceContext {
    pub device: ash::Device,
    pub gpu: SelectedDevice,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: swapchain::Device,
    pub command_pool: vk::CommandPool,
    pub instance: InstanceContext,
}

impl DeviceContext {
    pub unsafe fn new(instance: InstanceContext) -> Result<Self> {
        let gpu = select_device(&instance.instance, &instance.surface_loader, instance.surface)?;
        info!(
            "GPU: {} (vendor {:#06x}, Vulkan {}), graphics family {}, present family {}",
            gpu.name, gpu.vendor_id, gpu.api_version, gpu.queues.graphics, gpu.queues.present
        );

        let device = create_logical_device(&instance.instance, &gpu)?;
        let swapchain_loader = swapchain::Device::new(&instance.instance, &device);
        let graphics_queue = device.get_device_queue(gpu.queues.graphics, 0);
        let present_queue = device.get_device_queue(gpu.queues.present, 0);

        let mut ctx = DeviceContext {
            device,
            gpu,
            graphics_queue,
            present_queue,
            swapchain_loader,
            command_pool: vk::CommandPool::null(),
            instance,
        };
        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: ctx.gpu.queues.graphics,
            ..Default::default()
        };
        ctx.command_pool = ctx
            .device
            .create_command_pool(&pool_info, None)
            .call("vkCreateCommandPool")?;
        Ok(ctx)
    }

    /// Device-wide idle barrier.
    pub unsafe fn wait_idle(&self) -> Result<(), VkError> {
        self.device.device_wait_idle().call("vkDeviceWaitIdle")
    }
}

impl Drop for DeviceContext {
    fn drop(&mut self) {
        unsafe {
            if self.command_pool != vk::CommandPool::null() {
                self.device.destroy_command_pool(self.command_pool, None);
            }
            self.device.destroy_device(None);
        }
        // `instance` drops after this, taking the surface and instance.
    }
}

/// One queue per distinct family, plus the swapchain extension.
unsafe fn create_logical_device(
    instance: &ash::Instance,
    gpu: &SelectedDevice,
) -> Result<ash::Device, VkError> {
    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = gpu
        .queues
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();
    let extensions: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .map(|ext| ext.as_ptr())
        .collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let info = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };
    instance
        .create_device(gpu.physical, &info, None)
        .call("vkCreateDevice")
}
