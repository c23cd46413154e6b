// SPDX-License-Identifier: CEPL-1.0
//! Physical device selection.
use crate::error::{VkCall, VkError};
use crate::surface::SurfaceSupport;
use ash::khr::{surface, swapchain};
use ash::vk;
use std::ffi::CStr;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Device extensions every candidate must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [swapchain::NAME];

/// Packed Vulkan version, split into its fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub variant: u32,
}

impl ApiVersion {
    pub fn decode(packed: u32) -> Self {
        Self {
            major: vk::api_version_major(packed),
            minor: vk::api_version_minor(packed),
            patch: vk::api_version_patch(packed),
            variant: vk::api_version_variant(packed),
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Graphics and present queue families. They may be the same family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Prefers a single family that does both; otherwise takes the first
    /// graphics family and the first present-capable one.
    /// `present_support[i]` says whether family `i` can present.
    pub fn find(families: &[vk::QueueFamilyProperties], present_support: &[bool]) -> Option<Self> {
        let graphics = |i: usize| {
            families[i].queue_count > 0 && families[i].queue_flags.contains(vk::QueueFlags::GRAPHICS)
        };
        let present = |i: usize| present_support.get(i).copied().unwrap_or(false);

        if let Some(both) = (0..families.len()).find(|&i| graphics(i) && present(i)) {
            return Some(Self {
                graphics: both as u32,
                present: both as u32,
            });
        }
        let g = (0..families.len()).find(|&i| graphics(i))?;
        let p = (0..families.len()).find(|&i| present(i))?;
        Some(Self {
            graphics: g as u32,
            present: p as u32,
        })
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

pub fn supports_extensions(available: &[vk::ExtensionProperties], required: &[&CStr]) -> bool {
    required.iter().all(|&want| {
        available
            .iter()
            .any(|e| e.extension_name_as_c_str().is_ok_and(|name| name == want))
    })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("no graphics and present queue families")]
    NoQueueFamilies,
    #[error("missing {0}")]
    MissingExtension(String),
    #[error("surface offers no formats or no present modes")]
    InadequateSurface,
}

/// Checks one device against everything rendering to this surface needs.
pub fn assess(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
    extensions: &[vk::ExtensionProperties],
    surface: &SurfaceSupport,
) -> Result<QueueFamilyIndices, Rejection> {
    let queues =
        QueueFamilyIndices::find(families, present_support).ok_or(Rejection::NoQueueFamilies)?;
    if let Some(missing) = REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .find(|&&ext| !supports_extensions(extensions, &[ext]))
    {
        return Err(Rejection::MissingExtension(missing.to_string_lossy().into_owned()));
    }
    if !surface.is_adequate() {
        return Err(Rejection::InadequateSurface);
    }
    Ok(queues)
}

#[derive(Clone, Debug)]
pub struct SelectedDevice {
    pub physical: vk::PhysicalDevice,
    pub name: String,
    pub vendor_id: u32,
    pub api_version: ApiVersion,
    pub queues: QueueFamilyIndices,
}

/// Returns the first physical device that passes [`assess`].
pub unsafe fn select_device(
    instance: &ash::Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<SelectedDevice, VkError> {
    let devices = instance
        .enumerate_physical_devices()
        .call("vkEnumeratePhysicalDevices")?;
    info!("{} physical device(s) available", devices.len());

    for phys in devices {
        let props = instance.get_physical_device_properties(phys);
        let name = props
            .device_name_as_c_str()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "<unnamed>".to_string());

        let families = instance.get_physical_device_queue_family_properties(phys);
        let present_support: Vec<bool> = (0..families.len() as u32)
            .map(|i| {
                surface_loader
                    .get_physical_device_surface_support(phys, i, surface)
                    .unwrap_or(false)
            })
            .collect();
        let extensions = instance
            .enumerate_device_extension_properties(phys)
            .call("vkEnumerateDeviceExtensionProperties")?;
        let support = SurfaceSupport::query(surface_loader, phys, surface)?;

        match assess(&families, &present_support, &extensions, &support) {
            Ok(queues) => {
                return Ok(SelectedDevice {
                    physical: phys,
                    name,
                    vendor_id: props.vendor_id,
                    api_version: ApiVersion::decode(props.api_version),
                    queues,
                })
            }
            Err(why) => debug!("skipping {name}: {why}"),
        }
    }
    Err(VkError::NoSuitableDevice)
}
