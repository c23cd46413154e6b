// SPDX-License-Identifier: CEPL-1.0
//! Surface capability queries and the format / present-mode / extent
//! policies applied on every swapchain build.
use crate::error::{VkCall, VkError};
use ash::khr::surface;
use ash::vk;
use vesper_render::{PresentMode, RenderSize};

/// Everything a surface reports for one physical device.
#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Pure query. Called again on every rebuild since `current_extent`
    /// follows the window.
    pub unsafe fn query(
        loader: &surface::Instance,
        phys: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self, VkError> {
        let capabilities = loader
            .get_physical_device_surface_capabilities(phys, surface)
            .call("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;
        let formats = loader
            .get_physical_device_surface_formats(phys, surface)
            .call("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let present_modes = loader
            .get_physical_device_surface_present_modes(phys, surface)
            .call("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// A swapchain needs at least one format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// BGRA8 in the non-linear sRGB color space if offered, else whatever the
/// surface lists first.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, VkError> {
    [vk::Format::B8G8R8A8_SRGB, vk::Format::B8G8R8A8_UNORM]
        .into_iter()
        .find_map(|want| {
            formats.iter().copied().find(|f| {
                f.format == want && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
        .ok_or(VkError::NoSurfaceFormat)
}

pub fn vk_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Vsync => vk::PresentModeKHR::FIFO,
        PresentMode::TripleBuffering => vk::PresentModeKHR::MAILBOX,
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::RelaxedVsync => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

/// The desired mode if the surface supports it, FIFO otherwise. FIFO is
/// mandatory for every implementation so this never fails.
pub fn choose_present_mode(
    supported: &[vk::PresentModeKHR],
    desired: PresentMode,
) -> vk::PresentModeKHR {
    let want = vk_present_mode(desired);
    if supported.contains(&want) {
        want
    } else {
        vk_present_mode(PresentMode::GUARANTEED)
    }
}

/// `current_extent` is authoritative unless it holds the u32::MAX sentinel,
/// in which case the drawable size is clamped into the supported range.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, drawable: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: drawable
            .width
            .max(caps.min_image_extent.width)
            .min(caps.max_image_extent.width),
        height: drawable
            .height
            .max(caps.min_image_extent.height)
            .min(caps.max_image_extent.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn free_extent_caps(min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn prefers_bgra8_srgb_nonlinear() {
        let nl = vk::ColorSpaceKHR::SRGB_NONLINEAR;
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, nl),
            fmt(vk::Format::B8G8R8A8_UNORM, nl),
            fmt(vk::Format::B8G8R8A8_SRGB, nl),
        ];
        let chosen = choose_surface_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);

        let chosen = choose_surface_format(&formats[..2]).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn falls_back_to_first_reported_format() {
        let formats = [
            fmt(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            fmt(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::HDR10_ST2084_EXT),
            // Right format, wrong color space.
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
    }

    #[test]
    fn no_formats_is_an_error() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(VkError::NoSurfaceFormat)
        ));
    }

    #[test]
    fn triple_buffering_without_mailbox_falls_back_to_fifo() {
        let supported = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&supported, PresentMode::TripleBuffering),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&supported, PresentMode::Immediate),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn every_absent_mode_resolves_to_the_guaranteed_one() {
        let fifo_only = [vk::PresentModeKHR::FIFO];
        for mode in PresentMode::ALL {
            assert_eq!(
                choose_present_mode(&fifo_only, mode),
                vk_present_mode(PresentMode::GUARANTEED),
                "{mode}"
            );
        }
    }

    #[test]
    fn undefined_extent_uses_drawable_size() {
        let caps = free_extent_caps((1, 1), (4096, 4096));
        let extent = choose_extent(&caps, RenderSize::new(1024, 768));
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn undefined_extent_is_clamped_per_axis() {
        let caps = free_extent_caps((200, 100), (1920, 1080));
        for (w, h) in [(0, 0), (10, 5000), (5000, 10), (640, 480), (u32::MAX - 1, 1)] {
            let e = choose_extent(&caps, RenderSize::new(w, h));
            assert!((200..=1920).contains(&e.width), "{w}x{h} -> {e:?}");
            assert!((100..=1080).contains(&e.height), "{w}x{h} -> {e:?}");
        }
    }

    #[test]
    fn current_extent_is_authoritative() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        let extent = choose_extent(&caps, RenderSize::new(1600, 1200));
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn adequacy_needs_formats_and_modes() {
        let mut support = SurfaceSupport::default();
        assert!(!support.is_adequate());
        support.formats.push(fmt(
            vk::Format::B8G8R8A8_SRGB,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        ));
        assert!(!support.is_adequate());
        support.present_modes.push(vk::PresentModeKHR::FIFO);
        assert!(support.is_adequate());
    }
}
