// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::vk;
use easyvk_render::RenderSize;
use tracing::{debug, info};

use crate::events::SwapchainImages;
use crate::{NativeResultExt, VkResult};

/// What the caller asked for; kept so a rebuild reproduces the same choices.
#[derive(Clone, Debug)]
pub(crate) struct SwapchainRequest {
    pub limit_frame_rate: bool,
    pub size_hint: RenderSize,
    pub preferred_format: Option<vk::SurfaceFormatKHR>,
    pub flags: vk::SwapchainCreateFlagsKHR,
}

/// Parameters derived from surface capabilities for one swapchain build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainParams {
    pub min_image_count: u32,
    pub extent: vk::Extent2D,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub image_usage: vk::ImageUsageFlags,
}

impl SwapchainParams {
    pub fn from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> Self {
        Self {
            min_image_count: image_count(caps),
            extent: extent_from_caps(caps, want),
            pre_transform: caps.current_transform,
            composite_alpha: choose_composite_alpha(caps.supported_composite_alpha),
            image_usage: choose_image_usage(caps.supported_usage_flags),
        }
    }
}

/// One more than the minimum, capped by the maximum (0 == no max).
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

pub fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    if supported.contains(vk::CompositeAlphaFlagsKHR::INHERIT) {
        return vk::CompositeAlphaFlagsKHR::INHERIT;
    }
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|&a| supported.contains(a))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Color attachment always; transfer in either direction when the surface allows it.
pub fn choose_image_usage(supported: vk::ImageUsageFlags) -> vk::ImageUsageFlags {
    let mut usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    for extra in [
        vk::ImageUsageFlags::TRANSFER_SRC,
        vk::ImageUsageFlags::TRANSFER_DST,
    ] {
        if supported.contains(extra) {
            usage |= extra;
        }
    }
    usage
}

/// FIFO unless frame-rate limiting is off and MAILBOX exists.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    limit_frame_rate: bool,
) -> vk::PresentModeKHR {
    if !limit_frame_rate && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Whether `want` is offered. `UNDEFINED` as the requested format matches any
/// format in the requested color space.
pub fn format_available(formats: &[vk::SurfaceFormatKHR], want: vk::SurfaceFormatKHR) -> bool {
    resolve_format(formats, want).is_some()
}

pub fn resolve_format(
    formats: &[vk::SurfaceFormatKHR],
    want: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.color_space == want.color_space
                && (want.format == vk::Format::UNDEFINED || f.format == want.format)
        })
        .copied()
}

/// Preferred format if available, then R8G8B8A8_UNORM, then B8G8R8A8_UNORM
/// (both sRGB nonlinear), then whatever comes first.
pub fn pick_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: Option<vk::SurfaceFormatKHR>,
) -> Option<vk::SurfaceFormatKHR> {
    if let Some(f) = preferred.and_then(|want| resolve_format(formats, want)) {
        return Some(f);
    }
    [vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_UNORM]
        .into_iter()
        .find_map(|format| {
            resolve_format(
                formats,
                vk::SurfaceFormatKHR {
                    format,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            )
        })
        .or_else(|| formats.first().copied())
}

pub(crate) struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub info: SwapchainImages,
    pub present_mode: vk::PresentModeKHR,
    pub request: SwapchainRequest,
    pub current_image: u32,
}

impl Swapchain {
    /// # Safety
    /// No view may still be in use by the device.
    pub unsafe fn destroy_views(&mut self, device: &ash::Device) {
        for &iv in &self.info.views {
            unsafe { device.destroy_image_view(iv, None) };
        }
        self.info.views.clear();
    }

    /// # Safety
    /// The device must be idle with respect to this swapchain.
    pub unsafe fn destroy(mut self, device: &ash::Device, loader: &swapchain::Device) {
        unsafe {
            self.destroy_views(device);
            loader.destroy_swapchain(self.handle, None);
        }
    }
}

pub(crate) struct BuildTarget<'a> {
    pub device: &'a ash::Device,
    pub surface_loader: &'a surface::Instance,
    pub swapchain_loader: &'a swapchain::Device,
    pub phys: vk::PhysicalDevice,
    pub surface: vk::SurfaceKHR,
    pub families: &'a [u32],
}

/// Creates the swapchain plus one view per image. Aborts when the surface
/// reports no formats or no present modes.
///
/// # Safety
/// `old_swapchain` must be null or a retired swapchain of the same surface.
pub(crate) unsafe fn build_swapchain(
    target: &BuildTarget<'_>,
    caps: &vk::SurfaceCapabilitiesKHR,
    request: SwapchainRequest,
    old_swapchain: vk::SwapchainKHR,
    generation: u64,
) -> VkResult<Swapchain> {
    let formats = unsafe {
        target
            .surface_loader
            .get_physical_device_surface_formats(target.phys, target.surface)
    }
    .native("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
    let modes = unsafe {
        target
            .surface_loader
            .get_physical_device_surface_present_modes(target.phys, target.surface)
    }
    .native("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
    if modes.is_empty() {
        crate::error::fatal("surface reports no present modes");
    }
    let Some(surf_format) = pick_surface_format(&formats, request.preferred_format) else {
        crate::error::fatal("surface reports no formats");
    };

    let params = SwapchainParams::from_caps(caps, request.size_hint);
    let present_mode = choose_present_mode(&modes, request.limit_frame_rate);

    // Separate present family: share images instead of transferring ownership.
    let (sharing, family_count, p_families) = if target.families.len() > 1 {
        (
            vk::SharingMode::CONCURRENT,
            target.families.len() as u32,
            target.families.as_ptr(),
        )
    } else {
        (vk::SharingMode::EXCLUSIVE, 0, std::ptr::null())
    };

    let swap_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        flags: request.flags,
        surface: target.surface,
        min_image_count: params.min_image_count,
        image_format: surf_format.format,
        image_color_space: surf_format.color_space,
        image_extent: params.extent,
        image_array_layers: 1,
        image_usage: params.image_usage,
        image_sharing_mode: sharing,
        queue_family_index_count: family_count,
        p_queue_family_indices: p_families,
        pre_transform: params.pre_transform,
        composite_alpha: params.composite_alpha,
        present_mode,
        clipped: vk::TRUE,
        old_swapchain,
        ..Default::default()
    };

    let handle = unsafe { target.swapchain_loader.create_swapchain(&swap_info, None) }
        .native("vkCreateSwapchainKHR")?;
    let images = match unsafe { target.swapchain_loader.get_swapchain_images(handle) } {
        Ok(images) => images,
        Err(code) => {
            unsafe { target.swapchain_loader.destroy_swapchain(handle, None) };
            return Err(code).native("vkGetSwapchainImagesKHR");
        }
    };

    let mut views = Vec::with_capacity(images.len());
    for &img in &images {
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image: img,
            view_type: vk::ImageViewType::TYPE_2D,
            format: surf_format.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        match unsafe { target.device.create_image_view(&iv_info, None) } {
            Ok(v) => views.push(v),
            Err(code) => unsafe {
                for &v in &views {
                    target.device.destroy_image_view(v, None);
                }
                target.swapchain_loader.destroy_swapchain(handle, None);
                return Err(code).native("vkCreateImageView");
            },
        }
    }

    info!(
        "swapchain #{generation}: {:?} / {:?}, {:?}, {}x{}, {} images",
        surf_format.format,
        surf_format.color_space,
        present_mode,
        params.extent.width,
        params.extent.height,
        images.len()
    );
    debug!(?params, "swapchain parameters");

    Ok(Swapchain {
        handle,
        images,
        info: SwapchainImages {
            generation,
            format: surf_format.format,
            extent: params.extent,
            views,
        },
        present_mode,
        request,
        current_image: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ..Default::default()
        }
    }

    fn srgb(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn image_count_is_min_plus_one_within_max() {
        let mut c = caps();
        assert_eq!(image_count(&c), 3);
        c.max_image_count = 2;
        assert_eq!(image_count(&c), 2);
        c.max_image_count = 0;
        assert_eq!(image_count(&c), 3);
    }

    #[test]
    fn extent_follows_surface_or_clamps_hint() {
        let mut c = caps();
        let hint = RenderSize::new(5000, 300);
        assert_eq!(extent_from_caps(&c, hint), c.current_extent);

        c.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert_eq!(
            extent_from_caps(&c, hint),
            vk::Extent2D {
                width: 4096,
                height: 300
            }
        );
    }

    #[test]
    fn composite_alpha_prefers_inherit_then_opaque_order() {
        use vk::CompositeAlphaFlagsKHR as A;
        assert_eq!(choose_composite_alpha(A::INHERIT | A::OPAQUE), A::INHERIT);
        assert_eq!(
            choose_composite_alpha(A::POST_MULTIPLIED | A::PRE_MULTIPLIED),
            A::PRE_MULTIPLIED
        );
        assert_eq!(choose_composite_alpha(A::POST_MULTIPLIED), A::POST_MULTIPLIED);
    }

    #[test]
    fn usage_adds_supported_transfer_bits_only() {
        use vk::ImageUsageFlags as U;
        assert_eq!(choose_image_usage(U::COLOR_ATTACHMENT), U::COLOR_ATTACHMENT);
        assert_eq!(
            choose_image_usage(U::COLOR_ATTACHMENT | U::TRANSFER_DST | U::SAMPLED),
            U::COLOR_ATTACHMENT | U::TRANSFER_DST
        );
        assert_eq!(
            choose_image_usage(
                U::COLOR_ATTACHMENT | U::TRANSFER_SRC | U::TRANSFER_DST | U::STORAGE
            ),
            U::COLOR_ATTACHMENT | U::TRANSFER_SRC | U::TRANSFER_DST
        );
    }

    #[test]
    fn present_mode_is_fifo_unless_unlimited_and_mailbox() {
        use vk::PresentModeKHR as P;
        let modes = [P::FIFO, P::MAILBOX, P::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes, true), P::FIFO);
        assert_eq!(choose_present_mode(&modes, false), P::MAILBOX);
        assert_eq!(choose_present_mode(&[P::FIFO, P::IMMEDIATE], false), P::FIFO);
    }

    #[test]
    fn surface_format_preference_order() {
        let offered = [
            srgb(vk::Format::B8G8R8A8_SRGB),
            srgb(vk::Format::B8G8R8A8_UNORM),
            srgb(vk::Format::R8G8B8A8_UNORM),
        ];
        assert_eq!(
            pick_surface_format(&offered, None),
            Some(srgb(vk::Format::R8G8B8A8_UNORM))
        );
        assert_eq!(
            pick_surface_format(&offered[..2], None),
            Some(srgb(vk::Format::B8G8R8A8_UNORM))
        );
        assert_eq!(
            pick_surface_format(&offered[..1], None),
            Some(srgb(vk::Format::B8G8R8A8_SRGB))
        );
        assert_eq!(pick_surface_format(&[], None), None);
    }

    #[test]
    fn preferred_format_wins_when_offered() {
        let offered = [
            srgb(vk::Format::R8G8B8A8_UNORM),
            srgb(vk::Format::B8G8R8A8_SRGB),
        ];
        let want = srgb(vk::Format::B8G8R8A8_SRGB);
        assert_eq!(pick_surface_format(&offered, Some(want)), Some(want));

        let missing = srgb(vk::Format::A2B10G10R10_UNORM_PACK32);
        assert_eq!(
            pick_surface_format(&offered, Some(missing)),
            Some(srgb(vk::Format::R8G8B8A8_UNORM))
        );
    }

    #[test]
    fn undefined_format_matches_color_space_only() {
        let offered = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R16G16B16A16_SFLOAT,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
            srgb(vk::Format::B8G8R8A8_UNORM),
        ];
        let any_linear = vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        assert!(format_available(&offered, any_linear));
        assert_eq!(resolve_format(&offered, any_linear), Some(offered[0]));
        assert!(!format_available(
            &offered,
            vk::SurfaceFormatKHR {
                format: vk::Format::UNDEFINED,
                color_space: vk::ColorSpaceKHR::HDR10_ST2084_EXT,
            }
        ));
    }

    #[test]
    fn params_keep_current_transform() {
        let mut c = caps();
        c.current_transform = vk::SurfaceTransformFlagsKHR::ROTATE_90;
        let p = SwapchainParams::from_caps(&c, RenderSize::new(1280, 720));
        assert_eq!(p.pre_transform, vk::SurfaceTransformFlagsKHR::ROTATE_90);
        assert_eq!(p.min_image_count, 3);
        assert_eq!(p.composite_alpha, vk::CompositeAlphaFlagsKHR::OPAQUE);
    }
}
