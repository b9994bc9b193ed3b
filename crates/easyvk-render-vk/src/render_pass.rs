// SPDX-License-Identifier: CEPL-1.0
use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use tracing::debug;

use crate::context::GraphicsContext;
use crate::events::{DeviceObserver, SwapchainImages, SwapchainObserver};
use crate::{NativeResultExt, VkError, VkResult};

pub struct RenderPass {
    device: ash::Device,
    handle: vk::RenderPass,
}

impl RenderPass {
    pub fn new(device: &ash::Device, info: &vk::RenderPassCreateInfo<'_>) -> VkResult<Self> {
        let handle = unsafe { device.create_render_pass(info, None) }.native("vkCreateRenderPass")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    /// # Safety
    /// `cmd` must be recording and `framebuffer` compatible with this pass.
    pub unsafe fn begin(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        area: vk::Rect2D,
        clears: &[vk::ClearValue],
        contents: vk::SubpassContents,
    ) {
        let info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: self.handle,
            framebuffer,
            render_area: area,
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe { self.device.cmd_begin_render_pass(cmd, &info, contents) };
    }

    /// # Safety
    /// `cmd` must be inside this render pass.
    pub unsafe fn end(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) };
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        if self.handle != vk::RenderPass::null() {
            unsafe { self.device.destroy_render_pass(self.handle, None) };
        }
    }
}

pub struct Framebuffer {
    device: ash::Device,
    handle: vk::Framebuffer,
}

impl Framebuffer {
    pub fn new(device: &ash::Device, info: &vk::FramebufferCreateInfo<'_>) -> VkResult<Self> {
        let handle =
            unsafe { device.create_framebuffer(info, None) }.native("vkCreateFramebuffer")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        if self.handle != vk::Framebuffer::null() {
            unsafe { self.device.destroy_framebuffer(self.handle, None) };
        }
    }
}

/// Attachment, subpass reference and dependency of the screen pass: one
/// color attachment cleared on load and left ready for presentation.
#[derive(Clone, Copy, Debug)]
pub struct ScreenPassLayout {
    pub attachment: vk::AttachmentDescription,
    pub color_ref: vk::AttachmentReference,
    pub dependency: vk::SubpassDependency,
}

impl ScreenPassLayout {
    pub fn new(format: vk::Format) -> Self {
        Self {
            attachment: vk::AttachmentDescription {
                format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                ..Default::default()
            },
            color_ref: vk::AttachmentReference {
                attachment: 0,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            },
            // The acquire semaphore is waited at color output, so the layout
            // transition has to wait there too.
            dependency: vk::SubpassDependency {
                src_subpass: vk::SUBPASS_EXTERNAL,
                dst_subpass: 0,
                src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                src_access_mask: vk::AccessFlags::empty(),
                dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                dependency_flags: vk::DependencyFlags::BY_REGION,
            },
        }
    }

    pub fn create(&self, device: &ash::Device) -> VkResult<RenderPass> {
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &self.color_ref,
            ..Default::default()
        };
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &self.attachment,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &self.dependency,
            ..Default::default()
        };
        RenderPass::new(device, &info)
    }
}

/// One framebuffer description per swapchain view, each sized to the swapchain.
pub fn framebuffer_infos(
    render_pass: vk::RenderPass,
    images: &SwapchainImages,
) -> Vec<vk::FramebufferCreateInfo<'_>> {
    images
        .views
        .iter()
        .map(|view| {
            vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(std::slice::from_ref(view))
                .width(images.extent.width)
                .height(images.extent.height)
                .layers(1)
        })
        .collect()
}

/// A render pass plus one framebuffer per swapchain image, kept in step with
/// the swapchain through its observer hooks.
pub struct RenderPassBundle {
    // framebuffers before the pass they were built for
    framebuffers: Vec<Framebuffer>,
    render_pass: Option<RenderPass>,
    device: Option<ash::Device>,
    format: vk::Format,
    extent: vk::Extent2D,
    generation: u64,
}

impl RenderPassBundle {
    /// Builds the screen pass for the current swapchain and subscribes it to
    /// swapchain and device events.
    pub fn create_screen(ctx: &mut GraphicsContext) -> VkResult<Rc<RefCell<Self>>> {
        let device = ctx.device()?.clone();
        let images = ctx
            .swapchain_images()
            .ok_or(VkError::NotReady("swapchain"))?
            .clone();

        let mut bundle = Self {
            framebuffers: Vec::new(),
            render_pass: Some(ScreenPassLayout::new(images.format).create(&device)?),
            device: Some(device),
            format: images.format,
            extent: images.extent,
            generation: images.generation,
        };
        bundle.rebuild_framebuffers(&images)?;

        let rc = Rc::new(RefCell::new(bundle));
        let as_swapchain: Rc<RefCell<dyn SwapchainObserver>> = rc.clone();
        let as_device: Rc<RefCell<dyn DeviceObserver>> = rc.clone();
        ctx.subscribe_swapchain(&as_swapchain);
        ctx.subscribe_device(&as_device);
        Ok(rc)
    }

    pub fn render_pass(&self) -> VkResult<&RenderPass> {
        self.render_pass
            .as_ref()
            .ok_or(VkError::NotReady("render pass"))
    }

    pub fn framebuffer(&self, image_index: u32) -> VkResult<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
            .ok_or(VkError::NotReady("framebuffer"))
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Swapchain generation the framebuffers were built against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    fn rebuild_framebuffers(&mut self, images: &SwapchainImages) -> VkResult<()> {
        let device = self.device.as_ref().ok_or(VkError::NotReady("device"))?;
        if images.format != self.format || self.render_pass.is_none() {
            self.framebuffers.clear();
            self.render_pass = None;
            self.render_pass = Some(ScreenPassLayout::new(images.format).create(device)?);
            self.format = images.format;
        }
        let rp = self.render_pass()?.handle();
        self.framebuffers.clear();
        for info in framebuffer_infos(rp, images) {
            self.framebuffers.push(Framebuffer::new(device, &info)?);
        }
        self.extent = images.extent;
        self.generation = images.generation;
        debug!(
            "{} framebuffers for swapchain #{}",
            self.framebuffers.len(),
            self.generation
        );
        Ok(())
    }
}

impl SwapchainObserver for RenderPassBundle {
    fn swapchain_destroyed(&mut self) {
        self.framebuffers.clear();
    }

    fn swapchain_created(&mut self, images: &SwapchainImages) -> VkResult<()> {
        self.rebuild_framebuffers(images)
    }
}

impl DeviceObserver for RenderPassBundle {
    fn device_created(&mut self, _device: &ash::Device) -> VkResult<()> {
        Ok(())
    }

    fn device_destroyed(&mut self, _device: &ash::Device) {
        self.framebuffers.clear();
        self.render_pass = None;
        self.device = None;
    }
}

/// Lazily created screen bundle. The first `get` builds and subscribes it;
/// later calls hand out the same bundle without registering again.
#[derive(Default)]
pub struct ScreenPass {
    bundle: Option<Rc<RefCell<RenderPassBundle>>>,
}

impl ScreenPass {
    pub fn get(&mut self, ctx: &mut GraphicsContext) -> VkResult<Rc<RefCell<RenderPassBundle>>> {
        if let Some(b) = &self.bundle {
            return Ok(b.clone());
        }
        let b = RenderPassBundle::create_screen(ctx)?;
        self.bundle = Some(b.clone());
        Ok(b)
    }

    pub fn is_created(&self) -> bool {
        self.bundle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn screen_attachment_clears_and_presents() {
        let l = ScreenPassLayout::new(vk::Format::B8G8R8A8_UNORM);
        assert_eq!(l.attachment.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(l.attachment.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(l.attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(l.attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(l.attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(l.attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(l.color_ref.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn screen_dependency_waits_on_color_output() {
        let d = ScreenPassLayout::new(vk::Format::R8G8B8A8_UNORM).dependency;
        assert_eq!(d.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(d.dst_subpass, 0);
        assert_eq!(d.src_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(d.dst_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(d.dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(d.dependency_flags, vk::DependencyFlags::BY_REGION);
    }

    #[test]
    fn one_framebuffer_per_view() {
        let images = SwapchainImages {
            generation: 4,
            format: vk::Format::B8G8R8A8_UNORM,
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            views: (10..13).map(vk::ImageView::from_raw).collect(),
        };
        let rp = vk::RenderPass::from_raw(99);
        let infos = framebuffer_infos(rp, &images);
        assert_eq!(infos.len(), images.count());
        for (info, view) in infos.iter().zip(&images.views) {
            assert_eq!(info.render_pass, rp);
            assert_eq!(info.attachment_count, 1);
            assert_eq!(unsafe { *info.p_attachments }, *view);
            assert_eq!((info.width, info.height, info.layers), (800, 600, 1));
        }
    }
}
