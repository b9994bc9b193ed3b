// SPDX-License-Identifier: CEPL-1.0
use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use easyvk_render::WindowSystem;
use tracing::info;

use crate::command::{CommandBuffer, CommandPool};
use crate::context::GraphicsContext;
use crate::events::{SwapchainImages, SwapchainObserver};
use crate::frame::{run_frame, FrameOutcome, FrameSyncObjects};
use crate::pipeline::{Pipeline, PipelineDescriptor, PipelineLayout};
use crate::render_pass::{RenderPassBundle, ScreenPass};
use crate::shader::{ShaderModule, ShaderPaths};
use crate::{VkError, VkResult};

/// Fixed-function state for the triangle: triangle list, no culling, one
/// opaque color attachment, viewport and scissor set per frame.
pub fn triangle_pipeline(
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    stages: [vk::PipelineShaderStageCreateInfo<'static>; 2],
) -> PipelineDescriptor {
    let mut d = PipelineDescriptor::new();
    d.layout = layout;
    d.render_pass = render_pass;
    d.shader_stages.extend(stages);
    d.input_assembly.topology = vk::PrimitiveTopology::TRIANGLE_LIST;
    d.rasterization.polygon_mode = vk::PolygonMode::FILL;
    d.rasterization.cull_mode = vk::CullModeFlags::NONE;
    d.rasterization.front_face = vk::FrontFace::COUNTER_CLOCKWISE;
    d.multisample.rasterization_samples = vk::SampleCountFlags::TYPE_1;
    d.color_blend_attachments
        .push(vk::PipelineColorBlendAttachmentState {
            color_write_mask: vk::ColorComponentFlags::R
                | vk::ColorComponentFlags::G
                | vk::ColorComponentFlags::B
                | vk::ColorComponentFlags::A,
            ..Default::default()
        });
    d.dynamic_states
        .extend([vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]);
    d
}

/// Points `desc` at `render_pass`. The linked create info picks the new pass
/// up on the next `update_all_arrays`.
pub fn retarget(desc: &mut PipelineDescriptor, render_pass: vk::RenderPass) {
    desc.render_pass = render_pass;
}

/// The triangle pipeline, rebuilt whenever the screen render pass is.
///
/// Subscribed after the screen bundle, so by the time it hears about a new
/// swapchain the bundle already holds the pass for the new format.
struct TrianglePipeline {
    pipeline: Option<Pipeline>,
    desc: PipelineDescriptor,
    layout: PipelineLayout,
    // the descriptor's stages point at these
    _shaders: [ShaderModule; 2],
    bundle: Rc<RefCell<RenderPassBundle>>,
    device: ash::Device,
    format: vk::Format,
}

impl TrianglePipeline {
    fn handle(&self) -> VkResult<vk::Pipeline> {
        self.pipeline
            .as_ref()
            .map(Pipeline::handle)
            .ok_or(VkError::NotReady("triangle pipeline"))
    }

    fn rebuild(&mut self) -> VkResult<()> {
        let (render_pass, format) = {
            let b = self.bundle.borrow();
            (b.render_pass()?.handle(), b.format())
        };
        self.pipeline = None;
        retarget(&mut self.desc, render_pass);
        self.pipeline = Some(Pipeline::graphics(
            &self.device,
            &self.desc.update_all_arrays(),
        )?);
        self.format = format;
        info!("triangle pipeline ready for {format:?}");
        Ok(())
    }
}

impl SwapchainObserver for TrianglePipeline {
    fn swapchain_destroyed(&mut self) {}

    fn swapchain_created(&mut self, images: &SwapchainImages) -> VkResult<()> {
        if images.format == self.format {
            return Ok(());
        }
        self.rebuild()
    }
}

// Field order is drop order: the pipeline, then the screen bundle, then
// sync objects, then the command buffer before its pool.
pub struct TriangleRenderer {
    pipeline: Rc<RefCell<TrianglePipeline>>,
    screen: ScreenPass,
    sync: FrameSyncObjects,
    cmd: CommandBuffer,
    _pool: CommandPool,
    device: ash::Device,
    clear: vk::ClearValue,
}

impl TriangleRenderer {
    /// Needs a device and a swapchain.
    pub fn new(
        ctx: &mut GraphicsContext,
        shaders: &ShaderPaths,
        clear_color: [f32; 4],
    ) -> VkResult<Self> {
        let device = ctx.device()?.clone();
        let family = ctx
            .queue_families()
            .and_then(|f| f.graphics)
            .ok_or(VkError::NotReady("graphics queue"))?;

        let pool = CommandPool::new(
            &device,
            family,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )?;
        let cmd = pool.allocate_primary()?;
        let sync = FrameSyncObjects::new(&device)?;

        let mut screen = ScreenPass::default();
        let bundle = screen.get(ctx)?;

        let layout = PipelineLayout::empty(&device)?;
        let vert = ShaderModule::from_file(&device, &shaders.vertex)?;
        let frag = ShaderModule::from_file(&device, &shaders.fragment)?;
        let desc = triangle_pipeline(
            layout.handle(),
            vk::RenderPass::null(),
            [
                vert.stage_info(vk::ShaderStageFlags::VERTEX),
                frag.stage_info(vk::ShaderStageFlags::FRAGMENT),
            ],
        );
        let mut pipeline = TrianglePipeline {
            pipeline: None,
            desc,
            layout,
            _shaders: [vert, frag],
            bundle,
            device: device.clone(),
            format: vk::Format::UNDEFINED,
        };
        pipeline.rebuild()?;

        let pipeline = Rc::new(RefCell::new(pipeline));
        let observer: Rc<RefCell<dyn SwapchainObserver>> = pipeline.clone();
        ctx.subscribe_swapchain(&observer);

        Ok(Self {
            pipeline,
            screen,
            sync,
            cmd,
            _pool: pool,
            device,
            clear: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear_color,
                },
            },
        })
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear = vk::ClearValue {
            color: vk::ClearColorValue { float32: rgba },
        };
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline.borrow().layout.handle()
    }

    /// The render pass the current pipeline was built against.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.pipeline.borrow().desc.render_pass
    }

    /// Runs one frame: clear, draw three vertices, present.
    pub fn draw_frame<W>(
        &mut self,
        ctx: &mut GraphicsContext,
        window: &mut W,
    ) -> VkResult<FrameOutcome>
    where
        W: WindowSystem + ?Sized,
    {
        let bundle = self.screen.get(ctx)?;
        let device = &self.device;
        let pipeline = &self.pipeline;
        let clear = self.clear;

        run_frame(
            ctx,
            window,
            &self.sync.in_flight,
            self.sync.handles(),
            self.cmd.handle(),
            |cmd, image_index| {
                // read after acquire; a rebuild on the way may replace both
                let b = bundle.borrow();
                let pipeline = pipeline.borrow().handle()?;
                let area = b.render_area();
                let viewport = vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: area.extent.width as f32,
                    height: area.extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                };
                let framebuffer = b.framebuffer(image_index)?;
                let rp = b.render_pass()?;
                unsafe {
                    rp.begin(
                        cmd,
                        framebuffer,
                        area,
                        &[clear],
                        vk::SubpassContents::INLINE,
                    );
                    device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
                    device.cmd_set_viewport(cmd, 0, &[viewport]);
                    device.cmd_set_scissor(cmd, 0, &[area]);
                    device.cmd_draw(cmd, 3, 1, 0, 0);
                    rp.end(cmd);
                }
                Ok(())
            },
        )
    }
}

impl Drop for TriangleRenderer {
    fn drop(&mut self) {
        // the last frame may still be executing on any exit path
        unsafe { self.device.device_wait_idle() }.ok();
    }
}
