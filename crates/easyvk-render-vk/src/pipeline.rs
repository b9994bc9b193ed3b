// SPDX-License-Identifier: CEPL-1.0
//! Graphics pipeline description.
//!
//! `PipelineDescriptor` owns every array a graphics pipeline create info
//! points into. The native create info is only produced through
//! [`PipelineDescriptor::update_all_arrays`], which borrows the descriptor,
//! so the arrays cannot grow or move while pointers into them exist.
use ash::vk;

use crate::{NativeResultExt, VkResult};

#[derive(Clone, Debug)]
pub struct PipelineDescriptor {
    pub flags: vk::PipelineCreateFlags,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub base_pipeline: vk::Pipeline,
    pub base_pipeline_index: i32,

    pub shader_stages: Vec<vk::PipelineShaderStageCreateInfo<'static>>,
    pub vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    pub tessellation: vk::PipelineTessellationStateCreateInfo<'static>,

    pub viewports: Vec<vk::Viewport>,
    pub scissors: Vec<vk::Rect2D>,
    /// Viewport count used when `viewports` is empty (dynamic viewports).
    pub dynamic_viewport_count: u32,
    pub dynamic_scissor_count: u32,

    pub rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    pub multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    pub depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    /// Logic op and blend constants; attachments come from `color_blend_attachments`.
    pub color_blend: vk::PipelineColorBlendStateCreateInfo<'static>,
    pub color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    pub dynamic_states: Vec<vk::DynamicState>,
}

impl Default for PipelineDescriptor {
    fn default() -> Self {
        Self {
            flags: vk::PipelineCreateFlags::empty(),
            layout: vk::PipelineLayout::null(),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            base_pipeline: vk::Pipeline::null(),
            base_pipeline_index: -1,
            shader_stages: Vec::new(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            input_assembly: vk::PipelineInputAssemblyStateCreateInfo::default(),
            tessellation: vk::PipelineTessellationStateCreateInfo::default(),
            viewports: Vec::new(),
            scissors: Vec::new(),
            dynamic_viewport_count: 1,
            dynamic_scissor_count: 1,
            rasterization: vk::PipelineRasterizationStateCreateInfo {
                line_width: 1.0,
                ..Default::default()
            },
            multisample: vk::PipelineMultisampleStateCreateInfo::default(),
            depth_stencil: vk::PipelineDepthStencilStateCreateInfo::default(),
            color_blend: vk::PipelineColorBlendStateCreateInfo::default(),
            color_blend_attachments: Vec::new(),
            dynamic_states: Vec::new(),
        }
    }
}

impl PipelineDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes every count and pointer from the current arrays.
    pub fn update_all_arrays(&self) -> LinkedPipelineInfo<'_> {
        let viewport_count = if self.viewports.is_empty() {
            self.dynamic_viewport_count
        } else {
            self.viewports.len() as u32
        };
        let scissor_count = if self.scissors.is_empty() {
            self.dynamic_scissor_count
        } else {
            self.scissors.len() as u32
        };

        LinkedPipelineInfo {
            desc: self,
            vertex_input: vk::PipelineVertexInputStateCreateInfo {
                vertex_binding_description_count: self.vertex_bindings.len() as u32,
                p_vertex_binding_descriptions: self.vertex_bindings.as_ptr(),
                vertex_attribute_description_count: self.vertex_attributes.len() as u32,
                p_vertex_attribute_descriptions: self.vertex_attributes.as_ptr(),
                ..Default::default()
            },
            viewport: vk::PipelineViewportStateCreateInfo {
                viewport_count,
                p_viewports: slice_ptr(&self.viewports),
                scissor_count,
                p_scissors: slice_ptr(&self.scissors),
                ..Default::default()
            },
            color_blend: vk::PipelineColorBlendStateCreateInfo {
                attachment_count: self.color_blend_attachments.len() as u32,
                p_attachments: self.color_blend_attachments.as_ptr(),
                ..self.color_blend
            },
            dynamic: vk::PipelineDynamicStateCreateInfo {
                dynamic_state_count: self.dynamic_states.len() as u32,
                p_dynamic_states: self.dynamic_states.as_ptr(),
                ..Default::default()
            },
        }
    }
}

fn slice_ptr<T>(v: &[T]) -> *const T {
    if v.is_empty() {
        std::ptr::null()
    } else {
        v.as_ptr()
    }
}

/// Sub-states of a descriptor with counts and pointers filled in.
pub struct LinkedPipelineInfo<'a> {
    desc: &'a PipelineDescriptor,
    vertex_input: vk::PipelineVertexInputStateCreateInfo<'a>,
    viewport: vk::PipelineViewportStateCreateInfo<'a>,
    color_blend: vk::PipelineColorBlendStateCreateInfo<'a>,
    dynamic: vk::PipelineDynamicStateCreateInfo<'a>,
}

impl<'a> LinkedPipelineInfo<'a> {
    pub fn vertex_input(&self) -> &vk::PipelineVertexInputStateCreateInfo<'a> {
        &self.vertex_input
    }

    pub fn viewport(&self) -> &vk::PipelineViewportStateCreateInfo<'a> {
        &self.viewport
    }

    pub fn color_blend(&self) -> &vk::PipelineColorBlendStateCreateInfo<'a> {
        &self.color_blend
    }

    pub fn dynamic(&self) -> &vk::PipelineDynamicStateCreateInfo<'a> {
        &self.dynamic
    }

    pub fn create_info(&self) -> vk::GraphicsPipelineCreateInfo<'_> {
        let d = self.desc;
        vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            flags: d.flags,
            stage_count: d.shader_stages.len() as u32,
            p_stages: d.shader_stages.as_ptr(),
            p_vertex_input_state: &self.vertex_input,
            p_input_assembly_state: &d.input_assembly,
            p_tessellation_state: &d.tessellation,
            p_viewport_state: &self.viewport,
            p_rasterization_state: &d.rasterization,
            p_multisample_state: &d.multisample,
            p_depth_stencil_state: &d.depth_stencil,
            p_color_blend_state: &self.color_blend,
            p_dynamic_state: &self.dynamic,
            layout: d.layout,
            render_pass: d.render_pass,
            subpass: d.subpass,
            base_pipeline_handle: d.base_pipeline,
            base_pipeline_index: d.base_pipeline_index,
            ..Default::default()
        }
    }
}

pub struct PipelineLayout {
    device: ash::Device,
    handle: vk::PipelineLayout,
}

impl PipelineLayout {
    pub fn new(device: &ash::Device, info: &vk::PipelineLayoutCreateInfo<'_>) -> VkResult<Self> {
        let handle = unsafe { device.create_pipeline_layout(info, None) }
            .native("vkCreatePipelineLayout")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    /// No descriptor sets, no push constants.
    pub fn empty(device: &ash::Device) -> VkResult<Self> {
        Self::new(device, &vk::PipelineLayoutCreateInfo::default())
    }

    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        if self.handle != vk::PipelineLayout::null() {
            unsafe { self.device.destroy_pipeline_layout(self.handle, None) };
        }
    }
}

pub struct Pipeline {
    device: ash::Device,
    handle: vk::Pipeline,
}

impl Pipeline {
    pub fn graphics(device: &ash::Device, linked: &LinkedPipelineInfo<'_>) -> VkResult<Self> {
        let info = linked.create_info();
        let handle = unsafe {
            device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&info),
                None,
            )
        }
        .map_err(|(_, code)| code)
        .native("vkCreateGraphicsPipelines")?
        .into_iter()
        .next()
        .unwrap_or_default();
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.handle != vk::Pipeline::null() {
            unsafe { self.device.destroy_pipeline(self.handle, None) };
        }
    }
}
