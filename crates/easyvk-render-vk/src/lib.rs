// SPDX-License-Identifier: CEPL-1.0
//! Vulkan context, RAII handles and the triangle renderer.
#![deny(unsafe_op_in_unsafe_fn)]

pub mod command;
pub mod context;
mod error;
pub mod events;
pub mod frame;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod sync;
pub mod triangle;

pub use ash::vk;
pub use command::{CommandBuffer, CommandPool};
pub use context::{ContextBuilder, GraphicsContext, QueueCapabilities, QueueFamilyIndices};
pub use error::{NativeResultExt, VkError, VkResult};
pub use events::{DeviceObserver, SwapchainImages, SwapchainObserver};
pub use frame::{run_frame, FrameBackend, FrameFence, FrameOutcome, FrameSync, FrameSyncObjects};
pub use pipeline::{LinkedPipelineInfo, Pipeline, PipelineDescriptor, PipelineLayout};
pub use render_pass::{Framebuffer, RenderPass, RenderPassBundle, ScreenPass};
pub use shader::{ShaderModule, ShaderPaths};
pub use sync::{Fence, Semaphore};
pub use triangle::TriangleRenderer;
