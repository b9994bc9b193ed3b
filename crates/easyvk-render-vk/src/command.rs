// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::{NativeResultExt, VkResult};

pub struct CommandPool {
    device: ash::Device,
    handle: vk::CommandPool,
}

impl CommandPool {
    pub fn new(
        device: &ash::Device,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<Self> {
        let ci = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            queue_family_index: queue_family,
            flags,
            ..Default::default()
        };
        let handle =
            unsafe { device.create_command_pool(&ci, None) }.native("vkCreateCommandPool")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    pub fn allocate_buffers(
        &self,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> VkResult<Vec<CommandBuffer>> {
        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.handle,
            level,
            command_buffer_count: count,
            ..Default::default()
        };
        let raw = unsafe { self.device.allocate_command_buffers(&ai) }
            .native("vkAllocateCommandBuffers")?;
        Ok(raw
            .into_iter()
            .map(|handle| CommandBuffer {
                device: self.device.clone(),
                pool: self.handle,
                handle,
            })
            .collect())
    }

    pub fn allocate_primary(&self) -> VkResult<CommandBuffer> {
        self.allocate_buffers(vk::CommandBufferLevel::PRIMARY, 1)?
            .pop()
            .ok_or(crate::VkError::NotReady("command buffer"))
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        if self.handle != vk::CommandPool::null() {
            unsafe { self.device.destroy_command_pool(self.handle, None) };
        }
    }
}

/// A primary or secondary command buffer. Freed back to its pool on drop, so
/// it must be dropped before the pool.
pub struct CommandBuffer {
    device: ash::Device,
    pool: vk::CommandPool,
    handle: vk::CommandBuffer,
}

impl CommandBuffer {
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn begin(&self, usage: vk::CommandBufferUsageFlags) -> VkResult<()> {
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: usage,
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(self.handle, &bi) }
            .native("vkBeginCommandBuffer")
    }

    pub fn end(&self) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(self.handle) }.native("vkEndCommandBuffer")
    }
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        if self.handle != vk::CommandBuffer::null() {
            unsafe {
                self.device
                    .free_command_buffers(self.pool, std::slice::from_ref(&self.handle))
            };
        }
    }
}
