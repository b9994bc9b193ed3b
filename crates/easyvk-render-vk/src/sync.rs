// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::{NativeResultExt, VkResult};

/// Owns one `VkFence`; destroyed on drop.
pub struct Fence {
    device: ash::Device,
    handle: vk::Fence,
}

impl Fence {
    pub fn new(device: &ash::Device, flags: vk::FenceCreateFlags) -> VkResult<Self> {
        let ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags,
            ..Default::default()
        };
        let handle = unsafe { device.create_fence(&ci, None) }.native("vkCreateFence")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    /// A fence that starts signaled, so the first wait on it returns at once.
    pub fn signaled(device: &ash::Device) -> VkResult<Self> {
        Self::new(device, vk::FenceCreateFlags::SIGNALED)
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.handle
    }

    pub fn wait(&self) -> VkResult<()> {
        unsafe {
            self.device
                .wait_for_fences(std::slice::from_ref(&self.handle), true, u64::MAX)
        }
        .native("vkWaitForFences")
    }

    pub fn reset(&self) -> VkResult<()> {
        unsafe { self.device.reset_fences(std::slice::from_ref(&self.handle)) }
            .native("vkResetFences")
    }

    /// Blocks until the GPU signals the fence, then unsignals it. Used at the
    /// top of a frame to keep the CPU at most one submission ahead.
    pub fn wait_and_reset(&self) -> VkResult<()> {
        self.wait()?;
        self.reset()
    }

    /// `true` when signaled.
    pub fn status(&self) -> VkResult<bool> {
        unsafe { self.device.get_fence_status(self.handle) }.native("vkGetFenceStatus")
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        if self.handle != vk::Fence::null() {
            unsafe { self.device.destroy_fence(self.handle, None) };
        }
    }
}

/// Owns one binary `VkSemaphore`; destroyed on drop.
pub struct Semaphore {
    device: ash::Device,
    handle: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: &ash::Device) -> VkResult<Self> {
        let ci = vk::SemaphoreCreateInfo::default();
        let handle = unsafe { device.create_semaphore(&ci, None) }.native("vkCreateSemaphore")?;
        Ok(Self {
            device: device.clone(),
            handle,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.handle
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        if self.handle != vk::Semaphore::null() {
            unsafe { self.device.destroy_semaphore(self.handle, None) };
        }
    }
}
