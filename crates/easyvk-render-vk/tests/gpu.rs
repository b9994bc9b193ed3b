// SPDX-License-Identifier: CEPL-1.0
//! Runs against a real Vulkan implementation. `cargo test -- --ignored`.
use easyvk_render_vk::{vk, ContextBuilder, Fence, GraphicsContext, QueueCapabilities};

fn headless() -> GraphicsContext {
    easyvk_core::init_tracing();
    let mut builder = ContextBuilder::new("easyvk-tests").unwrap();
    builder.validation(false);
    builder.use_latest_api_version().unwrap();
    let mut ctx = builder
        .create_instance(vk::InstanceCreateFlags::empty())
        .unwrap();
    ctx.select_physical_device(QueueCapabilities {
        graphics: true,
        ..Default::default()
    })
    .unwrap();
    ctx.create_device(vk::DeviceCreateFlags::empty()).unwrap();
    ctx
}

#[test]
#[ignore = "needs a Vulkan driver"]
fn fence_is_unsignaled_after_wait_and_reset() {
    let ctx = headless();
    let fence = Fence::signaled(ctx.device().unwrap()).unwrap();
    assert!(fence.status().unwrap());
    fence.wait_and_reset().unwrap();
    assert!(!fence.status().unwrap());
}

#[test]
#[ignore = "needs a Vulkan driver"]
fn headless_device_has_no_present_queue() {
    let ctx = headless();
    assert!(ctx.graphics_queue().is_some());
    assert!(ctx.present_queue().is_none());
    assert!(ctx.swapchain_images().is_none());
}
