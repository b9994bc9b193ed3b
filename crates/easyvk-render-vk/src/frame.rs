// SPDX-License-Identifier: CEPL-1.0
//! One frame of the render loop.
//!
//! A single fence bounds the CPU to one frame ahead of the GPU. The fence is
//! created signaled so the first wait returns immediately, and it is reset
//! right after that wait. Every path that leaves the frame after the reset
//! hands the fence back to the queue, either with the frame's submit or with
//! an empty one, so the next wait always has something to wait for.
use ash::vk;
use easyvk_render::WindowSystem;

use crate::context::GraphicsContext;
use crate::sync::{Fence, Semaphore};
use crate::{NativeResultExt, VkResult};

/// The native calls a frame is made of.
pub trait FrameBackend {
    /// Acquires an image and signals `image_available`; rebuilds the
    /// swapchain on the way when needed. `Ok(None)` when the rebuild had to
    /// be deferred (zero-sized surface); nothing is signaled then.
    fn swap_image(&mut self, image_available: vk::Semaphore) -> VkResult<Option<u32>>;

    /// `Ok(false)` when the rebuild was deferred (zero-sized surface).
    fn recreate_swapchain(&mut self) -> VkResult<bool>;

    fn begin_commands(&mut self, cmd: vk::CommandBuffer) -> VkResult<()>;

    fn end_commands(&mut self, cmd: vk::CommandBuffer) -> VkResult<()>;

    /// Null handles are left out of the submit.
    fn submit_graphics(
        &mut self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()>;

    fn present_image(&mut self, render_finished: vk::Semaphore) -> VkResult<()>;
}

/// The in-flight fence as the frame loop sees it.
pub trait FrameFence {
    fn handle(&self) -> vk::Fence;

    fn wait_and_reset(&self) -> VkResult<()>;
}

impl FrameFence for Fence {
    fn handle(&self) -> vk::Fence {
        Fence::handle(self)
    }

    fn wait_and_reset(&self) -> VkResult<()> {
        Fence::wait_and_reset(self)
    }
}

/// Semaphore handles of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
}

/// The fence and semaphores one frame in flight needs.
pub struct FrameSyncObjects {
    pub in_flight: Fence,
    pub image_available: Semaphore,
    pub render_finished: Semaphore,
}

impl FrameSyncObjects {
    pub fn new(device: &ash::Device) -> VkResult<Self> {
        Ok(Self {
            in_flight: Fence::signaled(device)?,
            image_available: Semaphore::new(device)?,
            render_finished: Semaphore::new(device)?,
        })
    }

    pub fn handles(&self) -> FrameSync {
        FrameSync {
            image_available: self.image_available.handle(),
            render_finished: self.render_finished.handle(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented { image_index: u32 },
    /// No image could be acquired because the surface has no area yet.
    Skipped,
    /// The window asked to close while the loop was waiting out a minimize.
    Closed,
}

// STRICT PER-FRAME ORDER:
// wait+reset fence -> block while minimized -> pending resize rebuild ->
// acquire -> begin -> record -> end -> submit(wait acquire, signal render,
// fence) -> present(wait render) -> poll events
pub fn run_frame<B, W, F, R>(
    backend: &mut B,
    window: &mut W,
    in_flight: &F,
    sync: FrameSync,
    cmd: vk::CommandBuffer,
    record: R,
) -> VkResult<FrameOutcome>
where
    B: FrameBackend + ?Sized,
    W: WindowSystem + ?Sized,
    F: FrameFence + ?Sized,
    R: FnOnce(vk::CommandBuffer, u32) -> VkResult<()>,
{
    in_flight.wait_and_reset()?;
    let fence = in_flight.handle();

    while window.is_minimized() {
        if window.should_close() {
            release_fence(backend, vk::Semaphore::null(), fence)?;
            return Ok(FrameOutcome::Closed);
        }
        window.wait_events();
    }

    let acquired = if window.take_resized() {
        backend
            .recreate_swapchain()
            .and_then(|_| backend.swap_image(sync.image_available))
    } else {
        backend.swap_image(sync.image_available)
    };
    let image_index = match acquired {
        Ok(Some(index)) => index,
        Ok(None) => {
            release_fence(backend, vk::Semaphore::null(), fence)?;
            window.poll_events();
            return Ok(FrameOutcome::Skipped);
        }
        Err(e) => {
            let _ = release_fence(backend, vk::Semaphore::null(), fence);
            return Err(e);
        }
    };

    let recorded = backend
        .begin_commands(cmd)
        .and_then(|_| record(cmd, image_index))
        .and_then(|_| backend.end_commands(cmd));
    if let Err(e) = recorded {
        // the acquire signaled `image_available`; consume it with the fence
        let _ = release_fence(backend, sync.image_available, fence);
        return Err(e);
    }

    backend.submit_graphics(cmd, sync.image_available, sync.render_finished, fence)?;
    backend.present_image(sync.render_finished)?;

    window.poll_events();
    Ok(FrameOutcome::Presented { image_index })
}

/// Empty submit that signals `fence` and waits out `pending`, if any.
fn release_fence<B>(backend: &mut B, pending: vk::Semaphore, fence: vk::Fence) -> VkResult<()>
where
    B: FrameBackend + ?Sized,
{
    backend.submit_graphics(vk::CommandBuffer::null(), pending, vk::Semaphore::null(), fence)
}

impl FrameBackend for GraphicsContext {
    fn swap_image(&mut self, image_available: vk::Semaphore) -> VkResult<Option<u32>> {
        GraphicsContext::swap_image(self, image_available)
    }

    fn recreate_swapchain(&mut self) -> VkResult<bool> {
        GraphicsContext::recreate_swapchain(self)
    }

    fn begin_commands(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe { self.device()?.begin_command_buffer(cmd, &info) }
            .native("vkBeginCommandBuffer")
    }

    fn end_commands(&mut self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device()?.end_command_buffer(cmd) }.native("vkEndCommandBuffer")
    }

    fn submit_graphics(
        &mut self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()> {
        GraphicsContext::submit_graphics(self, cmd, wait, signal, fence)
    }

    fn present_image(&mut self, render_finished: vk::Semaphore) -> VkResult<()> {
        GraphicsContext::present_image(self, render_finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use ash::vk::Handle;
    use easyvk_render::RenderSize;
    use raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    };

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        WaitReset(vk::Fence),
        Acquire { signal: vk::Semaphore },
        Recreate,
        Begin,
        Record(u32),
        End,
        Submit {
            cmd: vk::CommandBuffer,
            wait: vk::Semaphore,
            signal: vk::Semaphore,
            fence: vk::Fence,
        },
        Present { wait: vk::Semaphore },
    }

    type Log = Rc<RefCell<Vec<Call>>>;

    const FENCE: u64 = 1;
    const CMD: u64 = 4;

    /// Models the fence: waiting on it while unsignaled with nothing
    /// submitted would never return.
    struct MockFence {
        signaled: Rc<Cell<bool>>,
        calls: Log,
    }

    impl FrameFence for MockFence {
        fn handle(&self) -> vk::Fence {
            vk::Fence::from_raw(FENCE)
        }

        fn wait_and_reset(&self) -> VkResult<()> {
            assert!(self.signaled.get(), "wait on a fence nothing will signal");
            self.signaled.set(false);
            self.calls.borrow_mut().push(Call::WaitReset(self.handle()));
            Ok(())
        }
    }

    struct Recorder {
        calls: Log,
        fence_signaled: Rc<Cell<bool>>,
        next_image: u32,
        deferred_acquires: u32,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                calls: Rc::default(),
                fence_signaled: Rc::new(Cell::new(true)),
                next_image: 0,
                deferred_acquires: 0,
            }
        }

        fn fence(&self) -> MockFence {
            MockFence {
                signaled: self.fence_signaled.clone(),
                calls: self.calls.clone(),
            }
        }

        fn log(&self, call: Call) {
            self.calls.borrow_mut().push(call);
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.borrow().iter().filter(|c| pred(c)).count()
        }
    }

    impl FrameBackend for Recorder {
        fn swap_image(&mut self, image_available: vk::Semaphore) -> VkResult<Option<u32>> {
            self.log(Call::Acquire {
                signal: image_available,
            });
            if self.deferred_acquires > 0 {
                self.deferred_acquires -= 1;
                return Ok(None);
            }
            let i = self.next_image;
            self.next_image = (self.next_image + 1) % 3;
            Ok(Some(i))
        }

        fn recreate_swapchain(&mut self) -> VkResult<bool> {
            self.log(Call::Recreate);
            Ok(true)
        }

        fn begin_commands(&mut self, _cmd: vk::CommandBuffer) -> VkResult<()> {
            self.log(Call::Begin);
            Ok(())
        }

        fn end_commands(&mut self, _cmd: vk::CommandBuffer) -> VkResult<()> {
            self.log(Call::End);
            Ok(())
        }

        fn submit_graphics(
            &mut self,
            cmd: vk::CommandBuffer,
            wait: vk::Semaphore,
            signal: vk::Semaphore,
            fence: vk::Fence,
        ) -> VkResult<()> {
            if fence != vk::Fence::null() {
                assert!(!self.fence_signaled.get(), "submit with a signaled fence");
                self.fence_signaled.set(true);
            }
            self.log(Call::Submit {
                cmd,
                wait,
                signal,
                fence,
            });
            Ok(())
        }

        fn present_image(&mut self, render_finished: vk::Semaphore) -> VkResult<()> {
            self.log(Call::Present {
                wait: render_finished,
            });
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeWindow {
        minimized_polls: u32,
        waits: u32,
        polls: u32,
        resized: bool,
        close: bool,
    }

    impl HasWindowHandle for FakeWindow {
        fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
            Err(HandleError::Unavailable)
        }
    }

    impl HasDisplayHandle for FakeWindow {
        fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
            Err(HandleError::Unavailable)
        }
    }

    impl WindowSystem for FakeWindow {
        fn size(&self) -> RenderSize {
            RenderSize::new(1280, 720)
        }

        fn should_close(&self) -> bool {
            self.close
        }

        fn is_minimized(&self) -> bool {
            self.minimized_polls > 0
        }

        fn wait_events(&mut self) {
            self.waits += 1;
            self.minimized_polls = self.minimized_polls.saturating_sub(1);
        }

        fn poll_events(&mut self) {
            self.polls += 1;
        }

        fn take_resized(&mut self) -> bool {
            std::mem::take(&mut self.resized)
        }

        fn set_title(&mut self, _title: &str) {}
    }

    fn sync() -> FrameSync {
        FrameSync {
            image_available: vk::Semaphore::from_raw(2),
            render_finished: vk::Semaphore::from_raw(3),
        }
    }

    fn try_draw(b: &mut Recorder, w: &mut FakeWindow) -> VkResult<FrameOutcome> {
        let fence = b.fence();
        let log = b.calls.clone();
        run_frame(b, w, &fence, sync(), vk::CommandBuffer::from_raw(CMD), |_, i| {
            log.borrow_mut().push(Call::Record(i));
            Ok(())
        })
    }

    fn draw(b: &mut Recorder, w: &mut FakeWindow) -> FrameOutcome {
        try_draw(b, w).unwrap()
    }

    fn is_fence_release(c: &Call) -> bool {
        matches!(c, Call::Submit { cmd, .. } if *cmd == vk::CommandBuffer::null())
    }

    #[test]
    fn one_frame_submits_and_presents_once_with_chained_semaphores() {
        let mut b = Recorder::new();
        let mut w = FakeWindow::default();
        let s = sync();
        let fence = vk::Fence::from_raw(FENCE);

        let out = draw(&mut b, &mut w);
        assert_eq!(out, FrameOutcome::Presented { image_index: 0 });

        assert_eq!(b.count(|c| matches!(c, Call::Submit { .. })), 1);
        assert_eq!(b.count(|c| matches!(c, Call::Present { .. })), 1);
        assert_eq!(
            *b.calls.borrow(),
            [
                Call::WaitReset(fence),
                Call::Acquire {
                    signal: s.image_available
                },
                Call::Begin,
                Call::Record(0),
                Call::End,
                Call::Submit {
                    cmd: vk::CommandBuffer::from_raw(CMD),
                    wait: s.image_available,
                    signal: s.render_finished,
                    fence,
                },
                Call::Present {
                    wait: s.render_finished
                },
            ]
        );
        assert_eq!(w.polls, 1);
    }

    #[test]
    fn recorder_gets_the_command_buffer_and_acquired_index() {
        let mut b = Recorder::new();
        b.next_image = 2;
        let mut w = FakeWindow::default();
        let fence = b.fence();
        let cmd = vk::CommandBuffer::from_raw(CMD);
        let mut seen = None;
        run_frame(&mut b, &mut w, &fence, sync(), cmd, |c, i| {
            seen = Some((c, i));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, Some((cmd, 2)));
    }

    #[test]
    fn record_failure_consumes_the_acquire_and_frees_the_fence() {
        let mut b = Recorder::new();
        let mut w = FakeWindow::default();
        let fence = b.fence();
        let cmd = vk::CommandBuffer::from_raw(CMD);
        let err = run_frame(&mut b, &mut w, &fence, sync(), cmd, |_, _| {
            Err(crate::VkError::NotReady("framebuffer"))
        })
        .unwrap_err();
        assert!(matches!(err, crate::VkError::NotReady("framebuffer")));
        assert_eq!(b.count(|c| matches!(c, Call::Present { .. })), 0);
        assert_eq!(
            b.calls.borrow().last(),
            Some(&Call::Submit {
                cmd: vk::CommandBuffer::null(),
                wait: sync().image_available,
                signal: vk::Semaphore::null(),
                fence: vk::Fence::from_raw(FENCE),
            })
        );
        assert!(b.fence_signaled.get());

        assert_eq!(draw(&mut b, &mut w), FrameOutcome::Presented { image_index: 1 });
    }

    #[test]
    fn first_and_later_frames_never_wait_on_an_unsignaled_fence() {
        let mut b = Recorder::new();
        let mut w = FakeWindow::default();
        let images: Vec<_> = (0..5).map(|_| draw(&mut b, &mut w)).collect();
        assert_eq!(
            images,
            [0, 1, 2, 0, 1].map(|image_index| FrameOutcome::Presented { image_index })
        );
        assert_eq!(b.count(|c| matches!(c, Call::Submit { .. })), 5);
        assert_eq!(b.count(is_fence_release), 0);
    }

    #[test]
    fn deferred_acquire_skips_the_frame_and_the_loop_carries_on() {
        let mut b = Recorder::new();
        b.deferred_acquires = 1;
        let mut w = FakeWindow::default();

        assert_eq!(try_draw(&mut b, &mut w).unwrap(), FrameOutcome::Skipped);
        assert_eq!(b.count(|c| *c == Call::Begin), 0);
        assert_eq!(b.count(|c| matches!(c, Call::Present { .. })), 0);
        assert_eq!(b.count(is_fence_release), 1);
        assert!(b.fence_signaled.get());
        assert_eq!(w.polls, 1);

        assert_eq!(draw(&mut b, &mut w), FrameOutcome::Presented { image_index: 0 });
    }

    #[test]
    fn minimized_window_blocks_before_acquire() {
        let mut b = Recorder::new();
        let mut w = FakeWindow {
            minimized_polls: 3,
            ..Default::default()
        };
        draw(&mut b, &mut w);
        assert_eq!(w.waits, 3);
        assert!(matches!(b.calls.borrow()[1], Call::Acquire { .. }));
    }

    #[test]
    fn close_while_minimized_ends_without_drawing() {
        let mut b = Recorder::new();
        let mut w = FakeWindow {
            minimized_polls: 1,
            close: true,
            ..Default::default()
        };
        assert_eq!(draw(&mut b, &mut w), FrameOutcome::Closed);
        assert_eq!(b.count(|c| *c == Call::Begin), 0);
        assert_eq!(b.count(is_fence_release), 1);
        assert!(b.fence_signaled.get());
    }

    #[test]
    fn pending_resize_rebuilds_before_acquire() {
        let mut b = Recorder::new();
        let mut w = FakeWindow {
            resized: true,
            ..Default::default()
        };
        draw(&mut b, &mut w);
        assert_eq!(b.calls.borrow()[1], Call::Recreate);
        assert!(matches!(b.calls.borrow()[2], Call::Acquire { .. }));

        draw(&mut b, &mut w);
        assert_eq!(b.count(|c| *c == Call::Recreate), 1);
    }
}
