// SPDX-License-Identifier: CEPL-1.0
//! Observer lists for device and swapchain lifecycle.
//!
//! Observers are held weakly and invoked in registration order. An observer
//! that has been dropped is pruned the next time the list fires.
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use ash::vk;

use crate::VkResult;

/// The swapchain-dependent state handed to observers after each (re)creation.
#[derive(Clone, Debug, Default)]
pub struct SwapchainImages {
    pub generation: u64,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub views: Vec<vk::ImageView>,
}

impl SwapchainImages {
    pub fn count(&self) -> usize {
        self.views.len()
    }
}

pub trait SwapchainObserver {
    /// Release everything built on top of the old images. Runs before the
    /// old image views are destroyed.
    fn swapchain_destroyed(&mut self);

    fn swapchain_created(&mut self, images: &SwapchainImages) -> VkResult<()>;
}

pub trait DeviceObserver {
    fn device_created(&mut self, device: &ash::Device) -> VkResult<()>;

    fn device_destroyed(&mut self, device: &ash::Device);
}

pub struct Observers<O: ?Sized> {
    entries: Vec<Weak<RefCell<O>>>,
}

impl<O: ?Sized> Default for Observers<O> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<O: ?Sized> Observers<O> {
    pub fn subscribe(&mut self, observer: &Rc<RefCell<O>>) {
        self.entries.push(Rc::downgrade(observer));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls `f` on every live observer in registration order, stopping at
    /// the first error.
    pub fn try_for_each<F>(&mut self, mut f: F) -> VkResult<()>
    where
        F: FnMut(&mut O) -> VkResult<()>,
    {
        self.entries.retain(|w| w.strong_count() > 0);
        for weak in &self.entries {
            if let Some(rc) = weak.upgrade() {
                f(&mut *rc.borrow_mut())?;
            }
        }
        Ok(())
    }

    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut O),
    {
        let _ = self.try_for_each(|o| {
            f(o);
            Ok(())
        });
    }
}

impl Observers<dyn SwapchainObserver> {
    /// Runs one swapchain generation change: every destroy hook, then
    /// `rebuild`, then every create hook.
    pub fn regenerate<F>(&mut self, rebuild: F) -> VkResult<SwapchainImages>
    where
        F: FnOnce() -> VkResult<SwapchainImages>,
    {
        self.for_each(|o| o.swapchain_destroyed());
        let images = rebuild()?;
        self.try_for_each(|o| o.swapchain_created(&images))?;
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        seen: usize,
    }

    impl SwapchainObserver for Recorder {
        fn swapchain_destroyed(&mut self) {
            self.log.borrow_mut().push(format!("destroy {}", self.name));
        }

        fn swapchain_created(&mut self, images: &SwapchainImages) -> VkResult<()> {
            self.seen = images.count();
            self.log.borrow_mut().push(format!("create {}", self.name));
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Log) -> Rc<RefCell<Recorder>> {
        Rc::new(RefCell::new(Recorder {
            name,
            log: log.clone(),
            seen: 0,
        }))
    }

    fn images(n: u64) -> SwapchainImages {
        SwapchainImages {
            generation: 1,
            format: vk::Format::B8G8R8A8_UNORM,
            extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            views: (1..=n).map(vk::ImageView::from_raw).collect(),
        }
    }

    #[test]
    fn destroy_hooks_all_run_before_create_hooks() {
        let log: Log = Rc::default();
        let a = recorder("a", &log);
        let b = recorder("b", &log);
        let mut list: Observers<dyn SwapchainObserver> = Observers::default();
        let a_dyn: Rc<RefCell<dyn SwapchainObserver>> = a.clone();
        let b_dyn: Rc<RefCell<dyn SwapchainObserver>> = b.clone();
        list.subscribe(&a_dyn);
        list.subscribe(&b_dyn);

        let rebuild_log = log.clone();
        let got = list
            .regenerate(|| {
                rebuild_log.borrow_mut().push("rebuild".into());
                Ok(images(3))
            })
            .unwrap();

        assert_eq!(got.count(), 3);
        assert_eq!(
            *log.borrow(),
            ["destroy a", "destroy b", "rebuild", "create a", "create b"]
        );
        assert_eq!(a.borrow().seen, 3);
        assert_eq!(b.borrow().seen, 3);
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let log: Log = Rc::default();
        let mut list: Observers<dyn SwapchainObserver> = Observers::default();
        let keep: Rc<RefCell<dyn SwapchainObserver>> = recorder("keep", &log);
        {
            let gone: Rc<RefCell<dyn SwapchainObserver>> = recorder("gone", &log);
            list.subscribe(&gone);
        }
        list.subscribe(&keep);
        assert_eq!(list.len(), 2);

        list.regenerate(|| Ok(images(2))).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(*log.borrow(), ["destroy keep", "create keep"]);
    }

    #[test]
    fn failed_rebuild_skips_create_hooks() {
        let log: Log = Rc::default();
        let mut list: Observers<dyn SwapchainObserver> = Observers::default();
        let a: Rc<RefCell<dyn SwapchainObserver>> = recorder("a", &log);
        list.subscribe(&a);

        let err = list
            .regenerate(|| {
                Err(crate::VkError::Native {
                    call: "vkCreateSwapchainKHR",
                    code: vk::Result::ERROR_SURFACE_LOST_KHR,
                })
            })
            .unwrap_err();
        assert_eq!(err.code(), Some(vk::Result::ERROR_SURFACE_LOST_KHR));
        assert_eq!(*log.borrow(), ["destroy a"]);
    }
}
