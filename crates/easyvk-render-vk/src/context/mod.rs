// SPDX-License-Identifier: CEPL-1.0
//! Instance, device, surface and swapchain ownership.
//!
//! Creation follows a fixed order: instance (with layers and extensions),
//! surface, physical device selection, logical device, swapchain. Each stage
//! reports `VkError::NotReady` until its prerequisites exist.
mod instance;
mod queues;
mod swapchain;

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::rc::Rc;

use ash::khr::{surface, swapchain as khr_swapchain};
use ash::{vk, Entry, Instance};
use easyvk_render::RenderSize;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, info, warn};

pub use instance::{ContextBuilder, NameList, VALIDATION_LAYER};
pub use queues::{select_queue_families, QueueCapabilities, QueueFamilyCache, QueueFamilyIndices};
pub use swapchain::{
    choose_composite_alpha, choose_image_usage, choose_present_mode, extent_from_caps,
    format_available, image_count, pick_surface_format, SwapchainParams,
};

use crate::events::{DeviceObserver, Observers, SwapchainImages, SwapchainObserver};
use crate::{NativeResultExt, VkError, VkResult};
use instance::DebugMessenger;
use swapchain::{build_swapchain, BuildTarget, Swapchain, SwapchainRequest};

struct SelectedDevice {
    handle: vk::PhysicalDevice,
    index: usize,
    families: QueueFamilyIndices,
    // graphics and present families, deduplicated
    sharing: Vec<u32>,
}

struct DeviceState {
    device: ash::Device,
    swapchain_loader: khr_swapchain::Device,
    graphics_queue: Option<vk::Queue>,
    present_queue: Option<vk::Queue>,
    compute_queue: Option<vk::Queue>,
    properties: vk::PhysicalDeviceProperties,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

pub struct GraphicsContext {
    entry: Entry,
    instance: Instance,
    api_version: u32,
    instance_layers: NameList,
    instance_extensions: NameList,
    debug: Option<DebugMessenger>,

    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    physical_devices: Vec<vk::PhysicalDevice>,
    selected: Option<SelectedDevice>,
    queue_cache: QueueFamilyCache,
    device_extensions: NameList,
    device: Option<DeviceState>,

    preferred_format: Option<vk::SurfaceFormatKHR>,
    available_formats: Vec<vk::SurfaceFormatKHR>,
    swapchain: Option<Swapchain>,

    device_events: Observers<dyn DeviceObserver>,
    swapchain_events: Observers<dyn SwapchainObserver>,
}

impl GraphicsContext {
    fn from_instance(
        entry: Entry,
        instance: Instance,
        api_version: u32,
        instance_layers: NameList,
        instance_extensions: NameList,
        device_extensions: NameList,
        debug: Option<DebugMessenger>,
    ) -> Self {
        let surface_loader = surface::Instance::new(&entry, &instance);
        Self {
            entry,
            instance,
            api_version,
            instance_layers,
            instance_extensions,
            debug,
            surface_loader,
            surface: vk::SurfaceKHR::null(),
            physical_devices: Vec::new(),
            selected: None,
            queue_cache: QueueFamilyCache::default(),
            device_extensions,
            device: None,
            preferred_format: None,
            available_formats: Vec::new(),
            swapchain: None,
            device_events: Observers::default(),
            swapchain_events: Observers::default(),
        }
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn instance_layers(&self) -> &NameList {
        &self.instance_layers
    }

    pub fn instance_extensions(&self) -> &NameList {
        &self.instance_extensions
    }

    // --- surface ---

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Takes ownership of `surface`. Only the first call has an effect.
    pub fn set_surface(&mut self, surface: vk::SurfaceKHR) {
        if self.surface == vk::SurfaceKHR::null() {
            self.surface = surface;
        } else {
            warn!("surface already set; ignoring");
        }
    }

    /// Creates the window surface. Must precede physical device selection so
    /// present support is checked against it.
    pub fn create_surface<W>(&mut self, window: &W) -> VkResult<vk::SurfaceKHR>
    where
        W: HasWindowHandle + HasDisplayHandle + ?Sized,
    {
        if self.surface != vk::SurfaceKHR::null() {
            return Ok(self.surface);
        }
        let dh = window.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();
        let surface =
            unsafe { ash_window::create_surface(&self.entry, &self.instance, dh, wh, None) }
                .native("vkCreateSurfaceKHR")?;
        self.surface = surface;
        Ok(surface)
    }

    // --- physical device ---

    /// Enumerates physical devices. Having none aborts.
    pub fn physical_devices(&mut self) -> VkResult<&[vk::PhysicalDevice]> {
        if self.physical_devices.is_empty() {
            let found = unsafe { self.instance.enumerate_physical_devices() }
                .native("vkEnumeratePhysicalDevices")?;
            if found.is_empty() {
                crate::error::fatal("no physical device supports Vulkan");
            }
            debug!("{} physical device(s)", found.len());
            self.physical_devices = found;
        }
        Ok(&self.physical_devices)
    }

    /// Selects device `index` if it exposes queue families for `want`.
    /// Present support is checked against the surface, which must exist when
    /// `want.present` is set. Results are memoized per device and capability set.
    pub fn determine_physical_device(
        &mut self,
        index: usize,
        want: QueueCapabilities,
    ) -> VkResult<()> {
        if want.present && self.surface == vk::SurfaceKHR::null() {
            return Err(VkError::NotReady("surface"));
        }
        self.physical_devices()?;
        let Some(&phys) = self.physical_devices.get(index) else {
            return Err(VkError::NoQueueFamilies { index });
        };

        let instance = &self.instance;
        let surface_loader = &self.surface_loader;
        let surface = self.surface;
        let found = self.queue_cache.resolve(index, want, || {
            let families =
                unsafe { instance.get_physical_device_queue_family_properties(phys) };
            select_queue_families(&families, want, |i| {
                unsafe { surface_loader.get_physical_device_surface_support(phys, i, surface) }
                    .native("vkGetPhysicalDeviceSurfaceSupportKHR")
            })
        })?;
        let Some(families) = found else {
            return Err(VkError::NoQueueFamilies { index });
        };

        debug!(index, ?families, "physical device selected");
        let sharing = QueueFamilyIndices {
            compute: None,
            ..families
        }
        .distinct();
        self.selected = Some(SelectedDevice {
            handle: phys,
            index,
            families,
            sharing,
        });
        Ok(())
    }

    /// First device that satisfies `want`; returns its index.
    pub fn select_physical_device(&mut self, want: QueueCapabilities) -> VkResult<usize> {
        let count = self.physical_devices()?.len();
        let mut last = VkError::NoQueueFamilies { index: 0 };
        for index in 0..count {
            match self.determine_physical_device(index, want) {
                Ok(()) => return Ok(index),
                Err(e @ VkError::NoQueueFamilies { .. }) => last = e,
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }

    pub fn physical_device(&self) -> Option<vk::PhysicalDevice> {
        self.selected.as_ref().map(|s| s.handle)
    }

    pub fn physical_device_index(&self) -> Option<usize> {
        self.selected.as_ref().map(|s| s.index)
    }

    pub fn queue_families(&self) -> Option<QueueFamilyIndices> {
        self.selected.as_ref().map(|s| s.families)
    }

    // --- logical device ---

    /// Records a device extension. After device creation this only warns.
    pub fn add_device_extension(&mut self, name: &CStr) {
        if self.device.is_some() {
            warn!("device already created; {name:?} will not be enabled");
            return;
        }
        self.device_extensions.add(name);
    }

    pub fn set_device_extensions<I: IntoIterator<Item = CString>>(&mut self, names: I) {
        if self.device.is_some() {
            warn!("device already created; extension list unchanged");
            return;
        }
        self.device_extensions.set(names);
    }

    pub fn device_extensions(&self) -> &NameList {
        &self.device_extensions
    }

    /// Requested device extensions the selected device does not provide.
    pub fn check_device_extensions(&self) -> VkResult<Vec<CString>> {
        let phys = self
            .physical_device()
            .ok_or(VkError::NotReady("physical device"))?;
        let props = unsafe { self.instance.enumerate_device_extension_properties(phys) }
            .native("vkEnumerateDeviceExtensionProperties")?;
        let names: Vec<&CStr> = props
            .iter()
            .map(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) })
            .collect();
        Ok(self.device_extensions.missing_from(names.iter().copied()))
    }

    /// One queue per distinct family, every supported core feature enabled.
    /// The swapchain extension is added whenever a present family was chosen.
    pub fn create_device(&mut self, flags: vk::DeviceCreateFlags) -> VkResult<()> {
        if self.device.is_some() {
            warn!("device already created");
            return Ok(());
        }
        let sel = self
            .selected
            .as_ref()
            .ok_or(VkError::NotReady("physical device"))?;
        let phys = sel.handle;
        let families = sel.families;
        if families.present.is_some() {
            self.device_extensions.add(khr_swapchain::NAME);
        }

        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .distinct()
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();
        let features = unsafe { self.instance.get_physical_device_features(phys) };
        let ext_ptrs = self.device_extensions.as_ptrs();

        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            flags,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            p_enabled_features: &features,
            ..Default::default()
        };
        let device = unsafe { self.instance.create_device(phys, &dinfo, None) }
            .native("vkCreateDevice")?;

        let queue = |family: Option<u32>| {
            family.map(|f| unsafe { device.get_device_queue(f, 0) })
        };
        let state = DeviceState {
            swapchain_loader: khr_swapchain::Device::new(&self.instance, &device),
            graphics_queue: queue(families.graphics),
            present_queue: queue(families.present),
            compute_queue: queue(families.compute),
            properties: unsafe { self.instance.get_physical_device_properties(phys) },
            memory_properties: unsafe {
                self.instance.get_physical_device_memory_properties(phys)
            },
            device,
        };
        let name = unsafe { CStr::from_ptr(state.properties.device_name.as_ptr()) };
        info!("Renderer: {}", name.to_string_lossy());

        let device = state.device.clone();
        self.device = Some(state);
        self.device_events
            .try_for_each(|o| o.device_created(&device))
    }

    pub fn device(&self) -> VkResult<&ash::Device> {
        self.device
            .as_ref()
            .map(|s| &s.device)
            .ok_or(VkError::NotReady("device"))
    }

    pub fn device_properties(&self) -> Option<&vk::PhysicalDeviceProperties> {
        self.device.as_ref().map(|s| &s.properties)
    }

    pub fn memory_properties(&self) -> Option<&vk::PhysicalDeviceMemoryProperties> {
        self.device.as_ref().map(|s| &s.memory_properties)
    }

    pub fn graphics_queue(&self) -> Option<vk::Queue> {
        self.device.as_ref().and_then(|s| s.graphics_queue)
    }

    pub fn present_queue(&self) -> Option<vk::Queue> {
        self.device.as_ref().and_then(|s| s.present_queue)
    }

    pub fn compute_queue(&self) -> Option<vk::Queue> {
        self.device.as_ref().and_then(|s| s.compute_queue)
    }

    pub fn wait_idle(&self) -> VkResult<()> {
        let d = self.device()?;
        unsafe { d.device_wait_idle() }.native("vkDeviceWaitIdle")
    }

    // --- observers ---

    pub fn subscribe_device(&mut self, observer: &Rc<RefCell<dyn DeviceObserver>>) {
        self.device_events.subscribe(observer);
    }

    pub fn subscribe_swapchain(&mut self, observer: &Rc<RefCell<dyn SwapchainObserver>>) {
        self.swapchain_events.subscribe(observer);
    }

    // --- surface formats ---

    pub fn available_surface_formats(&mut self) -> VkResult<&[vk::SurfaceFormatKHR]> {
        let phys = self
            .physical_device()
            .ok_or(VkError::NotReady("physical device"))?;
        if self.surface == vk::SurfaceKHR::null() {
            return Err(VkError::NotReady("surface"));
        }
        self.available_formats = unsafe {
            self.surface_loader
                .get_physical_device_surface_formats(phys, self.surface)
        }
        .native("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        Ok(&self.available_formats)
    }

    /// Prefers `format` for future swapchains and rebuilds an existing one.
    /// `UNDEFINED` accepts any format in the given color space.
    pub fn set_surface_format(&mut self, format: vk::SurfaceFormatKHR) -> VkResult<()> {
        if !format_available(self.available_surface_formats()?, format) {
            return Err(VkError::Native {
                call: "vkGetPhysicalDeviceSurfaceFormatsKHR",
                code: vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            });
        }
        self.preferred_format = Some(format);
        if let Some(sc) = self.swapchain.as_mut() {
            sc.request.preferred_format = Some(format);
            self.recreate_swapchain()?;
        }
        Ok(())
    }

    // --- swapchain ---

    /// Builds the first swapchain and notifies swapchain observers.
    /// `size_hint` is used only when the surface leaves the extent open.
    pub fn create_swapchain(
        &mut self,
        limit_frame_rate: bool,
        size_hint: RenderSize,
        flags: vk::SwapchainCreateFlagsKHR,
    ) -> VkResult<()> {
        if let Some(sc) = self.swapchain.as_mut() {
            sc.request.limit_frame_rate = limit_frame_rate;
            sc.request.size_hint = size_hint;
            sc.request.flags = flags;
            self.recreate_swapchain()?;
            return Ok(());
        }
        let request = SwapchainRequest {
            limit_frame_rate,
            size_hint,
            preferred_format: self.preferred_format,
            flags,
        };
        let caps = self.surface_capabilities()?;
        let sc = {
            let target =
                build_target(&self.device, &self.selected, &self.surface_loader, self.surface)?;
            unsafe { build_swapchain(&target, &caps, request, vk::SwapchainKHR::null(), 1) }?
        };
        let images = sc.info.clone();
        self.swapchain = Some(sc);
        self.swapchain_events
            .try_for_each(|o| o.swapchain_created(&images))
    }

    /// Rebuilds the swapchain with its original request. Returns `Ok(false)`
    /// without touching anything while the surface extent is zero.
    ///
    /// Order: queues idle, destroy observers, old views destroyed, new
    /// swapchain built from the old one, old swapchain destroyed, create
    /// observers.
    pub fn recreate_swapchain(&mut self) -> VkResult<bool> {
        if self.swapchain.is_none() {
            return Err(VkError::NotReady("swapchain"));
        }
        let caps = self.surface_capabilities()?;
        if caps.current_extent.width == 0 || caps.current_extent.height == 0 {
            debug!("surface extent is zero; swapchain rebuild deferred");
            return Ok(false);
        }
        self.wait_queues_idle()?;

        let target =
            build_target(&self.device, &self.selected, &self.surface_loader, self.surface)?;
        let Some(mut old) = self.swapchain.take() else {
            return Err(VkError::NotReady("swapchain"));
        };
        let slot = &mut self.swapchain;
        let result = self.swapchain_events.regenerate(|| unsafe {
            old.destroy_views(target.device);
            let built = build_swapchain(
                &target,
                &caps,
                old.request.clone(),
                old.handle,
                old.info.generation + 1,
            );
            target.swapchain_loader.destroy_swapchain(old.handle, None);
            let sc = built?;
            let images = sc.info.clone();
            *slot = Some(sc);
            Ok(images)
        });
        result.map(|_| true)
    }

    pub fn swapchain_images(&self) -> Option<&SwapchainImages> {
        self.swapchain.as_ref().map(|s| &s.info)
    }

    pub fn swapchain_handle(&self) -> Option<vk::SwapchainKHR> {
        self.swapchain.as_ref().map(|s| s.handle)
    }

    pub fn swapchain_image(&self, index: u32) -> Option<vk::Image> {
        self.swapchain
            .as_ref()
            .and_then(|s| s.images.get(index as usize).copied())
    }

    pub fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.swapchain.as_ref().map(|s| s.info.extent)
    }

    pub fn swapchain_format(&self) -> Option<vk::Format> {
        self.swapchain.as_ref().map(|s| s.info.format)
    }

    pub fn present_mode(&self) -> Option<vk::PresentModeKHR> {
        self.swapchain.as_ref().map(|s| s.present_mode)
    }

    pub fn current_image_index(&self) -> Option<u32> {
        self.swapchain.as_ref().map(|s| s.current_image)
    }

    /// Acquires the next image, signalling `image_available` when it is ready.
    ///
    /// An out-of-date swapchain is rebuilt and the acquire retried. A
    /// suboptimal one is rebuilt too, after an empty submit that waits on the
    /// semaphore so it is unsignaled again. `Ok(None)` when the rebuild is
    /// deferred because the surface has no area; the semaphore is then left
    /// unsignaled.
    pub fn swap_image(&mut self, image_available: vk::Semaphore) -> VkResult<Option<u32>> {
        loop {
            let (loader, handle) = {
                let dev = self.device.as_ref().ok_or(VkError::NotReady("device"))?;
                let sc = self
                    .swapchain
                    .as_ref()
                    .ok_or(VkError::NotReady("swapchain"))?;
                (dev.swapchain_loader.clone(), sc.handle)
            };
            let acquired = unsafe {
                loader.acquire_next_image(handle, u64::MAX, image_available, vk::Fence::null())
            };
            match acquired {
                Ok((index, false)) => {
                    if let Some(sc) = self.swapchain.as_mut() {
                        sc.current_image = index;
                    }
                    return Ok(Some(index));
                }
                Ok((_, true)) => {
                    debug!("swapchain suboptimal on acquire");
                    self.drain_semaphore(image_available)?;
                    if !self.recreate_swapchain()? {
                        return Ok(None);
                    }
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("swapchain out of date on acquire");
                    if !self.recreate_swapchain()? {
                        return Ok(None);
                    }
                }
                Err(code) => return Err(code).native("vkAcquireNextImageKHR"),
            }
        }
    }

    /// Submits one command buffer to the graphics queue. Null semaphores and
    /// fence are skipped. The wait happens at color attachment output.
    pub fn submit_graphics(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let dev = self.device.as_ref().ok_or(VkError::NotReady("device"))?;
        let queue = dev
            .graphics_queue
            .ok_or(VkError::NotReady("graphics queue"))?;
        let wait_stage = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let waits = [wait];
        let signals = [signal];
        let cmds = [cmd];
        let has_wait = wait != vk::Semaphore::null();
        let has_signal = signal != vk::Semaphore::null();
        let has_cmd = cmd != vk::CommandBuffer::null();
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: has_wait as u32,
            p_wait_semaphores: waits.as_ptr(),
            p_wait_dst_stage_mask: wait_stage.as_ptr(),
            command_buffer_count: has_cmd as u32,
            p_command_buffers: cmds.as_ptr(),
            signal_semaphore_count: has_signal as u32,
            p_signal_semaphores: signals.as_ptr(),
            ..Default::default()
        };
        unsafe { dev.device.queue_submit(queue, &[submit], fence) }.native("vkQueueSubmit")
    }

    /// Presents the current image once `render_finished` is signaled. An
    /// out-of-date or suboptimal swapchain is rebuilt afterwards.
    pub fn present_image(&mut self, render_finished: vk::Semaphore) -> VkResult<()> {
        let presented = {
            let dev = self.device.as_ref().ok_or(VkError::NotReady("device"))?;
            let queue = dev
                .present_queue
                .ok_or(VkError::NotReady("present queue"))?;
            let sc = self
                .swapchain
                .as_ref()
                .ok_or(VkError::NotReady("swapchain"))?;
            let waits = [render_finished];
            let swapchains = [sc.handle];
            let indices = [sc.current_image];
            let info = vk::PresentInfoKHR {
                s_type: vk::StructureType::PRESENT_INFO_KHR,
                wait_semaphore_count: (render_finished != vk::Semaphore::null()) as u32,
                p_wait_semaphores: waits.as_ptr(),
                swapchain_count: 1,
                p_swapchains: swapchains.as_ptr(),
                p_image_indices: indices.as_ptr(),
                ..Default::default()
            };
            unsafe { dev.swapchain_loader.queue_present(queue, &info) }
        };
        match presented {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("swapchain stale on present");
                self.recreate_swapchain().map(|_| ())
            }
            Err(code) => Err(code).native("vkQueuePresentKHR"),
        }
    }

    fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        let phys = self
            .physical_device()
            .ok_or(VkError::NotReady("physical device"))?;
        if self.surface == vk::SurfaceKHR::null() {
            return Err(VkError::NotReady("surface"));
        }
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(phys, self.surface)
        }
        .native("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")
    }

    fn wait_queues_idle(&self) -> VkResult<()> {
        let dev = self.device.as_ref().ok_or(VkError::NotReady("device"))?;
        if let Some(g) = dev.graphics_queue {
            unsafe { dev.device.queue_wait_idle(g) }.native("vkQueueWaitIdle")?;
        }
        if let Some(p) = dev.present_queue {
            if Some(p) != dev.graphics_queue {
                unsafe { dev.device.queue_wait_idle(p) }.native("vkQueueWaitIdle")?;
            }
        }
        Ok(())
    }

    fn drain_semaphore(&self, semaphore: vk::Semaphore) -> VkResult<()> {
        self.submit_graphics(
            vk::CommandBuffer::null(),
            semaphore,
            vk::Semaphore::null(),
            vk::Fence::null(),
        )
    }
}

fn build_target<'a>(
    device: &'a Option<DeviceState>,
    selected: &'a Option<SelectedDevice>,
    surface_loader: &'a surface::Instance,
    surface: vk::SurfaceKHR,
) -> VkResult<BuildTarget<'a>> {
    let dev = device.as_ref().ok_or(VkError::NotReady("device"))?;
    let sel = selected
        .as_ref()
        .ok_or(VkError::NotReady("physical device"))?;
    if surface == vk::SurfaceKHR::null() {
        return Err(VkError::NotReady("surface"));
    }
    Ok(BuildTarget {
        device: &dev.device,
        surface_loader,
        swapchain_loader: &dev.swapchain_loader,
        phys: sel.handle,
        surface,
        families: &sel.sharing,
    })
}

// STRICT TEARDOWN ORDER:
// - device_wait_idle()
// - swapchain observers told, then views and swapchain destroyed
// - device observers told, then device destroyed
// - surface after device; debug messenger, then instance last.
impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            if let Some(dev) = self.device.take() {
                dev.device.device_wait_idle().ok();
                if let Some(sc) = self.swapchain.take() {
                    self.swapchain_events.for_each(|o| o.swapchain_destroyed());
                    sc.destroy(&dev.device, &dev.swapchain_loader);
                }
                self.device_events
                    .for_each(|o| o.device_destroyed(&dev.device));
                dev.device.destroy_device(None);
            }
            if self.surface != vk::SurfaceKHR::null() {
                self.surface_loader.destroy_surface(self.surface, None);
            }
            if let Some(dbg) = self.debug.take() {
                dbg.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}
