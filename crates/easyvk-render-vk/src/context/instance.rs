// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_char, CStr, CString};

use ash::ext::debug_utils as ext_debug;
use ash::{vk, Entry};
use raw_window_handle::HasDisplayHandle;
use tracing::{debug, error, info, trace, warn};

use super::GraphicsContext;
use crate::{NativeResultExt, VkResult};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Ordered list of layer or extension names without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameList {
    names: Vec<CString>,
}

impl NameList {
    /// Returns false if `name` was already present.
    pub fn add(&mut self, name: &CStr) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_owned());
        true
    }

    pub fn contains(&self, name: &CStr) -> bool {
        self.names.iter().any(|n| n.as_c_str() == name)
    }

    /// Replaces the whole list, dropping repeats.
    pub fn set<I: IntoIterator<Item = CString>>(&mut self, names: I) {
        self.names.clear();
        for n in names {
            self.add(&n);
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CStr> {
        self.names.iter().map(CString::as_c_str)
    }

    /// Pointer array for a create info; valid while `self` is unchanged.
    pub fn as_ptrs(&self) -> Vec<*const c_char> {
        self.names.iter().map(|n| n.as_ptr()).collect()
    }

    /// Names in this list that `available` does not contain.
    pub fn missing_from<'a, I>(&self, available: I) -> Vec<CString>
    where
        I: IntoIterator<Item = &'a CStr> + Clone,
    {
        self.names
            .iter()
            .filter(|n| !available.clone().into_iter().any(|a| a == n.as_c_str()))
            .cloned()
            .collect()
    }
}

/// Instance-level setup: layers, extensions and API version, gathered before
/// the instance exists.
pub struct ContextBuilder {
    entry: Entry,
    app_name: CString,
    api_version: u32,
    layers: NameList,
    extensions: NameList,
    device_extensions: NameList,
    validation: bool,
}

impl ContextBuilder {
    /// Loads the Vulkan library. Validation follows the build profile.
    pub fn new(app_name: &str) -> VkResult<Self> {
        let entry = unsafe { Entry::load() }?;
        let app_name = CString::new(app_name.replace('\0', "")).unwrap_or_default();
        Ok(Self {
            entry,
            app_name,
            api_version: vk::API_VERSION_1_0,
            layers: NameList::default(),
            extensions: NameList::default(),
            device_extensions: NameList::default(),
            validation: cfg!(debug_assertions),
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn set_api_version(&mut self, version: u32) -> &mut Self {
        self.api_version = version;
        self
    }

    /// Raises the requested version to what the loader supports. 1.0 loaders
    /// lack the query and keep the current value.
    pub fn use_latest_api_version(&mut self) -> VkResult<u32> {
        let latest = unsafe { self.entry.try_enumerate_instance_version() }
            .native("vkEnumerateInstanceVersion")?;
        if let Some(v) = latest {
            self.api_version = v;
        }
        debug!(
            "instance API version {}.{}.{}",
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version)
        );
        Ok(self.api_version)
    }

    pub fn validation(&mut self, on: bool) -> &mut Self {
        self.validation = on;
        self
    }

    pub fn add_instance_layer(&mut self, name: &CStr) -> &mut Self {
        self.layers.add(name);
        self
    }

    pub fn add_instance_extension(&mut self, name: &CStr) -> &mut Self {
        self.extensions.add(name);
        self
    }

    pub fn add_device_extension(&mut self, name: &CStr) -> &mut Self {
        self.device_extensions.add(name);
        self
    }

    pub fn set_instance_layers<I: IntoIterator<Item = CString>>(&mut self, names: I) {
        self.layers.set(names);
    }

    pub fn set_instance_extensions<I: IntoIterator<Item = CString>>(&mut self, names: I) {
        self.extensions.set(names);
    }

    pub fn instance_layers(&self) -> &NameList {
        &self.layers
    }

    pub fn instance_extensions(&self) -> &NameList {
        &self.extensions
    }

    /// Adds the surface extensions the windowing system needs.
    pub fn add_window_extensions(&mut self, display: &dyn HasDisplayHandle) -> VkResult<()> {
        let raw = display.display_handle()?.as_raw();
        let exts = ash_window::enumerate_required_extensions(raw)
            .native("vkEnumerateInstanceExtensionProperties")?;
        for &p in exts {
            self.extensions.add(unsafe { CStr::from_ptr(p) });
        }
        Ok(())
    }

    /// Requested layers the loader does not know. Empty means all present.
    pub fn check_instance_layers(&self) -> VkResult<Vec<CString>> {
        let props = unsafe { self.entry.enumerate_instance_layer_properties() }
            .native("vkEnumerateInstanceLayerProperties")?;
        let names: Vec<&CStr> = props
            .iter()
            .map(|p| unsafe { CStr::from_ptr(p.layer_name.as_ptr()) })
            .collect();
        Ok(self.layers.missing_from(names.iter().copied()))
    }

    /// Requested extensions not provided by the implementation (or by `layer`).
    pub fn check_instance_extensions(&self, layer: Option<&CStr>) -> VkResult<Vec<CString>> {
        let props = unsafe { self.entry.enumerate_instance_extension_properties(layer) }
            .native("vkEnumerateInstanceExtensionProperties")?;
        let names: Vec<&CStr> = props
            .iter()
            .map(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) })
            .collect();
        Ok(self.extensions.missing_from(names.iter().copied()))
    }

    pub fn create_instance(mut self, flags: vk::InstanceCreateFlags) -> VkResult<GraphicsContext> {
        if self.validation {
            self.layers.add(VALIDATION_LAYER);
            self.extensions.add(ext_debug::NAME);
        }

        let app_info = vk::ApplicationInfo {
            s_type: vk::StructureType::APPLICATION_INFO,
            p_application_name: self.app_name.as_ptr(),
            application_version: 0,
            p_engine_name: self.app_name.as_ptr(),
            engine_version: 0,
            api_version: self.api_version,
            ..Default::default()
        };
        let layer_ptrs = self.layers.as_ptrs();
        let ext_ptrs = self.extensions.as_ptrs();
        let create_info = vk::InstanceCreateInfo {
            s_type: vk::StructureType::INSTANCE_CREATE_INFO,
            flags,
            p_application_info: &app_info,
            enabled_layer_count: layer_ptrs.len() as u32,
            pp_enabled_layer_names: layer_ptrs.as_ptr(),
            enabled_extension_count: ext_ptrs.len() as u32,
            pp_enabled_extension_names: ext_ptrs.as_ptr(),
            ..Default::default()
        };

        let instance = unsafe { self.entry.create_instance(&create_info, None) }
            .native("vkCreateInstance")?;
        info!(
            "Vulkan API version {}.{}.{}",
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version)
        );

        let debug = if self.validation {
            unsafe { create_debug_messenger(&self.entry, &instance) }
        } else {
            None
        };

        Ok(GraphicsContext::from_instance(
            self.entry,
            instance,
            self.api_version,
            self.layers,
            self.extensions,
            self.device_extensions,
            debug,
        ))
    }
}

pub(crate) struct DebugMessenger {
    loader: ext_debug::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// # Safety
    /// Must run before the owning instance is destroyed.
    pub unsafe fn destroy(self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.handle, None)
        };
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if data.is_null() || unsafe { (*data).p_message.is_null() } {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

/// A failure here is logged and otherwise ignored.
unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Option<DebugMessenger> {
    let loader = ext_debug::Instance::new(entry, instance);
    let ci = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    match unsafe { loader.create_debug_utils_messenger(&ci, None) } {
        Ok(handle) => Some(DebugMessenger { loader, handle }),
        Err(code) => {
            error!("failed to create a debug messenger: {code:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_list_drops_repeats_and_keeps_order() {
        let mut list = NameList::default();
        assert!(list.add(c"VK_KHR_surface"));
        assert!(list.add(c"VK_KHR_xcb_surface"));
        assert!(!list.add(c"VK_KHR_surface"));
        assert_eq!(list.len(), 2);
        let got: Vec<&CStr> = list.iter().collect();
        assert_eq!(got, [c"VK_KHR_surface", c"VK_KHR_xcb_surface"]);
    }

    #[test]
    fn set_replaces_and_dedups() {
        let mut list = NameList::default();
        list.add(c"old");
        list.set([c"a".to_owned(), c"b".to_owned(), c"a".to_owned()]);
        assert!(!list.contains(c"old"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn missing_reports_only_unavailable_names() {
        let mut list = NameList::default();
        list.add(VALIDATION_LAYER);
        list.add(c"VK_LAYER_MESA_overlay");
        let available = [c"VK_LAYER_MESA_overlay", c"VK_LAYER_LUNARG_api_dump"];
        let missing = list.missing_from(available.iter().copied());
        assert_eq!(missing, vec![VALIDATION_LAYER.to_owned()]);
    }

    #[test]
    fn pointer_array_matches_names() {
        let mut list = NameList::default();
        list.add(c"x");
        list.add(c"y");
        let ptrs = list.as_ptrs();
        assert_eq!(ptrs.len(), 2);
        assert_eq!(unsafe { CStr::from_ptr(ptrs[1]) }, c"y");
    }
}
