// SPDX-License-Identifier: CEPL-1.0
use std::collections::HashMap;

use ash::vk;

use crate::VkResult;

/// Which kinds of queue a device must expose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct QueueCapabilities {
    pub graphics: bool,
    pub present: bool,
    pub compute: bool,
}

impl QueueCapabilities {
    pub const ALL: Self = Self {
        graphics: true,
        present: true,
        compute: true,
    };

    pub const GRAPHICS_PRESENT: Self = Self {
        graphics: true,
        present: true,
        compute: false,
    };
}

/// Chosen family per capability; `None` where the capability was not asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
}

impl QueueFamilyIndices {
    /// Each family once, in graphics, present, compute order. One queue is
    /// requested per entry.
    pub fn distinct(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(3);
        for i in [self.graphics, self.present, self.compute].into_iter().flatten() {
            if !out.contains(&i) {
                out.push(i);
            }
        }
        out
    }

    fn satisfies(&self, want: QueueCapabilities) -> bool {
        (!want.graphics || self.graphics.is_some())
            && (!want.present || self.present.is_some())
            && (!want.compute || self.compute.is_some())
    }
}

/// Picks queue families for `want`.
///
/// A single family that covers every requested capability wins. Otherwise
/// graphics and compute try to share a family, and each remaining capability
/// takes the first family that supports it. `Ok(None)` when some requested
/// capability is not available at all.
pub fn select_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    want: QueueCapabilities,
    mut supports_present: F,
) -> VkResult<Option<QueueFamilyIndices>>
where
    F: FnMut(u32) -> VkResult<bool>,
{
    let mut caps = Vec::with_capacity(families.len());
    for (i, f) in families.iter().enumerate() {
        let i = i as u32;
        let present = want.present && supports_present(i)?;
        caps.push((
            i,
            want.graphics && f.queue_flags.contains(vk::QueueFlags::GRAPHICS),
            present,
            want.compute && f.queue_flags.contains(vk::QueueFlags::COMPUTE),
        ));
    }

    let covers_all = |&&(_, g, p, c): &&(u32, bool, bool, bool)| {
        (g || !want.graphics) && (p || !want.present) && (c || !want.compute)
    };
    if let Some(&(i, ..)) = caps.iter().find(covers_all) {
        let pick = |on: bool| on.then_some(i);
        return Ok(Some(QueueFamilyIndices {
            graphics: pick(want.graphics),
            present: pick(want.present),
            compute: pick(want.compute),
        }));
    }

    let mut out = QueueFamilyIndices::default();
    if want.graphics && want.compute {
        if let Some(&(i, ..)) = caps.iter().find(|(_, g, _, c)| *g && *c) {
            out.graphics = Some(i);
            out.compute = Some(i);
        }
    }
    for &(i, g, p, c) in &caps {
        if g && out.graphics.is_none() {
            out.graphics = Some(i);
        }
        if p && out.present.is_none() {
            out.present = Some(i);
        }
        if c && out.compute.is_none() {
            out.compute = Some(i);
        }
    }

    Ok(out.satisfies(want).then_some(out))
}

/// Remembers the outcome of queue-family selection per physical device and
/// capability set, so repeated lookups neither re-query the driver nor change
/// their answer. Failed queries are not remembered.
#[derive(Debug, Default)]
pub struct QueueFamilyCache {
    entries: HashMap<(usize, QueueCapabilities), Option<QueueFamilyIndices>>,
}

impl QueueFamilyCache {
    pub fn resolve<F>(
        &mut self,
        device_index: usize,
        want: QueueCapabilities,
        query: F,
    ) -> VkResult<Option<QueueFamilyIndices>>
    where
        F: FnOnce() -> VkResult<Option<QueueFamilyIndices>>,
    {
        if let Some(hit) = self.entries.get(&(device_index, want)) {
            return Ok(*hit);
        }
        let found = query()?;
        self.entries.insert((device_index, want), found);
        Ok(found)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
