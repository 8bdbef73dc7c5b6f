//! Site registry: partitions configured tabs into rotating and hidden views.
//!
//! The registry is built once per session. Tab order is significant: it is
//! both the rotation order and the manual swipe order. The tab → view mapping
//! never changes afterwards; reconfiguration means a restart.

use crate::config::Site;
use kiosk_protocol::{ViewStack, ViewTarget};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteDuration {
    Rotate(u64),
    Manual,
    Hidden,
}

impl SiteDuration {
    pub fn from_config(duration: i64) -> Self {
        match duration {
            d if d > 0 => SiteDuration::Rotate(d as u64),
            -1 => SiteDuration::Hidden,
            _ => SiteDuration::Manual,
        }
    }

    pub fn rotates(&self) -> bool {
        matches!(self, SiteDuration::Rotate(_))
    }
}

/// Position of a view in one of the two stacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewSlot {
    Visible(usize),
    Hidden(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRef {
    pub tab_index: usize,
    /// URL to load, credentials included.
    pub url: String,
    /// Configured URL without credentials, for status output.
    pub display_url: String,
    pub duration: SiteDuration,
}

#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    visible: Vec<ViewRef>,
    hidden: Vec<ViewRef>,
    tab_to_view: HashMap<usize, ViewSlot>,
}

impl SiteRegistry {
    pub fn load(tabs: &[Site]) -> Self {
        let mut registry = SiteRegistry::default();

        for (tab_index, site) in tabs.iter().enumerate() {
            if site.duration < -1 {
                tracing::warn!(
                    tab_index,
                    duration = site.duration,
                    "Negative site duration other than -1; treating as manual"
                );
            }
            let view = ViewRef {
                tab_index,
                url: site.resolved_url(),
                display_url: site.display_url(),
                duration: SiteDuration::from_config(site.duration),
            };
            let slot = if view.duration == SiteDuration::Hidden {
                registry.hidden.push(view);
                ViewSlot::Hidden(registry.hidden.len() - 1)
            } else {
                registry.visible.push(view);
                ViewSlot::Visible(registry.visible.len() - 1)
            };
            registry.tab_to_view.insert(tab_index, slot);
        }

        tracing::debug!(
            visible = registry.visible.len(),
            hidden = registry.hidden.len(),
            "Site registry loaded"
        );
        registry
    }

    pub fn visible(&self) -> &[ViewRef] {
        &self.visible
    }

    pub fn hidden(&self) -> &[ViewRef] {
        &self.hidden
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.hidden.is_empty()
    }

    /// Translates a configuration tab index into its view slot.
    pub fn view_for_tab(&self, tab_index: usize) -> Option<ViewSlot> {
        self.tab_to_view.get(&tab_index).copied()
    }

    pub fn get(&self, slot: ViewSlot) -> Option<&ViewRef> {
        match slot {
            ViewSlot::Visible(index) => self.visible.get(index),
            ViewSlot::Hidden(index) => self.hidden.get(index),
        }
    }

    /// Target for `AttachView`; the only place the credentialed URL leaves.
    pub fn target(&self, slot: ViewSlot) -> Option<ViewTarget> {
        let view = self.get(slot)?;
        Some(Self::build_target(slot, view, view.url.clone()))
    }

    /// Same target with credentials stripped, for snapshots.
    pub fn display_target(&self, slot: ViewSlot) -> Option<ViewTarget> {
        let view = self.get(slot)?;
        Some(Self::build_target(slot, view, view.display_url.clone()))
    }

    fn build_target(slot: ViewSlot, view: &ViewRef, url: String) -> ViewTarget {
        let (stack, index) = match slot {
            ViewSlot::Visible(index) => (ViewStack::Visible, index),
            ViewSlot::Hidden(index) => (ViewStack::Hidden, index),
        };
        ViewTarget {
            stack,
            index,
            tab_index: view.tab_index,
            url,
        }
    }

    /// Next visible site with `duration > 0` after `current`, wrapping.
    ///
    /// Returns `None` when a full cycle finds no other rotating site.
    pub fn next_rotating(&self, current: usize) -> Option<usize> {
        let len = self.visible.len();
        if len == 0 {
            return None;
        }
        (1..len)
            .map(|offset| (current + offset) % len)
            .find(|&index| self.visible[index].duration.rotates())
    }

    /// Manual swipe forward through every visible site.
    pub fn next_visible(&self, current: usize) -> Option<usize> {
        match self.visible.len() {
            0 => None,
            len => Some((current + 1) % len),
        }
    }

    /// Manual swipe backward through every visible site.
    pub fn previous_visible(&self, current: usize) -> Option<usize> {
        match self.visible.len() {
            0 => None,
            len => Some((current + len - 1) % len),
        }
    }
}
