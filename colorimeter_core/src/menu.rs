//! Menu pagination: a cursor over the ordered measurement list.
//!
//! Items are the built-in measurements, then calibration entries in load
//! order, then the trailing About sentinel. The viewport scrolls only as
//! far as needed to keep the cursor visible; it never recenters.

use crate::measurement::MeasurementName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Measurement(MeasurementName),
    About,
}

impl MenuEntry {
    pub fn label(&self) -> &str {
        match self {
            MenuEntry::Measurement(name) => name.label(),
            MenuEntry::About => "About",
        }
    }
}

#[derive(Debug)]
pub struct MenuNavigator {
    items: Vec<MenuEntry>,
    item_pos: usize,
    view_pos: usize,
    items_per_page: usize,
}

impl MenuNavigator {
    pub fn new(items: Vec<MenuEntry>) -> Self {
        debug_assert!(!items.is_empty(), "menu always has the About sentinel");
        Self {
            items,
            item_pos: 0,
            view_pos: 0,
            items_per_page: 1,
        }
    }

    /// Re-entering the menu puts the cursor back at the top and adopts the
    /// page size of the freshly created menu screen.
    pub fn reset(&mut self, items_per_page: usize) {
        self.item_pos = 0;
        self.view_pos = 0;
        self.items_per_page = items_per_page.max(1);
        self.check_invariants();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item_pos(&self) -> usize {
        self.item_pos
    }

    pub fn view_pos(&self) -> usize {
        self.view_pos
    }

    pub fn items_per_page(&self) -> usize {
        self.items_per_page
    }

    pub fn selected(&self) -> &MenuEntry {
        &self.items[self.item_pos]
    }

    pub fn items(&self) -> &[MenuEntry] {
        &self.items
    }

    /// The visible slice and the absolute index of its first item.
    pub fn window(&self) -> (usize, &[MenuEntry]) {
        let end = (self.view_pos + self.items_per_page).min(self.items.len());
        (self.view_pos, &self.items[self.view_pos..end])
    }

    /// Cursor row within the visible window.
    pub fn cursor_row(&self) -> usize {
        self.item_pos - self.view_pos
    }

    pub fn increment(&mut self) {
        if self.item_pos < self.items.len() - 1 {
            self.item_pos += 1;
        }
        if self.item_pos - self.view_pos > self.items_per_page - 1 {
            self.view_pos += 1;
        }
        self.check_invariants();
    }

    pub fn decrement(&mut self) {
        if self.item_pos > 0 {
            self.item_pos -= 1;
        }
        if self.item_pos < self.view_pos {
            self.view_pos -= 1;
        }
        self.check_invariants();
    }

    fn check_invariants(&self) {
        debug_assert!(self.view_pos <= self.item_pos);
        debug_assert!(self.item_pos < self.items.len());
        debug_assert!(self.item_pos - self.view_pos <= self.items_per_page - 1);
    }
}
