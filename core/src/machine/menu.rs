//! Custom menu items (`menuitem(idx, label, callback)`), up to 5 slots.
//! Stored behind opaque `slotmap` handles rather than raw script
//! pointers/closures, per spec.md §9's design note, so the script bridge
//! retains exclusive ownership and can free them on reset.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Opaque handle to a script-level callback, owned exclusively by
    /// the script bridge (spec.md §9 "Custom menu items ... store
    /// callables as opaque ScriptCallbackHandles").
    pub struct MenuHandle;
}

/// A single custom menu item: a label plus an opaque callback handle the
/// script bridge resolves when the item is activated.
#[derive(Debug, Clone)]
pub struct CustomMenuItem {
    pub index: u8,
    pub label: String,
    pub callback: MenuHandle,
}

/// Up to 5 custom menu item slots (spec.md §3 "CustomMenuItem (x5)").
pub struct MenuItems {
    slots: SlotMap<MenuHandle, CustomMenuItem>,
}

pub const MAX_MENU_ITEMS: usize = 5;

impl MenuItems {
    pub fn new() -> Self {
        MenuItems { slots: SlotMap::with_key() }
    }

    /// Registers or replaces a menu item. Returns `None` if all 5 slots
    /// are full and `index` doesn't match an existing item.
    pub fn set(&mut self, index: u8, label: String, callback: MenuHandle) -> Option<MenuHandle> {
        if let Some((existing, item)) = self.slots.iter_mut().find(|(_, i)| i.index == index) {
            item.label = label;
            item.callback = callback;
            return Some(existing);
        }
        if self.slots.len() >= MAX_MENU_ITEMS {
            return None;
        }
        Some(self.slots.insert_with_key(|key| CustomMenuItem { index, label, callback: key }))
    }

    pub fn remove(&mut self, index: u8) {
        if let Some(key) = self.slots.iter().find(|(_, i)| i.index == index).map(|(k, _)| k) {
            self.slots.remove(key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CustomMenuItem> {
        self.slots.values()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

impl Default for MenuItems {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_and_lookup() {
        let mut items = MenuItems::new();
        let mut slots = SlotMap::<MenuHandle, ()>::with_key();
        let cb = slots.insert(());
        items.set(0, "Restart".into(), cb);
        assert_eq!(items.iter().count(), 1);
    }

    #[test]
    fn caps_at_five_new_indices() {
        let mut items = MenuItems::new();
        let mut slots = SlotMap::<MenuHandle, ()>::with_key();
        for i in 0..6u8 {
            let cb = slots.insert(());
            items.set(i, format!("item{i}"), cb);
        }
        assert_eq!(items.iter().count(), MAX_MENU_ITEMS);
    }
}
