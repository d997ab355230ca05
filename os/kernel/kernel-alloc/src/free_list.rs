//! Intrusive doubly linked list of free blocks.
//!
//! A block on the list carries its own links in its first eight bytes:
//!
//! ```text
//! +-----------+-----------+------------------------+
//! | prev: u32 | next: u32 |   rest of the block    |
//! +-----------+-----------+------------------------+
//! ^ block
//! ```
//!
//! Links are virtual addresses, `0` ends the chain. The list itself only keeps
//! head, tail and length; every link access goes through a [`LinkStore`], so
//! the list works on whatever memory the store reaches (an address space's
//! mapped pages in the allocator, a plain map in tests).

use kernel_memory_addresses::VirtualAddress;

/// Bytes at the start of a free block that hold its links.
pub const LINK_BYTES: u32 = 8;

const PREV: u32 = 0;
const NEXT: u32 = 4;

/// Word-sized access to the memory the linked blocks live in.
pub trait LinkStore {
    fn load_link(&self, at: VirtualAddress) -> u32;
    fn store_link(&self, at: VirtualAddress, value: u32);
}

impl<S: LinkStore> LinkStore for &S {
    fn load_link(&self, at: VirtualAddress) -> u32 {
        (**self).load_link(at)
    }

    fn store_link(&self, at: VirtualAddress, value: u32) {
        (**self).store_link(at, value);
    }
}

#[inline]
fn encode(node: Option<VirtualAddress>) -> u32 {
    node.map_or(0, VirtualAddress::as_u32)
}

#[inline]
fn decode(raw: u32) -> Option<VirtualAddress> {
    (raw != 0).then(|| VirtualAddress::new(raw))
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct FreeList {
    head: Option<VirtualAddress>,
    tail: Option<VirtualAddress>,
    len: u32,
}

impl FreeList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Forget every member. The blocks themselves are not touched.
    pub const fn init(&mut self) {
        *self = Self::new();
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn head(&self) -> Option<VirtualAddress> {
        self.head
    }

    fn prev<S: LinkStore>(store: &S, node: VirtualAddress) -> Option<VirtualAddress> {
        decode(store.load_link(node + PREV))
    }

    fn next<S: LinkStore>(store: &S, node: VirtualAddress) -> Option<VirtualAddress> {
        decode(store.load_link(node + NEXT))
    }

    /// Link `node` in at the tail.
    pub fn append<S: LinkStore>(&mut self, store: &S, node: VirtualAddress) {
        debug_assert!(!node.is_null(), "null block on a free list");
        store.store_link(node + PREV, encode(self.tail));
        store.store_link(node + NEXT, 0);
        match self.tail {
            Some(tail) => store.store_link(tail + NEXT, node.as_u32()),
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
    }

    /// Unlink the head and return it.
    pub fn pop_front<S: LinkStore>(&mut self, store: &S) -> Option<VirtualAddress> {
        let head = self.head?;
        self.remove(store, head);
        Some(head)
    }

    /// Unlink `node`, which must be a member.
    pub fn remove<S: LinkStore>(&mut self, store: &S, node: VirtualAddress) {
        let prev = Self::prev(store, node);
        let next = Self::next(store, node);
        match prev {
            Some(p) => store.store_link(p + NEXT, encode(next)),
            None => {
                debug_assert_eq!(self.head, Some(node), "{node} is not on this list");
                self.head = next;
            }
        }
        match next {
            Some(n) => store.store_link(n + PREV, encode(prev)),
            None => self.tail = prev,
        }
        self.len -= 1;
    }

    /// Walk the chain looking for `node`.
    pub fn contains<S: LinkStore>(&self, store: &S, node: VirtualAddress) -> bool {
        self.iter(store).any(|member| member == node)
    }

    /// Members from head to tail.
    pub fn iter<'s, S: LinkStore>(
        &self,
        store: &'s S,
    ) -> impl Iterator<Item = VirtualAddress> + use<'s, S> {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let node = cursor?;
            cursor = Self::next(store, node);
            Some(node)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapStore(RefCell<BTreeMap<u32, u32>>);

    impl LinkStore for MapStore {
        fn load_link(&self, at: VirtualAddress) -> u32 {
            self.0.borrow().get(&at.as_u32()).copied().unwrap_or(0xDEAD_BEEF)
        }

        fn store_link(&self, at: VirtualAddress, value: u32) {
            self.0.borrow_mut().insert(at.as_u32(), value);
        }
    }

    fn va(v: u32) -> VirtualAddress {
        VirtualAddress::new(v)
    }

    fn members(list: &FreeList, store: &MapStore) -> Vec<u32> {
        list.iter(store).map(VirtualAddress::as_u32).collect()
    }

    #[test]
    fn append_and_pop_are_fifo() {
        let store = MapStore::default();
        let mut list = FreeList::new();
        assert!(list.is_empty());
        for a in [0x1000, 0x1010, 0x1020] {
            list.append(&store, va(a));
        }
        assert_eq!(list.len(), 3);
        assert_eq!(members(&list, &store), [0x1000, 0x1010, 0x1020]);
        assert_eq!(list.pop_front(&store), Some(va(0x1000)));
        assert_eq!(list.pop_front(&store), Some(va(0x1010)));
        assert_eq!(list.pop_front(&store), Some(va(0x1020)));
        assert_eq!(list.pop_front(&store), None);
        assert!(list.is_empty());
    }

    #[test]
    fn links_live_inside_the_blocks() {
        let store = MapStore::default();
        let mut list = FreeList::new();
        list.append(&store, va(0x2000));
        list.append(&store, va(0x3000));
        assert_eq!(store.load_link(va(0x2000)), 0);
        assert_eq!(store.load_link(va(0x2004)), 0x3000);
        assert_eq!(store.load_link(va(0x3000)), 0x2000);
        assert_eq!(store.load_link(va(0x3004)), 0);
    }

    #[test]
    fn remove_from_middle_head_and_tail() {
        let store = MapStore::default();
        let mut list = FreeList::new();
        for a in [0x10, 0x20, 0x30, 0x40] {
            list.append(&store, va(a));
        }
        list.remove(&store, va(0x20));
        assert_eq!(members(&list, &store), [0x10, 0x30, 0x40]);
        list.remove(&store, va(0x10));
        assert_eq!(members(&list, &store), [0x30, 0x40]);
        list.remove(&store, va(0x40));
        assert_eq!(members(&list, &store), [0x30]);
        assert_eq!(list.head(), Some(va(0x30)));

        list.append(&store, va(0x50));
        assert_eq!(members(&list, &store), [0x30, 0x50]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn membership() {
        let store = MapStore::default();
        let mut list = FreeList::new();
        list.append(&store, va(0x100));
        list.append(&store, va(0x200));
        assert!(list.contains(&store, va(0x200)));
        assert!(!list.contains(&store, va(0x300)));
        list.init();
        assert!(!list.contains(&store, va(0x100)));
        assert_eq!(list.len(), 0);
    }
}
