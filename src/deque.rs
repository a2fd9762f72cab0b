//! Doubly linked deque with stable handles.
//!
//! Elements live in an index arena and are linked through `prev`/`next`
//! handles, so a [`Handle`] returned by a push stays valid until that element
//! is removed. Positional access walks the list and costs O(index).

use std::fmt::Display;
use std::io::{self, Write};

use crate::tracing_helpers::error_log;

/// Position of one element in a [`Deque`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Handle(u32);

impl Handle {
    const NULL: Handle = Handle(u32::MAX);

    #[inline]
    fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    #[inline]
    fn into_option(self) -> Option<Handle> {
        (!self.is_null()).then_some(self)
    }
}

struct Link<T> {
    /// `None` once the slot is on the free list.
    data: Option<T>,
    prev: Handle,
    next: Handle,
}

pub struct Deque<T> {
    links: Vec<Link<T>>,
    free: Vec<u32>,
    front: Handle,
    back: Handle,
    len: usize,
}

impl<T> Deque<T> {
    pub fn new() -> Self {
        Self {
            links: Vec::new(),
            free: Vec::new(),
            front: Handle::NULL,
            back: Handle::NULL,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn alloc(&mut self, data: T, prev: Handle, next: Handle) -> Handle {
        let link = Link {
            data: Some(data),
            prev,
            next,
        };
        if let Some(idx) = self.free.pop() {
            self.links[idx as usize] = link;
            return Handle(idx);
        }
        let idx = self.links.len() as u32;
        assert_ne!(idx, Handle::NULL.0, "deque arena exhausted");
        self.links.push(link);
        Handle(idx)
    }

    #[inline]
    fn link(&self, h: Handle) -> &Link<T> {
        &self.links[h.0 as usize]
    }

    #[inline]
    fn link_mut(&mut self, h: Handle) -> &mut Link<T> {
        &mut self.links[h.0 as usize]
    }

    /// Handle of the element at `index`. Caller checks bounds.
    fn handle_at(&self, index: usize) -> Handle {
        debug_assert!(index < self.len);
        let mut current = self.front;
        for _ in 0..index {
            current = self.link(current).next;
        }
        current
    }

    pub fn push_front(&mut self, data: T) -> Handle {
        let h = self.alloc(data, Handle::NULL, self.front);
        if self.front.is_null() {
            self.back = h;
        } else {
            let front = self.front;
            self.link_mut(front).prev = h;
        }
        self.front = h;
        self.len += 1;
        h
    }

    pub fn push_back(&mut self, data: T) -> Handle {
        let h = self.alloc(data, self.back, Handle::NULL);
        if self.back.is_null() {
            self.front = h;
        } else {
            let back = self.back;
            self.link_mut(back).next = h;
        }
        self.back = h;
        self.len += 1;
        h
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let front = self.front.into_option()?;
        Some(self.unlink(front))
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let back = self.back.into_option()?;
        Some(self.unlink(back))
    }

    pub fn front(&self) -> Option<&T> {
        self.get(self.front.into_option()?)
    }

    pub fn back(&self) -> Option<&T> {
        self.get(self.back.into_option()?)
    }

    /// Element at `index`, counting from the front.
    ///
    /// # Panics
    ///
    /// If `index >= len()`.
    pub fn at(&self, index: usize) -> &T {
        self.check_index(index, self.len, "at");
        let h = self.handle_at(index);
        match self.link(h).data.as_ref() {
            Some(data) => data,
            None => unreachable!("linked slot {} has no data", h.0),
        }
    }

    /// Inserts so that the new element ends up at `index`.
    ///
    /// # Panics
    ///
    /// If `index > len()`.
    pub fn insert_at(&mut self, index: usize, data: T) -> Handle {
        self.check_index(index, self.len + 1, "insert_at");
        if index == 0 {
            return self.push_front(data);
        }
        if index == self.len {
            return self.push_back(data);
        }
        let next = self.handle_at(index);
        let prev = self.link(next).prev;
        let h = self.alloc(data, prev, next);
        self.link_mut(prev).next = h;
        self.link_mut(next).prev = h;
        self.len += 1;
        h
    }

    /// Removes and returns the element at `index`.
    ///
    /// # Panics
    ///
    /// If `index >= len()`.
    pub fn erase_at(&mut self, index: usize) -> T {
        self.check_index(index, self.len, "erase_at");
        let h = self.handle_at(index);
        self.unlink(h)
    }

    /// Removes and returns the element behind `handle`.
    ///
    /// # Panics
    ///
    /// If `handle` no longer refers to a live element.
    pub fn erase(&mut self, handle: Handle) -> T {
        if self.get(handle).is_none() {
            error_log!(?handle, "erase through stale deque handle");
            panic!("Deque::erase: stale handle {handle:?}");
        }
        self.unlink(handle)
    }

    fn unlink(&mut self, h: Handle) -> T {
        let (prev, next) = {
            let link = self.link(h);
            (link.prev, link.next)
        };
        if prev.is_null() {
            self.front = next;
        } else {
            self.link_mut(prev).next = next;
        }
        if next.is_null() {
            self.back = prev;
        } else {
            self.link_mut(next).prev = prev;
        }

        let link = self.link_mut(h);
        link.prev = Handle::NULL;
        link.next = Handle::NULL;
        let data = link.data.take();
        self.free.push(h.0);
        self.len -= 1;
        match data {
            Some(data) => data,
            None => unreachable!("unlinked slot {} had no data", h.0),
        }
    }

    fn check_index(&self, index: usize, bound: usize, op: &str) {
        if index >= bound {
            error_log!(index, len = self.len, op, "deque index out of bounds");
            panic!(
                "Deque::{op}: index {index} out of bounds for length {}",
                self.len
            );
        }
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.free.clear();
        self.front = Handle::NULL;
        self.back = Handle::NULL;
        self.len = 0;
    }

    // =========================================================================
    // Handle walk
    // =========================================================================

    pub fn first(&self) -> Option<Handle> {
        self.front.into_option()
    }

    pub fn next(&self, handle: Handle) -> Option<Handle> {
        self.get(handle)?;
        self.link(handle).next.into_option()
    }

    /// Element behind `handle`, or `None` if it has been removed.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.links.get(handle.0 as usize)?.data.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.links.get_mut(handle.0 as usize)?.data.as_mut()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            deque: self,
            current: self.front,
            remaining: self.len,
        }
    }
}

impl<T: Display> Deque<T> {
    /// Writes the elements front to back, then the size.
    pub fn print<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for item in self.iter() {
            write!(out, "{item} ")?;
        }
        writeln!(out, " (size={}) ", self.len)
    }
}

impl<T> Default for Deque<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Deque<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Extend<T> for Deque<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<T> FromIterator<T> for Deque<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut deque = Self::new();
        deque.extend(iter);
        deque
    }
}

pub struct Iter<'a, T> {
    deque: &'a Deque<T>,
    current: Handle,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let h = self.current.into_option()?;
        let link = self.deque.link(h);
        self.current = link.next;
        self.remaining -= 1;
        link.data.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(d: &Deque<u32>) -> Vec<u32> {
        d.iter().copied().collect()
    }

    #[test]
    fn test_push_pop_both_ends() {
        let mut d: Deque<u32> = Deque::new();
        d.push_back(2);
        d.push_front(1);
        d.push_back(3);
        assert_eq!(contents(&d), vec![1, 2, 3]);
        assert_eq!(d.front(), Some(&1));
        assert_eq!(d.back(), Some(&3));
        assert_eq!(d.len(), 3);

        assert_eq!(d.pop_front(), Some(1));
        assert_eq!(d.pop_back(), Some(3));
        assert_eq!(d.pop_back(), Some(2));
        assert_eq!(d.pop_back(), None);
        assert_eq!(d.pop_front(), None);
        assert!(d.is_empty());
        assert_eq!(d.front(), None);
        assert_eq!(d.back(), None);
    }

    #[test]
    fn test_positional_access() {
        let mut d: Deque<u32> = (0..5).collect();
        assert_eq!(*d.at(0), 0);
        assert_eq!(*d.at(4), 4);

        d.insert_at(0, 10);
        d.insert_at(6, 20);
        d.insert_at(3, 30);
        assert_eq!(contents(&d), vec![10, 0, 1, 30, 2, 3, 4, 20]);

        assert_eq!(d.erase_at(3), 30);
        assert_eq!(d.erase_at(0), 10);
        assert_eq!(d.erase_at(d.len() - 1), 20);
        assert_eq!(contents(&d), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_at_out_of_bounds_panics() {
        let d: Deque<u32> = (0..3).collect();
        d.at(3);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_insert_past_end_panics() {
        let mut d: Deque<u32> = Deque::new();
        d.insert_at(1, 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_erase_on_empty_panics() {
        let mut d: Deque<u32> = Deque::new();
        d.erase_at(0);
    }

    #[test]
    fn test_handles_survive_other_removals() {
        let mut d: Deque<u32> = Deque::new();
        let a = d.push_back(1);
        let b = d.push_back(2);
        let c = d.push_back(3);

        assert_eq!(d.erase(b), 2);
        assert_eq!(d.get(a), Some(&1));
        assert_eq!(d.get(c), Some(&3));
        assert_eq!(d.get(b), None);
        assert_eq!(d.next(a), Some(c));
        assert_eq!(d.next(c), None);

        *d.get_mut(c).expect("live") = 30;
        assert_eq!(d.erase(a), 1);
        assert_eq!(d.first(), Some(c));
        assert_eq!(contents(&d), vec![30]);
    }

    #[test]
    #[should_panic(expected = "stale handle")]
    fn test_erase_stale_handle_panics() {
        let mut d: Deque<u32> = Deque::new();
        let a = d.push_back(1);
        d.erase(a);
        d.erase(a);
    }

    #[test]
    fn test_handle_walk_and_erase_while_walking() {
        let mut d: Deque<u32> = (1..=6).collect();
        let mut cursor = d.first();
        while let Some(h) = cursor {
            cursor = d.next(h);
            if d.get(h).is_some_and(|v| v % 2 == 0) {
                d.erase(h);
            }
        }
        assert_eq!(contents(&d), vec![1, 3, 5]);
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut d: Deque<u32> = Deque::new();
        for i in 0..8 {
            d.push_back(i);
        }
        for _ in 0..8 {
            d.pop_front();
        }
        let cap = d.links.len();
        for i in 0..8 {
            d.push_front(i);
        }
        assert_eq!(d.links.len(), cap);
        assert_eq!(contents(&d), vec![7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_print_and_clear() {
        let mut d: Deque<u32> = (1..=3).collect();
        let mut out = Vec::new();
        d.print(&mut out).expect("write to Vec");
        assert_eq!(String::from_utf8(out).expect("utf8"), "1 2 3  (size=3) \n");

        d.clear();
        assert!(d.is_empty());
        assert_eq!(d.first(), None);
        assert_eq!(format!("{:?}", d), "[]");
    }

    #[test]
    fn test_randomized_against_vecdeque() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::VecDeque;

        let mut rng = StdRng::seed_from_u64(7);
        let mut d: Deque<u32> = Deque::new();
        let mut m: VecDeque<u32> = VecDeque::new();

        for _ in 0..5_000 {
            let v: u32 = rng.gen();
            match rng.gen_range(0..6) {
                0 => {
                    d.push_front(v);
                    m.push_front(v);
                }
                1 => {
                    d.push_back(v);
                    m.push_back(v);
                }
                2 => assert_eq!(d.pop_front(), m.pop_front()),
                3 => assert_eq!(d.pop_back(), m.pop_back()),
                4 => {
                    let idx = rng.gen_range(0..=m.len());
                    d.insert_at(idx, v);
                    m.insert(idx, v);
                }
                _ => {
                    if !m.is_empty() {
                        let idx = rng.gen_range(0..m.len());
                        assert_eq!(d.erase_at(idx), m.remove(idx).expect("in range"));
                    }
                }
            }
            assert_eq!(d.len(), m.len());
        }
        assert_eq!(contents(&d), m.into_iter().collect::<Vec<_>>());
    }
}
