//! 空闲槽位链表
//!
//! 空闲槽位按 FIFO 复用：刚删除的槽位挂到队尾，尽量推迟同一下标被
//! 再次分配。每个空闲槽位记住下一次分配要用的代数。
//! 由表级的一把 `IrqLock` 保护。

use crate::compat::{Box, Vec};
use crate::error::{Result, SemError};

use super::id::{generation_span, SemId};

pub(crate) struct FreeList {
    next: Box<[Option<u32>]>,
    next_generation: Box<[u32]>,
    head: Option<u32>,
    tail: Option<u32>,
    used: usize,
    generation_span: u32,
}

fn try_boxed<T>(len: usize, f: impl Fn(usize) -> T) -> Result<Box<[T]>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| SemError::NoMemory)?;
    v.extend((0..len).map(f));
    Ok(v.into_boxed_slice())
}

impl FreeList {
    /// 初始时所有槽位按下标顺序空闲，代数为 0
    pub fn new(capacity: usize) -> Result<Self> {
        let next = try_boxed(capacity, |i| {
            if i + 1 < capacity { Some((i + 1) as u32) } else { None }
        })?;
        let next_generation = try_boxed(capacity, |_| 0u32)?;
        Ok(Self {
            next,
            next_generation,
            head: if capacity > 0 { Some(0) } else { None },
            tail: capacity.checked_sub(1).map(|i| i as u32),
            used: 0,
            generation_span: generation_span(capacity.max(1)),
        })
    }

    /// 取出队首空闲槽位，并为它生成新句柄
    pub fn pop(&mut self) -> Option<SemId> {
        let index = self.head?;
        let slot = index as usize;
        self.head = self.next[slot].take();
        if self.head.is_none() {
            self.tail = None;
        }
        self.used += 1;
        Some(SemId::new(index, self.next_generation[slot]))
    }

    /// 归还槽位，下一次分配使用 `generation + 1`
    pub fn push(&mut self, id: SemId) {
        let index = id.index() as u32;
        let slot = id.index();
        self.next_generation[slot] = (id.generation() + 1) % self.generation_span;
        self.next[slot] = None;
        match self.tail {
            Some(tail) => self.next[tail as usize] = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.used -= 1;
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.next.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_in_index_order() {
        let mut list = FreeList::new(4).unwrap();
        for i in 0..4 {
            let id = list.pop().unwrap();
            assert_eq!(id.index(), i);
            assert_eq!(id.generation(), 0);
        }
        assert!(list.pop().is_none());
        assert_eq!(list.used(), 4);
    }

    #[test]
    fn test_push_bumps_generation_and_appends_to_tail() {
        let mut list = FreeList::new(2).unwrap();
        let a = list.pop().unwrap();
        list.push(a);
        // 槽位 1 先于刚归还的槽位 0 被复用
        assert_eq!(list.pop().unwrap().index(), 1);
        let again = list.pop().unwrap();
        assert_eq!(again.index(), a.index());
        assert_eq!(again.generation(), a.generation() + 1);
        assert_ne!(again, a);
    }

    #[test]
    fn test_single_slot_table() {
        let mut list = FreeList::new(1).unwrap();
        let first = list.pop().unwrap();
        assert!(list.pop().is_none());
        list.push(first);
        assert_eq!(list.used(), 0);
        let second = list.pop().unwrap();
        assert_eq!(second.index(), 0);
        assert_ne!(first, second);
    }

    #[test]
    fn test_generation_wraps_within_span() {
        let mut list = FreeList::new(1).unwrap();
        let span = list.generation_span;
        let last = SemId::new(0, span - 1);
        list.pop().unwrap();
        list.push(last);
        assert_eq!(list.pop().unwrap().generation(), 0);
    }
}
