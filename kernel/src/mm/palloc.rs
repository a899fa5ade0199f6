//! Page pool — битовая карта над непрерывным диапазоном страниц
//! Page pool — a bitmap over a contiguous range of page frames
//!
//! Один бит на страницу: 1 = занята, 0 = свободна.
//! One bit per page: 1 = used, 0 = free.
//!
//! Поиск свободной страницы начинается с последней выделенной
//! (next-fit), чтобы не сканировать занятое начало каждый раз.
//! The search starts from the last allocation (next-fit) so the busy
//! front of the pool isn't rescanned every time.

use alloc::vec;
use alloc::vec::Vec;

use super::{PageAllocator, PhysAddr, PAGE_SIZE};

pub struct PagePool {
    base:  PhysAddr,
    pages: usize,
    used:  Vec<u64>,
    free:  usize,
    hint:  usize,
}

impl PagePool {
    /// Пул из `pages` страниц начиная с `base` (выровнен по странице).
    /// Pool of `pages` pages starting at page-aligned `base`.
    pub fn new(base: PhysAddr, pages: usize) -> Self {
        assert!(base.is_page_aligned(), "page pool base {:#x} not aligned", base.as_u64());
        Self {
            base,
            pages,
            used: vec![0; pages.div_ceil(64)],
            free: pages,
            hint: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.pages
    }

    pub fn free_pages(&self) -> usize {
        self.free
    }

    fn is_used(&self, idx: usize) -> bool {
        self.used[idx / 64] & (1 << (idx % 64)) != 0
    }

    fn index_of(&self, page: PhysAddr) -> usize {
        let offset = page
            .as_u64()
            .checked_sub(self.base.as_u64())
            .unwrap_or_else(|| panic!("page {:#x} below pool base", page.as_u64()));
        assert!(page.is_page_aligned(), "page {:#x} not aligned", page.as_u64());
        let idx = (offset / PAGE_SIZE as u64) as usize;
        assert!(idx < self.pages, "page {:#x} outside pool", page.as_u64());
        idx
    }
}

impl PageAllocator for PagePool {
    fn alloc_page(&mut self) -> Option<PhysAddr> {
        if self.free == 0 {
            return None;
        }

        let idx = (0..self.pages)
            .map(|i| (self.hint + i) % self.pages)
            .find(|&i| !self.is_used(i))?;

        self.used[idx / 64] |= 1 << (idx % 64);
        self.free -= 1;
        self.hint = idx + 1;
        Some(PhysAddr::new(self.base.as_u64() + (idx * PAGE_SIZE) as u64))
    }

    fn free_page(&mut self, page: PhysAddr) {
        let idx = self.index_of(page);
        // двойное освобождение — ошибка вызывающего / double free is caller misuse
        assert!(self.is_used(idx), "double free of page {:#x}", page.as_u64());
        self.used[idx / 64] &= !(1 << (idx % 64));
        self.free += 1;
    }
}
