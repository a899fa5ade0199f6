//! Memory Management — страницы под потоки / pages for threads
//!
//! Каждый поток ядра получает одну страницу: в ней живёт его стек.
//! Every kernel thread gets one page that holds its kernel stack.
//!
//!   palloc — пул физических страниц (битовая карта) / physical page pool (bitmap)

pub mod palloc;

pub const PAGE_SIZE: usize = 4096;

/// Физический адрес / Physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(pub u64);

impl PhysAddr {
    pub const fn new(addr: u64) -> Self { Self(addr) }
    pub const fn as_u64(self) -> u64   { self.0 }

    pub const fn is_page_aligned(self) -> bool {
        self.0 % PAGE_SIZE as u64 == 0
    }
}

/// Постраничный аллокатор, которым планировщик выделяет TCB.
/// Page-granularity allocator the scheduler uses for thread control blocks.
pub trait PageAllocator {
    /// `None` — страниц больше нет / no pages left
    fn alloc_page(&mut self) -> Option<PhysAddr>;

    fn free_page(&mut self, page: PhysAddr);
}
