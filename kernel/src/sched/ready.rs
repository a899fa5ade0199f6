//! Очередь готовых потоков / Ready queue
//!
//! 64 FIFO-очереди, по одной на уровень приоритета, и битовая карта
//! непустых уровней. Старший бит карты — лучший кандидат.
//! 64 FIFO queues, one per priority level, and a bitmap of non-empty
//! levels. The highest set bit is the best candidate.
//!
//! Внутри уровня порядок — порядок прихода, поэтому равные по
//! приоритету потоки чередуются честно.
//! Within a level order is arrival order, so equal-priority threads
//! take turns fairly.

use alloc::collections::VecDeque;

use super::thread::{Tid, PRI_MAX, PRI_MIN};

const LEVELS: usize = (PRI_MAX - PRI_MIN + 1) as usize;

pub struct ReadyQueue {
    levels:   [VecDeque<Tid>; LEVELS],
    occupied: u64,
    len:      usize,
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            levels:   core::array::from_fn(|_| VecDeque::new()),
            occupied: 0,
            len:      0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn level(priority: i32) -> usize {
        debug_assert!((PRI_MIN..=PRI_MAX).contains(&priority), "priority {priority}");
        (priority - PRI_MIN) as usize
    }

    /// Поставить в конец своего уровня / Append at the back of its level
    pub fn push(&mut self, tid: Tid, priority: i32) {
        let lvl = Self::level(priority);
        self.levels[lvl].push_back(tid);
        self.occupied |= 1 << lvl;
        self.len += 1;
    }

    /// Лучший приоритет среди готовых / Best priority among ready threads
    pub fn highest_priority(&self) -> Option<i32> {
        if self.occupied == 0 {
            return None;
        }
        Some(63 - self.occupied.leading_zeros() as i32 + PRI_MIN)
    }

    pub fn pop_highest(&mut self) -> Option<Tid> {
        let lvl = Self::level(self.highest_priority()?);
        let tid = self.levels[lvl].pop_front();
        if self.levels[lvl].is_empty() {
            self.occupied &= !(1 << lvl);
        }
        self.len -= 1;
        tid
    }

    /// Убрать поток, стоящий на уровне `priority`.
    /// Remove a thread filed under `priority`.
    pub fn remove(&mut self, tid: Tid, priority: i32) -> bool {
        let lvl = Self::level(priority);
        let Some(pos) = self.levels[lvl].iter().position(|&t| t == tid) else {
            return false;
        };
        self.levels[lvl].remove(pos);
        if self.levels[lvl].is_empty() {
            self.occupied &= !(1 << lvl);
        }
        self.len -= 1;
        true
    }

    /// Перенести поток после смены приоритета (в конец нового уровня).
    /// Refile a thread after a priority change (back of the new level).
    pub fn refile(&mut self, tid: Tid, old: i32, new: i32) {
        if old != new && self.remove(tid, old) {
            self.push(tid, new);
        }
    }

    /// Все потоки с уровнем: от высшего приоритета к низшему.
    /// Every thread with its level, highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = (Tid, i32)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .rev()
            .flat_map(|(lvl, q)| q.iter().map(move |&t| (t, lvl as i32 + PRI_MIN)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn highest_level_first_fifo_within_level() {
        let mut rq = ReadyQueue::new();
        rq.push(Tid(1), 31);
        rq.push(Tid(2), 40);
        rq.push(Tid(3), 31);
        rq.push(Tid(4), 40);

        assert_eq!(rq.highest_priority(), Some(40));
        let order: Vec<_> = core::iter::from_fn(|| rq.pop_highest()).collect();
        assert_eq!(order, [Tid(2), Tid(4), Tid(1), Tid(3)]);
        assert!(rq.is_empty());
        assert_eq!(rq.highest_priority(), None);
    }

    #[test]
    fn extremes_map_to_bitmap_ends() {
        let mut rq = ReadyQueue::new();
        rq.push(Tid(1), PRI_MIN);
        assert_eq!(rq.highest_priority(), Some(PRI_MIN));
        rq.push(Tid(2), PRI_MAX);
        assert_eq!(rq.highest_priority(), Some(PRI_MAX));
        assert_eq!(rq.pop_highest(), Some(Tid(2)));
        assert_eq!(rq.pop_highest(), Some(Tid(1)));
    }

    #[test]
    fn refile_moves_to_back_of_new_level() {
        let mut rq = ReadyQueue::new();
        rq.push(Tid(1), 31);
        rq.push(Tid(2), 50);
        rq.push(Tid(3), 31);

        rq.refile(Tid(3), 31, 50);
        assert_eq!(rq.len(), 3);
        assert_eq!(rq.iter().collect::<Vec<_>>(), [(Tid(2), 50), (Tid(3), 50), (Tid(1), 31)]);

        // не в очереди — ничего не делаем
        rq.refile(Tid(9), 10, 20);
        assert_eq!(rq.len(), 3);
    }

    #[test]
    fn remove_clears_empty_level() {
        let mut rq = ReadyQueue::new();
        rq.push(Tid(1), 20);
        assert!(!rq.remove(Tid(1), 21));
        assert!(rq.remove(Tid(1), 20));
        assert_eq!(rq.highest_priority(), None);
        assert_eq!(rq.len(), 0);
    }
}
