//! Ready set: per-priority circular queues and the priority bitmap
//!
//! Each priority level owns a circular singly-linked queue threaded
//! through the TCB `next` links. Tasks enter at the tail and are
//! scheduled from the head. A bitmap word mirrors which queues are
//! non-empty so the highest ready priority is a single
//! find-leading-set-bit away.

use core::ptr::NonNull;

use crate::kern::config::CFG_MAX_PRIORITIES;
use crate::kern::task::Tcb;
use crate::kern::types::SchedPrio;

/// Bitmap of priorities with at least one ready task
///
/// Bit *i* is set iff ready queue *i* is non-empty. Higher bit index
/// means higher urgency.
pub struct PrioBitmap {
    bits: u32,
}

impl PrioBitmap {
    pub const fn new() -> Self {
        PrioBitmap { bits: 0 }
    }

    pub fn init(&mut self) {
        self.bits = 0;
    }

    /// Mark a priority as having ready work
    #[inline]
    pub fn insert(&mut self, prio: SchedPrio) {
        debug_assert!((prio as usize) < CFG_MAX_PRIORITIES);
        self.bits |= 1 << prio;
    }

    /// Mark a priority as empty
    #[inline]
    pub fn remove(&mut self, prio: SchedPrio) {
        debug_assert!((prio as usize) < CFG_MAX_PRIORITIES);
        self.bits &= !(1 << prio);
    }

    /// Priority of the most significant set bit, or `None` when no task
    /// is ready
    #[inline]
    pub fn highest(&self) -> Option<SchedPrio> {
        if self.bits == 0 {
            None
        } else {
            Some((31 - self.bits.leading_zeros()) as SchedPrio)
        }
    }

    /// Check a single priority
    #[inline]
    pub fn is_set(&self, prio: SchedPrio) -> bool {
        (self.bits & (1 << prio)) != 0
    }

    /// Check if any priority has ready work
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl Default for PrioBitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// Circular singly-linked ready queue for one priority level
///
/// The head is the next task to schedule; the tail's `next` link closes
/// the circle back to the head. Insertion appends at the tail, removal
/// unlinks by value, and `rotate` advances the head for round-robin.
pub struct ReadyQueue {
    head: Option<NonNull<Tcb>>,
}

impl ReadyQueue {
    pub const fn new() -> Self {
        ReadyQueue { head: None }
    }

    pub fn init(&mut self) {
        self.head = None;
    }

    /// Next task to schedule at this priority
    #[inline]
    pub fn head(&self) -> Option<NonNull<Tcb>> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append a TCB at the tail of the circle.
    ///
    /// # Safety
    /// `tcb` must be valid and not linked into any list.
    pub unsafe fn insert_tail(&mut self, mut tcb: NonNull<Tcb>) {
        match self.head {
            None => {
                unsafe { tcb.as_mut() }.next = Some(tcb);
                self.head = Some(tcb);
            }
            Some(head) => {
                // Walk to the tail: the node whose link closes the circle.
                let mut tail = head;
                while unsafe { tail.as_ref() }.next != Some(head) {
                    tail = unsafe { tail.as_ref() }.next.unwrap();
                }
                unsafe { tcb.as_mut() }.next = Some(head);
                unsafe { tail.as_mut() }.next = Some(tcb);
            }
        }
    }

    /// Unlink a TCB from the circle.
    ///
    /// # Safety
    /// `tcb` must be valid; removing a TCB that is not in this queue is
    /// a no-op.
    pub unsafe fn remove(&mut self, mut tcb: NonNull<Tcb>) {
        let Some(head) = self.head else {
            return;
        };

        // Single node closes on itself.
        if unsafe { head.as_ref() }.next == Some(head) {
            if head == tcb {
                self.head = None;
                unsafe { tcb.as_mut() }.next = None;
            }
            return;
        }

        let mut prev = head;
        while unsafe { prev.as_ref() }.next != Some(tcb) {
            prev = unsafe { prev.as_ref() }.next.unwrap();
            if prev == head {
                // Walked the full circle without finding it.
                return;
            }
        }

        unsafe { prev.as_mut() }.next = unsafe { tcb.as_ref() }.next;
        if self.head == Some(tcb) {
            self.head = unsafe { tcb.as_ref() }.next;
        }
        unsafe { tcb.as_mut() }.next = None;
    }

    /// Advance the head to the next task in the circle (round-robin).
    ///
    /// # Safety
    /// The queue links must be intact.
    pub unsafe fn rotate(&mut self) {
        if let Some(head) = self.head {
            self.head = unsafe { head.as_ref() }.next;
        }
    }

    /// Number of tasks in the queue.
    ///
    /// # Safety
    /// The queue links must be intact.
    pub unsafe fn count(&self) -> usize {
        let Some(head) = self.head else {
            return 0;
        };
        let mut n = 1;
        let mut cur = unsafe { head.as_ref() }.next;
        while cur != Some(head) {
            n += 1;
            cur = unsafe { cur.unwrap().as_ref() }.next;
        }
        n
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}

// The queue is only touched inside critical sections or from the switch
// handler, which cannot be preempted by its peers.
unsafe impl Send for ReadyQueue {}
unsafe impl Sync for ReadyQueue {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kern::types::TaskState;

    fn tcb(prio: SchedPrio) -> Tcb {
        let mut t = Tcb::new();
        t.prio = prio;
        t.state = TaskState::Ready;
        t
    }

    #[test]
    fn bitmap_tracks_highest() {
        let mut map = PrioBitmap::new();
        assert!(map.is_empty());
        assert_eq!(map.highest(), None);

        map.insert(2);
        map.insert(5);
        map.insert(0);
        assert_eq!(map.highest(), Some(5));
        assert!(map.is_set(2));
        assert!(!map.is_set(3));

        map.remove(5);
        assert_eq!(map.highest(), Some(2));
        map.remove(2);
        map.remove(0);
        assert!(map.is_empty());
    }

    #[test]
    fn bitmap_boundary_priorities() {
        let mut map = PrioBitmap::new();
        map.insert(0);
        assert_eq!(map.highest(), Some(0));
        map.insert((CFG_MAX_PRIORITIES - 1) as SchedPrio);
        assert_eq!(map.highest(), Some((CFG_MAX_PRIORITIES - 1) as SchedPrio));
    }

    #[test]
    fn queue_insert_remove_single() {
        let mut q = ReadyQueue::new();
        let mut a = tcb(1);
        let pa = NonNull::from(&mut a);

        unsafe {
            q.insert_tail(pa);
            assert_eq!(q.head(), Some(pa));
            assert_eq!(q.count(), 1);
            // Single node circles back to itself.
            assert_eq!(pa.as_ref().next, Some(pa));

            q.remove(pa);
            assert!(q.is_empty());
            assert_eq!(pa.as_ref().next, None);
        }
    }

    #[test]
    fn queue_is_fifo_and_circular() {
        let mut q = ReadyQueue::new();
        let (mut a, mut b, mut c) = (tcb(1), tcb(1), tcb(1));
        let (pa, pb, pc) = (NonNull::from(&mut a), NonNull::from(&mut b), NonNull::from(&mut c));

        unsafe {
            q.insert_tail(pa);
            q.insert_tail(pb);
            q.insert_tail(pc);
            assert_eq!(q.head(), Some(pa));
            assert_eq!(q.count(), 3);
            // Tail wraps to head.
            assert_eq!(pc.as_ref().next, Some(pa));

            q.rotate();
            assert_eq!(q.head(), Some(pb));
            q.rotate();
            assert_eq!(q.head(), Some(pc));
            q.rotate();
            assert_eq!(q.head(), Some(pa));
        }
    }

    #[test]
    fn queue_remove_head_middle_tail() {
        let mut q = ReadyQueue::new();
        let (mut a, mut b, mut c) = (tcb(1), tcb(1), tcb(1));
        let (pa, pb, pc) = (NonNull::from(&mut a), NonNull::from(&mut b), NonNull::from(&mut c));

        unsafe {
            q.insert_tail(pa);
            q.insert_tail(pb);
            q.insert_tail(pc);

            q.remove(pb);
            assert_eq!(q.count(), 2);
            assert_eq!(pa.as_ref().next, Some(pc));

            q.remove(pa);
            assert_eq!(q.head(), Some(pc));
            assert_eq!(q.count(), 1);

            q.remove(pc);
            assert!(q.is_empty());
        }
    }

    #[test]
    fn queue_remove_absent_is_noop() {
        let mut q = ReadyQueue::new();
        let (mut a, mut b) = (tcb(1), tcb(1));
        let (pa, pb) = (NonNull::from(&mut a), NonNull::from(&mut b));

        unsafe {
            q.insert_tail(pa);
            q.remove(pb);
            assert_eq!(q.count(), 1);
            assert_eq!(q.head(), Some(pa));
        }
    }
}
