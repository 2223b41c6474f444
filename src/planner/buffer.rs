//! Lock-free single-producer single-consumer block queue.
//!
//! The queue is a ring of `N` slots holding at most `N - 1` blocks. Each
//! slot carries an atomic [`BlockState`] that arbitrates edits between the
//! planner (producer) and the step generator (consumer):
//!
//! - the producer writes `Free` slots and edits `Recalculate` slots freely;
//! - a `Planned` slot is claimed by whichever side wins a compare-and-swap,
//!   the producer to re-plan it, the consumer to execute it;
//! - a `Busy` slot belongs to the consumer until it is discarded.
//!
//! Block contents are only ever written by the producer. The consumer copies
//! a block after its `Planned -> Busy` swap, whose acquire pairs with the
//! producer's release when it published the slot.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::motion::{Block, BlockState};

struct Slot {
    state: AtomicU8,
    block: UnsafeCell<Block>,
}

impl Slot {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(BlockState::Free as u8),
            block: UnsafeCell::new(Block::EMPTY),
        }
    }

    #[inline]
    fn state(&self) -> BlockState {
        BlockState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn set_state(&self, state: BlockState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline]
    fn transition(&self, from: BlockState, to: BlockState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: Slot = Slot::new();

/// Fixed-size ring of planned blocks shared by one producer and one consumer.
///
/// Create it in a `static` or on the stack, then [`split`](Self::split) it
/// into its two handles.
pub struct BlockQueue<const N: usize> {
    slots: [Slot; N],
    head: AtomicUsize,
    tail: AtomicUsize,
    nonbusy: AtomicUsize,
    planned: AtomicUsize,
    delay_before_delivering: AtomicU16,
    cleaning: AtomicU32,
    epoch: AtomicU32,
    runtime_us: AtomicU32,
}

// SAFETY: slot contents are only reached through `Producer` and `Consumer`.
// There is at most one of each per queue (`split` takes `&mut self`), and the
// per-slot state machine keeps their accesses to the same block disjoint.
unsafe impl<const N: usize> Sync for BlockQueue<N> {}

impl<const N: usize> Default for BlockQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> BlockQueue<N> {
    /// An empty queue.
    pub const fn new() -> Self {
        Self {
            slots: [EMPTY_SLOT; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            nonbusy: AtomicUsize::new(0),
            planned: AtomicUsize::new(0),
            delay_before_delivering: AtomicU16::new(0),
            cleaning: AtomicU32::new(0),
            epoch: AtomicU32::new(0),
            runtime_us: AtomicU32::new(0),
        }
    }

    /// Maximum number of queued blocks.
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Split into the producer and consumer handles.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let queue: &Self = self;
        (Producer { queue }, Consumer { queue })
    }

    /// Slot after `index`.
    #[inline]
    pub const fn next_index(index: usize) -> usize {
        if index + 1 >= N {
            0
        } else {
            index + 1
        }
    }

    /// Slot before `index`.
    #[inline]
    pub const fn prev_index(index: usize) -> usize {
        if index == 0 {
            N - 1
        } else {
            index - 1
        }
    }

    /// Number of slots from `from` up to, not including, `to`.
    #[inline]
    const fn distance(from: usize, to: usize) -> usize {
        (to + N - from) % N
    }

    fn moves_planned(&self) -> usize {
        Self::distance(self.tail.load(Ordering::Acquire), self.head.load(Ordering::Acquire))
    }

    fn block(&self, index: usize) -> &Block {
        // SAFETY: only the producer writes block contents, and it does so
        // through `&mut Producer`, so no write overlaps a shared read made
        // through the producer. Consumer reads happen after the acquire swap
        // to `Busy`, when the producer no longer edits that slot.
        unsafe { &*self.slots[index].block.get() }
    }
}

/// Planner side of a [`BlockQueue`].
pub struct Producer<'a, const N: usize> {
    queue: &'a BlockQueue<N>,
}

impl<'a, const N: usize> Producer<'a, N> {
    /// Maximum number of queued blocks.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// No free slot is left.
    #[inline]
    pub fn is_full(&self) -> bool {
        let head = self.queue.head.load(Ordering::Relaxed);
        BlockQueue::<N>::next_index(head) == self.queue.tail.load(Ordering::Acquire)
    }

    /// Nothing is queued, including the block being executed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.has_queued_blocks()
    }

    /// Some block is queued or being executed.
    #[inline]
    pub fn has_queued_blocks(&self) -> bool {
        self.queue.head.load(Ordering::Relaxed) != self.queue.tail.load(Ordering::Acquire)
    }

    /// Queued blocks, including the one being executed.
    #[inline]
    pub fn moves_planned(&self) -> usize {
        self.queue.moves_planned()
    }

    /// Queued blocks the consumer has not started yet.
    #[inline]
    pub fn nonbusy_moves_planned(&self) -> usize {
        BlockQueue::<N>::distance(
            self.queue.nonbusy.load(Ordering::Acquire),
            self.queue.head.load(Ordering::Relaxed),
        )
    }

    /// Moves are refused until the consumer has polled through the
    /// quick-stop cooldown.
    #[inline]
    pub fn is_cleaning(&self) -> bool {
        self.queue.cleaning.load(Ordering::Acquire) != 0
    }

    /// Next slot to fill.
    #[inline]
    pub fn head(&self) -> usize {
        self.queue.head.load(Ordering::Relaxed)
    }

    /// Oldest queued slot.
    #[inline]
    pub fn tail(&self) -> usize {
        self.queue.tail.load(Ordering::Acquire)
    }

    /// First slot the recalculation passes still revisit.
    #[inline]
    pub fn planned(&self) -> usize {
        self.queue.planned.load(Ordering::Acquire)
    }

    /// Block stored in a slot.
    #[inline]
    pub fn block(&self, index: usize) -> &Block {
        self.queue.block(index)
    }

    /// State of a slot.
    #[inline]
    pub fn state(&self, index: usize) -> BlockState {
        self.queue.slots[index].state()
    }

    /// Total planned duration of the queued blocks in microseconds.
    #[inline]
    pub fn buffered_runtime_us(&self) -> u32 {
        self.queue.runtime_us.load(Ordering::Acquire)
    }

    /// Queue a block at `head`.
    ///
    /// Motion blocks enter as `Recalculate`, sync blocks as `Planned`.
    /// `first_move_delay` is armed when the queue was empty. Returns the
    /// slot index, or `None` when the queue is full.
    pub fn try_push(&mut self, block: &Block, first_move_delay: u16) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let queue = self.queue;
        let index = queue.head.load(Ordering::Relaxed);
        let slot = &queue.slots[index];

        // SAFETY: the slot at `head` is outside the published range, so the
        // consumer does not read it, and `&mut self` excludes other producer
        // borrows of its contents.
        unsafe { *slot.block.get() = *block };

        let state = if block.is_sync() {
            BlockState::Planned
        } else {
            BlockState::Recalculate
        };
        slot.set_state(state);

        if index == queue.tail.load(Ordering::Acquire) {
            queue
                .delay_before_delivering
                .store(first_move_delay, Ordering::Relaxed);
        }
        queue
            .runtime_us
            .fetch_add(block.segment_time_us, Ordering::AcqRel);

        queue
            .head
            .store(BlockQueue::<N>::next_index(index), Ordering::Release);
        Some(index)
    }

    /// Take a queued block for editing.
    ///
    /// Returns `None` when the consumer claimed it first; the caller leaves
    /// that block alone.
    pub fn begin_edit(&mut self, index: usize) -> Option<&mut Block> {
        let slot = &self.queue.slots[index];
        let editable = match slot.state() {
            BlockState::Recalculate => true,
            BlockState::Planned => slot.transition(BlockState::Planned, BlockState::Recalculate),
            BlockState::Free | BlockState::Busy => false,
        };
        if !editable {
            debug!("lost race with the consumer on block {}", index);
            return None;
        }
        // SAFETY: the slot is `Recalculate`, which the consumer never claims,
        // and `&mut self` makes this the only producer borrow.
        Some(unsafe { &mut *slot.block.get() })
    }

    /// Hand an edited block back to the consumer.
    pub fn publish(&mut self, index: usize) {
        let slot = &self.queue.slots[index];
        if slot.state() == BlockState::Recalculate {
            slot.set_state(BlockState::Planned);
        }
    }

    /// Move `planned` forward to `to`, never backward.
    pub fn advance_planned(&self, to: usize) {
        let queue = self.queue;
        let mut current = queue.planned.load(Ordering::Acquire);
        loop {
            let tail = queue.tail.load(Ordering::Acquire);
            let head = queue.head.load(Ordering::Relaxed);
            let target = BlockQueue::<N>::distance(tail, to);
            if target >= BlockQueue::<N>::distance(tail, head)
                || target <= BlockQueue::<N>::distance(tail, current)
            {
                return;
            }
            match queue
                .planned
                .compare_exchange(current, to, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Drop every queued block, including the one being executed.
    ///
    /// The caller must hold the consumer mask and abort the consumer's
    /// current block afterwards. Moves are refused until the consumer has
    /// polled `cooldown` times.
    pub fn quick_stop(&mut self, first_move_delay: u16, cooldown: u32) {
        let queue = self.queue;
        let tail = queue.tail.load(Ordering::Acquire);

        for slot in queue.slots.iter() {
            slot.set_state(BlockState::Free);
        }
        queue.nonbusy.store(tail, Ordering::Release);
        queue.planned.store(tail, Ordering::Release);
        queue
            .delay_before_delivering
            .store(first_move_delay, Ordering::Relaxed);
        queue.cleaning.store(cooldown, Ordering::Release);
        queue.runtime_us.store(0, Ordering::Release);
        queue.epoch.fetch_add(1, Ordering::AcqRel);
        queue.head.store(tail, Ordering::Release);
    }
}

/// A block taken by the consumer.
///
/// Hand it back with [`Consumer::discard`] once executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaimedBlock {
    /// Copy of the queued block.
    pub block: Block,
    index: usize,
    epoch: u32,
}

impl ClaimedBlock {
    /// Slot the block came from.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Step generator side of a [`BlockQueue`].
pub struct Consumer<'a, const N: usize> {
    queue: &'a BlockQueue<N>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// Claim the oldest block.
    ///
    /// Returns `None` while the queue is empty, cooling down after a quick
    /// stop, holding back the first move of a burst, or while the oldest
    /// block is being re-planned.
    pub fn current_block(&mut self) -> Option<ClaimedBlock> {
        let queue = self.queue;

        let cleaning = queue.cleaning.load(Ordering::Acquire);
        if cleaning != 0 {
            queue.cleaning.store(cleaning - 1, Ordering::Release);
            return None;
        }

        let tail = queue.tail.load(Ordering::Relaxed);
        let head = queue.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }

        let delay = queue.delay_before_delivering.load(Ordering::Relaxed);
        if delay != 0 {
            let delay = delay - 1;
            if delay != 0 && BlockQueue::<N>::distance(tail, head) < 3 {
                queue
                    .delay_before_delivering
                    .store(delay, Ordering::Relaxed);
                return None;
            }
            queue.delay_before_delivering.store(0, Ordering::Relaxed);
        }

        let slot = &queue.slots[tail];
        if !slot.transition(BlockState::Planned, BlockState::Busy) {
            return None;
        }

        let block = *queue.block(tail);
        let nonbusy = BlockQueue::<N>::next_index(tail);
        queue.nonbusy.store(nonbusy, Ordering::Release);
        let _ = queue
            .planned
            .compare_exchange(tail, nonbusy, Ordering::AcqRel, Ordering::Acquire);
        let _ = queue
            .runtime_us
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |runtime| {
                Some(runtime.saturating_sub(block.segment_time_us))
            });

        Some(ClaimedBlock {
            block,
            index: tail,
            epoch: queue.epoch.load(Ordering::Acquire),
        })
    }

    /// Release an executed block.
    ///
    /// Blocks claimed before a quick stop are ignored.
    pub fn discard(&mut self, claimed: &ClaimedBlock) {
        let queue = self.queue;
        if claimed.epoch != queue.epoch.load(Ordering::Acquire) {
            return;
        }
        debug_assert_eq!(claimed.index, queue.tail.load(Ordering::Relaxed));

        queue.slots[claimed.index].set_state(BlockState::Free);
        queue
            .tail
            .store(BlockQueue::<N>::next_index(claimed.index), Ordering::Release);
    }

    /// Nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.tail.load(Ordering::Relaxed) == self.queue.head.load(Ordering::Acquire)
    }

    /// Queued blocks, including a claimed one.
    #[inline]
    pub fn moves_planned(&self) -> usize {
        self.queue.moves_planned()
    }

    /// The quick-stop cooldown is running.
    #[inline]
    pub fn is_cleaning(&self) -> bool {
        self.queue.cleaning.load(Ordering::Acquire) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion(steps: u32) -> Block {
        Block {
            step_event_count: steps,
            segment_time_us: 1000,
            ..Block::EMPTY
        }
    }

    #[test]
    fn test_capacity_and_full() {
        let mut queue: BlockQueue<4> = BlockQueue::new();
        let (mut producer, _consumer) = queue.split();
        assert_eq!(producer.capacity(), 3);

        for i in 0..3 {
            assert_eq!(producer.try_push(&motion(10), 0), Some(i));
        }
        assert!(producer.is_full());
        assert!(producer.try_push(&motion(10), 0).is_none());
        assert_eq!(producer.moves_planned(), 3);
    }

    #[test]
    fn test_consumer_refuses_recalculate() {
        let mut queue: BlockQueue<4> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        let index = producer.try_push(&motion(10), 0).unwrap();
        assert_eq!(producer.state(index), BlockState::Recalculate);
        assert!(consumer.current_block().is_none());

        producer.publish(index);
        let claimed = consumer.current_block().unwrap();
        assert_eq!(claimed.index(), index);
        assert_eq!(producer.state(index), BlockState::Busy);
        assert!(producer.begin_edit(index).is_none());

        consumer.discard(&claimed);
        assert!(consumer.is_empty());
        assert_eq!(producer.state(index), BlockState::Free);
    }

    #[test]
    fn test_sync_block_is_immediately_planned() {
        let mut queue: BlockQueue<4> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        producer.try_push(&Block::sync([1, 2, 3, 4]), 0).unwrap();
        let claimed = consumer.current_block().unwrap();
        assert_eq!(claimed.block.sync_position(), Some([1, 2, 3, 4]));
    }

    #[test]
    fn test_begin_edit_takes_planned_back() {
        let mut queue: BlockQueue<4> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        let index = producer.try_push(&motion(10), 0).unwrap();
        producer.publish(index);
        producer.begin_edit(index).unwrap().step_event_count = 20;
        assert!(consumer.current_block().is_none());

        producer.publish(index);
        assert_eq!(consumer.current_block().unwrap().block.step_event_count, 20);
    }

    #[test]
    fn test_first_move_delay() {
        let mut queue: BlockQueue<8> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        let index = producer.try_push(&motion(10), 3).unwrap();
        producer.publish(index);
        assert!(consumer.current_block().is_none());
        assert!(consumer.current_block().is_none());
        assert!(consumer.current_block().is_some());
    }

    #[test]
    fn test_first_move_delay_skipped_with_lookahead() {
        let mut queue: BlockQueue<8> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        for _ in 0..3 {
            let index = producer.try_push(&motion(10), 100).unwrap();
            producer.publish(index);
        }
        assert!(consumer.current_block().is_some());
    }

    #[test]
    fn test_runtime_tracking() {
        let mut queue: BlockQueue<4> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        for _ in 0..2 {
            let index = producer.try_push(&motion(10), 0).unwrap();
            producer.publish(index);
        }
        assert_eq!(producer.buffered_runtime_us(), 2000);

        let claimed = consumer.current_block().unwrap();
        assert_eq!(producer.buffered_runtime_us(), 1000);
        consumer.discard(&claimed);
        assert_eq!(producer.buffered_runtime_us(), 1000);
    }

    #[test]
    fn test_claim_moves_planned_forward() {
        let mut queue: BlockQueue<4> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        for _ in 0..2 {
            let index = producer.try_push(&motion(10), 0).unwrap();
            producer.publish(index);
        }
        assert_eq!(producer.planned(), 0);
        let _claimed = consumer.current_block().unwrap();
        assert_eq!(producer.planned(), 1);
        assert_eq!(producer.nonbusy_moves_planned(), 1);
    }

    #[test]
    fn test_advance_planned_is_monotonic() {
        let mut queue: BlockQueue<8> = BlockQueue::new();
        let (mut producer, _consumer) = queue.split();

        for _ in 0..4 {
            producer.try_push(&motion(10), 0).unwrap();
        }
        producer.advance_planned(2);
        assert_eq!(producer.planned(), 2);
        producer.advance_planned(1);
        assert_eq!(producer.planned(), 2);
        // Beyond the newest block.
        producer.advance_planned(5);
        assert_eq!(producer.planned(), 2);
        producer.advance_planned(3);
        assert_eq!(producer.planned(), 3);
    }

    #[test]
    fn test_quick_stop_ignores_stale_discard() {
        let mut queue: BlockQueue<4> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        for _ in 0..2 {
            let index = producer.try_push(&motion(10), 0).unwrap();
            producer.publish(index);
        }
        let claimed = consumer.current_block().unwrap();

        producer.quick_stop(0, 2);
        assert!(!producer.has_queued_blocks());
        assert!(producer.is_cleaning());
        assert_eq!(producer.buffered_runtime_us(), 0);

        consumer.discard(&claimed);
        assert!(consumer.is_empty());

        assert!(consumer.current_block().is_none());
        assert!(consumer.current_block().is_none());
        assert!(!producer.is_cleaning());
    }

    #[test]
    fn test_wraps_around() {
        let mut queue: BlockQueue<3> = BlockQueue::new();
        let (mut producer, mut consumer) = queue.split();

        for round in 0..5u32 {
            let index = producer.try_push(&motion(round + 1), 0).unwrap();
            producer.publish(index);
            let claimed = consumer.current_block().unwrap();
            assert_eq!(claimed.block.step_event_count, round + 1);
            consumer.discard(&claimed);
        }
        assert_eq!(BlockQueue::<3>::next_index(2), 0);
        assert_eq!(BlockQueue::<3>::prev_index(0), 2);
    }
}
