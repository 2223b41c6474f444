//! Integration tests for the stepper-planner library.
//!
//! These tests drive the planner through its public API, from TOML parsing
//! to blocks handed to a consumer running on another thread.

mod unit;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::thread;

use proptest::prelude::*;
use stepper_planner::error::{ConfigError, KinematicsError, PlannerError};
use stepper_planner::motion::{Axis, BlockState, NUM_AXES};
use stepper_planner::planner::{CylinderEnvelope, RecalcSettings};
use stepper_planner::{
    parse_config, BlockQueue, Cartesian, Consumer, Coupling, Error, JunctionPolicyKind, Planner,
    PlannerBuilder, PlannerConfig, Producer, ProfileModel, Queued, Stepper,
};

// =============================================================================
// Test rig
// =============================================================================

const PRINTER: &str = r#"
[axes.x]
steps_per_mm = 80.0
max_feedrate_mm_s = 300.0
max_acceleration_mm_s2 = 3000.0

[axes.y]
steps_per_mm = 80.0
max_feedrate_mm_s = 300.0
max_acceleration_mm_s2 = 3000.0

[axes.z]
steps_per_mm = 400.0
max_feedrate_mm_s = 5.0
max_acceleration_mm_s2 = 100.0

[[extruders]]
steps_per_mm = 93.0
max_feedrate_mm_s = 100.0
max_acceleration_mm_s2 = 10000.0

[queue]
first_move_delay_polls = 0
quick_stop_cooldown_polls = 3
"#;

/// Step generator whose consumer side is driven by the test itself.
#[derive(Default)]
struct Rig {
    position: [AtomicI32; NUM_AXES],
    lock: AtomicBool,
    stops: AtomicU32,
    idles: AtomicU32,
    done: AtomicBool,
}

impl Rig {
    fn lock(&self) {
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            std::hint::spin_loop();
        }
    }

    fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }

    fn motor(&self, axis: Axis) -> i32 {
        self.position[axis.index()].load(Ordering::Acquire)
    }
}

impl Stepper for Rig {
    fn wake_up(&self) {}

    fn position(&self, axis: Axis) -> i32 {
        self.motor(axis)
    }

    fn triggered_position(&self, axis: Axis) -> i32 {
        self.motor(axis)
    }

    fn set_position(&self, position: &[i32; NUM_AXES]) {
        for (slot, value) in self.position.iter().zip(position) {
            slot.store(*value, Ordering::Release);
        }
    }

    fn set_axis_position(&self, axis: Axis, position: i32) {
        self.position[axis.index()].store(position, Ordering::Release);
    }

    fn quick_stop(&self) {
        self.stops.fetch_add(1, Ordering::AcqRel);
    }

    fn endstop_triggered(&self, _axis: Axis) {}
    fn enable_axis(&self, _axis: Axis) {}
    fn disable_axis(&self, _axis: Axis) {}
    fn enable_extruder(&self, _extruder: u8) {}
    fn disable_extruder(&self, _extruder: u8) {}

    fn mask_consumer(&self) {
        self.lock();
    }

    fn unmask_consumer(&self) {
        self.unlock();
    }

    fn idle(&self) {
        self.idles.fetch_add(1, Ordering::AcqRel);
        thread::yield_now();
    }
}

fn printer() -> PlannerConfig {
    parse_config(PRINTER).expect("Printer config should parse")
}

fn planner<'q, const N: usize>(
    rig: &'q Rig,
    config: &PlannerConfig,
    producer: Producer<'q, N>,
) -> Planner<'q, &'q Rig, Cartesian, N> {
    PlannerBuilder::new()
        .from_config(config)
        .stepper(rig)
        .build(producer)
        .expect("Planner should build")
}

fn settings(config: &PlannerConfig) -> RecalcSettings {
    RecalcSettings {
        min_planner_speed: config.motion.min_planner_speed.value(),
        profile: config.motion.profile,
        timer_rate_hz: config.motion.stepper_timer_rate_hz,
    }
}

/// Queued motion block indices, oldest first.
fn motion_blocks<const N: usize>(producer: &Producer<'_, N>) -> Vec<usize> {
    let mut indices = Vec::new();
    let mut index = producer.tail();
    while index != producer.head() {
        if !producer.block(index).is_sync() {
            indices.push(index);
        }
        index = BlockQueue::<N>::next_index(index);
    }
    indices
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= 0.01 + 1.0e-3 * a.abs().max(b.abs())
}

/// Check the speed bounds and trapezoid partition of every queued block.
///
/// With `reachable`, also check that each block can reach the next entry
/// speed and brake to it.
fn check_plan<const N: usize>(producer: &Producer<'_, N>, min_speed_sqr: f32, reachable: bool) {
    let blocks = motion_blocks(producer);
    for &i in &blocks {
        let block = producer.block(i);
        assert!(block.entry_speed_sqr <= block.max_entry_speed_sqr, "block {}", i);
        assert!(block.max_entry_speed_sqr <= block.nominal_speed_sqr, "block {}", i);
        assert_eq!(
            block.accel_steps() + block.cruise_steps() + block.decel_steps(),
            block.step_event_count,
            "block {}",
            i
        );
        assert_eq!(producer.state(i), BlockState::Planned, "block {}", i);
    }

    if !reachable {
        return;
    }
    for pair in blocks.windows(2) {
        let (a, b) = (producer.block(pair[0]), producer.block(pair[1]));
        let reach = a.entry_speed_sqr + 2.0 * a.acceleration * a.millimeters;
        assert!(
            b.entry_speed_sqr <= reach || close(b.entry_speed_sqr, reach),
            "block {} cannot reach {}",
            pair[0],
            b.entry_speed_sqr
        );
        let brake = b.entry_speed_sqr + 2.0 * a.acceleration * a.millimeters;
        assert!(
            a.entry_speed_sqr <= brake || close(a.entry_speed_sqr, brake),
            "block {} cannot brake to {}",
            pair[0],
            b.entry_speed_sqr
        );
    }
    if let Some(&last) = blocks.last() {
        let block = producer.block(last);
        let brake = min_speed_sqr + 2.0 * block.acceleration * block.millimeters;
        assert!(block.entry_speed_sqr <= brake || close(block.entry_speed_sqr, brake));
    }
}

// =============================================================================
// Planning invariants
// =============================================================================

const ZIGZAG: [[f32; 2]; 8] = [
    [10.0, 0.0],
    [20.0, 2.0],
    [30.0, 0.0],
    [40.0, 2.0],
    [40.0, 12.0],
    [38.0, 22.0],
    [20.0, 22.0],
    [0.5, 21.5],
];

#[test]
fn test_zigzag_plan_respects_speed_bounds() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<16> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    for [x, y] in ZIGZAG {
        let queued = planner.buffer_line([x, y, 0.0, 0.0], 120.0, 0, None).unwrap();
        assert_eq!(queued, Queued::Block);
        check_plan(planner.queue(), config.motion.min_planner_speed.squared(), true);
    }
    assert_eq!(planner.moves_planned(), ZIGZAG.len());
}

#[test]
fn test_first_block_starts_from_rest() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<16> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.buffer_line([10.0, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();
    planner.buffer_line([20.0, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();

    let first = planner.queue().block(0);
    assert_eq!(first.max_entry_speed_sqr, 0.0);
    assert_eq!(first.entry_speed_sqr, 0.0);
}

#[test]
fn test_plan_is_stable_under_recalculation() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<16> = BlockQueue::new();
    {
        let (producer, _consumer) = queue.split();
        let mut planner = planner(&rig, &config, producer);
        for [x, y] in ZIGZAG {
            planner.buffer_line([x, y, 0.0, 0.0], 150.0, 0, None).unwrap();
        }
    }

    let (mut producer, _consumer) = queue.split();
    let snapshot: Vec<_> = (0..ZIGZAG.len()).map(|i| *producer.block(i)).collect();
    producer.recalculate(&settings(&config));
    producer.recalculate(&settings(&config));
    let again: Vec<_> = (0..ZIGZAG.len()).map(|i| *producer.block(i)).collect();
    assert_eq!(snapshot, again);
}

#[test]
fn test_planned_index_never_moves_backward() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<16> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    let mut last = planner.queue().planned();
    for [x, y] in ZIGZAG {
        planner.buffer_line([x, y, 0.0, 0.0], 80.0, 0, None).unwrap();
        let planned = planner.queue().planned();
        assert!(planned >= last, "planned went from {} to {}", last, planned);
        assert!(planned < planner.queue().head());
        last = planned;
    }
}

// =============================================================================
// Junctions and profiles
// =============================================================================

#[test]
fn test_colinear_junction_keeps_nominal_speed() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.buffer_line([10.0, 0.0, 0.0, 0.0], 100.0, 0, Some(10.0)).unwrap();
    planner.buffer_line([20.0, 0.0, 0.0, 0.0], 100.0, 0, Some(10.0)).unwrap();

    let second = planner.queue().block(1);
    assert_eq!(second.max_entry_speed_sqr, second.nominal_speed_sqr);
}

#[test]
fn test_reversal_junction_nearly_stops() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.buffer_line([10.0, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();
    planner.buffer_line([0.0, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();

    let back = planner.queue().block(1);
    assert!(back.max_entry_speed_sqr <= config.motion.min_planner_speed.squared());
}

#[test]
fn test_three_colinear_blocks_cruise_through() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    for x in [10.0, 20.0, 30.0] {
        planner.buffer_line([x, 0.0, 0.0, 0.0], 100.0, 0, Some(10.0)).unwrap();
    }

    let queue = planner.queue();
    let (first, middle, last) = (queue.block(0), queue.block(1), queue.block(2));
    assert!(close(middle.entry_speed_sqr, middle.nominal_speed_sqr));
    assert!(first.trapezoid.final_rate + 1 >= first.nominal_rate);
    assert_eq!(middle.trapezoid.cruise_rate, middle.nominal_rate);
    assert!(middle.cruise_steps() > 0);
    assert!(last.trapezoid.final_rate < last.nominal_rate);
}

#[test]
fn test_short_block_never_cruises() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.buffer_line([1.0, 0.0, 0.0, 0.0], 200.0, 0, None).unwrap();

    let block = planner.queue().block(0);
    assert_eq!(block.cruise_steps(), 0);
    assert!(block.trapezoid.cruise_rate < block.nominal_rate);
    assert_eq!(
        block.accel_steps() + block.decel_steps(),
        block.step_event_count
    );
}

#[test]
fn test_jerk_policy_plans_within_bounds() {
    let mut config = printer();
    config.motion.junction.policy = JunctionPolicyKind::Jerk;
    let rig = Rig::default();
    let mut queue: BlockQueue<16> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    for [x, y] in ZIGZAG {
        planner.buffer_line([x, y, 0.0, 0.0], 120.0, 0, None).unwrap();
    }
    check_plan(planner.queue(), config.motion.min_planner_speed.squared(), false);
}

#[test]
fn test_s_curve_profile_fills_timing() {
    let mut config = printer();
    config.motion.profile = ProfileModel::SCurve;
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.buffer_line([10.0, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();
    planner.buffer_line([20.0, 5.0, 0.0, 0.0], 100.0, 0, None).unwrap();

    for i in motion_blocks(planner.queue()) {
        let timing = planner.queue().block(i).s_curve.expect("S-curve timing");
        assert!(timing.deceleration_time > 0);
        assert!(timing.deceleration_time_inverse > 0);
    }
}

// =============================================================================
// Queue control
// =============================================================================

#[test]
fn test_quick_stop_clears_queue_and_refuses_moves() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, mut consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    for x in [10.0, 20.0, 30.0] {
        planner.buffer_line([x, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();
    }
    let claimed = consumer.current_block().expect("oldest block is planned");

    planner.quick_stop();
    assert!(!planner.has_queued_blocks());
    assert_eq!(planner.buffered_runtime_ms(), 0);
    assert_eq!(rig.stops.load(Ordering::Acquire), 1);

    let refused = planner.buffer_line([40.0, 0.0, 0.0, 0.0], 100.0, 0, None);
    assert_eq!(refused, Err(Error::Planner(PlannerError::Cleaning)));

    // The claim from before the stop is stale.
    consumer.discard(&claimed);
    assert!(consumer.is_empty());

    for _ in 0..config.queue.quick_stop_cooldown_polls {
        assert!(consumer.current_block().is_none());
    }
    assert!(!consumer.is_cleaning());
    let queued = planner.buffer_line([40.0, 0.0, 0.0, 0.0], 100.0, 0, None);
    assert_eq!(queued, Ok(Queued::Block));
}

#[test]
fn test_set_position_queues_sync_block_behind_motion() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, mut consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.set_position_mm([5.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(rig.motor(Axis::X), 400);

    planner.buffer_line([10.0, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();
    planner.set_position_mm([0.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(planner.moves_planned(), 2);
    assert_eq!(rig.motor(Axis::X), 400);

    let motion = consumer.current_block().unwrap();
    assert!(!motion.block.is_sync());
    consumer.discard(&motion);
    let sync = consumer.current_block().unwrap();
    assert_eq!(sync.block.sync_position(), Some([0; NUM_AXES]));
}

#[test]
fn test_simulation_mode_queues_nothing() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.set_simulation(true);
    let outcome = planner.buffer_line([10.0, 10.0, 0.0, 1.0], 100.0, 0, None);
    assert_eq!(outcome, Ok(Queued::Absorbed));
    assert!(!planner.has_queued_blocks());
    assert_eq!(planner.position_steps(), &[800, 800, 0, 93]);
}

#[test]
fn test_invalid_requests_are_rejected() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    assert!(matches!(
        planner.buffer_line([1.0, 0.0, 0.0, 0.0], 100.0, 3, None),
        Err(Error::Planner(PlannerError::InvalidExtruder { index: 3, count: 1 }))
    ));
    assert!(matches!(
        planner.buffer_line([1.0, 0.0, 0.0, 0.0], 0.0, 0, None),
        Err(Error::Planner(PlannerError::InvalidFeedrate(_)))
    ));
    assert!(matches!(
        planner.buffer_line([1.0, f32::NAN, 0.0, 0.0], 100.0, 0, None),
        Err(Error::Planner(PlannerError::InvalidTarget(Axis::Y)))
    ));
    assert!(!planner.has_queued_blocks());
}

#[test]
fn test_targets_beyond_step_range_are_rejected() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    // 1e7 mm on X is 8e8 steps.
    assert!(matches!(
        planner.buffer_line([1.0e7, 0.0, 0.0, 0.0], 100.0, 0, None),
        Err(Error::Planner(PlannerError::InvalidTarget(Axis::X)))
    ));
    assert!(matches!(
        planner.buffer_segment([0.0, 0.0, 0.0, -1.0e8], 100.0, 0, None),
        Err(Error::Planner(PlannerError::InvalidTarget(Axis::E)))
    ));
    assert!(!planner.has_queued_blocks());
    assert_eq!(planner.position_steps(), &[0; NUM_AXES]);
}

#[test]
fn test_envelope_rejects_and_measures_in_cartesian_space() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = PlannerBuilder::new()
        .from_config(&config)
        .stepper(&rig)
        .kinematics(CylinderEnvelope::new(100.0, 50.0))
        .build(producer)
        .expect("Planner should build");

    let outside = planner.buffer_line([90.0, 90.0, 0.0, 0.0], 100.0, 0, None);
    assert!(matches!(
        outside,
        Err(Error::Kinematics(KinematicsError::Unreachable { .. }))
    ));
    assert!(!planner.has_queued_blocks());

    planner.buffer_line([6.0, 8.0, 0.0, 0.0], 100.0, 0, None).unwrap();
    assert_eq!(planner.queue().block(0).millimeters, 10.0);
}

// =============================================================================
// Runtime reconfiguration
// =============================================================================

#[test]
fn test_reconfiguration_rejects_invalid_live_config() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.config_mut().extruders.clear();
    assert_eq!(
        planner.reset_acceleration_rates(),
        Err(Error::Config(ConfigError::NoExtruders))
    );
    // The previous constraints stay in force.
    assert_eq!(planner.constraints().axis_steps_per_mm(Axis::E, 0), 93.0);

    *planner.config_mut() = config.clone();
    planner.config_mut().axes.x.steps_per_mm = 0.0;
    assert!(matches!(
        planner.refresh_positioning(),
        Err(Error::Config(ConfigError::InvalidStepsPerMm { axis: Axis::X, .. }))
    ));
    assert_eq!(planner.constraints().mm_per_step[0], 0.0125);
}

#[test]
fn test_refresh_positioning_rescales_steps() {
    let config = printer();
    let rig = Rig::default();
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = planner(&rig, &config, producer);

    planner.set_position_mm([10.0, 0.0, 0.0, 0.0]).unwrap();
    assert_eq!(rig.motor(Axis::X), 800);

    planner.config_mut().axes.x.steps_per_mm = 160.0;
    planner.refresh_positioning().unwrap();
    assert_eq!(planner.position_steps()[0], 1600);
    assert_eq!(rig.motor(Axis::X), 1600);
    assert_eq!(planner.constraints().max_acceleration_steps_per_s2[0], 480_000);
}

// =============================================================================
// Producer and consumer on separate threads
// =============================================================================

/// Claim and execute blocks until the producer is done and the queue drained.
fn drain<const N: usize>(rig: &Rig, mut consumer: Consumer<'_, N>, executed: &AtomicU32) {
    while !rig.done.load(Ordering::Acquire) || !consumer.is_empty() {
        rig.lock();
        let claimed = consumer.current_block();
        rig.unlock();

        let Some(claimed) = claimed else {
            thread::yield_now();
            continue;
        };

        if let Some(position) = claimed.block.sync_position() {
            rig.set_position(&position);
        } else {
            let block = claimed.block;
            for axis in Axis::ALL {
                let steps = block.steps[axis.index()] as i32;
                let signed = if block.direction.contains(axis) { -steps } else { steps };
                rig.position[axis.index()].fetch_add(signed, Ordering::AcqRel);
            }
            executed.fetch_add(1, Ordering::AcqRel);
        }

        rig.lock();
        consumer.discard(&claimed);
        rig.unlock();
    }
}

#[test]
fn test_full_queue_backpressure_loses_no_blocks() {
    let config = printer();
    let rig = Rig::default();
    let executed = AtomicU32::new(0);
    let mut queue: BlockQueue<4> = BlockQueue::new();
    let (producer, consumer) = queue.split();

    thread::scope(|s| {
        s.spawn(|| drain(&rig, consumer, &executed));

        let mut planner = planner(&rig, &config, producer);
        let mut queued = 0;
        for i in 1..=40 {
            let x = (i % 7) as f32 * 3.0;
            let y = (i % 5) as f32 * 4.0;
            if planner.buffer_line([x, y, 0.0, 0.0], 150.0, 0, None).unwrap() == Queued::Block {
                queued += 1;
            }
            assert!(planner.moves_planned() <= 3);
        }
        planner.synchronize();
        rig.done.store(true, Ordering::Release);

        assert_eq!(executed.load(Ordering::Acquire), queued);
        assert_eq!(rig.motor(Axis::X), planner.position_steps()[0]);
        assert_eq!(rig.motor(Axis::Y), planner.position_steps()[1]);
    });
}

#[test]
fn test_producer_parks_on_full_queue_until_a_slot_frees() {
    let config = printer();
    let rig = Rig::default();
    let seen_while_parked = AtomicU32::new(0);
    let mut queue: BlockQueue<4> = BlockQueue::new();
    let (producer, mut consumer) = queue.split();

    thread::scope(|s| {
        let mut planner = planner(&rig, &config, producer);
        for x in [10.0, 20.0, 30.0] {
            planner.buffer_line([x, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();
        }
        assert!(planner.queue().is_full());
        assert_eq!(rig.idles.load(Ordering::Acquire), 0);

        s.spawn(|| {
            // Let the producer spin in its idle hook for a while.
            while rig.idles.load(Ordering::Acquire) < 100 {
                thread::yield_now();
            }
            seen_while_parked.store(consumer.moves_planned() as u32, Ordering::Release);

            rig.lock();
            let claimed = consumer.current_block().expect("oldest block is planned");
            consumer.discard(&claimed);
            rig.unlock();
        });

        let queued = planner.buffer_line([40.0, 0.0, 0.0, 0.0], 100.0, 0, None);
        assert_eq!(queued, Ok(Queued::Block));
        assert_eq!(planner.moves_planned(), 3);
    });

    assert_eq!(seen_while_parked.load(Ordering::Acquire), 3);
    assert!(rig.idles.load(Ordering::Acquire) >= 100);
}

#[test]
fn test_core_xy_positions_read_back_in_head_space() {
    let config = printer();
    let rig = Rig::default();
    let executed = AtomicU32::new(0);
    let mut queue: BlockQueue<8> = BlockQueue::new();
    let (producer, consumer) = queue.split();

    thread::scope(|s| {
        s.spawn(|| drain(&rig, consumer, &executed));

        let mut planner = PlannerBuilder::new()
            .from_config(&config)
            .stepper(&rig)
            .coupling(Coupling::CoreXy, false)
            .build(producer)
            .expect("Planner should build");
        planner.buffer_line([10.0, 0.0, 0.0, 0.0], 100.0, 0, None).unwrap();
        planner.buffer_line([10.0, 5.0, 0.0, 0.0], 100.0, 0, None).unwrap();
        planner.synchronize();
        rig.done.store(true, Ordering::Release);

        assert!((planner.get_axis_position_mm(Axis::X) - 10.0).abs() < 1.0e-3);
        assert!((planner.get_axis_position_mm(Axis::Y) - 5.0).abs() < 1.0e-3);
        assert_ne!(rig.motor(Axis::X), rig.motor(Axis::Y));
    });
}

// =============================================================================
// Property tests
// =============================================================================

fn path() -> impl Strategy<Value = Vec<(i32, i32, u32)>> {
    prop::collection::vec((0i32..1000, 0i32..1000, 10u32..300), 1..12)
}

proptest! {
    #[test]
    fn prop_plan_invariants_hold_for_any_path(moves in path(), jerk in any::<bool>()) {
        let mut config = printer();
        if jerk {
            config.motion.junction.policy = JunctionPolicyKind::Jerk;
        }
        let rig = Rig::default();
        let mut queue: BlockQueue<16> = BlockQueue::new();
        {
            let (producer, _consumer) = queue.split();
            let mut planner = planner(&rig, &config, producer);

            let mut last_planned = planner.queue().planned();
            for &(x, y, feedrate) in &moves {
                let target = [x as f32 * 0.1, y as f32 * 0.1, 0.0, 0.0];
                planner.buffer_line(target, feedrate as f32, 0, None).unwrap();
                check_plan(planner.queue(), config.motion.min_planner_speed.squared(), !jerk);

                let planned = planner.queue().planned();
                prop_assert!(planned >= last_planned);
                last_planned = planned;
            }
        }

        let (mut producer, _consumer) = queue.split();
        let count = producer.head();
        let before: Vec<_> = (0..count).map(|i| *producer.block(i)).collect();
        producer.recalculate(&settings(&config));
        let after: Vec<_> = (0..count).map(|i| *producer.block(i)).collect();
        prop_assert_eq!(before, after);
    }
}
