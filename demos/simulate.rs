//! Example: Planning a square against a simulated step generator.
//!
//! This example demonstrates how to:
//! - Load planner configuration from TOML
//! - Run the consumer side of the block queue on its own thread
//! - Walk claimed blocks with the reference BlockExecutor
//!
//! Run with: `cargo run --example simulate --features std`

use std::hint::spin_loop;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;

use stepper_planner::{
    motion::{Axis, BlockExecutor, NUM_AXES},
    parse_config, BlockQueue, Cartesian, Consumer, Planner, PlannerBuilder, Result, Stepper,
};
use tracing_subscriber::filter::LevelFilter;

const CONFIG: &str = r#"
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

[motion]
acceleration_mm_s2 = 1500.0
split_first_move = true

[queue]
first_move_delay_polls = 20
"#;

/// Step generator that executes blocks instantly on a thread.
struct SimStepper {
    position: [AtomicI32; NUM_AXES],
    lock: AtomicBool,
    abort: AtomicBool,
    done: AtomicBool,
}

impl SimStepper {
    fn new() -> Self {
        Self {
            position: Default::default(),
            lock: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }

    fn lock(&self) {
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_loop();
        }
    }

    fn unlock(&self) {
        self.lock.store(false, Ordering::Release);
    }
}

impl Stepper for SimStepper {
    fn wake_up(&self) {}

    fn position(&self, axis: Axis) -> i32 {
        self.position[axis.index()].load(Ordering::Acquire)
    }

    fn triggered_position(&self, axis: Axis) -> i32 {
        self.position(axis)
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
        self.abort.store(true, Ordering::Release);
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
        thread::yield_now();
    }
}

fn run_consumer<const N: usize>(stepper: &SimStepper, mut consumer: Consumer<'_, N>) {
    while !stepper.done.load(Ordering::Acquire) || !consumer.is_empty() {
        stepper.lock();
        let claimed = consumer.current_block();
        stepper.unlock();

        let Some(claimed) = claimed else {
            thread::yield_now();
            continue;
        };

        if let Some(position) = claimed.block.sync_position() {
            stepper.set_position(&position);
        } else {
            let block = claimed.block;
            let mut executor = BlockExecutor::new(block);
            let mut peak_rate = executor.current_rate();
            while executor.advance() {
                peak_rate = peak_rate.max(executor.current_rate());
                if stepper.abort.swap(false, Ordering::AcqRel) {
                    break;
                }
            }
            for axis in Axis::ALL {
                let steps = block.steps[axis.index()] as i32;
                let signed = if block.direction.contains(axis) { -steps } else { steps };
                stepper.position[axis.index()].fetch_add(signed, Ordering::AcqRel);
            }
            println!(
                "block {:2}: {:5} steps, {:5} -> {:5} -> {:5} steps/s, peak {:5}, {:.3} s",
                claimed.index(),
                block.step_event_count,
                block.trapezoid.initial_rate,
                block.trapezoid.cruise_rate,
                block.trapezoid.final_rate,
                peak_rate,
                executor.elapsed_secs()
            );
        }

        stepper.lock();
        consumer.discard(&claimed);
        stepper.unlock();
    }
}

fn draw_square<const N: usize>(planner: &mut Planner<'_, &SimStepper, Cartesian, N>) -> Result<()> {
    let corners = [[20.0, 0.0], [20.0, 20.0], [0.0, 20.0], [0.0, 0.0]];
    let mut e = 0.0;
    for [x, y] in corners {
        e += 0.8;
        planner.buffer_line([x, y, 0.0, e], 60.0, 0, None)?;
        println!(
            "queued ({:5.1}, {:5.1}), {} blocks, {} ms buffered",
            x,
            y,
            planner.moves_planned(),
            planner.buffered_runtime_ms()
        );
    }
    planner.synchronize();

    println!(
        "\nfinal position: X={:.3} Y={:.3} E={:.3}",
        planner.get_axis_position_mm(Axis::X),
        planner.get_axis_position_mm(Axis::Y),
        planner.get_axis_position_mm(Axis::E)
    );
    while let Some(diagnostic) = planner.take_diagnostic() {
        println!("diagnostic: {:?}", diagnostic);
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    println!("=== Planner Simulation Example ===\n");

    let config = parse_config(CONFIG)?;
    let stepper = SimStepper::new();
    let mut queue: BlockQueue<16> = BlockQueue::new();
    let (producer, consumer) = queue.split();

    thread::scope(|s| {
        s.spawn(|| run_consumer(&stepper, consumer));

        let outcome = PlannerBuilder::new()
            .from_config(&config)
            .stepper(&stepper)
            .build(producer)
            .and_then(|mut planner| draw_square(&mut planner));

        stepper.done.store(true, Ordering::Release);
        outcome
    })
}
