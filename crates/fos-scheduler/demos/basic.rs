//! Example: Basic usage of fOS Scheduler

use std::rc::Rc;
use std::time::{Duration, Instant};

use fos_scheduler::{EventLoop, PriorityLevel, ScheduleOptions, Scheduler, TaskResult, TaskStatus};

/// Busy-work in 1ms slices, yielding whenever the frame budget is spent
fn chunked_work(scheduler: Scheduler, remaining: u32) -> TaskResult {
    let mut remaining = remaining;
    while remaining > 0 {
        let slice = Instant::now();
        while slice.elapsed() < Duration::from_millis(1) {}
        remaining -= 1;

        if remaining > 0 && scheduler.should_yield() {
            println!("  yielding with {} slices left", remaining);
            return Ok(TaskStatus::continue_with(move |_| chunked_work(scheduler, remaining)));
        }
    }
    println!("  chunked work done");
    Ok(TaskStatus::Complete)
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let event_loop = Rc::new(EventLoop::new());
    let scheduler = Scheduler::new(event_loop.clone());
    println!("fOS Scheduler v{} initialized", fos_scheduler::VERSION);

    scheduler.schedule_callback(PriorityLevel::Idle, |_| {
        println!("  idle cleanup");
        Ok(TaskStatus::Complete)
    });

    let s = scheduler.clone();
    scheduler.schedule_callback(PriorityLevel::Normal, move |_| chunked_work(s, 20));

    scheduler.schedule_callback(PriorityLevel::UserBlocking, |did_timeout| {
        println!("  input handler (did_timeout={})", did_timeout);
        Ok(TaskStatus::Complete)
    });

    let cancelled = scheduler.schedule_callback(PriorityLevel::Low, |_| {
        println!("  never printed");
        Ok(TaskStatus::Complete)
    });
    scheduler.cancel_callback(&cancelled);

    scheduler.schedule_callback_with_options(
        PriorityLevel::Normal,
        |_| {
            println!("  delayed by 30ms");
            Ok(TaskStatus::Complete)
        },
        ScheduleOptions::delay(30.0),
    );

    event_loop.run_until_idle()?;

    println!("{:#?}", scheduler.stats());
    println!("{:#?}", event_loop.stats());
    Ok(())
}
