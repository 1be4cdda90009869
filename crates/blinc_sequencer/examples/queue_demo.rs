//! Queue Demo
//!
//! Animates a card through three queued moves while an unqueued fade runs
//! alongside, then finishes whatever is left. Set `RUST_LOG=debug` to see
//! scheduling decisions.
//!
//! Run with: cargo run -p blinc_sequencer --example queue_demo

use blinc_sequencer::{
    AnimationOptions, AnimationScheduler, ElementId, Queue, Result, SchedulerConfig, Selection,
    Tween,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = SchedulerConfig::standard().with_duration(120.0);
    let mut scheduler = AnimationScheduler::with_config(config)
        .with_sink(|element: ElementId, property: &str, value: &str| {
            tracing::info!("{:?} {} = {}", element, property, value);
        });

    let card = scheduler.add_element("card");

    for (step, left) in [(1, 100.0), (2, 200.0), (3, 300.0)] {
        scheduler.animate(
            &[card],
            &[Tween::from_to("left", left - 100.0, left, "px")],
            AnimationOptions::new().on_complete(move |_, _| {
                tracing::info!("move {} complete", step);
                Ok(())
            }),
        )?;
    }
    scheduler.animate(
        &[card],
        &[Tween::from_to("opacity", 1.0, 0.5, "")],
        AnimationOptions::new()
            .queue(Queue::Unqueued)
            .duration(300.0)
            .on_begin(|_, _| {
                tracing::info!("fade started");
                Ok(())
            }),
    )?;

    let mut now = 0.0;
    while now < 200.0 && scheduler.tick_at(now) {
        now += 1000.0 / 60.0;
    }

    let finished = scheduler.finish(Selection::Elements(&[card]), true, false);
    tracing::info!("finished {} remaining call(s)", finished);

    for failure in scheduler.take_callback_failures() {
        tracing::error!("{:?} callback failed: {:#}", failure.hook, failure.error);
    }
    Ok(())
}
