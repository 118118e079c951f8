//! Bouncy entry point
//!
//! Natively this is a headless demo: it drives an arena at 60 Hz through a
//! few scripted impulses and logs every wall hit and rendered note. The
//! browser build starts from `bouncy::web` instead.

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::sync::Arc;

    use bouncy::audio::{RecordingSink, ThreadedDispatcher};
    use bouncy::sim::{ManualClock, Scheduler};
    use bouncy::{Arena, Direction, Settings};

    const FRAME_MS: u64 = 16;
    /// Give up after a minute of simulated time
    const MAX_FRAMES: u64 = 60 * 60;

    pub fn run() -> bouncy::Result<()> {
        let settings = match std::env::args().nth(1) {
            Some(path) => Settings::load_or_default(path),
            None => Settings::default(),
        };

        let sink = Arc::new(RecordingSink::new());
        let dispatcher = ThreadedDispatcher::new(sink.clone(), settings.string);
        let clock = ManualClock::new(0);
        let scheduler = Scheduler::with_clock(clock.clone());

        let mut arena = Arena::new(&scheduler, settings, dispatcher)?;
        arena.resize(800.0, 600.0);

        let mut hits = 0;
        let mut now = 0;
        for (label, kick) in [
            ("fling", Kick::Fling(3200.0, -2100.0)),
            ("nudge right", Kick::Nudge(Direction::Right)),
            ("nudge up", Kick::Nudge(Direction::Up)),
        ] {
            log::info!("{label} from {:?}", arena.position());
            match kick {
                Kick::Fling(vx, vy) => arena.fling(vx, vy)?,
                Kick::Nudge(direction) => arena.nudge(direction)?,
            }

            let mut frames = 0;
            while arena.needs_frame() && frames < MAX_FRAMES {
                clock.set(now);
                for contact in arena.advance_frame(now)? {
                    hits += 1;
                    log::info!(
                        "{now:>6} ms: hit {:?} wall at {:?}",
                        contact.wall,
                        contact.corrected
                    );
                }
                now += FRAME_MS;
                frames += 1;
            }
            log::info!("{label} settled at {:?} after {frames} frames", arena.position());
        }

        // Give the synth threads a moment to finish
        std::thread::sleep(std::time::Duration::from_millis(500));
        let clips = sink.clips();
        log::info!(
            "{hits} wall hits, {} notes rendered ({:.1}s of audio)",
            clips.len(),
            clips.iter().map(|c| c.duration_s()).sum::<f64>()
        );
        Ok(())
    }

    enum Kick {
        Fling(f64, f64),
        Nudge(Direction),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Bouncy (native) starting...");

    if let Err(e) = demo::run() {
        log::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is bouncy::web::start, this is just to satisfy the compiler
}
