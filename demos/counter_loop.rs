//! Counter Loop - 1 producer at 1 kHz, 2 consumers at 250 Hz and 60 Hz
//!
//! The producer writes a pose (3 x f32) per cycle as three partial writes.
//! Consumers always see the newest complete pose and never wait on it.
//!
//! Run: cargo run --example counter_loop --features tracy

use bytemuck::{ Pod, Zeroable };
use relay::{ Exchange, ExchangeConfig, SignalConfig, StatePlan };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::thread;
use std::time::{ Duration, Instant };

const RUN_FOR: Duration = Duration::from_secs(2);

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct Pose {
    x: f32,
    y: f32,
    heading: f32,
}

fn main() {
    relay::init_tracy();

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("  ║  Counter Loop - 1 producer, 2 consumers               ║");
    println!("  ╚════════════════════════════════════════════════════════╝\n");

    let mut builder = Exchange::builder(ExchangeConfig::new(3).unwrap());
    let cycle = builder.signal("cycle", 8).unwrap();
    let pose = builder
        .add_signal(SignalConfig::new("pose", 4).unwrap().with_sample_capacity(3).unwrap())
        .unwrap();
    let exchange = Arc::new(builder.build().unwrap());

    // One range for the cycle counter, three for the pose fields.
    let plan = StatePlan::new()
        .with_signal(cycle, 8)
        .with_range(pose, 0, 4)
        .with_range(pose, 4, 4)
        .with_range(pose, 8, 4);
    let mut producer = exchange.producer().unwrap();
    producer.begin_state(&plan).unwrap();

    let running = Arc::new(AtomicBool::new(true));

    let writer = {
        let running = running.clone();
        let plan = plan.clone();
        thread::spawn(move || {
            let mut n = 0u64;
            while running.load(Ordering::Relaxed) {
                n += 1;
                let t = n as f32 * 0.001;
                let p = Pose { x: t.cos(), y: t.sin(), heading: t };
                let bytes = bytemuck::bytes_of(&p);

                if producer.publish_value(cycle, &n).is_err() {
                    continue;
                }
                for range in plan.ranges().iter().filter(|r| r.signal == pose) {
                    match producer.write(pose) {
                        Ok(guard) => {
                            let field = &bytes[range.offset..range.offset + range.len];
                            if let Err(err) = guard.copy_from(range.offset, field) {
                                eprintln!("pose write failed: {}", err);
                            }
                        }
                        // Stale this cycle; the consumers keep the previous pose.
                        Err(err) if err.is_busy() => break,
                        Err(err) => panic!("pose write failed: {}", err),
                    }
                }
                thread::sleep(Duration::from_millis(1));
            }
            n
        })
    };

    let consumers: Vec<_> = [("fast", 4u64), ("slow", 16u64)]
        .into_iter()
        .map(|(name, period_ms)| {
            let exchange = exchange.clone();
            let running = running.clone();
            thread::spawn(move || {
                let mut seen = 0u64;
                let mut last = 0u64;
                while running.load(Ordering::Relaxed) {
                    if let (Ok(c), Ok(p)) = (
                        exchange.latest_value::<u64>(cycle),
                        exchange.latest_value::<Pose>(pose),
                    ) {
                        if c != last {
                            seen += 1;
                            last = c;
                            if seen % 50 == 1 {
                                println!("[{}] cycle={} pose=({:.3}, {:.3}, {:.3})", name, c, p.x, p.y, p.heading);
                            }
                        }
                    }
                    thread::sleep(Duration::from_millis(period_ms));
                }
                (name, seen)
            })
        })
        .collect();

    let start = Instant::now();
    thread::sleep(RUN_FOR);
    running.store(false, Ordering::Relaxed);

    let cycles = writer.join().unwrap();
    println!("\nProducer: {} cycles in {:?}", cycles, start.elapsed());
    for c in consumers {
        let (name, seen) = c.join().unwrap();
        println!("Consumer {}: {} distinct cycles observed", name, seen);
    }
    println!("Metrics: {}", exchange.metrics().snapshot());
}
