//! One coordinator collecting readings from a field of battery-powered
//! sensors.
//!
//! Run with `cargo run --example data_collection`; set `RUST_LOG=debug`
//! for protocol-level logs.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use capillary::app::SensorConfig;
use capillary::config::{ControllerConfig, DeviceConfig};
use capillary::sim::{SimTime, Simulator};
use capillary::trace::{TraceEvent, Tracer};

struct RoundLog {
    rounds: Rc<RefCell<u32>>,
    aborts: Rc<RefCell<u32>>,
}

impl Tracer for RoundLog {
    fn trace(&mut self, _now: SimTime, event: &TraceEvent) {
        match event {
            TraceEvent::RoundStopped { .. } => *self.rounds.borrow_mut() += 1,
            TraceEvent::RoundAborted { .. } => *self.aborts.borrow_mut() += 1,
            _ => {}
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    const SENSORS: usize = 8;
    const SLOTS: u16 = 8;

    let rounds = Rc::new(RefCell::new(0u32));
    let aborts = Rc::new(RefCell::new(0u32));
    let delivered = Rc::new(RefCell::new(0usize));

    let mut sim = Simulator::new(0xcafe);
    sim.set_tracer(Box::new(RoundLog {
        rounds: Rc::clone(&rounds),
        aborts: Rc::clone(&aborts),
    }));

    let mut coordinator_config = DeviceConfig::coordinator();
    coordinator_config.mac.slots = SLOTS;
    // mains-assisted: large enough to never cross the depletion threshold
    coordinator_config.source.initial_energy_j = 1000.0;
    let coordinator = sim.add_device(&coordinator_config);
    let coordinator_addr = sim.device(coordinator).address();

    let count = Rc::clone(&delivered);
    sim.set_forward_up(
        coordinator,
        Box::new(move |payload, _llc, src, _dst| {
            tracing::info!(%src, bytes = payload.len(), "reading collected");
            *count.borrow_mut() += 1;
        }),
    );

    let mut sensors = Vec::new();
    for n in 0..SENSORS {
        let mut config = DeviceConfig::end_device();
        config.mac.slots = SLOTS;
        config.source.initial_energy_j = 20.0;
        config.controller = ControllerConfig::Bounded {
            min_threshold: 0.3,
            max_threshold: 0.7,
            max_off: Duration::from_secs(10),
        };
        let id = sim.add_device(&config);
        let mut sensor = SensorConfig::reporting(Duration::from_millis(500 + 37 * n as u64), 24);
        sensor.destination = coordinator_addr;
        sim.attach_sensor(id, sensor);
        sensors.push(id);
    }

    sim.run_for(Duration::from_secs(60));

    println!("simulated 60 s of collection");
    println!(
        "rounds completed: {}, aborted: {}",
        rounds.borrow(),
        aborts.borrow()
    );
    println!("readings delivered: {}", delivered.borrow());
    for id in sensors {
        let device = sim.device(id);
        println!(
            "sensor {}: residual {:>5.1}%, consumed {:.3} J, duty cycle {:.2}%",
            device.address(),
            device.energy_fraction() * 100.0,
            device.total_consumption(),
            device.duty_cycle() * 100.0
        );
    }
}
