//! Headless runner: load a facility file, simulate it, print a summary.
//!
//! Runs the reference facility for ten simulated minutes, closes an entry
//! gate and a zone halfway through, and prints occupancy, revenue and
//! traffic once per simulated minute, then the most recent receipt.
//!
//! Run with: `cargo run -p parksim-data --example headless_runner [facility file]`

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use parksim_core::event::{Event, EventKind};
use parksim_core::fixed::fixed64_to_f64;
use parksim_core::ledger::Ticket;
use parksim_core::maintenance::ToggleKind;
use parksim_data::load_engine;

fn main() {
    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/reference_facility.toml")
    });
    let mut engine = load_engine(&path).unwrap();

    let last_ticket: Rc<RefCell<Option<Ticket>>> = Rc::new(RefCell::new(None));
    let sink = last_ticket.clone();
    engine.on_passive(
        EventKind::TicketIssued,
        Box::new(move |event| {
            if let Event::TicketIssued { ticket, .. } = event {
                *sink.borrow_mut() = Some(*ticket);
            }
        }),
    );

    println!("facility: {}", path.display());
    println!("minute  occupied  revenue    low/med/high");
    for minute in 1..=10 {
        if minute == 6 {
            engine.toggle_by_key(ToggleKind::Gate, "E1", true).unwrap();
            engine.toggle_by_key(ToggleKind::Zone, "C", true).unwrap();
            println!("-- E1 and zone C under maintenance --");
        }
        engine.advance(60_000).unwrap();

        let snap = engine.snapshot();
        println!(
            "{minute:>6}  {:>3}/{:<4}  {:>9.2}  {}/{}/{}",
            snap.occupied,
            snap.total,
            fixed64_to_f64(snap.revenue.total),
            snap.traffic.histogram.low,
            snap.traffic.histogram.medium,
            snap.traffic.histogram.high,
        );
    }

    let snap = engine.snapshot();
    println!();
    for zone in &snap.zones {
        println!(
            "zone {}: {}/{} occupied, {} available, revenue {:.2}",
            zone.name,
            zone.occupied,
            zone.total,
            zone.available,
            fixed64_to_f64(zone.revenue)
        );
    }

    if let Some(ticket) = *last_ticket.borrow() {
        let receipt = engine.receipt(&ticket).unwrap();
        println!("\nlast receipt: {}", receipt.to_payload().unwrap());
    }
}
