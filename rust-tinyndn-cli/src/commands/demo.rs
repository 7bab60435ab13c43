//! In-memory forwarding demo
//!
//! Wires a forwarder to one upstream face, routes `/aaa` over it, and walks
//! a consumer Interest through forwarding, Data return, caching and expiry.

use anyhow::{bail, Context, Result};
use log::info;
use rust_tinyndn_common::{Data, Interest, Name};
use rust_tinyndn_fwd::{Face, Forwarder, ForwarderConfig, InterestOutcome, ManualAlarm};
use std::cell::RefCell;
use std::rc::Rc;

use crate::utils::print_header;

/// Upstream face that queues what the forwarder sends.
#[derive(Clone, Default)]
struct QueueFace(Rc<RefCell<Vec<Vec<u8>>>>);

impl Face for QueueFace {
    fn send(&mut self, packet: &[u8]) -> rust_tinyndn_common::Result<()> {
        self.0.borrow_mut().push(packet.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct Consumer {
    data: Vec<String>,
    timeouts: Vec<String>,
}

fn express(
    fwd: &mut Forwarder<ManualAlarm>,
    consumer: &Rc<RefCell<Consumer>>,
    name: &Name,
    lifetime_ms: u32,
) -> Result<InterestOutcome> {
    let on_data = consumer.clone();
    let on_timeout = consumer.clone();
    let interest = Interest::new(name.clone()).with_lifetime(lifetime_ms);
    let outcome = fwd.express(
        &interest,
        move |data, _raw| {
            let content = String::from_utf8_lossy(&data.content).into_owned();
            on_data.borrow_mut().data.push(content);
        },
        move |name| on_timeout.borrow_mut().timeouts.push(name.to_string()),
    )?;
    Ok(outcome)
}

/// Run the demo scenario and print the final metrics as JSON
pub fn run_demo() -> Result<()> {
    let mut fwd = Forwarder::new(ForwarderConfig::default(), ManualAlarm::new(0))?;
    let upstream = QueueFace::default();
    let face = fwd.add_face(upstream.clone())?;
    let prefix = Name::from_uri("/aaa")?;
    fwd.add_route(face, &prefix)?;
    info!("Routed {} via {}", prefix, face);

    let consumer = Rc::new(RefCell::new(Consumer::default()));
    let name = Name::from_uri("/aaa/bbb/ccc/ddd")?;

    print_header("Interest");
    let outcome = express(&mut fwd, &consumer, &name, 4000)?;
    println!("express {} -> {:?}", name, outcome);

    let sent: Vec<Vec<u8>> = upstream.0.borrow_mut().drain(..).collect();
    if sent.len() != 1 {
        bail!("expected one forwarded Interest, saw {}", sent.len());
    }
    let forwarded = Interest::decode(&sent[0]).context("forwarded Interest did not decode")?;
    println!("upstream received Interest {}", forwarded.name);

    print_header("Data");
    let data = Data::new(forwarded.name.clone(), "hello from upstream")
        .with_freshness_period(10_000)
        .to_bytes()?;
    let outcome = fwd.receive(face, &data)?;
    println!("receive Data -> {:?}", outcome);
    println!("consumer got: {:?}", consumer.borrow().data);
    let pending = fwd.pit().find(fwd.name_tree(), &name, false)?.is_some();
    println!("PIT entry pending: {}", pending);

    print_header("Cache");
    let outcome = express(&mut fwd, &consumer, &name, 4000)?;
    println!("express {} again -> {:?}", name, outcome);
    println!("upstream sends since: {}", upstream.0.borrow().len());

    print_header("Expiry");
    let lost = Name::from_uri("/aaa/lost")?;
    express(&mut fwd, &consumer, &lost, 100)?;
    fwd.alarm_mut().advance(100);
    let expired = fwd.process_timers();
    println!("expired {} -> timeouts {:?}", expired, consumer.borrow().timeouts);

    print_header("No route");
    match express(&mut fwd, &consumer, &Name::from_uri("/zzz")?, 4000) {
        Ok(outcome) => println!("express /zzz -> {:?}", outcome),
        Err(e) => println!("express /zzz -> {}", e),
    }

    print_header("Metrics");
    println!("{}", serde_json::to_string_pretty(&fwd.metrics().snapshot())?);
    Ok(())
}
