//! Consumer command: express one Interest and report the outcome.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rust_ndn_common::ndn::{Interest, Name};
use rust_ndn_face::transport::make_default_transport;
use rust_ndn_face::Face;
use std::cell::RefCell;
use std::rc::Rc;

enum Outcome {
    Data(String, usize),
    Nacked(String),
    TimedOut,
}

pub fn send_interest(
    name_uri: &str,
    lifetime_ms: u64,
    can_be_prefix: bool,
    transport_uri: Option<&str>,
) -> Result<()> {
    let name = Name::from_string(name_uri).context("Invalid NDN name")?;
    let transport = make_default_transport(transport_uri)?;
    let face = Face::with_transport(transport);

    let interest = Interest::new(name)
        .with_lifetime(lifetime_ms)
        .with_can_be_prefix(can_be_prefix);
    info!("Sending Interest for {}", interest.name());

    let outcome: Rc<RefCell<Option<Outcome>>> = Rc::new(RefCell::new(None));
    let on_data = {
        let outcome = outcome.clone();
        Box::new(move |_: &Interest, data: &rust_ndn_common::ndn::Data| {
            println!("{}", String::from_utf8_lossy(data.content()));
            *outcome.borrow_mut() = Some(Outcome::Data(
                data.name().to_string(),
                data.content().len(),
            ));
        })
    };
    let on_nack = {
        let outcome = outcome.clone();
        Box::new(move |_: &Interest, nack: &rust_ndn_common::lp::Nack| {
            *outcome.borrow_mut() = Some(Outcome::Nacked(nack.reason().to_string()));
        })
    };
    let on_timeout = {
        let outcome = outcome.clone();
        Box::new(move |_: &Interest| {
            *outcome.borrow_mut() = Some(Outcome::TimedOut);
        })
    };

    face.express_interest(interest, Some(on_data), Some(on_nack), Some(on_timeout))?;
    face.process_events(None, false);

    let taken = outcome.borrow_mut().take();
    match taken {
        Some(Outcome::Data(name, size)) => {
            debug!("Received {size} bytes under {name}");
            Ok(())
        }
        Some(Outcome::Nacked(reason)) => bail!("Interest was Nacked: {reason}"),
        Some(Outcome::TimedOut) => bail!("Interest timed out"),
        None => bail!("Event loop exited without an outcome"),
    }
}
