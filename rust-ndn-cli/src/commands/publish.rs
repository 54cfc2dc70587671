//! Producer command: register a prefix and answer Interests under it.

use anyhow::{bail, Context, Result};
use log::{error, info};
use rust_ndn_common::ndn::{Data, Interest, Name, SignatureInfo, SignatureType};
use rust_ndn_face::interest_filter::InterestFilter;
use rust_ndn_face::transport::make_default_transport;
use rust_ndn_face::Face;
use std::cell::Cell;
use std::rc::Rc;

pub fn publish_data(
    name_uri: &str,
    content: String,
    freshness_ms: u64,
    transport_uri: Option<&str>,
) -> Result<()> {
    let prefix = Name::from_string(name_uri).context("Invalid NDN name")?;
    let transport = make_default_transport(transport_uri)?;
    let face = Face::with_transport(transport);

    let producer = face.clone();
    let on_interest = Box::new(move |_: &InterestFilter, interest: &Interest| {
        info!("Answering Interest for {}", interest.name());
        let mut data =
            Data::new(interest.name().clone(), content.clone()).with_freshness_period(freshness_ms);
        // a real producer signs with its keychain identity
        data.set_signature(
            SignatureInfo {
                signature_type: SignatureType::DigestSha256,
                key_locator: None,
            },
            vec![0u8; 32],
        );
        if let Err(e) = producer.put(data) {
            error!("Failed to publish Data: {e}");
        }
    });

    let registration_failed = Rc::new(Cell::new(false));
    let on_success = Box::new(|prefix: Name| {
        info!("Serving Data under {prefix}");
    });
    let on_failure = {
        let failed = registration_failed.clone();
        let shutdown_face = face.clone();
        Box::new(move |prefix: Name, reason: String| {
            error!("Failed to register {prefix}: {reason}");
            failed.set(true);
            shutdown_face.shutdown();
        })
    };

    face.set_interest_filter_with_registration(
        InterestFilter::new(prefix),
        Some(on_interest),
        Some(on_success),
        Some(on_failure),
    );

    // serve until interrupted
    face.process_events(None, true);

    if registration_failed.get() {
        bail!("Prefix registration failed");
    }
    Ok(())
}
