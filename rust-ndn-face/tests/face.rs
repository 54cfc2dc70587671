//! End-to-end Face behavior over the in-memory transport.

use rust_ndn_common::lp::{CachePolicyType, Nack, NackReason};
use rust_ndn_common::ndn::{Data, Interest, Name, NameComponent};
use rust_ndn_common::Error;
use rust_ndn_face::dummy_client_face::{sign_data, DummyClientFace};
use rust_ndn_face::InterestFilter;
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn name(uri: &str) -> Name {
    Name::from_string(uri).unwrap()
}

fn make_interest(uri: &str, can_be_prefix: bool, lifetime_ms: Option<u64>, nonce: Option<u32>) -> Interest {
    let mut interest = Interest::new(name(uri)).with_can_be_prefix(can_be_prefix);
    if let Some(lifetime_ms) = lifetime_ms {
        interest = interest.with_lifetime(lifetime_ms);
    }
    if let Some(nonce) = nonce {
        interest = interest.with_nonce(nonce);
    }
    interest
}

fn make_data(uri: &str) -> Data {
    let mut data = Data::new(name(uri), "content");
    sign_data(&mut data);
    data
}

fn make_nack(interest: &Interest, reason: NackReason) -> Nack {
    Nack::new(interest.clone(), reason)
}

fn flag() -> (Rc<Cell<bool>>, Rc<Cell<bool>>) {
    let f = Rc::new(Cell::new(false));
    (f.clone(), f)
}

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let c = Rc::new(Cell::new(0));
    (c.clone(), c)
}

/* ---------------------------------------------------------------- *
 * Consumer
 * ---------------------------------------------------------------- */

#[test]
fn reply_data() {
    let face = DummyClientFace::new();
    let (n_data, n_data2) = counter();

    face.express_interest(
        make_interest("/Hello/World", true, Some(50), None),
        Some(Box::new(move |interest, data| {
            assert!(interest.name().is_prefix_of(data.name()));
            assert_eq!(interest.name().to_string(), "/Hello/World");
            assert_eq!(data.name().to_string(), "/Hello/World/a");
            n_data2.set(n_data2.get() + 1);
        })),
        Some(Box::new(|_, _| panic!("unexpected nack"))),
        Some(Box::new(|_| panic!("unexpected timeout"))),
    )
    .unwrap();
    face.advance_clocks(ms(40));

    face.receive_data(&make_data("/Bye/World/a"));
    face.receive_data(&make_data("/Hello/World/a"));
    face.advance_clocks_times(ms(50), 2);

    assert_eq!(n_data.get(), 1);
    assert_eq!(face.sent_interests().len(), 1);
    assert_eq!(face.sent_data().len(), 0);
}

#[test]
fn multiple_data_satisfy_multiple_interests() {
    let face = DummyClientFace::new();
    let (n_data, n_data2) = counter();
    let n_data3 = n_data.clone();

    face.express_interest(
        make_interest("/Hello/World", true, Some(50), None),
        Some(Box::new(move |_, _| n_data2.set(n_data2.get() + 1))),
        None,
        None,
    )
    .unwrap();
    face.express_interest(
        make_interest("/Hello/World", true, Some(50), Some(42)),
        Some(Box::new(move |_, _| n_data3.set(n_data3.get() + 1))),
        None,
        None,
    )
    .unwrap();
    face.advance_clocks(ms(40));

    face.receive_data(&make_data("/Hello/World/a"));
    face.advance_clocks_times(ms(50), 2);

    assert_eq!(n_data.get(), 2);
    assert_eq!(face.sent_interests().len(), 2);
    assert_eq!(face.sent_data().len(), 0);
}

#[test]
fn timeout() {
    let face = DummyClientFace::new();
    let (n_timeouts, n_timeouts2) = counter();

    face.express_interest(
        make_interest("/Hello/World", true, Some(50), None),
        Some(Box::new(|_, _| panic!("unexpected data"))),
        Some(Box::new(|_, _| panic!("unexpected nack"))),
        Some(Box::new(move |interest| {
            assert_eq!(interest.name().to_string(), "/Hello/World");
            n_timeouts2.set(n_timeouts2.get() + 1);
        })),
    )
    .unwrap();
    face.advance_clocks_times(ms(200), 5);

    assert_eq!(n_timeouts.get(), 1);
    assert_eq!(face.sent_interests().len(), 1);
    assert_eq!(face.sent_data().len(), 0);
    assert_eq!(face.sent_nacks().len(), 0);
    assert_eq!(face.counters().interest_timeouts.value(), 1);
}

#[test]
fn absent_callbacks_are_tolerated() {
    let face = DummyClientFace::new();

    face.express_interest(make_interest("/Hello/World", true, Some(50), None), None, None, None)
        .unwrap();
    face.advance_clocks(ms(1));
    face.receive_data(&make_data("/Hello/World/a"));
    face.advance_clocks(ms(1));

    face.express_interest(make_interest("/Hello/World", true, Some(50), None), None, None, None)
        .unwrap();
    face.advance_clocks_times(ms(200), 5); // expires without a timeout callback
}

#[test]
fn reply_nack() {
    let face = DummyClientFace::new();
    let (n_nacks, n_nacks2) = counter();

    let interest = make_interest("/Hello/World", false, Some(50), Some(14247162));
    face.express_interest(
        interest.clone(),
        Some(Box::new(|_, _| panic!("unexpected data"))),
        Some(Box::new(move |interest, nack| {
            assert_eq!(interest.name().to_string(), "/Hello/World");
            assert_eq!(nack.reason(), NackReason::Duplicate);
            n_nacks2.set(n_nacks2.get() + 1);
        })),
        Some(Box::new(|_| panic!("unexpected timeout"))),
    )
    .unwrap();
    face.advance_clocks(ms(40));

    face.receive_nack(&make_nack(&interest, NackReason::Duplicate));
    face.advance_clocks_times(ms(50), 2);

    assert_eq!(n_nacks.get(), 1);
    assert_eq!(face.sent_interests().len(), 1);
}

#[test]
fn remove_all_pending_interests() {
    let face = DummyClientFace::new();

    for suffix in ["0", "1"] {
        face.express_interest(
            make_interest(&format!("/Hello/World/{suffix}"), false, Some(50), None),
            Some(Box::new(|_, _| panic!("unexpected data"))),
            Some(Box::new(|_, _| panic!("unexpected nack"))),
            Some(Box::new(|_| panic!("unexpected timeout"))),
        )
        .unwrap();
    }
    face.advance_clocks(ms(10));

    face.remove_all_pending_interests();
    face.advance_clocks(ms(10));

    assert_eq!(face.n_pending_interests(), 0);

    face.receive_data(&make_data("/Hello/World/0"));
    face.receive_data(&make_data("/Hello/World/1"));
    face.advance_clocks_times(ms(200), 5);
}

#[test]
fn handle_cancel_and_face_drop() {
    let face = DummyClientFace::new();
    let handle = face
        .express_interest(
            make_interest("/Hello/World", true, Some(50), None),
            Some(Box::new(|_, _| panic!("unexpected data"))),
            Some(Box::new(|_, _| panic!("unexpected nack"))),
            Some(Box::new(|_| panic!("unexpected timeout"))),
        )
        .unwrap();
    face.advance_clocks(ms(1));
    handle.cancel();
    face.advance_clocks(ms(1));
    face.receive_data(&make_data("/Hello/World/a"));
    face.advance_clocks_times(ms(200), 5);
    assert_eq!(face.n_pending_interests(), 0);

    // cancel after the face is gone is defined behavior
    let face2 = DummyClientFace::new();
    let handle2 = face2
        .express_interest(make_interest("/Hello/World", true, Some(50), None), None, None, None)
        .unwrap();
    face2.advance_clocks(ms(1));
    drop(face2);
    handle2.cancel();
}

/* ---------------------------------------------------------------- *
 * Producer
 * ---------------------------------------------------------------- */

#[test]
fn put_data_carries_tags() {
    let face = DummyClientFace::new();
    assert_eq!(face.sent_data().len(), 0);

    let data = make_data("/4g7xxcuEow/KFvK5Kf2m");
    face.put(data.clone()).unwrap();

    let mut tagged = data;
    tagged.tags_mut().cache_policy = Some(CachePolicyType::NoCache);
    tagged.tags_mut().congestion_mark = Some(1);
    face.put(tagged).unwrap();

    face.advance_clocks(ms(10));
    let sent = face.sent_data();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].tags().cache_policy.is_none());
    assert!(sent[0].tags().congestion_mark.is_none());
    assert_eq!(sent[1].tags().cache_policy, Some(CachePolicyType::NoCache));
    assert_eq!(sent[1].tags().congestion_mark, Some(1));
}

#[test]
fn put_data_loopback() {
    let face = DummyClientFace::new();
    let (has_interest1, hi) = flag();
    let (has_data, hd) = flag();

    // first filter allows loopback and receives the Interest;
    // it does not respond right away, so the Interest also goes out
    face.set_interest_filter(name("/"), Some(Box::new(move |_, _| hi.set(true))));

    // second filter disallows loopback and must not receive it
    face.set_interest_filter(
        InterestFilter::new(name("/")).allow_loopback(false),
        Some(Box::new(|_, _| panic!("unexpected Interest on second filter"))),
    );

    face.express_interest(
        make_interest("/A", true, None, None),
        Some(Box::new(move |_, _| hd.set(true))),
        Some(Box::new(|_, _| panic!("unexpected nack"))),
        None,
    )
    .unwrap();
    face.advance_clocks(ms(1));
    assert!(has_interest1.get()); // Interest looped back
    assert_eq!(face.sent_interests().len(), 1); // and went to the forwarder
    assert!(!has_data.get()); // still waiting for Data

    face.put(make_data("/A/B")).unwrap(); // first filter responds
    face.advance_clocks(ms(1));
    assert!(has_data.get());
    assert_eq!(face.sent_data().len(), 0); // Data not spilled to the forwarder
}

#[test]
fn put_multiple_data() {
    let face = DummyClientFace::new();
    let (has_interest1, hi) = flag();

    let producer = face.face().clone();
    face.set_interest_filter(
        name("/"),
        Some(Box::new(move |_, interest| {
            hi.set(true);
            // respond right away from the first destination
            producer
                .put(make_data(&format!("{}/B", interest.name().prefix(1))))
                .unwrap();
        })),
    );
    face.set_interest_filter(name("/"), Some(Box::new(|_, _| {})));
    face.advance_clocks(ms(10));

    face.receive_interest(&make_interest("/A", true, None, None));
    face.advance_clocks(ms(10));
    assert!(has_interest1.get());
    assert_eq!(face.sent_data().len(), 1);
    assert_eq!(face.sent_data()[0].name().to_string(), "/A/B");

    // the pending record is gone; this put has not been processed yet
    face.put(make_data("/A/C")).unwrap();
    assert_eq!(face.sent_data().len(), 1);
}

#[test]
fn put_nack() {
    let face = DummyClientFace::new();
    face.set_interest_filter(name("/"), Some(Box::new(|_, _| {})));
    face.advance_clocks(ms(10));

    assert_eq!(face.sent_nacks().len(), 0);

    face.put_nack(make_nack(
        &make_interest("/unsolicited", false, None, Some(18645250)),
        NackReason::NoRoute,
    ))
    .unwrap();
    face.advance_clocks(ms(10));
    assert_eq!(face.sent_nacks().len(), 0); // unsolicited Nack is dropped

    let interest1 = make_interest("/Hello/World", false, None, Some(14247162));
    face.receive_interest(&interest1);
    let interest2 = make_interest("/another/prefix", false, None, Some(92203002));
    face.receive_interest(&interest2);
    face.advance_clocks(ms(10));

    face.put_nack(make_nack(&interest1, NackReason::Duplicate)).unwrap();
    face.advance_clocks(ms(10));
    let nacks = face.sent_nacks();
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].reason(), NackReason::Duplicate);
    assert!(nacks[0].tags().congestion_mark.is_none());

    let mut nack = make_nack(&interest2, NackReason::NoRoute);
    nack.tags_mut().congestion_mark = Some(1);
    face.put_nack(nack).unwrap();
    face.advance_clocks(ms(10));
    let nacks = face.sent_nacks();
    assert_eq!(nacks.len(), 2);
    assert_eq!(nacks[1].reason(), NackReason::NoRoute);
    assert_eq!(nacks[1].tags().congestion_mark, Some(1));
}

#[test]
fn put_multiple_nack() {
    let face = DummyClientFace::new();
    let (has_interest1, hi1) = flag();
    let (has_interest2, hi2) = flag();

    let producer = face.face().clone();
    face.set_interest_filter(
        name("/"),
        Some(Box::new(move |_, interest| {
            hi1.set(true);
            // Nack right away from the first destination; the Interest
            // still reaches the second one
            producer
                .put_nack(Nack::new(interest.clone(), NackReason::Congestion))
                .unwrap();
        })),
    );
    face.set_interest_filter(name("/"), Some(Box::new(move |_, _| hi2.set(true))));
    face.advance_clocks(ms(10));

    let interest = make_interest("/A", false, None, Some(14333271));
    face.receive_interest(&interest);
    face.advance_clocks(ms(10));
    assert!(has_interest1.get());
    assert!(has_interest2.get());

    // one destination Nacked; wait for the other
    assert_eq!(face.sent_nacks().len(), 0);

    face.put_nack(make_nack(&interest, NackReason::NoRoute)).unwrap();
    face.advance_clocks(ms(10));
    let nacks = face.sent_nacks();
    assert_eq!(nacks.len(), 1);
    assert_eq!(nacks[0].reason(), NackReason::Congestion); // least severe wins

    // the record is gone; additional Nacks are ignored
    face.put_nack(make_nack(&interest, NackReason::Duplicate)).unwrap();
    face.advance_clocks(ms(10));
    assert_eq!(face.sent_nacks().len(), 1);
}

#[test]
fn put_multiple_nack_loopback() {
    let face = DummyClientFace::new();
    let (has_interest1, hi) = flag();
    let (has_nack, hn) = flag();

    let producer = face.face().clone();
    face.set_interest_filter(
        name("/"),
        Some(Box::new(move |_, interest| {
            hi.set(true);
            producer
                .put_nack(Nack::new(interest.clone(), NackReason::Congestion))
                .unwrap();
        })),
    );
    face.set_interest_filter(
        InterestFilter::new(name("/")).allow_loopback(false),
        Some(Box::new(|_, _| panic!("unexpected Interest on second filter"))),
    );

    let interest = make_interest("/A", false, None, Some(28395852));
    face.express_interest(
        interest.clone(),
        Some(Box::new(|_, _| panic!("unexpected data"))),
        Some(Box::new(move |_, nack| {
            assert_eq!(nack.reason(), NackReason::Congestion);
            hn.set(true);
        })),
        Some(Box::new(|_| panic!("unexpected timeout"))),
    )
    .unwrap();
    face.advance_clocks(ms(1));
    assert!(has_interest1.get()); // Interest looped back
    assert_eq!(face.sent_interests().len(), 1); // and went to the forwarder
    assert!(!has_nack.get()); // waiting for the forwarder's verdict

    face.receive_nack(&make_nack(&interest, NackReason::NoRoute));
    face.advance_clocks(ms(1));
    assert!(has_nack.get());
}

/* ---------------------------------------------------------------- *
 * Interest filters
 * ---------------------------------------------------------------- */

#[test]
fn similar_filters() {
    let face = DummyClientFace::new();
    let (n1, n1w) = counter();
    let (n2, n2w) = counter();

    face.set_interest_filter(name("/Hello/World"), Some(Box::new(move |_, _| n1w.set(n1w.get() + 1))));
    face.set_interest_filter(name("/Hello"), Some(Box::new(move |_, _| n2w.set(n2w.get() + 1))));
    face.set_interest_filter(
        name("/Los/Angeles/Lakers"),
        Some(Box::new(|_, _| panic!("unexpected Interest on unrelated filter"))),
    );
    face.advance_clocks(ms(10));

    face.receive_interest(&make_interest("/Hello/World/%21", false, None, None));
    face.advance_clocks(ms(10));

    assert_eq!(n1.get(), 1);
    assert_eq!(n2.get(), 1);
}

#[test]
fn set_and_cancel_filter() {
    let face = DummyClientFace::new();
    let (n_interests, ni) = counter();

    let handle = face.set_interest_filter(
        name("/Hello/World"),
        Some(Box::new(move |_, _| ni.set(ni.get() + 1))),
    );
    face.advance_clocks_times(ms(25), 4);
    assert_eq!(n_interests.get(), 0);

    face.receive_interest(&make_interest("/Hello/World/%21", false, None, None));
    face.advance_clocks_times(ms(25), 4);
    assert_eq!(n_interests.get(), 1);

    face.receive_interest(&make_interest("/Bye/World/%21", false, None, None));
    face.advance_clocks_times(ms(25), 4);
    assert_eq!(n_interests.get(), 1);

    face.receive_interest(&make_interest("/Hello/World/%21/2", false, None, None));
    face.advance_clocks_times(ms(25), 4);
    assert_eq!(n_interests.get(), 2);

    handle.cancel();
    face.advance_clocks_times(ms(25), 4);

    face.receive_interest(&make_interest("/Hello/World/%21/3", false, None, None));
    face.advance_clocks_times(ms(25), 4);
    assert_eq!(n_interests.get(), 2);
}

#[test]
fn filter_without_callback() {
    let face = DummyClientFace::new();
    face.set_interest_filter(name("/A"), None);
    face.advance_clocks(ms(1));

    face.receive_interest(&make_interest("/A/1", false, None, None));
    face.advance_clocks(ms(1));
}

#[test]
fn regex_filter() {
    let face = DummyClientFace::new();
    let (n_interests, ni) = counter();

    let filter = InterestFilter::with_regex(name("/Hello"), r"^/World(/.*)?$").unwrap();
    face.set_interest_filter(filter, Some(Box::new(move |_, _| ni.set(ni.get() + 1))));
    face.advance_clocks(ms(1));

    face.receive_interest(&make_interest("/Hello/World", false, None, None));
    face.receive_interest(&make_interest("/Hello/World/a", false, None, None));
    face.receive_interest(&make_interest("/Hello/Earth", false, None, None));
    face.advance_clocks(ms(1));

    assert_eq!(n_interests.get(), 2);
}

/* ---------------------------------------------------------------- *
 * Packet size limit
 * ---------------------------------------------------------------- */

#[test]
fn oversized_packets_are_rejected() {
    let face = DummyClientFace::new();

    let mut huge_name = name("/Hello");
    huge_name.push(NameComponent::new(vec![0u8; 9000]));

    let err = face
        .express_interest(Interest::new(huge_name.clone()), None, None, None)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OversizedPacket { size, .. } if size > 8800
    ));
    assert_eq!(face.n_pending_interests(), 0);

    let mut data = Data::new(name("/Hello/World"), vec![0u8; 9000]);
    sign_data(&mut data);
    let err = face.put(data).unwrap_err();
    assert!(matches!(err, Error::OversizedPacket { .. }));

    let err = face
        .put_nack(Nack::new(Interest::new(huge_name), NackReason::NoRoute))
        .unwrap_err();
    assert!(matches!(err, Error::OversizedPacket { .. }));

    face.advance_clocks(ms(10));
    assert_eq!(face.sent_interests().len(), 0);
    assert_eq!(face.sent_data().len(), 0);
    assert_eq!(face.sent_nacks().len(), 0);
}

/* ---------------------------------------------------------------- *
 * Prefix registration
 * ---------------------------------------------------------------- */

#[test]
fn register_then_unregister() {
    let face = DummyClientFace::with_registration_reply();
    let (registered, reg) = flag();

    let handle = face.register_prefix(
        name("/Hello/World"),
        Some(Box::new(move |prefix| {
            assert_eq!(prefix.to_string(), "/Hello/World");
            reg.set(true);
        })),
        Some(Box::new(|_, reason| panic!("register failed: {reason}"))),
    );
    face.advance_clocks_times(ms(25), 4);
    assert!(registered.get());

    let (unregistered, unreg) = flag();
    handle.unregister(
        Some(Box::new(move || unreg.set(true))),
        Some(Box::new(|reason| panic!("unregister failed: {reason}"))),
    );
    face.advance_clocks_times(ms(25), 4);
    assert!(unregistered.get());

    // a second unregister does not find the record
    let (failed, fw) = flag();
    handle.unregister(
        Some(Box::new(|| panic!("unexpected success"))),
        Some(Box::new(move |reason| {
            assert_eq!(reason, "unrecognized handle");
            fw.set(true);
        })),
    );
    face.advance_clocks_times(ms(25), 4);
    assert!(failed.get());
}

#[test]
fn register_fails_without_forwarder_reply() {
    let face = DummyClientFace::new(); // no registration reply
    let (failed, fw) = flag();

    face.register_prefix(
        name("/Hello/World"),
        Some(Box::new(|_| panic!("unexpected success"))),
        Some(Box::new(move |prefix, reason| {
            assert_eq!(prefix.to_string(), "/Hello/World");
            assert_eq!(reason, "request timed out");
            fw.set(true);
        })),
    );
    face.advance_clocks_times(ms(500), 10); // wait past the command timeout
    assert!(failed.get());
}

#[test]
fn cancel_skips_unregister_command() {
    let face = DummyClientFace::with_registration_reply();
    let (registered, reg) = flag();

    let handle = face.register_prefix(
        name("/Hello/World"),
        Some(Box::new(move |_| reg.set(true))),
        Some(Box::new(|_, reason| panic!("register failed: {reason}"))),
    );
    face.advance_clocks_times(ms(25), 4);
    assert!(registered.get());
    let commands_sent = face.sent_interests().len();

    // cancel removes the record locally without another RIB command
    handle.cancel();
    face.advance_clocks_times(ms(25), 4);
    assert_eq!(face.sent_interests().len(), commands_sent);

    // unregister after cancel no longer finds the record
    let (failed, fw) = flag();
    handle.unregister(None, Some(Box::new(move |_| fw.set(true))));
    face.advance_clocks_times(ms(25), 4);
    assert!(failed.get());
}

#[test]
fn registered_filter_receives_and_unregisters() {
    let face = DummyClientFace::with_registration_reply();
    let (n_interests, ni) = counter();
    let (registered, reg) = flag();

    let handle = face.set_interest_filter_with_registration(
        InterestFilter::new(name("/Hello/World")),
        Some(Box::new(move |_, _| ni.set(ni.get() + 1))),
        Some(Box::new(move |_| reg.set(true))),
        Some(Box::new(|_, reason| panic!("register failed: {reason}"))),
    );
    face.advance_clocks_times(ms(25), 4);
    assert!(registered.get());

    face.receive_interest(&make_interest("/Hello/World/%21", false, None, None));
    face.advance_clocks(ms(10));
    assert_eq!(n_interests.get(), 1);

    // unregistering removes the paired filter as well
    handle.unregister(None, Some(Box::new(|reason| panic!("unregister failed: {reason}"))));
    face.advance_clocks_times(ms(25), 4);

    face.receive_interest(&make_interest("/Hello/World/%21/2", false, None, None));
    face.advance_clocks(ms(10));
    assert_eq!(n_interests.get(), 1);
}

#[test]
fn announce_prefix() {
    let face = DummyClientFace::with_registration_reply();
    let (announced, ann) = flag();

    let handle = face.announce_prefix(
        name("/Hello/World"),
        ms(10_000),
        None,
        Some(Box::new(move |prefix| {
            assert_eq!(prefix.to_string(), "/Hello/World");
            ann.set(true);
        })),
        Some(Box::new(|_, reason| panic!("announce failed: {reason}"))),
    );
    face.advance_clocks_times(ms(25), 4);
    assert!(announced.get());

    let (unregistered, unreg) = flag();
    handle.unregister(
        Some(Box::new(move || unreg.set(true))),
        Some(Box::new(|reason| panic!("unregister failed: {reason}"))),
    );
    face.advance_clocks_times(ms(25), 4);
    assert!(unregistered.get());
}

#[test]
fn registration_handles_survive_face_drop() {
    let face = DummyClientFace::with_registration_reply();
    let handle = face.register_prefix(name("/Hello/World/2"), None, None);
    face.advance_clocks(ms(1));
    drop(face);
    handle.cancel(); // no-op

    let face2 = DummyClientFace::with_registration_reply();
    let handle2 = face2.register_prefix(name("/Hello/World/3"), None, None);
    face2.advance_clocks(ms(1));
    drop(face2);
    let (failed, fw) = flag();
    handle2.unregister(
        Some(Box::new(|| panic!("unexpected success"))),
        Some(Box::new(move |reason| {
            assert_eq!(reason, "Face already closed");
            fw.set(true);
        })),
    );
    assert!(failed.get());
}

/* ---------------------------------------------------------------- *
 * Broadcast link
 * ---------------------------------------------------------------- */

#[test]
fn broadcast_link_between_faces() {
    let consumer = DummyClientFace::new();
    let producer = DummyClientFace::new();
    consumer.link_to(&producer).unwrap();

    let producer_face = producer.face().clone();
    producer.set_interest_filter(
        name("/Hello"),
        Some(Box::new(move |_, interest| {
            let mut data = Data::new(interest.name().clone(), "payload");
            sign_data(&mut data);
            producer_face.put(data).unwrap();
        })),
    );
    producer.advance_clocks(ms(1));

    let (has_data, hd) = flag();
    consumer.express_interest(
        make_interest("/Hello/World", false, Some(1000), None),
        Some(Box::new(move |_, data| {
            assert_eq!(data.name().to_string(), "/Hello/World");
            hd.set(true);
        })),
        Some(Box::new(|_, _| panic!("unexpected nack"))),
        Some(Box::new(|_| panic!("unexpected timeout"))),
    )
    .unwrap();

    consumer.advance_clocks(ms(1)); // consumer sends, link enqueues at producer
    producer.advance_clocks(ms(1)); // producer dispatches and replies
    consumer.advance_clocks(ms(1)); // consumer receives the Data

    assert!(has_data.get());
    assert_eq!(consumer.sent_interests().len(), 1);
    assert_eq!(producer.sent_data().len(), 1);
}

#[test]
fn shutdown_clears_tables_silently() {
    let face = DummyClientFace::new();
    face.express_interest(
        make_interest("/Hello/World", true, Some(50), None),
        Some(Box::new(|_, _| panic!("unexpected data"))),
        Some(Box::new(|_, _| panic!("unexpected nack"))),
        Some(Box::new(|_| panic!("unexpected timeout"))),
    )
    .unwrap();
    face.advance_clocks(ms(1));
    assert_eq!(face.n_pending_interests(), 1);

    face.shutdown();
    face.advance_clocks(ms(1));
    assert_eq!(face.n_pending_interests(), 0);

    face.advance_clocks_times(ms(200), 5); // no timeout fires
}
