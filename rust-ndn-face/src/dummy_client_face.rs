//! In-memory Face for tests: records sent packets, injects received ones,
//! links faces into a broadcast group, and optionally answers RIB commands
//! the way a forwarder would.

use crate::clock::MockClock;
use crate::controller::DigestSigner;
use crate::face::Face;
use crate::io::IoContext;
use crate::transport::{ReceiveCallback, Transport, TransportState};
use bytes::Bytes;
use rust_ndn_common::lp::{LpPacket, Nack};
use rust_ndn_common::mgmt::{
    ControlParameters, ControlResponse, PrefixAnnouncement, ROUTE_FLAG_CHILD_INHERIT,
    ROUTE_ORIGIN_APP, ROUTE_ORIGIN_PREFIXANN,
};
use rust_ndn_common::ndn::{Data, Interest, Name, SignatureInfo, SignatureType};
use rust_ndn_common::tlv;
use rust_ndn_common::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Attaches the digest-placeholder signature used throughout the test
/// tooling.
pub fn sign_data(data: &mut Data) {
    data.set_signature(
        SignatureInfo {
            signature_type: SignatureType::DigestSha256,
            key_locator: None,
        },
        vec![0u8; 32],
    );
}

/// Behavior switches of a [`DummyClientFace`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Record sent packets into `sent_interests`/`sent_data`/`sent_nacks`.
    pub enable_packet_logging: bool,
    /// Answer RIB register/unregister/announce commands with code 200.
    pub enable_registration_reply: bool,
    /// FaceId filled into registration replies that carry none.
    pub registration_reply_face_id: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enable_packet_logging: true,
            enable_registration_reply: false,
            registration_reply_face_id: 1,
        }
    }
}

/// Transport that hands sent packets to a hook instead of a socket.
struct DummyTransport {
    state: Cell<TransportState>,
    on_receive: RefCell<Option<ReceiveCallback>>,
    on_send: RefCell<Option<Box<dyn Fn(Bytes)>>>,
}

impl DummyTransport {
    fn new() -> Self {
        Self {
            state: Cell::new(TransportState::Closed),
            on_receive: RefCell::new(None),
            on_send: RefCell::new(None),
        }
    }

    fn set_on_send(&self, hook: Box<dyn Fn(Bytes)>) {
        *self.on_send.borrow_mut() = Some(hook);
    }

    fn receive(&self, wire: Bytes) {
        let callback = self.on_receive.borrow().clone();
        if let Some(callback) = callback {
            callback(wire);
        }
    }
}

impl Transport for DummyTransport {
    fn state(&self) -> TransportState {
        self.state.get()
    }

    fn connect(&self, _io: &Rc<IoContext>, on_receive: ReceiveCallback) -> Result<()> {
        *self.on_receive.borrow_mut() = Some(on_receive);
        self.state.set(TransportState::Running);
        Ok(())
    }

    fn send(&self, wire: Bytes) -> Result<()> {
        // a fresh borrow per packet: the hook may send more packets
        let hook = self.on_send.borrow();
        if let Some(hook) = hook.as_ref() {
            hook(wire);
        }
        Ok(())
    }

    // the in-memory link keeps delivering regardless of the idle pause
    fn pause(&self) {}

    fn resume(&self) {}

    fn close(&self) {
        self.state.set(TransportState::Closed);
    }
}

#[derive(Default)]
struct BroadcastLink {
    faces: RefCell<Vec<Weak<DummyState>>>,
}

struct DummyState {
    io: Rc<IoContext>,
    transport: Rc<DummyTransport>,
    sent_interests: RefCell<Vec<Interest>>,
    sent_data: RefCell<Vec<Data>>,
    sent_nacks: RefCell<Vec<Nack>>,
    link: RefCell<Option<Rc<BroadcastLink>>>,
}

impl DummyState {
    /* ----------------------------- receive injection ------------------ */

    fn inject_interest(&self, interest: &Interest) {
        let Ok(wire) = interest.encode() else { return };
        let mut lp = LpPacket::new();
        lp.set_incoming_face_id(interest.tags().incoming_face_id);
        lp.set_next_hop_face_id(interest.tags().next_hop_face_id);
        lp.set_congestion_mark(interest.tags().congestion_mark);
        lp.set_fragment(wire);
        if let Ok(wire) = lp.encode() {
            self.transport.receive(wire);
        }
    }

    fn inject_data(&self, data: &Data) {
        let Ok(wire) = data.encode() else { return };
        let mut lp = LpPacket::new();
        lp.set_incoming_face_id(data.tags().incoming_face_id);
        lp.set_congestion_mark(data.tags().congestion_mark);
        lp.set_fragment(wire);
        if let Ok(wire) = lp.encode() {
            self.transport.receive(wire);
        }
    }

    fn inject_nack(&self, nack: &Nack) {
        let Ok(wire) = nack.interest().encode() else { return };
        let mut lp = LpPacket::new();
        lp.set_nack(nack.reason());
        lp.set_incoming_face_id(nack.tags().incoming_face_id);
        lp.set_congestion_mark(nack.tags().congestion_mark);
        lp.set_fragment(wire);
        if let Ok(wire) = lp.encode() {
            self.transport.receive(wire);
        }
    }

    /* ----------------------------- send hook -------------------------- */

    fn handle_sent(self: &Rc<Self>, wire: Bytes, options: &Options) {
        let Ok(lp) = LpPacket::decode(wire) else { return };
        let Some(fragment) = lp.fragment().cloned() else { return };
        let mut peek = fragment.clone();
        let Ok(net_type) = tlv::decode_var_number(&mut peek) else { return };

        match net_type {
            tlv::TLV_INTEREST => {
                let Ok(mut interest) = Interest::decode(fragment) else { return };
                if let Some(reason) = lp.nack() {
                    let mut nack = Nack::new(interest, reason);
                    nack.tags_mut().congestion_mark = lp.congestion_mark();
                    if options.enable_packet_logging {
                        self.sent_nacks.borrow_mut().push(nack.clone());
                    }
                    self.broadcast(move |peer| peer.inject_nack(&nack));
                } else {
                    interest.tags_mut().next_hop_face_id = lp.next_hop_face_id();
                    interest.tags_mut().congestion_mark = lp.congestion_mark();
                    if options.enable_packet_logging {
                        self.sent_interests.borrow_mut().push(interest.clone());
                    }
                    if options.enable_registration_reply {
                        self.reply_to_registration(&interest, options.registration_reply_face_id);
                    }
                    self.broadcast(move |peer| peer.inject_interest(&interest));
                }
            }
            tlv::TLV_DATA => {
                let Ok(mut data) = Data::decode(fragment) else { return };
                data.tags_mut().cache_policy = lp.cache_policy();
                data.tags_mut().congestion_mark = lp.congestion_mark();
                if options.enable_packet_logging {
                    self.sent_data.borrow_mut().push(data.clone());
                }
                self.broadcast(move |peer| peer.inject_data(&data));
            }
            _ => {}
        }
    }

    /// Fans a packet out to every linked peer by enqueueing the receive on
    /// that peer's own loop.
    fn broadcast(self: &Rc<Self>, deliver: impl Fn(&DummyState) + Clone + 'static) {
        let Some(link) = self.link.borrow().clone() else {
            return;
        };
        for peer in link.faces.borrow().iter() {
            let Some(peer) = peer.upgrade() else { continue };
            if Rc::ptr_eq(&peer, self) {
                continue;
            }
            let deliver = deliver.clone();
            let target = peer.clone();
            peer.io.post(move || deliver(&target));
        }
    }

    fn reply_to_registration(self: &Rc<Self>, interest: &Interest, reply_face_id: u64) {
        let mut rib_prefix = Name::new();
        rib_prefix.push("localhost");
        rib_prefix.push("nfd");
        rib_prefix.push("rib");

        let name = interest.name();
        if name.len() <= 4 || !rib_prefix.is_prefix_of(name) {
            return;
        }
        let verb = match name.get(3) {
            Some(component) => component.as_bytes().clone(),
            None => return,
        };

        let params = if verb.as_ref() == b"announce" {
            let Some(app_params) = interest.application_parameters() else {
                return;
            };
            let Ok(carrier) = Data::decode(app_params.clone()) else {
                return;
            };
            let Ok(announcement) = PrefixAnnouncement::from_data(&carrier) else {
                return;
            };

            ControlParameters::new()
                .with_name(announcement.announced_name)
                // TODO derive the faceId from the IncomingFaceId tag of the
                // command Interest instead of this placeholder
                .with_face_id(555)
                .with_origin(ROUTE_ORIGIN_PREFIXANN)
                .with_cost(2048)
                .with_flags(ROUTE_FLAG_CHILD_INHERIT)
                .with_expiration_period(announcement.expiration_ms)
        } else {
            let Some(component) = name.get(4) else { return };
            let Ok(mut params) = ControlParameters::decode(component.as_bytes().clone()) else {
                return;
            };
            if params.face_id.is_none() {
                params.face_id = Some(reply_face_id);
            }
            if params.origin.is_none() {
                params.origin = Some(ROUTE_ORIGIN_APP);
            }
            if params.cost.is_none() && verb.as_ref() == b"register" {
                params.cost = Some(0);
            }
            params
        };

        let response = ControlResponse::new(200, "OK").with_body(params.encode());
        let mut data =
            Data::new(name.clone(), response.encode()).with_freshness_period(1000);
        sign_data(&mut data);

        let target = self.clone();
        self.io.post(move || target.inject_data(&data));
    }
}

/// A Face over an in-memory transport, driven by a mock clock.
pub struct DummyClientFace {
    face: Face,
    clock: Rc<MockClock>,
    state: Rc<DummyState>,
}

impl DummyClientFace {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// A face whose fake forwarder answers RIB commands with code 200.
    pub fn with_registration_reply() -> Self {
        Self::with_options(Options {
            enable_registration_reply: true,
            ..Options::default()
        })
    }

    pub fn with_options(options: Options) -> Self {
        let clock = Rc::new(MockClock::new());
        let transport = Rc::new(DummyTransport::new());
        let face = Face::construct(transport.clone(), clock.clone(), Rc::new(DigestSigner));

        let state = Rc::new(DummyState {
            io: face.io_context().clone(),
            transport: transport.clone(),
            sent_interests: RefCell::new(Vec::new()),
            sent_data: RefCell::new(Vec::new()),
            sent_nacks: RefCell::new(Vec::new()),
            link: RefCell::new(None),
        });

        let weak_state = Rc::downgrade(&state);
        transport.set_on_send(Box::new(move |wire| {
            if let Some(state) = weak_state.upgrade() {
                state.handle_sent(wire, &options);
            }
        }));

        // run the posted initial connect so receive works right away
        face.io_context().poll();

        Self { face, clock, state }
    }

    pub fn face(&self) -> &Face {
        &self.face
    }

    /* ----------------------------- packet logs ------------------------ */

    pub fn sent_interests(&self) -> Vec<Interest> {
        self.state.sent_interests.borrow().clone()
    }

    pub fn sent_data(&self) -> Vec<Data> {
        self.state.sent_data.borrow().clone()
    }

    pub fn sent_nacks(&self) -> Vec<Nack> {
        self.state.sent_nacks.borrow().clone()
    }

    /* ----------------------------- receive ---------------------------- */

    /// Delivers an Interest as if the forwarder sent it.
    pub fn receive_interest(&self, interest: &Interest) {
        self.state.inject_interest(interest);
    }

    /// Delivers a Data as if the forwarder sent it.
    pub fn receive_data(&self, data: &Data) {
        self.state.inject_data(data);
    }

    /// Delivers a Nack as if the forwarder sent it.
    pub fn receive_nack(&self, nack: &Nack) {
        self.state.inject_nack(nack);
    }

    /* ----------------------------- clock ------------------------------ */

    /// Advances the mock clock by `tick` and drains the loop once.
    pub fn advance_clocks(&self, tick: Duration) {
        self.advance_clocks_times(tick, 1);
    }

    /// Advances the mock clock `times` times by `tick`, draining the loop
    /// after each step.
    pub fn advance_clocks_times(&self, tick: Duration, times: usize) {
        for _ in 0..times {
            self.clock.advance(tick);
            self.face.io_context().poll();
        }
    }

    /* ----------------------------- broadcast link --------------------- */

    /// Joins this face and `other` onto one broadcast link.
    pub fn link_to(&self, other: &DummyClientFace) -> Result<()> {
        let mine = self.state.link.borrow().clone();
        let theirs = other.state.link.borrow().clone();
        match (mine, theirs) {
            (Some(a), Some(b)) => {
                if !Rc::ptr_eq(&a, &b) {
                    return Err(Error::Transport(
                        "Face has already been linked to another face".into(),
                    ));
                }
                Ok(())
            }
            (None, Some(link)) => {
                link.faces.borrow_mut().push(Rc::downgrade(&self.state));
                *self.state.link.borrow_mut() = Some(link);
                Ok(())
            }
            (Some(link), None) => {
                link.faces.borrow_mut().push(Rc::downgrade(&other.state));
                *other.state.link.borrow_mut() = Some(link);
                Ok(())
            }
            (None, None) => {
                let link = Rc::new(BroadcastLink::default());
                link.faces.borrow_mut().push(Rc::downgrade(&self.state));
                link.faces.borrow_mut().push(Rc::downgrade(&other.state));
                *self.state.link.borrow_mut() = Some(link.clone());
                *other.state.link.borrow_mut() = Some(link);
                Ok(())
            }
        }
    }

    /// Leaves the broadcast link.
    pub fn unlink(&self) {
        let Some(link) = self.state.link.borrow_mut().take() else {
            return;
        };
        let this = Rc::downgrade(&self.state);
        link.faces
            .borrow_mut()
            .retain(|peer| !peer.ptr_eq(&this) && peer.upgrade().is_some());

        // a link with a single remaining face is dissolved
        let last = {
            let faces = link.faces.borrow();
            if faces.len() == 1 {
                faces[0].upgrade()
            } else {
                None
            }
        };
        if let Some(last) = last {
            *last.link.borrow_mut() = None;
            link.faces.borrow_mut().clear();
        }
    }
}

impl Default for DummyClientFace {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DummyClientFace {
    fn drop(&mut self) {
        self.unlink();
    }
}

impl std::ops::Deref for DummyClientFace {
    type Target = Face;

    fn deref(&self) -> &Face {
        &self.face
    }
}
