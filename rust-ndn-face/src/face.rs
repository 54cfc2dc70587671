//! The application Face: the endpoint multiplexing one application's
//! consumer and producer operations onto a single transport to an NDN
//! forwarder.
//!
//! DEBUG-level packet logging uses a direction symbol ('<' outgoing, '>'
//! incoming) and a packet type symbol ('I' Interest, 'D' Data, 'N' Nack).
//! A line about an incoming packet may be followed by indented lines about
//! Interests matching filters, Data satisfying Interests, or Nacks rejecting
//! Interests. Prefix registration events log at INFO.

use crate::clock::{Clock, SteadyClock};
use crate::controller::{
    CommandOptions, CommandSigner, Controller, DigestSigner, RibAnnounceCommand,
    RibRegisterCommand, RibUnregisterCommand,
};
use crate::interest_filter::{InterestCallback, InterestFilter, InterestFilterRecord};
use crate::io::IoContext;
use crate::pending_interest::{PendingInterest, PendingInterestOrigin};
use crate::registered_prefix::RegisteredPrefix;
use crate::scheduler::ScopedEventId;
use crate::tables::{RecordContainer, RecordId};
use crate::transport::{make_default_transport, transport_from_uri, Transport};
use bytes::Bytes;
use log::{debug, error, info, warn};
use rust_ndn_common::lp::{is_less_severe, LpPacket, Nack};
use rust_ndn_common::metrics::FaceCounters;
use rust_ndn_common::mgmt::{ControlParameters, ValidityPeriod, ROUTE_FLAG_CHILD_INHERIT};
use rust_ndn_common::ndn::{Data, Interest, Name, PacketKind, MAX_NDN_PACKET_SIZE};
use rust_ndn_common::tlv;
use rust_ndn_common::{Error, Result};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Invoked when a pending Interest is satisfied by Data.
pub type DataCallback = Box<dyn FnOnce(&Interest, &Data)>;
/// Invoked when a pending Interest is rejected by a Nack.
pub type NackCallback = Box<dyn FnOnce(&Interest, &Nack)>;
/// Invoked when a pending Interest expires unanswered.
pub type TimeoutCallback = Box<dyn FnOnce(&Interest)>;
/// Invoked once a prefix registration command succeeds.
pub type RegisterPrefixSuccessCallback = Box<dyn FnOnce(Name)>;
/// Invoked when a prefix registration command fails, with a reason text.
pub type RegisterPrefixFailureCallback = Box<dyn FnOnce(Name, String)>;
/// Invoked once an unregistration command succeeds.
pub type UnregisterSuccessCallback = Box<dyn FnOnce()>;
/// Invoked when an unregistration command fails, with a reason text.
pub type UnregisterFailureCallback = Box<dyn FnOnce(String)>;

/// Finish packet encoding: wrap `wire` into the NDNLP container when any
/// header field is set, and enforce the packet size limit.
fn finish_encoding(
    mut lp: LpPacket,
    wire: Bytes,
    kind: PacketKind,
    name: &Name,
) -> Result<Bytes> {
    let out = if lp.has_headers() {
        lp.set_fragment(wire);
        lp.encode()?
    } else {
        wire
    };

    if out.len() > MAX_NDN_PACKET_SIZE {
        return Err(Error::OversizedPacket {
            kind,
            name: name.clone(),
            size: out.len(),
        });
    }
    Ok(out)
}

pub(crate) struct FaceImpl {
    weak_self: Weak<FaceImpl>,
    io: Rc<IoContext>,
    transport: Rc<dyn Transport>,
    controller: Controller,
    pit: RecordContainer<PendingInterest>,
    filters: RecordContainer<InterestFilterRecord>,
    registered_prefixes: RecordContainer<RegisteredPrefix>,
    counters: FaceCounters,
    work_guard_held: Cell<bool>,
    process_events_timeout: RefCell<Option<ScopedEventId>>,
}

impl FaceImpl {
    fn new(
        weak_self: Weak<FaceImpl>,
        io: Rc<IoContext>,
        transport: Rc<dyn Transport>,
        signer: Rc<dyn CommandSigner>,
    ) -> Self {
        Self {
            controller: Controller::new(weak_self.clone(), signer),
            weak_self,
            io,
            transport,
            pit: RecordContainer::new(),
            filters: RecordContainer::new(),
            registered_prefixes: RecordContainer::new(),
            counters: FaceCounters::new(),
            work_guard_held: Cell::new(false),
            process_events_timeout: RefCell::new(None),
        }
    }

    fn init(self: &Rc<Self>) {
        // the pause-when-idle check must go through the loop, not run inside
        // the erase that emptied the table: a synchronous pause can reorder
        // against a receive dispatch that is still using the transport
        fn make_on_empty(weak: Weak<FaceImpl>) -> Box<dyn Fn()> {
            Box::new(move || {
                if let Some(face) = weak.upgrade() {
                    let weak = face.weak_self.clone();
                    face.io.post(move || {
                        if let Some(face) = weak.upgrade() {
                            face.on_empty_pit_or_no_registered_prefixes();
                        }
                    });
                }
            })
        }
        self.pit.set_on_empty(make_on_empty(self.weak_self.clone()));
        self.registered_prefixes
            .set_on_empty(make_on_empty(self.weak_self.clone()));

        let weak = self.weak_self.clone();
        self.io.post(move || {
            if let Some(face) = weak.upgrade() {
                if let Err(e) = face.ensure_connected(false) {
                    warn!("Failed to connect to forwarder: {e}");
                }
            }
        });
    }

    fn on_empty_pit_or_no_registered_prefixes(&self) {
        if self.pit.is_empty() && self.registered_prefixes.is_empty() {
            self.transport.pause();
            if !self.work_guard_held.get() {
                self.process_events_timeout.borrow_mut().take();
            }
        }
    }

    pub(crate) fn ensure_connected(self: &Rc<Self>, want_resume: bool) -> Result<()> {
        if !self.transport.is_connected() {
            let weak = self.weak_self.clone();
            self.transport.connect(
                &self.io,
                Rc::new(move |wire| {
                    if let Some(face) = weak.upgrade() {
                        face.on_receive_element(wire);
                    }
                }),
            )?;
        }
        if want_resume && !self.transport.is_receiving() {
            self.transport.resume();
        }
        Ok(())
    }

    fn send(&self, wire: Bytes) {
        if let Err(e) = self.transport.send(wire) {
            error!("Failed to send packet: {e}");
        }
    }

    /* ------------------------------------------------------------ *
     * Consumer
     * ------------------------------------------------------------ */

    /// Validates the encoding, allocates the record id, and posts the actual
    /// expression onto the loop. An oversized packet is reported here, with
    /// no state mutated.
    pub(crate) fn express_interest(
        self: &Rc<Self>,
        interest: Interest,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<RecordId> {
        let wire = interest.encode()?;
        let mut lp = LpPacket::new();
        lp.set_next_hop_face_id(interest.tags().next_hop_face_id);
        lp.set_congestion_mark(interest.tags().congestion_mark);
        let finished = finish_encoding(lp, wire, PacketKind::Interest, interest.name())?;

        let id = self.pit.allocate_id();
        let weak = self.weak_self.clone();
        self.io.post(move || {
            if let Some(face) = weak.upgrade() {
                face.do_express_interest(id, interest, finished, on_data, on_nack, on_timeout);
            }
        });
        Ok(id)
    }

    fn do_express_interest(
        self: &Rc<Self>,
        id: RecordId,
        interest: Interest,
        wire: Bytes,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) {
        debug!("<I {interest}");
        if let Err(e) = self.ensure_connected(true) {
            error!("Failed to connect to forwarder: {e}");
            return;
        }

        let entry = self
            .pit
            .insert(id, PendingInterest::new_app(interest, on_data, on_nack, on_timeout));

        let weak = self.weak_self.clone();
        let event = self
            .io
            .scheduler()
            .schedule(entry.interest().lifetime(), move || {
                if let Some(face) = weak.upgrade() {
                    face.on_interest_timeout(id);
                }
            });
        entry.set_timeout_event(ScopedEventId::new(self.io.scheduler(), event));

        // the wire copy reaches the transport before any loopback callback
        entry.record_forwarding();
        self.send(wire);
        self.counters.interests_sent.increment();

        self.dispatch_interest(&entry);
    }

    fn on_interest_timeout(&self, id: RecordId) {
        let Some(entry) = self.pit.erase(id) else {
            return;
        };
        debug!("   timeout {}", entry.interest());
        self.counters.interest_timeouts.increment();
        entry.invoke_timeout_callback();
    }

    pub(crate) fn remove_pending_interest(&self, id: RecordId) {
        self.pit.erase(id);
    }

    pub(crate) fn remove_all_pending_interests(&self) {
        self.pit.clear();
    }

    /// Satisfies matching pending Interests with `data`.
    ///
    /// Returns whether the Data should be sent to the forwarder: it should
    /// when it satisfies a forwarder-origin record, and also when it matches
    /// nothing at all (unsolicited Data).
    fn satisfy_pending_interests(&self, data: &Data) -> bool {
        let mut has_app_match = false;
        let mut has_forwarder_match = false;

        for id in self.pit.ids() {
            let Some(entry) = self.pit.get(id) else {
                continue;
            };
            if !entry.interest().matches_data(data) {
                continue;
            }

            debug!("   satisfying {} from {}", entry.interest(), entry.origin());
            self.pit.erase(id);

            match entry.origin() {
                PendingInterestOrigin::App => {
                    has_app_match = true;
                    entry.invoke_data_callback(data);
                }
                PendingInterestOrigin::Forwarder => has_forwarder_match = true,
            }
        }

        has_forwarder_match || !has_app_match
    }

    /// Records `nack` against matching pending Interests.
    ///
    /// Returns the Nack to send to the forwarder, if any: the least severe
    /// accumulated reason among forwarder-origin records whose every
    /// destination has now Nacked.
    fn nack_pending_interests(&self, nack: &Nack) -> Option<Nack> {
        let mut out_nack: Option<Nack> = None;

        for id in self.pit.ids() {
            let Some(entry) = self.pit.get(id) else {
                continue;
            };
            if !nack.interest().matches_interest(entry.interest()) {
                continue;
            }

            debug!("   nacking {} from {}", entry.interest(), entry.origin());
            let Some(accumulated) = entry.record_nack(nack) else {
                continue;
            };
            self.pit.erase(id);

            match entry.origin() {
                PendingInterestOrigin::App => entry.invoke_nack_callback(&accumulated),
                PendingInterestOrigin::Forwarder => {
                    out_nack = Some(match out_nack.take() {
                        None => accumulated,
                        Some(previous) => {
                            if is_less_severe(accumulated.reason(), previous.reason()) {
                                accumulated
                            } else {
                                previous
                            }
                        }
                    });
                }
            }
        }

        out_nack
    }

    /* ------------------------------------------------------------ *
     * Producer
     * ------------------------------------------------------------ */

    pub(crate) fn set_interest_filter(
        self: &Rc<Self>,
        filter: InterestFilter,
        on_interest: Option<InterestCallback>,
    ) -> RecordId {
        let id = self.filters.allocate_id();
        let weak = self.weak_self.clone();
        self.io.post(move || {
            if let Some(face) = weak.upgrade() {
                info!("setting InterestFilter: {filter}");
                face.filters
                    .insert(id, InterestFilterRecord::new(filter, on_interest));
            }
        });
        id
    }

    pub(crate) fn unset_interest_filter(&self, id: RecordId) {
        if let Some(record) = self.filters.get(id) {
            info!("unsetting InterestFilter: {}", record.filter());
            self.filters.erase(id);
        }
    }

    fn dispatch_interest(&self, entry: &Rc<PendingInterest>) {
        for (_, filter) in self.filters.snapshot() {
            if !filter.does_match(entry.origin(), entry.interest().name()) {
                continue;
            }
            debug!("   matches {}", filter.filter());
            entry.record_forwarding();
            filter.invoke(entry.interest());
        }
    }

    /// Validates the encoding and posts the put onto the loop.
    pub(crate) fn put_data(self: &Rc<Self>, data: Data) -> Result<()> {
        let wire = data.encode()?;
        let mut lp = LpPacket::new();
        lp.set_cache_policy(data.tags().cache_policy);
        lp.set_congestion_mark(data.tags().congestion_mark);
        let finished = finish_encoding(lp, wire, PacketKind::Data, data.name())?;

        let weak = self.weak_self.clone();
        self.io.post(move || {
            if let Some(face) = weak.upgrade() {
                face.do_put_data(&data, finished);
            }
        });
        Ok(())
    }

    fn do_put_data(self: &Rc<Self>, data: &Data, wire: Bytes) {
        debug!("<D {}", data.name());

        let should_send_to_forwarder = self.satisfy_pending_interests(data);
        if !should_send_to_forwarder {
            return;
        }

        if let Err(e) = self.ensure_connected(true) {
            error!("Failed to connect to forwarder: {e}");
            return;
        }
        self.send(wire);
        self.counters.data_sent.increment();
    }

    /// Validates the encoding and posts the Nack onto the loop.
    pub(crate) fn put_nack(self: &Rc<Self>, nack: Nack) -> Result<()> {
        let wire = nack.interest().encode()?;
        let mut lp = LpPacket::new();
        lp.set_nack(nack.reason());
        lp.set_congestion_mark(nack.tags().congestion_mark);
        finish_encoding(lp, wire, PacketKind::Nack, nack.interest().name())?;

        let weak = self.weak_self.clone();
        self.io.post(move || {
            if let Some(face) = weak.upgrade() {
                face.do_put_nack(&nack);
            }
        });
        Ok(())
    }

    fn do_put_nack(self: &Rc<Self>, nack: &Nack) {
        debug!("<N {nack}");

        let Some(out_nack) = self.nack_pending_interests(nack) else {
            return;
        };

        if let Err(e) = self.ensure_connected(true) {
            error!("Failed to connect to forwarder: {e}");
            return;
        }

        let wire = match out_nack.interest().encode() {
            Ok(wire) => wire,
            Err(e) => {
                error!("Failed to encode outgoing Nack: {e}");
                return;
            }
        };
        // the Nack header is mandatory, so this is always NDNLP-wrapped
        let mut lp = LpPacket::new();
        lp.set_nack(out_nack.reason());
        lp.set_congestion_mark(out_nack.tags().congestion_mark);
        match finish_encoding(lp, wire, PacketKind::Nack, out_nack.interest().name()) {
            Ok(finished) => {
                self.send(finished);
                self.counters.nacks_sent.increment();
            }
            Err(e) => error!("Failed to encode outgoing Nack: {e}"),
        }
    }

    /* ------------------------------------------------------------ *
     * Prefix registration
     * ------------------------------------------------------------ */

    pub(crate) fn register_prefix(
        self: &Rc<Self>,
        prefix: Name,
        filter: Option<(InterestFilter, Option<InterestCallback>)>,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
        flags: u64,
        options: CommandOptions,
    ) -> RecordId {
        info!("registering prefix: {prefix}");
        let id = self.registered_prefixes.allocate_id();

        let params = ControlParameters::new()
            .with_name(prefix.clone())
            .with_flags(flags);

        let weak = self.weak_self.clone();
        let registered_prefix = prefix.clone();
        let registered_options = options.clone();
        let on_ok = Box::new(move |_params: ControlParameters| {
            if let Some(face) = weak.upgrade() {
                face.after_prefix_registered(
                    id,
                    registered_prefix,
                    filter,
                    registered_options,
                    on_success,
                );
            }
        });
        let on_fail = Box::new(move |resp: rust_ndn_common::mgmt::ControlResponse| {
            info!("register prefix failed: {prefix}");
            if let Some(callback) = on_failure {
                callback(prefix, resp.text);
            }
        });

        self.controller
            .start::<RibRegisterCommand>(params, None, on_ok, on_fail, &options);
        id
    }

    pub(crate) fn announce_prefix(
        self: &Rc<Self>,
        prefix: Name,
        expiration: Duration,
        validity: Option<ValidityPeriod>,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
        options: CommandOptions,
    ) -> RecordId {
        info!("announcing prefix: {prefix}");
        let id = self.registered_prefixes.allocate_id();

        let mut announcement = rust_ndn_common::mgmt::PrefixAnnouncement::new(
            prefix.clone(),
            expiration.as_millis() as u64,
        );
        if let Some(validity) = validity {
            announcement = announcement.with_validity(validity);
        }
        let version = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let payload = match announcement.to_data(version).encode() {
            Ok(wire) => wire,
            Err(e) => {
                if let Some(callback) = on_failure {
                    callback(prefix, e.to_string());
                }
                return id;
            }
        };

        let weak = self.weak_self.clone();
        let announced_prefix = prefix.clone();
        let announced_options = options.clone();
        let on_ok = Box::new(move |_params: ControlParameters| {
            if let Some(face) = weak.upgrade() {
                face.after_prefix_registered(id, announced_prefix, None, announced_options, on_success);
            }
        });
        let on_fail = Box::new(move |resp: rust_ndn_common::mgmt::ControlResponse| {
            info!("announce prefix failed: {prefix}");
            if let Some(callback) = on_failure {
                callback(prefix, resp.text);
            }
        });

        self.controller.start::<RibAnnounceCommand>(
            ControlParameters::new(),
            Some(payload),
            on_ok,
            on_fail,
            &options,
        );
        id
    }

    fn after_prefix_registered(
        self: &Rc<Self>,
        id: RecordId,
        prefix: Name,
        filter: Option<(InterestFilter, Option<InterestCallback>)>,
        options: CommandOptions,
        on_success: Option<RegisterPrefixSuccessCallback>,
    ) {
        info!("registered prefix: {prefix}");

        let filter_id = filter.map(|(filter, on_interest)| {
            let filter_id = self.filters.allocate_id();
            info!("setting InterestFilter: {filter}");
            self.filters
                .insert(filter_id, InterestFilterRecord::new(filter, on_interest));
            filter_id
        });

        self.registered_prefixes
            .insert(id, RegisteredPrefix::new(prefix.clone(), options, filter_id));

        if let Some(callback) = on_success {
            callback(prefix);
        }
    }

    pub(crate) fn unregister_prefix(
        self: &Rc<Self>,
        id: RecordId,
        on_success: Option<UnregisterSuccessCallback>,
        on_failure: Option<UnregisterFailureCallback>,
    ) {
        let Some(record) = self.registered_prefixes.get(id) else {
            if let Some(callback) = on_failure {
                callback("unrecognized handle".to_string());
            }
            return;
        };

        // the paired filter goes first, local only
        if let Some(filter_id) = record.filter_id() {
            self.filters.erase(filter_id);
        }

        let prefix = record.prefix().clone();
        info!("unregistering prefix: {prefix}");

        let params = ControlParameters::new().with_name(prefix.clone());

        let weak = self.weak_self.clone();
        let unregistered_prefix = prefix.clone();
        let on_ok = Box::new(move |_params: ControlParameters| {
            if let Some(face) = weak.upgrade() {
                info!("unregistered prefix: {unregistered_prefix}");
                face.registered_prefixes.erase(id);
                if let Some(callback) = on_success {
                    callback();
                }
            }
        });
        let on_fail = Box::new(move |resp: rust_ndn_common::mgmt::ControlResponse| {
            info!("unregister prefix failed: {prefix}");
            if let Some(callback) = on_failure {
                callback(resp.text);
            }
        });

        self.controller
            .start::<RibUnregisterCommand>(params, None, on_ok, on_fail, record.options());
    }

    /// Local removal used by handle cancellation: drops the record and its
    /// paired filter without issuing an unregister command.
    pub(crate) fn remove_registered_prefix(&self, id: RecordId) {
        if let Some(record) = self.registered_prefixes.get(id) {
            if let Some(filter_id) = record.filter_id() {
                self.filters.erase(filter_id);
            }
            self.registered_prefixes.erase(id);
        }
    }

    /* ------------------------------------------------------------ *
     * Receive path
     * ------------------------------------------------------------ */

    pub(crate) fn on_receive_element(self: &Rc<Self>, wire: Bytes) {
        let lp = match LpPacket::decode(wire) {
            Ok(lp) => lp,
            Err(e) => {
                warn!("Failed to decode incoming packet: {e}");
                return;
            }
        };
        let Some(fragment) = lp.fragment().cloned() else {
            warn!("Incoming NDNLP packet has no fragment");
            return;
        };

        let mut peek = fragment.clone();
        let net_type = match tlv::decode_var_number(&mut peek) {
            Ok(net_type) => net_type,
            Err(e) => {
                warn!("Failed to decode incoming packet: {e}");
                return;
            }
        };

        match net_type {
            tlv::TLV_INTEREST => {
                let mut interest = match Interest::decode(fragment) {
                    Ok(interest) => interest,
                    Err(e) => {
                        warn!("Failed to decode incoming Interest: {e}");
                        return;
                    }
                };
                if let Some(reason) = lp.nack() {
                    let mut nack = Nack::new(interest, reason);
                    nack.tags_mut().incoming_face_id = lp.incoming_face_id();
                    nack.tags_mut().congestion_mark = lp.congestion_mark();
                    debug!(">N {nack}");
                    self.counters.nacks_received.increment();
                    // unresolved accumulations may yield an outbound Nack on
                    // a later put_nack, not on the receive path
                    self.nack_pending_interests(&nack);
                } else {
                    interest.tags_mut().incoming_face_id = lp.incoming_face_id();
                    interest.tags_mut().next_hop_face_id = lp.next_hop_face_id();
                    interest.tags_mut().congestion_mark = lp.congestion_mark();
                    debug!(">I {interest}");
                    self.counters.interests_received.increment();
                    self.process_incoming_interest(interest);
                }
            }
            tlv::TLV_DATA => {
                let mut data = match Data::decode(fragment) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("Failed to decode incoming Data: {e}");
                        return;
                    }
                };
                data.tags_mut().incoming_face_id = lp.incoming_face_id();
                data.tags_mut().congestion_mark = lp.congestion_mark();
                data.tags_mut().cache_policy = lp.cache_policy();
                debug!(">D {}", data.name());
                self.counters.data_received.increment();
                self.satisfy_pending_interests(&data);
            }
            other => warn!("Unrecognized network packet type {other}"),
        }
    }

    fn process_incoming_interest(self: &Rc<Self>, interest: Interest) {
        let id = self.pit.allocate_id();
        let entry = self.pit.insert(id, PendingInterest::new_forwarder(interest));
        self.dispatch_interest(&entry);
    }

    /* ------------------------------------------------------------ *
     * Lifecycle
     * ------------------------------------------------------------ */

    fn acquire_work_guard(&self) {
        if !self.work_guard_held.replace(true) {
            self.io.add_work_guard();
        }
    }

    pub(crate) fn release_work_guard(&self) {
        if self.work_guard_held.replace(false) {
            self.io.remove_work_guard();
        }
    }

    pub(crate) fn shutdown(&self) {
        self.release_work_guard();
        // no user callbacks fire, and no unregister commands are issued:
        // the forwarder will expire the routes
        self.pit.clear();
        self.registered_prefixes.clear();
    }
}

/// The application-side endpoint for NDN, analogous to a socket.
///
/// All operations assume they run on the Face's event-loop thread; mutating
/// entry points post their work onto the loop and return immediately.
/// Cloning yields another handle to the same Face, letting producer
/// callbacks reply through it.
#[derive(Clone)]
pub struct Face {
    io: Rc<IoContext>,
    inner: Rc<FaceImpl>,
}

impl Face {
    /// Connects using the transport chosen by environment and configuration
    /// (see [`make_default_transport`]).
    pub fn new() -> Result<Self> {
        Ok(Self::with_transport(make_default_transport(None)?))
    }

    /// Connects to the forwarder named by a `unix://` or `tcp://` URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        Ok(Self::with_transport(transport_from_uri(uri)?))
    }

    /// Uses a caller-supplied transport.
    pub fn with_transport(transport: Rc<dyn Transport>) -> Self {
        Self::construct(
            transport,
            Rc::new(SteadyClock::new()),
            Rc::new(DigestSigner),
        )
    }

    pub(crate) fn construct(
        transport: Rc<dyn Transport>,
        clock: Rc<dyn Clock>,
        signer: Rc<dyn CommandSigner>,
    ) -> Self {
        let io = IoContext::new(clock);
        let io_for_impl = io.clone();
        let inner = Rc::new_cyclic(|weak| {
            FaceImpl::new(weak.clone(), io_for_impl, transport, signer)
        });
        inner.init();
        Self { io, inner }
    }

    pub(crate) fn inner(&self) -> &Rc<FaceImpl> {
        &self.inner
    }

    pub(crate) fn io_context(&self) -> &Rc<IoContext> {
        &self.io
    }

    /// Expresses an Interest. Each callback may be absent; at most one of
    /// them fires, exactly once.
    pub fn express_interest(
        &self,
        interest: Interest,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Result<PendingInterestHandle> {
        let id = self
            .inner
            .express_interest(interest, on_data, on_nack, on_timeout)?;
        Ok(PendingInterestHandle {
            face: Rc::downgrade(&self.inner),
            id,
        })
    }

    /// Publishes Data. Data satisfying only locally expressed Interests
    /// stays local; Data satisfying a forwarder-origin Interest, or nothing
    /// at all, goes to the forwarder.
    pub fn put(&self, data: Data) -> Result<()> {
        self.inner.put_data(data)
    }

    /// Rejects a previously received Interest. The Nack is sent once every
    /// local destination of that Interest has Nacked, carrying the least
    /// severe accumulated reason.
    pub fn put_nack(&self, nack: Nack) -> Result<()> {
        self.inner.put_nack(nack)
    }

    /// Installs an Interest filter without registering anything with the
    /// forwarder.
    pub fn set_interest_filter(
        &self,
        filter: impl Into<InterestFilter>,
        on_interest: Option<InterestCallback>,
    ) -> InterestFilterHandle {
        let id = self.inner.set_interest_filter(filter.into(), on_interest);
        InterestFilterHandle {
            face: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Registers the filter's prefix with the forwarder and, on success,
    /// installs the filter.
    pub fn set_interest_filter_with_registration(
        &self,
        filter: InterestFilter,
        on_interest: Option<InterestCallback>,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
    ) -> RegisteredPrefixHandle {
        let prefix = filter.prefix().clone();
        let id = self.inner.register_prefix(
            prefix,
            Some((filter, on_interest)),
            on_success,
            on_failure,
            ROUTE_FLAG_CHILD_INHERIT,
            CommandOptions::default(),
        );
        RegisteredPrefixHandle {
            face: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Registers a prefix with default flags and options.
    pub fn register_prefix(
        &self,
        prefix: Name,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
    ) -> RegisteredPrefixHandle {
        self.register_prefix_with_options(
            prefix,
            ROUTE_FLAG_CHILD_INHERIT,
            CommandOptions::default(),
            on_success,
            on_failure,
        )
    }

    /// Registers a prefix with explicit route flags and command options.
    pub fn register_prefix_with_options(
        &self,
        prefix: Name,
        flags: u64,
        options: CommandOptions,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
    ) -> RegisteredPrefixHandle {
        let id = self
            .inner
            .register_prefix(prefix, None, on_success, on_failure, flags, options);
        RegisteredPrefixHandle {
            face: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Announces a prefix through a signed PrefixAnnouncement object.
    pub fn announce_prefix(
        &self,
        prefix: Name,
        expiration: Duration,
        validity: Option<ValidityPeriod>,
        on_success: Option<RegisterPrefixSuccessCallback>,
        on_failure: Option<RegisterPrefixFailureCallback>,
    ) -> RegisteredPrefixHandle {
        let id = self.inner.announce_prefix(
            prefix,
            expiration,
            validity,
            on_success,
            on_failure,
            CommandOptions::default(),
        );
        RegisteredPrefixHandle {
            face: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Removes every pending Interest without invoking callbacks.
    pub fn remove_all_pending_interests(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.io.post(move || {
            if let Some(face) = weak.upgrade() {
                face.remove_all_pending_interests();
            }
        });
    }

    /// Number of Interests currently pending.
    pub fn n_pending_interests(&self) -> usize {
        self.inner.pit.len()
    }

    pub fn counters(&self) -> &FaceCounters {
        &self.inner.counters
    }

    /// Runs the event loop. With no timeout the call returns once the loop
    /// runs out of work; `keep_running` holds the loop alive even when idle.
    pub fn process_events(&self, timeout: Option<Duration>, keep_running: bool) {
        if self.io.is_stopped() {
            self.io.restart();
        }

        if let Some(timeout) = timeout {
            if !timeout.is_zero() {
                let io = Rc::downgrade(&self.io);
                let weak = Rc::downgrade(&self.inner);
                let event = self.io.scheduler().schedule(timeout, move || {
                    if let Some(face) = weak.upgrade() {
                        face.release_work_guard();
                    }
                    if let Some(io) = io.upgrade() {
                        io.stop();
                    }
                });
                *self.inner.process_events_timeout.borrow_mut() =
                    Some(ScopedEventId::new(self.io.scheduler(), event));
            }
        }

        if keep_running {
            self.inner.acquire_work_guard();
        }

        self.io.run();
    }

    /// Clears all tables (without callbacks or unregister commands) and
    /// closes the transport.
    pub fn shutdown(&self) {
        let weak = Rc::downgrade(&self.inner);
        self.io.post(move || {
            if let Some(face) = weak.upgrade() {
                face.shutdown();
                if face.transport.is_connected() {
                    face.transport.close();
                }
            }
        });
    }
}

/* ---------------------------------------------------------------- *
 * Handles
 * ---------------------------------------------------------------- */

/// Handle of a pending Interest. Safe to use after the Face is gone.
#[derive(Debug)]
pub struct PendingInterestHandle {
    face: Weak<FaceImpl>,
    id: RecordId,
}

impl PendingInterestHandle {
    /// Posts removal of the pending Interest onto the loop; no callbacks
    /// will fire. A no-op if the Face has been dropped.
    pub fn cancel(&self) {
        if let Some(face) = self.face.upgrade() {
            let weak = face.weak_self.clone();
            let id = self.id;
            face.io.post(move || {
                if let Some(face) = weak.upgrade() {
                    face.remove_pending_interest(id);
                }
            });
        }
    }
}

/// A pending-Interest handle that cancels when dropped.
pub struct ScopedPendingInterestHandle(PendingInterestHandle);

impl From<PendingInterestHandle> for ScopedPendingInterestHandle {
    fn from(handle: PendingInterestHandle) -> Self {
        Self(handle)
    }
}

impl Drop for ScopedPendingInterestHandle {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Handle of an installed Interest filter.
pub struct InterestFilterHandle {
    face: Weak<FaceImpl>,
    id: RecordId,
}

impl InterestFilterHandle {
    /// Posts removal of the filter onto the loop. A no-op if the Face has
    /// been dropped.
    pub fn cancel(&self) {
        if let Some(face) = self.face.upgrade() {
            let weak = face.weak_self.clone();
            let id = self.id;
            face.io.post(move || {
                if let Some(face) = weak.upgrade() {
                    face.unset_interest_filter(id);
                }
            });
        }
    }
}

/// An Interest-filter handle that cancels when dropped.
pub struct ScopedInterestFilterHandle(InterestFilterHandle);

impl From<InterestFilterHandle> for ScopedInterestFilterHandle {
    fn from(handle: InterestFilterHandle) -> Self {
        Self(handle)
    }
}

impl Drop for ScopedInterestFilterHandle {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Handle of a registered prefix.
pub struct RegisteredPrefixHandle {
    face: Weak<FaceImpl>,
    id: RecordId,
}

impl RegisteredPrefixHandle {
    /// Posts local removal of the record (and its paired filter) onto the
    /// loop, without telling the forwarder; the route expires there on its
    /// own. A no-op if the Face has been dropped.
    pub fn cancel(&self) {
        if let Some(face) = self.face.upgrade() {
            let weak = face.weak_self.clone();
            let id = self.id;
            face.io.post(move || {
                if let Some(face) = weak.upgrade() {
                    face.remove_registered_prefix(id);
                }
            });
        }
    }

    /// Issues a RibUnregister command and removes the record on success.
    /// Unregistering twice, or through a cancelled handle, fails with
    /// "unrecognized handle".
    pub fn unregister(
        &self,
        on_success: Option<UnregisterSuccessCallback>,
        on_failure: Option<UnregisterFailureCallback>,
    ) {
        if let Some(face) = self.face.upgrade() {
            let weak = face.weak_self.clone();
            let id = self.id;
            face.io.post(move || {
                if let Some(face) = weak.upgrade() {
                    face.unregister_prefix(id, on_success, on_failure);
                }
            });
        } else if let Some(callback) = on_failure {
            callback("Face already closed".to_string());
        }
    }
}

/// A registered-prefix handle that cancels (locally) when dropped.
pub struct ScopedRegisteredPrefixHandle(RegisteredPrefixHandle);

impl From<RegisteredPrefixHandle> for ScopedRegisteredPrefixHandle {
    fn from(handle: RegisteredPrefixHandle) -> Self {
        Self(handle)
    }
}

impl Drop for ScopedRegisteredPrefixHandle {
    fn drop(&mut self) {
        self.0.cancel();
    }
}
