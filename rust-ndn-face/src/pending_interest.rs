//! Bookkeeping for an outstanding Interest awaiting Data, Nack, or timeout.

use crate::face::{DataCallback, NackCallback, TimeoutCallback};
use crate::scheduler::ScopedEventId;
use rust_ndn_common::lp::{is_less_severe, Nack};
use rust_ndn_common::ndn::{Data, Interest};
use std::cell::{Cell, RefCell};
use std::fmt;

/// Where a pending Interest came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInterestOrigin {
    /// Expressed by the local application.
    App,
    /// Received from the forwarder and dispatched to local filters.
    Forwarder,
}

impl fmt::Display for PendingInterestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingInterestOrigin::App => write!(f, "app"),
            PendingInterestOrigin::Forwarder => write!(f, "forwarder"),
        }
    }
}

/// One record in the pending-interest table.
///
/// Outcome callbacks are stored as `FnOnce` slots, so each of the three
/// terminal transitions (satisfied, nacked, timed out) can invoke user code
/// at most once.
pub(crate) struct PendingInterest {
    interest: Interest,
    origin: PendingInterestOrigin,
    on_data: RefCell<Option<DataCallback>>,
    on_nack: RefCell<Option<NackCallback>>,
    on_timeout: RefCell<Option<TimeoutCallback>>,
    timeout_event: RefCell<Option<ScopedEventId>>,
    n_out_records: Cell<usize>,
    n_nacks: Cell<usize>,
    least_severe_nack: RefCell<Option<Nack>>,
}

impl PendingInterest {
    /// Record for an Interest expressed by the application.
    pub fn new_app(
        interest: Interest,
        on_data: Option<DataCallback>,
        on_nack: Option<NackCallback>,
        on_timeout: Option<TimeoutCallback>,
    ) -> Self {
        Self {
            interest,
            origin: PendingInterestOrigin::App,
            on_data: RefCell::new(on_data),
            on_nack: RefCell::new(on_nack),
            on_timeout: RefCell::new(on_timeout),
            timeout_event: RefCell::new(None),
            n_out_records: Cell::new(0),
            n_nacks: Cell::new(0),
            least_severe_nack: RefCell::new(None),
        }
    }

    /// Record for an Interest received from the forwarder. Carries no user
    /// callbacks and no timeout.
    pub fn new_forwarder(interest: Interest) -> Self {
        Self {
            interest,
            origin: PendingInterestOrigin::Forwarder,
            on_data: RefCell::new(None),
            on_nack: RefCell::new(None),
            on_timeout: RefCell::new(None),
            timeout_event: RefCell::new(None),
            n_out_records: Cell::new(0),
            n_nacks: Cell::new(0),
            least_severe_nack: RefCell::new(None),
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn origin(&self) -> PendingInterestOrigin {
        self.origin
    }

    /// Arms the timeout timer. The event is cancelled when this record is
    /// dropped, so erasing the entry disarms the timer.
    pub fn set_timeout_event(&self, event: ScopedEventId) {
        *self.timeout_event.borrow_mut() = Some(event);
    }

    /// Notes that the Interest was forwarded to one more destination (the
    /// forwarder itself, or a matching local filter).
    pub fn record_forwarding(&self) {
        self.n_out_records.set(self.n_out_records.get() + 1);
    }

    /// Records an incoming Nack against a forwarded Interest.
    ///
    /// Returns the least severe Nack seen once every destination has Nacked,
    /// and `None` while responses are still outstanding.
    pub fn record_nack(&self, nack: &Nack) -> Option<Nack> {
        self.n_nacks.set(self.n_nacks.get() + 1);
        {
            let mut least = self.least_severe_nack.borrow_mut();
            let replace = match &*least {
                None => true,
                Some(current) => is_less_severe(nack.reason(), current.reason()),
            };
            if replace {
                *least = Some(nack.clone());
            }
        }

        if self.n_nacks.get() < self.n_out_records.get() {
            None
        } else {
            self.least_severe_nack.borrow().clone()
        }
    }

    pub fn invoke_data_callback(&self, data: &Data) {
        if let Some(callback) = self.on_data.borrow_mut().take() {
            callback(&self.interest, data);
        }
    }

    pub fn invoke_nack_callback(&self, nack: &Nack) {
        if let Some(callback) = self.on_nack.borrow_mut().take() {
            callback(&self.interest, nack);
        }
    }

    pub fn invoke_timeout_callback(&self) {
        if let Some(callback) = self.on_timeout.borrow_mut().take() {
            callback(&self.interest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndn_common::lp::NackReason;
    use rust_ndn_common::ndn::Name;
    use std::rc::Rc;

    fn interest(uri: &str) -> Interest {
        Interest::new(Name::from_string(uri).unwrap()).with_nonce(1)
    }

    #[test]
    fn nack_accumulator_waits_for_all_destinations() {
        let entry = PendingInterest::new_forwarder(interest("/A"));
        entry.record_forwarding();
        entry.record_forwarding();

        let first = Nack::new(interest("/A"), NackReason::NoRoute);
        assert!(entry.record_nack(&first).is_none());

        let second = Nack::new(interest("/A"), NackReason::Congestion);
        let out = entry.record_nack(&second).unwrap();
        assert_eq!(out.reason(), NackReason::Congestion);
    }

    #[test]
    fn least_severe_reason_wins() {
        let entry = PendingInterest::new_forwarder(interest("/A"));
        entry.record_forwarding();
        entry.record_forwarding();

        entry.record_nack(&Nack::new(interest("/A"), NackReason::Congestion));
        let out = entry
            .record_nack(&Nack::new(interest("/A"), NackReason::NoRoute))
            .unwrap();
        assert_eq!(out.reason(), NackReason::Congestion);
    }

    #[test]
    fn callbacks_fire_at_most_once() {
        let count = Rc::new(Cell::new(0u32));
        let count2 = count.clone();
        let entry = PendingInterest::new_app(
            interest("/A"),
            Some(Box::new(move |_, _| count2.set(count2.get() + 1))),
            None,
            None,
        );

        let data = Data::new(Name::from_string("/A").unwrap(), "x");
        entry.invoke_data_callback(&data);
        entry.invoke_data_callback(&data);
        assert_eq!(count.get(), 1);

        // absent callbacks are a no-op
        entry.invoke_nack_callback(&Nack::new(interest("/A"), NackReason::NoRoute));
        entry.invoke_timeout_callback();
    }
}
