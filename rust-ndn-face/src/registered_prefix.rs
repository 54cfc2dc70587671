//! Bookkeeping for a prefix registered with the forwarder.

use crate::controller::CommandOptions;
use crate::tables::RecordId;
use rust_ndn_common::ndn::Name;

/// One record in the registered-prefix table: the prefix, the command
/// options it was registered under (reused for unregistration), and the id
/// of the InterestFilter created by the same call, if any.
pub(crate) struct RegisteredPrefix {
    prefix: Name,
    options: CommandOptions,
    filter_id: Option<RecordId>,
}

impl RegisteredPrefix {
    pub fn new(prefix: Name, options: CommandOptions, filter_id: Option<RecordId>) -> Self {
        Self {
            prefix,
            options,
            filter_id,
        }
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    pub fn filter_id(&self) -> Option<RecordId> {
        self.filter_id
    }
}
