//! Producer-side Interest filters and their table records.

use crate::pending_interest::PendingInterestOrigin;
use regex::Regex;
use rust_ndn_common::ndn::{Interest, Name};
use rust_ndn_common::{Error, Result};
use std::cell::RefCell;
use std::fmt;

/// Callback invoked for each Interest matching a filter.
pub type InterestCallback = Box<dyn FnMut(&InterestFilter, &Interest)>;

/// Declares which Interests a producer wants to receive: a name prefix, an
/// optional regular expression over the remaining components, and whether
/// locally expressed Interests may loop back into this filter.
#[derive(Debug, Clone)]
pub struct InterestFilter {
    prefix: Name,
    regex: Option<Regex>,
    allow_loopback: bool,
}

impl InterestFilter {
    pub fn new(prefix: Name) -> Self {
        Self {
            prefix,
            regex: None,
            allow_loopback: true,
        }
    }

    /// Creates a filter whose remainder (the URI of the components after the
    /// prefix) must match `pattern`.
    pub fn with_regex(prefix: Name, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| Error::FilterRegex(e.to_string()))?;
        Ok(Self {
            prefix,
            regex: Some(regex),
            allow_loopback: true,
        })
    }

    /// Sets whether Interests expressed on the same Face may reach this
    /// filter.
    pub fn allow_loopback(mut self, allow: bool) -> Self {
        self.allow_loopback = allow;
        self
    }

    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn allows_loopback(&self) -> bool {
        self.allow_loopback
    }

    /// Checks `name` against the prefix and, if configured, the remainder
    /// regex.
    pub fn matches(&self, name: &Name) -> bool {
        if !self.prefix.is_prefix_of(name) {
            return false;
        }
        match &self.regex {
            None => true,
            Some(regex) => {
                let mut remainder = String::new();
                for component in name.components().skip(self.prefix.len()) {
                    remainder.push('/');
                    remainder.push_str(&component.to_string());
                }
                regex.is_match(&remainder)
            }
        }
    }
}

impl From<Name> for InterestFilter {
    fn from(prefix: Name) -> Self {
        Self::new(prefix)
    }
}

impl fmt::Display for InterestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix)?;
        if let Some(regex) = &self.regex {
            write!(f, "?{}", regex.as_str())?;
        }
        Ok(())
    }
}

/// One record in the interest-filter table.
pub(crate) struct InterestFilterRecord {
    filter: InterestFilter,
    on_interest: RefCell<Option<InterestCallback>>,
}

impl InterestFilterRecord {
    pub fn new(filter: InterestFilter, on_interest: Option<InterestCallback>) -> Self {
        Self {
            filter,
            on_interest: RefCell::new(on_interest),
        }
    }

    pub fn filter(&self) -> &InterestFilter {
        &self.filter
    }

    /// Checks the filter against a pending Interest, honoring the loopback
    /// flag for app-origin Interests.
    pub fn does_match(&self, origin: PendingInterestOrigin, name: &Name) -> bool {
        (self.filter.allow_loopback || origin != PendingInterestOrigin::App)
            && self.filter.matches(name)
    }

    pub fn invoke(&self, interest: &Interest) {
        // the callback is taken out for the duration of the call;
        // reentrant dispatch into the same filter is skipped
        let callback = self.on_interest.borrow_mut().take();
        if let Some(mut callback) = callback {
            callback(&self.filter, interest);
            let mut slot = self.on_interest.borrow_mut();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }
}
