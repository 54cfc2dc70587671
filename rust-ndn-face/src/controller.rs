//! Management-RPC client for the forwarder's RIB module.
//!
//! A typed command is turned into a signed command Interest, expressed
//! through the Face, and the reply Data's content is decoded into a
//! [`ControlResponse`]. Status code 200 is success; everything else,
//! including Nack and timeout, is surfaced through the failure callback.

use crate::face::FaceImpl;
use bytes::Bytes;
use log::debug;
use rust_ndn_common::mgmt::{
    ControlParameters, ControlResponse, ROUTE_FLAG_CHILD_INHERIT, ROUTE_ORIGIN_APP,
};
use rust_ndn_common::ndn::{Data, Interest, Name, NameComponent};
use rust_ndn_common::tlv::{self, TlvElement};
use rust_ndn_common::{Error, Result};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Response code reported when the reply is malformed or the command is
/// rejected server-side without a decodable response.
pub const ERROR_SERVER: u32 = 500;
/// Lowest response code treated as a failure.
pub const ERROR_LBOUND: u32 = 400;
/// Response code synthesized when the command Interest times out.
pub const ERROR_TIMEOUT: u32 = 10060;
/// Response code synthesized when the command Interest is Nacked.
pub const ERROR_NACK: u32 = 10800;

/// Identity selection forwarded to the command signer.
#[derive(Debug, Clone, Default)]
pub struct SigningInfo {
    pub identity: Option<Name>,
}

/// Signs command Interests. Real deployments plug a keychain-backed signer
/// in here; the bundled [`DigestSigner`] appends digest-style components
/// without any key material.
pub trait CommandSigner {
    fn sign_interest(&self, interest: &mut Interest, info: &SigningInfo) -> Result<()>;
}

/// Stand-in signer appending the signed-Interest name components
/// (timestamp, nonce, SignatureInfo, SignatureValue) with a digest
/// placeholder.
#[derive(Debug, Default)]
pub struct DigestSigner;

impl CommandSigner for DigestSigner {
    fn sign_interest(&self, interest: &mut Interest, _info: &SigningInfo) -> Result<()> {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut name = interest.name().clone();
        name.push(NameComponent::new(timestamp_ms.to_be_bytes().to_vec()));
        name.push(NameComponent::new(
            (timestamp_ms as u32).to_be_bytes().to_vec(),
        ));

        let mut info = bytes::BytesMut::new();
        TlvElement::from_nonneg_integer(tlv::TLV_SIGNATURE_TYPE, 0).encode(&mut info);
        let info = TlvElement::new(tlv::TLV_SIGNATURE_INFO, info.freeze()).to_bytes();
        name.push(NameComponent::new(info));

        let value = TlvElement::new(tlv::TLV_SIGNATURE_VALUE, vec![0u8; 32]).to_bytes();
        name.push(NameComponent::new(value));

        interest.set_name(name);
        Ok(())
    }
}

/// Options governing one management command.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Name prefix of the management protocol, `/localhost/nfd` by default.
    pub command_prefix: Name,
    /// Lifetime of the command Interest; a timeout counts as one failed
    /// attempt.
    pub timeout: Duration,
    /// Additional attempts after a timeout before giving up.
    pub retries: u32,
    pub signing: SigningInfo,
}

impl Default for CommandOptions {
    fn default() -> Self {
        let mut command_prefix = Name::new();
        command_prefix.push("localhost");
        command_prefix.push("nfd");
        Self {
            command_prefix,
            timeout: Duration::from_millis(2000),
            retries: 0,
            signing: SigningInfo::default(),
        }
    }
}

/// A typed management command.
pub trait ControlCommand {
    const MODULE: &'static str;
    const VERB: &'static str;
    /// Whether the ControlParameters block rides in the command name.
    const PARAMS_IN_NAME: bool = true;

    fn check_request(params: &ControlParameters) -> Result<()>;

    fn apply_defaults(_params: &mut ControlParameters) {}

    fn check_response(params: &ControlParameters) -> Result<()>;
}

pub struct RibRegisterCommand;

impl ControlCommand for RibRegisterCommand {
    const MODULE: &'static str = "rib";
    const VERB: &'static str = "register";

    fn check_request(params: &ControlParameters) -> Result<()> {
        if params.name.is_none() {
            return Err(Error::NdnPacket("register command requires a Name".into()));
        }
        Ok(())
    }

    fn apply_defaults(params: &mut ControlParameters) {
        params.origin.get_or_insert(ROUTE_ORIGIN_APP);
        params.cost.get_or_insert(0);
        params.flags.get_or_insert(ROUTE_FLAG_CHILD_INHERIT);
    }

    fn check_response(params: &ControlParameters) -> Result<()> {
        if params.name.is_none() || params.face_id.is_none() {
            return Err(Error::NdnPacket(
                "register response lacks Name or FaceId".into(),
            ));
        }
        Ok(())
    }
}

pub struct RibUnregisterCommand;

impl ControlCommand for RibUnregisterCommand {
    const MODULE: &'static str = "rib";
    const VERB: &'static str = "unregister";

    fn check_request(params: &ControlParameters) -> Result<()> {
        if params.name.is_none() {
            return Err(Error::NdnPacket(
                "unregister command requires a Name".into(),
            ));
        }
        Ok(())
    }

    fn apply_defaults(params: &mut ControlParameters) {
        params.origin.get_or_insert(ROUTE_ORIGIN_APP);
    }

    fn check_response(params: &ControlParameters) -> Result<()> {
        if params.name.is_none() {
            return Err(Error::NdnPacket("unregister response lacks Name".into()));
        }
        Ok(())
    }
}

pub struct RibAnnounceCommand;

impl ControlCommand for RibAnnounceCommand {
    const MODULE: &'static str = "rib";
    const VERB: &'static str = "announce";
    // the announcement object rides in ApplicationParameters instead
    const PARAMS_IN_NAME: bool = false;

    fn check_request(_params: &ControlParameters) -> Result<()> {
        Ok(())
    }

    fn check_response(params: &ControlParameters) -> Result<()> {
        if params.name.is_none() {
            return Err(Error::NdnPacket("announce response lacks Name".into()));
        }
        Ok(())
    }
}

pub(crate) type CommandSuccessCallback = Box<dyn FnOnce(ControlParameters)>;
pub(crate) type CommandFailureCallback = Box<dyn FnOnce(ControlResponse)>;

type SuccessSlot = Rc<RefCell<Option<CommandSuccessCallback>>>;
type FailureSlot = Rc<RefCell<Option<CommandFailureCallback>>>;

fn fail(slot: &FailureSlot, response: ControlResponse) {
    if let Some(callback) = slot.borrow_mut().take() {
        callback(response);
    }
}

fn succeed(slot: &SuccessSlot, params: ControlParameters) {
    if let Some(callback) = slot.borrow_mut().take() {
        callback(params);
    }
}

/// Client for management commands, bound to one Face.
pub(crate) struct Controller {
    face: Weak<FaceImpl>,
    signer: Rc<dyn CommandSigner>,
}

impl Controller {
    pub fn new(face: Weak<FaceImpl>, signer: Rc<dyn CommandSigner>) -> Self {
        Self { face, signer }
    }

    /// Issues a command. Exactly one of the callbacks fires, after the reply
    /// arrives or every attempt is exhausted.
    pub fn start<C: ControlCommand + 'static>(
        &self,
        mut params: ControlParameters,
        payload: Option<Bytes>,
        on_success: CommandSuccessCallback,
        on_failure: CommandFailureCallback,
        options: &CommandOptions,
    ) {
        if let Err(e) = C::check_request(&params) {
            on_failure(ControlResponse::new(ERROR_LBOUND, e.to_string()));
            return;
        }
        C::apply_defaults(&mut params);

        send_attempt::<C>(
            self.face.clone(),
            self.signer.clone(),
            params,
            payload,
            Rc::new(RefCell::new(Some(on_success))),
            Rc::new(RefCell::new(Some(on_failure))),
            options.clone(),
            options.retries,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn send_attempt<C: ControlCommand + 'static>(
    face: Weak<FaceImpl>,
    signer: Rc<dyn CommandSigner>,
    params: ControlParameters,
    payload: Option<Bytes>,
    on_success: SuccessSlot,
    on_failure: FailureSlot,
    options: CommandOptions,
    retries_left: u32,
) {
    let Some(face_impl) = face.upgrade() else {
        fail(
            &on_failure,
            ControlResponse::new(ERROR_TIMEOUT, "Face already closed"),
        );
        return;
    };

    let mut name = options.command_prefix.clone();
    name.push(C::MODULE);
    name.push(C::VERB);
    if C::PARAMS_IN_NAME {
        name.push(NameComponent::new(params.encode()));
    }

    let mut interest = Interest::new(name)
        .with_must_be_fresh(true)
        .with_lifetime(options.timeout.as_millis() as u64);
    if let Some(payload) = &payload {
        interest = interest.with_application_parameters(payload.clone());
    }
    if let Err(e) = signer.sign_interest(&mut interest, &options.signing) {
        fail(&on_failure, ControlResponse::new(ERROR_SERVER, e.to_string()));
        return;
    }

    debug!("<C {}/{} {}", C::MODULE, C::VERB, interest.name());

    let on_data = {
        let on_success = on_success.clone();
        let on_failure = on_failure.clone();
        Box::new(move |_: &Interest, data: &Data| {
            process_command_response::<C>(data, &on_success, &on_failure);
        })
    };
    let on_nack = {
        let on_failure = on_failure.clone();
        Box::new(move |_: &Interest, nack: &rust_ndn_common::lp::Nack| {
            fail(
                &on_failure,
                ControlResponse::new(ERROR_NACK, format!("received Nack: {}", nack.reason())),
            );
        })
    };
    let on_timeout = {
        let on_failure2 = on_failure.clone();
        Box::new(move |_: &Interest| {
            if retries_left > 0 {
                debug!(
                    "command {}/{} timed out, {retries_left} retries left",
                    C::MODULE,
                    C::VERB
                );
                send_attempt::<C>(
                    face,
                    signer,
                    params,
                    payload,
                    on_success,
                    on_failure2,
                    options,
                    retries_left - 1,
                );
            } else {
                fail(
                    &on_failure2,
                    ControlResponse::new(ERROR_TIMEOUT, "request timed out"),
                );
            }
        })
    };

    if let Err(e) = face_impl.express_interest(interest, Some(on_data), Some(on_nack), Some(on_timeout)) {
        fail(&on_failure, ControlResponse::new(ERROR_SERVER, e.to_string()));
    }
}

fn process_command_response<C: ControlCommand>(
    data: &Data,
    on_success: &SuccessSlot,
    on_failure: &FailureSlot,
) {
    let response = match ControlResponse::decode(data.content().clone()) {
        Ok(response) => response,
        Err(e) => {
            fail(
                on_failure,
                ControlResponse::new(
                    ERROR_SERVER,
                    format!("ControlResponse decoding failure: {e}"),
                ),
            );
            return;
        }
    };

    if response.code >= ERROR_LBOUND {
        fail(on_failure, response);
        return;
    }

    let params = match ControlParameters::decode(response.body.clone()) {
        Ok(params) => params,
        Err(e) => {
            fail(
                on_failure,
                ControlResponse::new(
                    ERROR_SERVER,
                    format!("ControlParameters decoding failure: {e}"),
                ),
            );
            return;
        }
    };

    if let Err(e) = C::check_response(&params) {
        fail(
            on_failure,
            ControlResponse::new(ERROR_SERVER, format!("Invalid response: {e}")),
        );
        return;
    }

    succeed(on_success, params);
}
