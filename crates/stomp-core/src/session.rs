//! The session state machine.
//!
//! `Session` validates commands against the negotiated version and the
//! current lifecycle state, allocates and resolves subscription and
//! transaction tokens, and tracks pending receipts — all without touching
//! I/O. It is the layer a transport drives: call a `Session` method to get
//! the `Frame` to send, hand inbound frames back to `connected`/`message`/
//! `receipt` as they arrive.
//!
//! Generic over an opaque context type `Ctx` a caller can attach to a
//! subscription (a handler reference, an error destination, ...) and get
//! back unchanged from [`Session::replay`]. Defaults to `()` for callers
//! that don't need one.

use std::collections::HashSet;

use stomp_proto::{
    Frame,
    spec::{
        self, CONNECTED, DESTINATION_HEADER, ID_HEADER, MESSAGE, RECEIPT, RECEIPT_HEADER,
        RECEIPT_ID_HEADER, SERVER_HEADER, SESSION_HEADER, SUBSCRIBE, SUBSCRIPTION_HEADER,
        TRANSACTION_HEADER, UNSUBSCRIBE, VERSION_1_0, VERSION_HEADER, VERSIONS,
    },
};

use crate::{commands, error::ProtocolError};

/// A subscription correlation handle: `(ID_HEADER, id)` under 1.1+, or
/// `(DESTINATION_HEADER, destination)` as a 1.0 fallback.
pub type SubscriptionToken = (String, String);

/// The session's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection attempt in progress.
    Disconnected,
    /// `CONNECT`/`STOMP` sent, waiting for `CONNECTED`.
    Connecting,
    /// `CONNECTED` received; the session is live.
    Connected,
    /// `DISCONNECT` sent with a receipt requested; waiting for that receipt
    /// (or an explicit [`Session::flush`]) before dropping state.
    Disconnecting,
}

/// One live subscription: what was sent, and the caller's opaque context.
#[derive(Debug, Clone)]
struct Subscription<Ctx> {
    destination: String,
    headers: Vec<(String, String)>,
    context: Option<Ctx>,
}

/// Something that can be resolved to a [`SubscriptionToken`]: a token
/// itself, an inbound/outbound [`Frame`], or a bare headers list. Models
/// `unsubscribe`'s duck-typed argument as a tagged input variant.
pub enum SubscriptionRef<'a> {
    /// An already-resolved token.
    Token(SubscriptionToken),
    /// A frame carrying `id` or `destination`.
    Frame(&'a Frame),
    /// A headers list carrying `id` or `destination`.
    Headers(&'a [(String, String)]),
}

impl<'a> From<SubscriptionToken> for SubscriptionRef<'a> {
    fn from(token: SubscriptionToken) -> Self {
        Self::Token(token)
    }
}

impl<'a> From<&'a Frame> for SubscriptionRef<'a> {
    fn from(frame: &'a Frame) -> Self {
        Self::Frame(frame)
    }
}

impl<'a> From<&'a [(String, String)]> for SubscriptionRef<'a> {
    fn from(headers: &'a [(String, String)]) -> Self {
        Self::Headers(headers)
    }
}

/// Something that can be resolved to a transaction id: a `(TRANSACTION_HEADER,
/// id)` token, a frame, or a headers list. Mirrors [`SubscriptionRef`] for
/// `commit`/`abort`.
pub enum TransactionRef<'a> {
    /// An already-resolved `(TRANSACTION_HEADER, id)` token.
    Token((String, String)),
    /// A frame carrying `transaction`.
    Frame(&'a Frame),
    /// A headers list carrying `transaction`.
    Headers(&'a [(String, String)]),
}

impl<'a> From<(String, String)> for TransactionRef<'a> {
    fn from(token: (String, String)) -> Self {
        Self::Token(token)
    }
}

impl<'a> From<&'a Frame> for TransactionRef<'a> {
    fn from(frame: &'a Frame) -> Self {
        Self::Frame(frame)
    }
}

impl<'a> From<&'a [(String, String)]> for TransactionRef<'a> {
    fn from(headers: &'a [(String, String)]) -> Self {
        Self::Headers(headers)
    }
}

/// The protocol session state machine.
#[derive(Debug, Clone)]
pub struct Session<Ctx = ()> {
    /// The version offered at construction; negotiated down (or confirmed)
    /// by `connected`.
    version: String,
    state: SessionState,
    server: Option<String>,
    id: Option<String>,
    check: bool,
    offered_versions: Vec<String>,
    subscriptions: Vec<(SubscriptionToken, Subscription<Ctx>)>,
    transactions: HashSet<String>,
    receipts: HashSet<String>,
    pending_disconnect_receipt: Option<String>,
    transaction_counter: u64,
}

impl<Ctx> Session<Ctx> {
    /// Builds a session that will offer up to `version` (default
    /// [`stomp_proto::spec::DEFAULT_VERSION`]) on `connect`, validating
    /// commands against the current state only when `check` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Frame`] if `version` is not one of
    /// [`stomp_proto::spec::VERSIONS`].
    pub fn new(version: Option<&str>, check: bool) -> Result<Self, ProtocolError> {
        let version = spec::version(version)?;
        Ok(Self {
            version: version.to_string(),
            state: SessionState::Disconnected,
            server: None,
            id: None,
            check,
            offered_versions: Vec::new(),
            subscriptions: Vec::new(),
            transactions: HashSet::new(),
            receipts: HashSet::new(),
            pending_disconnect_receipt: None,
            transaction_counter: 0,
        })
    }

    /// The negotiated (or, before `connected`, the offered) version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The server's self-identification string, once connected.
    #[must_use]
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// The server-assigned session id, once connected.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn check_state(&self, allowed: &[SessionState], operation: &'static str) -> Result<(), ProtocolError> {
        if !self.check || allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ProtocolError::InvalidState { state: self.state, operation })
        }
    }

    fn register_receipt(&mut self, headers: &[(String, String)]) {
        if let Some((_, id)) = headers.iter().find(|(k, _)| k == RECEIPT_HEADER) {
            self.receipts.insert(id.clone());
        }
    }

    /// Builds the `CONNECT` frame and transitions `Disconnected -> Connecting`.
    ///
    /// When `versions` is `None`, offers every version from 1.0 up to and
    /// including this session's configured version.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session is not `Disconnected`).
    pub fn connect(
        &mut self,
        login: Option<&str>,
        passcode: Option<&str>,
        headers: impl IntoIterator<Item = (String, String)>,
        versions: Option<&[&str]>,
        host: Option<&str>,
    ) -> Result<Frame, ProtocolError> {
        self.check_state(&[SessionState::Disconnected], "connect")?;

        self.offered_versions = match versions {
            Some(versions) => versions.iter().map(|v| (*v).to_string()).collect(),
            None => {
                let mut offered = Vec::new();
                for v in VERSIONS {
                    offered.push(v.to_string());
                    if v == self.version {
                        break;
                    }
                }
                offered
            },
        };
        let offered: Vec<&str> = self.offered_versions.iter().map(String::as_str).collect();

        self.state = SessionState::Connecting;
        Ok(commands::connect(login, passcode, headers, Some(&offered), host))
    }

    /// Consumes a `CONNECTED` frame: negotiates the version, records
    /// `server`/`id`, and transitions `Connecting -> Connected`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedFrame`] if `frame` isn't a
    /// `CONNECTED` command, or if it arrived while the session wasn't
    /// `Connecting` (only enforced when `check` is set), or
    /// [`ProtocolError::UnsupportedVersion`] if the peer confirmed a version
    /// never offered.
    pub fn connected(&mut self, frame: &Frame) -> Result<(), ProtocolError> {
        if frame.command != CONNECTED || (self.check && self.state != SessionState::Connecting) {
            return Err(ProtocolError::UnexpectedFrame { state: self.state, command: frame.command.clone() });
        }

        let version = frame.header(VERSION_HEADER).unwrap_or(VERSION_1_0);
        if !self.offered_versions.is_empty() && !self.offered_versions.iter().any(|v| v == version) {
            return Err(ProtocolError::UnsupportedVersion(version.to_string()));
        }

        self.version = version.to_string();
        self.server = frame.header(SERVER_HEADER).map(str::to_string);
        self.id = frame.header(SESSION_HEADER).map(str::to_string);
        self.state = SessionState::Connected;
        Ok(())
    }

    /// Builds the `DISCONNECT` frame. If `receipt` is `None`, the session
    /// finalizes to `Disconnected` immediately (there's nothing to wait
    /// for); otherwise it moves to `Disconnecting` until the matching
    /// `RECEIPT` arrives via [`Session::receipt`], or [`Session::flush`] is
    /// called directly.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session is neither `Connected` nor already `Disconnecting`).
    pub fn disconnect(&mut self, receipt: Option<&str>) -> Result<Frame, ProtocolError> {
        self.check_state(&[SessionState::Connected, SessionState::Disconnecting], "disconnect")?;

        let frame = commands::disconnect(receipt, Some(&self.version));
        self.state = SessionState::Disconnecting;
        match receipt {
            Some(id) => {
                self.receipts.insert(id.to_string());
                self.pending_disconnect_receipt = Some(id.to_string());
            },
            None => self.flush(),
        }
        Ok(frame)
    }

    /// Builds a `SEND` frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or [`ProtocolError::UnknownTransaction`]
    /// if `transaction` names a transaction not currently open.
    pub fn send(
        &mut self,
        destination: &str,
        body: impl Into<Vec<u8>>,
        headers: impl IntoIterator<Item = (String, String)>,
        transaction: Option<&str>,
    ) -> Result<Frame, ProtocolError> {
        self.check_state(&[SessionState::Connected], "send")?;
        if let Some(transaction) = transaction {
            if !self.transactions.contains(transaction) {
                return Err(ProtocolError::UnknownTransaction(transaction.to_string()));
            }
        }
        let headers: Vec<(String, String)> = headers.into_iter().collect();
        self.register_receipt(&headers);
        Ok(commands::send(destination, body, headers, transaction, Some(&self.version)))
    }

    /// Builds a `SUBSCRIBE` frame and allocates its [`SubscriptionToken`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or [`ProtocolError::MissingHeader`] if
    /// `headers` lacks `id` under 1.1+.
    pub fn subscribe(
        &mut self,
        destination: &str,
        headers: impl IntoIterator<Item = (String, String)>,
        context: Option<Ctx>,
    ) -> Result<(Frame, SubscriptionToken), ProtocolError> {
        self.check_state(&[SessionState::Connected], "subscribe")?;
        let headers: Vec<(String, String)> = headers.into_iter().collect();
        let frame = commands::subscribe(destination, headers.clone(), Some(&self.version))?;
        self.register_receipt(&headers);

        let token = subscription_token(&self.version, &headers, destination)?;
        let entry = Subscription { destination: destination.to_string(), headers, context };
        match self.subscriptions.iter_mut().find(|(t, _)| *t == token) {
            Some((_, existing)) => *existing = entry,
            None => self.subscriptions.push((token.clone(), entry)),
        }
        Ok((frame, token))
    }

    /// Resolves `subscription` to a token that must currently be live and
    /// unsubscribes it, whether `subscription` is a token, a frame, or a
    /// headers list (the tagged-variant treatment of the original's
    /// duck-typed argument).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or [`ProtocolError::UnknownSubscription`]
    /// if the resolved token has no live subscription.
    pub fn unsubscribe<'a>(&mut self, subscription: impl Into<SubscriptionRef<'a>>) -> Result<Frame, ProtocolError> {
        self.check_state(&[SessionState::Connected], "unsubscribe")?;
        let token = self.resolve_subscription(subscription.into())?;
        let index = self
            .subscriptions
            .iter()
            .position(|(t, _)| *t == token)
            .ok_or_else(|| ProtocolError::UnknownSubscription(token.clone()))?;
        self.subscriptions.remove(index);
        Ok(commands::unsubscribe(vec![token], Some(&self.version)))
    }

    fn resolve_subscription(&self, subscription: SubscriptionRef<'_>) -> Result<SubscriptionToken, ProtocolError> {
        let headers: &[(String, String)] = match subscription {
            SubscriptionRef::Token(token) => return Ok(token),
            SubscriptionRef::Frame(frame) => {
                if let Some(id) = frame.header(ID_HEADER) {
                    return Ok((ID_HEADER.to_string(), id.to_string()));
                }
                if let Some(dest) = frame.header(DESTINATION_HEADER) {
                    return Ok((DESTINATION_HEADER.to_string(), dest.to_string()));
                }
                &[]
            },
            SubscriptionRef::Headers(headers) => headers,
        };
        if let Some((_, id)) = headers.iter().find(|(k, _)| k == ID_HEADER) {
            return Ok((ID_HEADER.to_string(), id.clone()));
        }
        if let Some((_, dest)) = headers.iter().find(|(k, _)| k == DESTINATION_HEADER) {
            return Ok((DESTINATION_HEADER.to_string(), dest.clone()));
        }
        Err(ProtocolError::MissingHeader { command: UNSUBSCRIBE, header: ID_HEADER, version: self.version.clone() })
    }

    /// Builds an `ACK` frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or the header errors [`commands::ack`]
    /// raises.
    pub fn ack(&mut self, headers: impl IntoIterator<Item = (String, String)>) -> Result<Frame, ProtocolError> {
        self.check_state(&[SessionState::Connected], "ack")?;
        commands::ack(headers, Some(&self.version))
    }

    /// Builds a `NACK` frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or the header errors [`commands::nack`]
    /// raises.
    pub fn nack(&mut self, headers: impl IntoIterator<Item = (String, String)>) -> Result<Frame, ProtocolError> {
        self.check_state(&[SessionState::Connected], "nack")?;
        commands::nack(headers, Some(&self.version))
    }

    /// Opens a transaction, generating an id if `headers` doesn't already
    /// carry a `transaction` header, and returns its token alongside the
    /// `BEGIN` frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or [`ProtocolError::DuplicateTransaction`]
    /// if the (explicit or generated) id is already open.
    pub fn begin(
        &mut self,
        headers: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(Frame, (String, String)), ProtocolError> {
        self.check_state(&[SessionState::Connected], "begin")?;
        let mut headers: Vec<(String, String)> = headers.into_iter().collect();
        let id = match headers.iter().find(|(k, _)| k == TRANSACTION_HEADER) {
            Some((_, id)) => id.clone(),
            None => {
                self.transaction_counter += 1;
                let id = self.transaction_counter.to_string();
                headers.push((TRANSACTION_HEADER.to_string(), id.clone()));
                id
            },
        };
        if !self.transactions.insert(id.clone()) {
            return Err(ProtocolError::DuplicateTransaction(id));
        }
        let frame = commands::begin(headers);
        Ok((frame, (TRANSACTION_HEADER.to_string(), id)))
    }

    /// Commits a transaction resolved from `transaction` (a token, a frame,
    /// or a headers list).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or [`ProtocolError::UnknownTransaction`]
    /// if the resolved id isn't currently open.
    pub fn commit<'a>(
        &mut self,
        transaction: impl Into<TransactionRef<'a>>,
    ) -> Result<(Frame, (String, String)), ProtocolError> {
        self.end_transaction("commit", commands::commit as fn(Vec<(String, String)>) -> Frame, transaction)
    }

    /// Aborts (rolls back) a transaction resolved from `transaction`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidState`] (when `check` is set and the
    /// session isn't `Connected`), or [`ProtocolError::UnknownTransaction`]
    /// if the resolved id isn't currently open.
    pub fn abort<'a>(
        &mut self,
        transaction: impl Into<TransactionRef<'a>>,
    ) -> Result<(Frame, (String, String)), ProtocolError> {
        self.end_transaction("abort", commands::abort as fn(Vec<(String, String)>) -> Frame, transaction)
    }

    fn end_transaction<'a>(
        &mut self,
        operation: &'static str,
        build: fn(Vec<(String, String)>) -> Frame,
        transaction: impl Into<TransactionRef<'a>>,
    ) -> Result<(Frame, (String, String)), ProtocolError> {
        self.check_state(&[SessionState::Connected], operation)?;
        let id = self.resolve_transaction(operation, transaction.into())?;
        if !self.transactions.remove(&id) {
            return Err(ProtocolError::UnknownTransaction(id));
        }
        let frame = build(vec![(TRANSACTION_HEADER.to_string(), id.clone())]);
        Ok((frame, (TRANSACTION_HEADER.to_string(), id)))
    }

    fn resolve_transaction(&self, operation: &'static str, transaction: TransactionRef<'_>) -> Result<String, ProtocolError> {
        let headers: &[(String, String)] = match transaction {
            TransactionRef::Token((_, id)) => return Ok(id),
            TransactionRef::Frame(frame) => {
                if let Some(id) = frame.header(TRANSACTION_HEADER) {
                    return Ok(id.to_string());
                }
                &[]
            },
            TransactionRef::Headers(headers) => headers,
        };
        headers
            .iter()
            .find(|(k, _)| k == TRANSACTION_HEADER)
            .map(|(_, v)| v.clone())
            .ok_or(ProtocolError::MissingHeader {
                command: operation,
                header: TRANSACTION_HEADER,
                version: self.version.clone(),
            })
    }

    /// Resolves an incoming `MESSAGE` frame to its subscription token via
    /// `subscription` (1.1/1.2) or `destination` (1.0).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownSubscription`] if the resolved token
    /// has no live subscription.
    pub fn message(&self, frame: &Frame) -> Result<SubscriptionToken, ProtocolError> {
        let token = if let Some(subscription) = frame.header(SUBSCRIPTION_HEADER) {
            (ID_HEADER.to_string(), subscription.to_string())
        } else if let Some(destination) = frame.header(DESTINATION_HEADER) {
            (DESTINATION_HEADER.to_string(), destination.to_string())
        } else {
            return Err(ProtocolError::MissingHeader {
                command: MESSAGE,
                header: SUBSCRIPTION_HEADER,
                version: self.version.clone(),
            });
        };
        if !self.subscriptions.iter().any(|(t, _)| *t == token) {
            return Err(ProtocolError::UnknownSubscription(token));
        }
        Ok(token)
    }

    /// Consumes a `RECEIPT` frame: verifies the `receipt-id` was pending and
    /// removes it. If it was the receipt a pending `disconnect` was waiting
    /// on, finalizes the disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingHeader`] if the frame lacks
    /// `receipt-id`, or [`ProtocolError::UnknownReceipt`] if the id was
    /// never requested.
    pub fn receipt(&mut self, frame: &Frame) -> Result<String, ProtocolError> {
        let id = frame
            .header(RECEIPT_ID_HEADER)
            .ok_or(ProtocolError::MissingHeader {
                command: RECEIPT,
                header: RECEIPT_ID_HEADER,
                version: self.version.clone(),
            })?
            .to_string();
        if !self.receipts.remove(&id) {
            return Err(ProtocolError::UnknownReceipt(id));
        }
        if self.pending_disconnect_receipt.as_deref() == Some(id.as_str()) {
            self.flush();
        }
        Ok(id)
    }

    /// Drains and returns all live subscriptions in insertion order,
    /// clearing the subscription table. Used by the reconnect path to
    /// re-issue every subscription against the new connection.
    pub fn replay(&mut self) -> Vec<(String, Vec<(String, String)>, Option<Ctx>)> {
        std::mem::take(&mut self.subscriptions)
            .into_iter()
            .map(|(_, sub)| (sub.destination, sub.headers, sub.context))
            .collect()
    }

    /// Drops all subscriptions, transactions, and pending receipts without
    /// emitting any frame. If a `disconnect` was waiting on a receipt,
    /// finalizes it to `Disconnected`.
    pub fn flush(&mut self) {
        self.subscriptions.clear();
        self.transactions.clear();
        self.receipts.clear();
        self.pending_disconnect_receipt = None;
        if self.state == SessionState::Disconnecting {
            self.state = SessionState::Disconnected;
            self.server = None;
            self.id = None;
        }
    }

    /// Treats a STOMP `ERROR` frame as fatal: the session is no longer
    /// usable once a transport observes one.
    ///
    /// # Errors
    ///
    /// Always returns [`ProtocolError::PeerError`] with the frame's
    /// `info()` summary.
    pub fn error(&self, frame: &Frame) -> Result<(), ProtocolError> {
        Err(ProtocolError::PeerError(frame.info()))
    }
}

fn subscription_token(
    version: &str,
    headers: &[(String, String)],
    destination: &str,
) -> Result<SubscriptionToken, ProtocolError> {
    if let Some((_, id)) = headers.iter().find(|(k, _)| k == ID_HEADER) {
        return Ok((ID_HEADER.to_string(), id.clone()));
    }
    if version == VERSION_1_0 {
        return Ok((DESTINATION_HEADER.to_string(), destination.to_string()));
    }
    Err(ProtocolError::MissingHeader { command: SUBSCRIBE, header: ID_HEADER, version: version.to_string() })
}
