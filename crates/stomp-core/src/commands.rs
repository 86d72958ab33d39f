//! Pure, no-I/O constructors that build a validated [`Frame`] for every
//! STOMP command.
//!
//! Each function here just builds and validates; it never touches session
//! state. [`crate::session::Session`] is the layer that decides *whether* a
//! command is currently legal and allocates the tokens these frames carry.

use stomp_proto::{
    Frame,
    spec::{
        ABORT, ACCEPT_VERSION_HEADER, ACK, BEGIN, COMMIT, CONNECT, DESTINATION_HEADER,
        DISCONNECT, DEFAULT_VERSION, HOST_HEADER, ID_HEADER, LOGIN_HEADER, MESSAGE_ID_HEADER,
        NACK, PASSCODE_HEADER, RECEIPT_HEADER, SEND, STOMP, SUBSCRIBE, SUBSCRIPTION_HEADER,
        TRANSACTION_HEADER, UNSUBSCRIBE, VERSION_1_0,
    },
};

use crate::error::ProtocolError;

fn merge(base: Vec<(String, String)>, extra: impl IntoIterator<Item = (String, String)>) -> Vec<(String, String)> {
    let mut out = base;
    out.extend(extra);
    out
}

/// Builds a `CONNECT` frame.
///
/// `versions` defaults to `[DEFAULT_VERSION]` when `None`. When any
/// candidate beyond 1.0 is offered, the frame carries `accept-version` (the
/// comma-joined candidate list) and `host` (falling back to `"/"` if the
/// caller didn't supply one), per §4.4. Always encoded under version 1.0:
/// `CONNECT` precedes negotiation, and 1.0 is the one version whose headers
/// are never escaped for this command, matching the interop convention
/// brokers expect during the handshake itself.
#[must_use]
pub fn connect(
    login: Option<&str>,
    passcode: Option<&str>,
    headers: impl IntoIterator<Item = (String, String)>,
    versions: Option<&[&str]>,
    host: Option<&str>,
) -> Frame {
    connect_like(CONNECT, login, passcode, headers, versions, host)
}

/// Builds a `STOMP` frame: the 1.1+ alias for `CONNECT`, identical in every
/// other respect.
#[must_use]
pub fn stomp(
    login: Option<&str>,
    passcode: Option<&str>,
    headers: impl IntoIterator<Item = (String, String)>,
    versions: Option<&[&str]>,
    host: Option<&str>,
) -> Frame {
    connect_like(STOMP, login, passcode, headers, versions, host)
}

fn connect_like(
    command: &'static str,
    login: Option<&str>,
    passcode: Option<&str>,
    headers: impl IntoIterator<Item = (String, String)>,
    versions: Option<&[&str]>,
    host: Option<&str>,
) -> Frame {
    let versions = versions.unwrap_or(&[DEFAULT_VERSION]);
    let mut base = Vec::new();
    if let Some(login) = login {
        base.push((LOGIN_HEADER.to_string(), login.to_string()));
    }
    if let Some(passcode) = passcode {
        base.push((PASSCODE_HEADER.to_string(), passcode.to_string()));
    }
    if versions.iter().any(|v| *v != VERSION_1_0) {
        base.push((ACCEPT_VERSION_HEADER.to_string(), versions.join(",")));
        base.push((HOST_HEADER.to_string(), host.unwrap_or("/").to_string()));
    }
    Frame::new(command, merge(base, headers), Vec::new(), VERSION_1_0)
}

/// Builds a `DISCONNECT` frame, attaching a `receipt` header if requested.
#[must_use]
pub fn disconnect(receipt: Option<&str>, version: Option<&str>) -> Frame {
    let mut headers = Vec::new();
    if let Some(receipt) = receipt {
        headers.push((RECEIPT_HEADER.to_string(), receipt.to_string()));
    }
    Frame::new(DISCONNECT, headers, Vec::new(), version.unwrap_or(DEFAULT_VERSION))
}

/// Builds a `SEND` frame for `destination` carrying `body`, merging in a
/// `transaction` header if the send is scoped to one.
#[must_use]
pub fn send(
    destination: &str,
    body: impl Into<Vec<u8>>,
    headers: impl IntoIterator<Item = (String, String)>,
    transaction: Option<&str>,
    version: Option<&str>,
) -> Frame {
    let mut base = vec![(DESTINATION_HEADER.to_string(), destination.to_string())];
    if let Some(transaction) = transaction {
        base.push((TRANSACTION_HEADER.to_string(), transaction.to_string()));
    }
    Frame::new(SEND, merge(base, headers), body, version.unwrap_or(DEFAULT_VERSION))
}

/// Builds a `SUBSCRIBE` frame for `destination`.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingHeader`] if `version` is 1.1+ and
/// `headers` carries no `id`.
pub fn subscribe(
    destination: &str,
    headers: impl IntoIterator<Item = (String, String)>,
    version: Option<&str>,
) -> Result<Frame, ProtocolError> {
    let version = version.unwrap_or(DEFAULT_VERSION);
    let headers: Vec<(String, String)> = headers.into_iter().collect();
    if version != VERSION_1_0 && !headers.iter().any(|(k, _)| k == ID_HEADER) {
        return Err(ProtocolError::MissingHeader {
            command: SUBSCRIBE,
            header: ID_HEADER,
            version: version.to_string(),
        });
    }
    let base = vec![(DESTINATION_HEADER.to_string(), destination.to_string())];
    Ok(Frame::new(SUBSCRIBE, merge(base, headers), Vec::new(), version))
}

/// Builds an `UNSUBSCRIBE` frame from the token headers the session already
/// resolved (an `id` or, under 1.0 only, a `destination`).
#[must_use]
pub fn unsubscribe(headers: impl IntoIterator<Item = (String, String)>, version: Option<&str>) -> Frame {
    Frame::new(UNSUBSCRIBE, headers, Vec::new(), version.unwrap_or(DEFAULT_VERSION))
}

/// Builds an `ACK` frame.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingHeader`] / [`ProtocolError::ForbiddenHeader`]
/// if `headers` doesn't satisfy §4.4's per-version requirements.
pub fn ack(headers: impl IntoIterator<Item = (String, String)>, version: Option<&str>) -> Result<Frame, ProtocolError> {
    let headers = validate_ack_nack(ACK, headers, version)?;
    Ok(Frame::new(ACK, headers, Vec::new(), version.unwrap_or(DEFAULT_VERSION)))
}

/// Builds a `NACK` frame. Does not exist under STOMP 1.0.
///
/// # Errors
///
/// Returns [`ProtocolError::UnsupportedCommand`] under 1.0, or the same
/// header errors as [`ack`] otherwise.
pub fn nack(headers: impl IntoIterator<Item = (String, String)>, version: Option<&str>) -> Result<Frame, ProtocolError> {
    let version = version.unwrap_or(DEFAULT_VERSION);
    if version == VERSION_1_0 {
        return Err(ProtocolError::UnsupportedCommand { command: NACK, version: version.to_string() });
    }
    let headers = validate_ack_nack(NACK, headers, Some(version))?;
    Ok(Frame::new(NACK, headers, Vec::new(), version))
}

fn validate_ack_nack(
    command: &'static str,
    headers: impl IntoIterator<Item = (String, String)>,
    version: Option<&str>,
) -> Result<Vec<(String, String)>, ProtocolError> {
    let version = version.unwrap_or(DEFAULT_VERSION);
    let headers: Vec<(String, String)> = headers.into_iter().collect();
    let has = |key: &str| headers.iter().any(|(k, _)| k == key);

    match version {
        VERSION_1_0 => {
            if !has(MESSAGE_ID_HEADER) {
                return Err(ProtocolError::MissingHeader {
                    command,
                    header: MESSAGE_ID_HEADER,
                    version: version.to_string(),
                });
            }
        },
        stomp_proto::spec::VERSION_1_1 => {
            if !has(MESSAGE_ID_HEADER) {
                return Err(ProtocolError::MissingHeader {
                    command,
                    header: MESSAGE_ID_HEADER,
                    version: version.to_string(),
                });
            }
            if !has(SUBSCRIPTION_HEADER) {
                return Err(ProtocolError::MissingHeader {
                    command,
                    header: SUBSCRIPTION_HEADER,
                    version: version.to_string(),
                });
            }
        },
        _ => {
            if !has(ID_HEADER) {
                return Err(ProtocolError::MissingHeader {
                    command,
                    header: ID_HEADER,
                    version: version.to_string(),
                });
            }
            if has(SUBSCRIPTION_HEADER) {
                return Err(ProtocolError::ForbiddenHeader {
                    command,
                    header: SUBSCRIPTION_HEADER,
                    version: version.to_string(),
                });
            }
        },
    }
    Ok(headers)
}

/// Builds a `BEGIN` frame from transaction headers.
#[must_use]
pub fn begin(headers: impl IntoIterator<Item = (String, String)>) -> Frame {
    Frame::new(BEGIN, headers, Vec::new(), DEFAULT_VERSION)
}

/// Builds a `COMMIT` frame from transaction headers.
#[must_use]
pub fn commit(headers: impl IntoIterator<Item = (String, String)>) -> Frame {
    Frame::new(COMMIT, headers, Vec::new(), DEFAULT_VERSION)
}

/// Builds an `ABORT` frame from transaction headers.
#[must_use]
pub fn abort(headers: impl IntoIterator<Item = (String, String)>) -> Frame {
    Frame::new(ABORT, headers, Vec::new(), DEFAULT_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stomp_proto::spec::VERSION_1_1;

    #[test]
    fn connect_with_only_1_0_omits_accept_version_and_host() {
        let frame = connect(Some(""), Some(""), Vec::new(), None, None);
        assert_eq!(frame.header(ACCEPT_VERSION_HEADER), None);
        assert_eq!(frame.header(HOST_HEADER), None);
    }

    #[test]
    fn connect_offering_1_1_includes_accept_version_and_host() {
        let frame = connect(Some(""), Some(""), Vec::new(), Some(&["1.0", "1.1"]), None);
        assert_eq!(frame.header(ACCEPT_VERSION_HEADER), Some("1.0,1.1"));
        assert_eq!(frame.header(HOST_HEADER), Some("/"));
    }

    #[test]
    fn disconnect_with_receipt_attaches_header() {
        let frame = disconnect(Some("4711"), Some(VERSION_1_1));
        assert_eq!(frame.header(RECEIPT_HEADER), Some("4711"));
    }

    #[test]
    fn subscribe_without_id_fails_under_1_1() {
        let err = subscribe("bla1", Vec::new(), Some(VERSION_1_1)).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingHeader { header: ID_HEADER, .. }));
    }

    #[test]
    fn subscribe_without_id_is_allowed_under_1_0() {
        assert!(subscribe("bla1", Vec::new(), Some(VERSION_1_0)).is_ok());
    }

    #[test]
    fn nack_does_not_exist_under_1_0() {
        let err = nack(Vec::new(), Some(VERSION_1_0)).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedCommand { command: NACK, .. }));
    }

    #[test]
    fn ack_under_1_2_forbids_subscription_header() {
        let headers = vec![
            (ID_HEADER.to_string(), "1".to_string()),
            (SUBSCRIPTION_HEADER.to_string(), "bla".to_string()),
        ];
        let err = ack(headers, Some(stomp_proto::spec::VERSION_1_2)).unwrap_err();
        assert!(matches!(err, ProtocolError::ForbiddenHeader { header: SUBSCRIPTION_HEADER, .. }));
    }

    #[test]
    fn ack_under_1_1_requires_message_id_and_subscription() {
        let headers = vec![(MESSAGE_ID_HEADER.to_string(), "4711".to_string())];
        let err = ack(headers, Some(VERSION_1_1)).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingHeader { header: SUBSCRIPTION_HEADER, .. }));
    }
}
