//! Failover URI parsing and the reconnect-schedule iterator.
//!
//! `failover:(tcp://a:1,tcp://b:2)?randomize=false,startupMaxReconnectAttempts=1`
//! names a list of candidate brokers plus a reconnect policy. [`FailoverProtocol`]
//! turns that into a stateful iterator of `(broker, delay)` pairs; the
//! (external) connection loop sleeps `delay` seconds, then tries `broker`.

use std::time::Duration;

use crate::env::Environment;

/// One candidate broker named by a failover URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverBroker {
    /// `"tcp"` or `"ssl"`.
    pub protocol: String,
    /// Hostname or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Reconnect policy parsed from a failover URI's query options.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry after a failure, in seconds.
    pub initial_reconnect_delay: f64,
    /// Ceiling any backed-off delay is clamped to, in seconds.
    pub max_reconnect_delay: f64,
    /// Whether delay grows as `initial * multiplier^k`.
    pub use_exponential_back_off: bool,
    /// Growth factor when `use_exponential_back_off` is set.
    pub back_off_multiplier: f64,
    /// Attempt ceiling after the first connect; `None` means unbounded.
    pub max_reconnect_attempts: Option<u32>,
    /// Attempt ceiling for the very first connect sequence, if different
    /// from `max_reconnect_attempts`.
    pub startup_max_reconnect_attempts: Option<u32>,
    /// Whether the next broker is chosen uniformly at random (never
    /// immediately repeating) rather than round-robin.
    pub randomize: bool,
    /// Always prefer the first URI once it is known to be reachable; only
    /// fall back to the rest after the primary has failed at least once.
    pub priority_backup: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_reconnect_delay: 0.1,
            max_reconnect_delay: 30.0,
            use_exponential_back_off: true,
            back_off_multiplier: 2.0,
            max_reconnect_attempts: None,
            startup_max_reconnect_attempts: None,
            randomize: true,
            priority_backup: false,
        }
    }
}

/// A parsed `failover:(...)?...` URI: broker list plus [`ReconnectPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct FailoverUri {
    /// Candidate brokers, in the order they appeared in the URI.
    pub brokers: Vec<FailoverBroker>,
    /// Reconnect policy options.
    pub policy: ReconnectPolicy,
}

/// Errors parsing a failover URI.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailoverUriError {
    /// The URI didn't start with `failover:` or `tcp://`/`ssl://`.
    #[error("not a failover or broker URI: {0:?}")]
    NotAUri(String),
    /// A broker entry was not `(tcp|ssl)://host:port`.
    #[error("malformed broker URI: {0:?}")]
    MalformedBroker(String),
    /// An option value didn't parse as the expected type.
    #[error("malformed option {key}={value:?}")]
    MalformedOption {
        /// The option name.
        key: String,
        /// The value that failed to parse.
        value: String,
    },
}

impl FailoverUri {
    /// Parses a `failover:(uri[,uri]*)?[?opt=val(&|,)...]` URI, or a single
    /// bare `(tcp|ssl)://host:port` URI (treated as a one-broker failover
    /// list with default policy).
    ///
    /// # Errors
    ///
    /// Returns [`FailoverUriError`] if the URI's shape or any broker/option
    /// doesn't parse.
    pub fn parse(uri: &str) -> Result<Self, FailoverUriError> {
        let body = if let Some(rest) = uri.strip_prefix("failover:") {
            rest
        } else if uri.starts_with("tcp://") || uri.starts_with("ssl://") {
            uri
        } else {
            return Err(FailoverUriError::NotAUri(uri.to_string()));
        };

        let (broker_list, options) = match body.strip_prefix('(') {
            Some(rest) => match rest.split_once(')') {
                Some((list, tail)) => (list, tail.strip_prefix('?').unwrap_or(tail)),
                None => return Err(FailoverUriError::NotAUri(uri.to_string())),
            },
            None => match body.split_once('?') {
                Some((list, opts)) => (list, opts),
                None => (body, ""),
            },
        };

        let brokers: Vec<FailoverBroker> =
            broker_list.split(',').filter(|s| !s.is_empty()).map(parse_broker).collect::<Result<_, _>>()?;
        if brokers.is_empty() {
            return Err(FailoverUriError::MalformedBroker(uri.to_string()));
        }

        let policy = parse_policy(options)?;
        Ok(Self { brokers, policy })
    }
}

fn parse_broker(uri: &str) -> Result<FailoverBroker, FailoverUriError> {
    let (protocol, rest) =
        uri.split_once("://").ok_or_else(|| FailoverUriError::MalformedBroker(uri.to_string()))?;
    let (host, port) =
        rest.rsplit_once(':').ok_or_else(|| FailoverUriError::MalformedBroker(uri.to_string()))?;
    let port: u16 = port.parse().map_err(|_| FailoverUriError::MalformedBroker(uri.to_string()))?;
    Ok(FailoverBroker { protocol: protocol.to_string(), host: host.to_string(), port })
}

fn parse_policy(options: &str) -> Result<ReconnectPolicy, FailoverUriError> {
    let mut policy = ReconnectPolicy::default();
    for pair in options.split(|c| c == ',' || c == '&').filter(|s| !s.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| FailoverUriError::MalformedOption { key: pair.to_string(), value: String::new() })?;
        let bad = |value: &str| FailoverUriError::MalformedOption { key: key.to_string(), value: value.to_string() };
        match key {
            "initialReconnectDelay" => {
                policy.initial_reconnect_delay = parse_ms(value).ok_or_else(|| bad(value))?;
            },
            "maxReconnectDelay" => {
                policy.max_reconnect_delay = parse_ms(value).ok_or_else(|| bad(value))?;
            },
            "useExponentialBackOff" => {
                policy.use_exponential_back_off = value.parse().map_err(|_| bad(value))?;
            },
            "backOffMultiplier" => {
                policy.back_off_multiplier = value.parse().map_err(|_| bad(value))?;
            },
            "maxReconnectAttempts" => {
                let n: i64 = value.parse().map_err(|_| bad(value))?;
                policy.max_reconnect_attempts = if n < 0 { None } else { Some(n as u32) };
            },
            "startupMaxReconnectAttempts" => {
                let n: i64 = value.parse().map_err(|_| bad(value))?;
                policy.startup_max_reconnect_attempts = if n < 0 { None } else { Some(n as u32) };
            },
            "randomize" => {
                policy.randomize = value.parse().map_err(|_| bad(value))?;
            },
            "priorityBackup" => {
                policy.priority_backup = value.parse().map_err(|_| bad(value))?;
            },
            _ => return Err(bad(value)),
        }
    }
    Ok(policy)
}

/// Parses a millisecond count from the URI (per §4.6's grammar) into
/// seconds, as [`ReconnectPolicy`] stores delays.
fn parse_ms(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().map(|ms| ms / 1000.0)
}

/// Stateful iterator of `(broker, delay_seconds)` reconnect attempts.
///
/// Not a Rust `Iterator` of infinite length when bounded by
/// `maxReconnectAttempts`; callers drive it with [`FailoverProtocol::next`]
/// and stop on `None`, which means the attempt ceiling was reached.
#[derive(Debug, Clone)]
pub struct FailoverProtocol<E> {
    uri: FailoverUri,
    env: E,
    /// Broker-visits made since construction or the last [`Self::mark_connected`].
    attempts: u32,
    failures: u32,
    last_index: Option<usize>,
    /// Whether a connection has ever succeeded. Governs whether
    /// `startupMaxReconnectAttempts` or `maxReconnectAttempts` bounds the
    /// current phase, per §4.6.
    ever_connected: bool,
}

impl<E: Environment> FailoverProtocol<E> {
    /// Builds a protocol iterator over `uri`'s brokers using `env` as the
    /// source of randomness for `randomize`.
    #[must_use]
    pub fn new(uri: FailoverUri, env: E) -> Self {
        Self { uri, env, attempts: 0, failures: 0, last_index: None, ever_connected: false }
    }

    /// Yields the next `(broker, delay_seconds)` pair, or `None` once the
    /// configured attempt ceiling is reached.
    ///
    /// The very first visit (of this phase) is always yielded with delay 0,
    /// uncounted against the ceiling — it is the initial connect, not a
    /// retry. Every visit after that counts as one reconnect attempt.
    pub fn next(&mut self) -> Option<(FailoverBroker, f64)> {
        if self.attempts > 0 {
            let ceiling = if self.ever_connected {
                self.uri.policy.max_reconnect_attempts
            } else {
                self.uri.policy.startup_max_reconnect_attempts.or(self.uri.policy.max_reconnect_attempts)
            };
            if let Some(ceiling) = ceiling {
                if self.attempts - 1 >= ceiling {
                    return None;
                }
            }
        }

        let delay = if self.attempts == 0 { 0.0 } else { self.next_delay() };

        let index = self.next_index();
        self.last_index = Some(index);
        self.attempts += 1;
        Some((self.uri.brokers[index].clone(), delay))
    }

    /// Marks the most recently yielded broker as having failed, which
    /// `priorityBackup` consults before handing out the primary again.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Marks that a connection has succeeded, ending the startup phase and
    /// resetting the attempt counter for the next reconnect episode (which
    /// is bounded by `maxReconnectAttempts`, not `startupMaxReconnectAttempts`).
    pub fn mark_connected(&mut self) {
        self.ever_connected = true;
        self.attempts = 0;
        self.failures = 0;
    }

    fn next_delay(&self) -> f64 {
        let policy = &self.uri.policy;
        if !policy.use_exponential_back_off {
            return policy.initial_reconnect_delay;
        }
        let grown = policy.initial_reconnect_delay * policy.back_off_multiplier.powi(self.attempts as i32 - 1);
        grown.min(policy.max_reconnect_delay)
    }

    fn next_index(&self) -> usize {
        let policy = &self.uri.policy;
        let n = self.uri.brokers.len();
        if n <= 1 {
            return 0;
        }
        if policy.priority_backup && self.failures == 0 {
            return 0;
        }
        if policy.randomize {
            loop {
                let candidate = (self.env.random_u64() as usize) % n;
                if Some(candidate) != self.last_index {
                    return candidate;
                }
            }
        }
        match self.last_index {
            Some(last) => (last + 1) % n,
            None => 0,
        }
    }
}

/// Converts a `(broker, delay_seconds)` pair's delay into a [`Duration`] for
/// callers that want to `sleep` on it directly.
#[must_use]
pub fn delay_duration(delay_seconds: f64) -> Duration {
    Duration::from_secs_f64(delay_seconds.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::SystemEnvironment;

    #[test]
    fn parses_scenario_6_from_the_spec() {
        let uri = FailoverUri::parse(
            "failover:(tcp://nosuchhost:65535,tcp://localhost:61613)?startupMaxReconnectAttempts=1,initialReconnectDelay=0,randomize=false",
        )
        .unwrap();
        assert_eq!(uri.brokers.len(), 2);
        assert_eq!(uri.brokers[0].host, "nosuchhost");
        assert_eq!(uri.brokers[0].port, 65535);
        assert_eq!(uri.policy.startup_max_reconnect_attempts, Some(1));
        assert!(!uri.policy.randomize);

        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);
        let (first, delay1) = protocol.next().unwrap();
        assert_eq!(first.host, "nosuchhost");
        assert_eq!(delay1, 0.0);

        let (second, _delay2) = protocol.next().unwrap();
        assert_eq!(second.host, "localhost");

        assert_eq!(protocol.next(), None);
    }

    #[test]
    fn empty_broker_list_is_rejected() {
        assert!(matches!(FailoverUri::parse("failover:()"), Err(FailoverUriError::MalformedBroker(_))));
        assert!(matches!(FailoverUri::parse("failover:?randomize=false"), Err(FailoverUriError::MalformedBroker(_))));
    }

    #[test]
    fn single_bare_uri_is_a_one_broker_list() {
        let uri = FailoverUri::parse("tcp://localhost:61613").unwrap();
        assert_eq!(uri.brokers, vec![FailoverBroker { protocol: "tcp".to_string(), host: "localhost".to_string(), port: 61613 }]);
    }

    #[test]
    fn round_robin_never_repeats_the_same_broker_consecutively_without_randomize() {
        let uri = FailoverUri::parse("failover:(tcp://a:1,tcp://b:2)?randomize=false").unwrap();
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);
        let (b1, _) = protocol.next().unwrap();
        let (b2, _) = protocol.next().unwrap();
        let (b3, _) = protocol.next().unwrap();
        assert_eq!(b1.host, "a");
        assert_eq!(b2.host, "b");
        assert_eq!(b3.host, "a");
    }

    #[test]
    fn randomize_never_immediately_repeats() {
        let uri = FailoverUri::parse("failover:(tcp://a:1,tcp://b:2,tcp://c:3)?randomize=true").unwrap();
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);
        let mut previous = None;
        for _ in 0..50 {
            let (broker, _) = protocol.next().unwrap();
            if let Some(prev) = &previous {
                assert_ne!(prev, &broker.host);
            }
            previous = Some(broker.host);
        }
    }

    #[test]
    fn priority_backup_prefers_the_first_uri_until_a_failure() {
        let uri = FailoverUri::parse("failover:(tcp://a:1,tcp://b:2)?randomize=false,priorityBackup=true").unwrap();
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);
        let (b1, _) = protocol.next().unwrap();
        let (b2, _) = protocol.next().unwrap();
        assert_eq!(b1.host, "a");
        assert_eq!(b2.host, "a");

        protocol.record_failure();
        let (b3, _) = protocol.next().unwrap();
        assert_eq!(b3.host, "b");
    }

    #[test]
    fn exponential_back_off_grows_and_clamps() {
        let uri = FailoverUri::parse(
            "failover:(tcp://a:1)?randomize=false,initialReconnectDelay=1000,backOffMultiplier=2,maxReconnectDelay=3000",
        )
        .unwrap();
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);
        let (_, d0) = protocol.next().unwrap();
        let (_, d1) = protocol.next().unwrap();
        let (_, d2) = protocol.next().unwrap();
        let (_, d3) = protocol.next().unwrap();
        assert_eq!(d0, 0.0);
        assert_eq!(d1, 1.0);
        assert_eq!(d2, 2.0);
        assert_eq!(d3, 3.0);
    }

    #[test]
    fn mark_connected_switches_to_the_steady_state_ceiling() {
        let uri = FailoverUri::parse(
            "failover:(tcp://a:1)?randomize=false,startupMaxReconnectAttempts=5,maxReconnectAttempts=0",
        )
        .unwrap();
        let mut protocol = FailoverProtocol::new(uri, SystemEnvironment);
        assert!(protocol.next().is_some());
        assert!(protocol.next().is_some());
        protocol.mark_connected();
        // maxReconnectAttempts=0 now applies: the next visit is the
        // uncounted "initial" one for the new phase, but the one after
        // that is the first retry and is immediately over the ceiling.
        assert!(protocol.next().is_some());
        assert_eq!(protocol.next(), None);
    }
}
