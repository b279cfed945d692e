use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::defaults::DEFAULT_IRC_PORT;

/// Address of the chat server carrying the command channel.
///
/// Every configuration layer spells it as `irc://host[:port]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct ServerEndpoint {
    /// Host name or address of the chat server.
    pub host: String,
    /// TCP port of the chat server.
    pub port: u16,
}

impl ServerEndpoint {
    /// Builds a plaintext TCP endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "irc://{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        match url.scheme() {
            "irc" => {
                let host = url
                    .host_str()
                    .filter(|host| !host.is_empty())
                    .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
                Ok(Self::new(host, url.port().unwrap_or(DEFAULT_IRC_PORT)))
            }
            "ircs" => Err(EndpointParseError::TlsUnsupported(input.to_owned())),
            other => Err(EndpointParseError::UnsupportedScheme(other.to_owned())),
        }
    }
}

impl TryFrom<String> for ServerEndpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServerEndpoint> for String {
    fn from(endpoint: ServerEndpoint) -> Self {
        endpoint.to_string()
    }
}

/// Errors encountered while parsing a [`ServerEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not recognised.
    #[error("unsupported server scheme '{0}'")]
    UnsupportedScheme(String),
    /// TLS endpoints must be terminated outside this client.
    #[error("TLS endpoint '{0}' is not supported; use an irc:// endpoint")]
    TlsUnsupported(String),
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn display_round_trips_through_parse() {
        let endpoint = ServerEndpoint::new("irc.example.net", 6668);
        let parsed: ServerEndpoint = endpoint
            .to_string()
            .parse()
            .expect("display output should parse");
        assert_eq!(parsed, endpoint);
    }

    #[rstest]
    fn serialises_as_url_text() {
        let endpoint = ServerEndpoint::new("irc.example.net", 6668);
        let value = serde_json::to_value(&endpoint).expect("serialise endpoint");
        assert_eq!(value, serde_json::json!("irc://irc.example.net:6668"));
        let back: ServerEndpoint = serde_json::from_value(value).expect("deserialise endpoint");
        assert_eq!(back, endpoint);
    }

    #[rstest]
    fn deserialising_rejects_tls_urls() {
        let result = serde_json::from_str::<ServerEndpoint>("\"ircs://irc.example.net\"");
        assert!(result.is_err());
    }

    #[rstest]
    fn missing_port_uses_default() {
        let endpoint: ServerEndpoint = "irc://irc.example.net".parse().expect("parse endpoint");
        assert_eq!(endpoint.port, DEFAULT_IRC_PORT);
    }

    #[rstest]
    fn tls_scheme_is_rejected() {
        let error = "ircs://irc.example.net:6697"
            .parse::<ServerEndpoint>()
            .expect_err("ircs should be rejected");
        assert!(matches!(error, EndpointParseError::TlsUnsupported(_)));
    }

    #[rstest]
    #[case("tcp://127.0.0.1:6667")]
    #[case("http://irc.example.net")]
    fn other_schemes_are_rejected(#[case] input: &str) {
        let error = input
            .parse::<ServerEndpoint>()
            .expect_err("scheme should be rejected");
        assert!(matches!(error, EndpointParseError::UnsupportedScheme(_)));
    }
}
