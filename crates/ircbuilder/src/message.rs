//! Parsing of inbound protocol lines.
//!
//! Only the shapes this client acts on are recognised; everything else is
//! reported as [`Inbound::Other`] and dropped by the dispatcher.

/// CTCP version query carried in a `PRIVMSG` body.
pub(crate) const CTCP_VERSION: &str = "\u{1}VERSION\u{1}";

/// Command word of application payload lines.
pub(crate) const PRIVMSG: &str = "PRIVMSG";

/// A classified inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inbound<'a> {
    /// Keepalive probe carrying the argument to echo.
    Ping(&'a str),
    /// Bare client-version query.
    VersionQuery,
    /// Line with a leading origin marker.
    Prefixed(Prefixed<'a>),
    /// Anything else.
    Other,
}

/// Fields of a line that begins with `:origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Prefixed<'a> {
    /// Nickname or server name before any `!user@host` suffix.
    pub(crate) origin: &'a str,
    /// Command word or three-digit numeric.
    pub(crate) kind: &'a str,
    /// First parameter, normally the target nickname.
    pub(crate) recipient: &'a str,
    /// Remainder of the line, if any.
    pub(crate) rest: Option<&'a str>,
}

impl<'a> Prefixed<'a> {
    /// Numeric status code, when `kind` is one.
    pub(crate) fn numeric(&self) -> Option<u16> {
        self.kind.parse::<u16>().ok().filter(|numeric| *numeric > 0)
    }

    /// Text after the first colon of the remainder.
    pub(crate) fn text(&self) -> Option<&'a str> {
        self.rest
            .and_then(|rest| rest.split_once(':'))
            .map(|(_, text)| text)
    }
}

/// Classifies one protocol line.
pub(crate) fn parse_line(line: &str) -> Inbound<'_> {
    if let Some(argument) = line.strip_prefix("PING :") {
        return Inbound::Ping(argument);
    }
    if line.starts_with("VERSION") {
        return Inbound::VersionQuery;
    }
    let Some(body) = line.strip_prefix(':') else {
        return Inbound::Other;
    };

    let mut fields = body.splitn(4, ' ');
    let (Some(sender), Some(kind), Some(recipient)) = (fields.next(), fields.next(), fields.next())
    else {
        return Inbound::Other;
    };
    let origin = sender.split('!').next().unwrap_or(sender);
    Inbound::Prefixed(Prefixed {
        origin,
        kind,
        recipient,
        rest: fields.next(),
    })
}
