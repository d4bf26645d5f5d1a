use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

// -----------------------------------------------------------------------------
// ----- SessionTimeout --------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionTimeout {
    /// Long-running reads: the session never times out.
    #[default]
    Unbounded,
    After(Duration),
}

impl SessionTimeout {
    /// Accepts `none` / `unbounded` or a humantime duration (`30s`, `1m 30s`).
    pub fn parse(raw: &str) -> Result<Self, humantime::DurationError> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("none") || raw.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::Unbounded);
        }
        humantime::parse_duration(raw).map(Self::After)
    }
}

impl fmt::Display for SessionTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("none"),
            Self::After(d) => write!(f, "{}", humantime::format_duration(*d)),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- TimeoutPolicy ---------------------------------------------------------

/// Declarative `(channel, service id) -> timeout` table.
///
/// Lookup falls back from the service entry to the channel default and then
/// to the global default.
#[derive(Debug, Clone, Default)]
pub struct TimeoutPolicy {
    default: SessionTimeout,
    channels: HashMap<String, ChannelTimeouts>,
}

#[derive(Debug, Clone, Default)]
struct ChannelTimeouts {
    default: Option<SessionTimeout>,
    by_service: HashMap<String, SessionTimeout>,
}

impl TimeoutPolicy {
    pub fn new(default: SessionTimeout) -> Self {
        Self {
            default,
            channels: HashMap::new(),
        }
    }

    pub fn with_channel_default(mut self, channel: &str, timeout: SessionTimeout) -> Self {
        self.channels.entry(channel.to_string()).or_default().default = Some(timeout);
        self
    }

    pub fn with_service(mut self, channel: &str, service_id: &str, timeout: SessionTimeout) -> Self {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .by_service
            .insert(service_id.to_string(), timeout);
        self
    }

    pub fn lookup(&self, channel: &str, service_id: &str) -> SessionTimeout {
        let Some(entry) = self.channels.get(channel) else {
            return self.default;
        };

        entry
            .by_service
            .get(service_id)
            .copied()
            .or(entry.default)
            .unwrap_or(self.default)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
