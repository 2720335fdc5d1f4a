//! Core domain types for callbeacon
//!
//! These types describe one library call as it travels from the call site,
//! through redaction, into the upload batch.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **RawEvent** | Everything the call site knows about one call; never leaves the process as-is |
//! | **PrivacyConfig** | The host's consent policy: a boolean or per-category switches |
//! | **RedactedEvent** | A RawEvent with every disallowed field removed |
//! | **PreparedRecord** | A RedactedEvent plus client build info and clock skew, ready to upload |
//! | **Skew** | Whole seconds between the local clock and the time authority |
//!
//! ### Gated vs ungated fields
//!
//! Three field categories can be switched off individually: authentication
//! type, status code, and timings. Everything else on a [`RawEvent`]
//! (versions, method name, presence flags) is ungated and survives whenever
//! the policy allows anything at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

// ============================================
// Raw events
// ============================================

/// One instrumented library call, as produced by the call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Version of the calling library
    pub version: String,
    /// Build hash of the calling library
    pub hash: String,
    /// Library method that was invoked (e.g. `get`, `paginate`)
    pub method: String,
    /// Call went through user middleware
    pub has_middleware: bool,
    /// Caller supplied a completion callback
    pub has_callback: bool,
    /// Request carried a body
    pub has_body: bool,
    /// Request carried query parameters
    pub has_query: bool,
    /// Caller supplied custom headers
    pub has_headers: bool,
    /// How the request was authenticated
    pub auth: AuthDescriptor,
    /// HTTP status code of the response
    pub status_code: u16,
    /// When the call started
    pub started_at: DateTime<Utc>,
    /// When the call finished
    pub finished_at: DateTime<Utc>,
    /// Call was part of an automatic pagination run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paginated: Option<bool>,
}

/// Authentication details of a call. Only the scheme is ever recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDescriptor {
    /// Authentication scheme (`none`, `basic`, `bearer`, `api-key`, ...)
    #[serde(rename = "type")]
    pub kind: String,
}

impl AuthDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

// ============================================
// Privacy policy
// ============================================

/// Consent policy supplied by the host application.
///
/// Accepts either form in TOML:
///
/// ```toml
/// [telemetry]
/// privacy = false
/// ```
///
/// ```toml
/// [telemetry.privacy]
/// timings = false
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrivacyConfig {
    /// `true` allows every field, `false` allows none
    Flag(bool),
    /// Per-category switches
    Fields(FieldPermissions),
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        PrivacyConfig::Flag(true)
    }
}

/// Per-category permission switches. Unset switches count as allowed,
/// but a map with no switches set at all allows nothing.
///
/// Unknown keys are rejected: a misspelled switch would otherwise leave an
/// empty map and switch telemetry off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldPermissions {
    /// Include `auth.type`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<bool>,
    /// Include `status_code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<bool>,
    /// Include `started_at` and `finished_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<bool>,
}

impl FieldPermissions {
    /// True when no switch has been set
    pub fn is_empty(&self) -> bool {
        self.auth_type.is_none() && self.status_code.is_none() && self.timings.is_none()
    }

    pub fn allows_auth_type(&self) -> bool {
        self.auth_type.unwrap_or(true)
    }

    pub fn allows_status_code(&self) -> bool {
        self.status_code.unwrap_or(true)
    }

    pub fn allows_timings(&self) -> bool {
        self.timings.unwrap_or(true)
    }
}

// ============================================
// Redacted and prepared records
// ============================================

/// A [`RawEvent`] after redaction. `None` means the field was withheld.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_middleware: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_callback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_body: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_query: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_headers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paginated: Option<bool>,
}

impl RedactedEvent {
    /// True when redaction withheld every field; such events are never queued.
    pub fn is_empty(&self) -> bool {
        *self == RedactedEvent::default()
    }
}

impl From<&RawEvent> for RedactedEvent {
    /// Keeps every field.
    fn from(raw: &RawEvent) -> Self {
        Self {
            version: Some(raw.version.clone()),
            hash: Some(raw.hash.clone()),
            method: Some(raw.method.clone()),
            has_middleware: Some(raw.has_middleware),
            has_callback: Some(raw.has_callback),
            has_body: Some(raw.has_body),
            has_query: Some(raw.has_query),
            has_headers: Some(raw.has_headers),
            auth: Some(raw.auth.clone()),
            status_code: Some(raw.status_code),
            started_at: Some(raw.started_at),
            finished_at: Some(raw.finished_at),
            paginated: raw.paginated,
        }
    }
}

/// Offset between the local clock and the time authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skew {
    /// Remote minus local, in whole seconds (floored)
    Offset(i64),
    /// The time authority could not be consulted
    Unknown,
}

impl std::fmt::Display for Skew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Skew::Offset(secs) => write!(f, "{:+}s", secs),
            Skew::Unknown => f.write_str("unknown"),
        }
    }
}

/// Serialized as an integer, or `null` when unknown.
impl Serialize for Skew {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Skew::Offset(secs) => serializer.serialize_i64(*secs),
            Skew::Unknown => serializer.serialize_none(),
        }
    }
}

/// Version information of the telemetry client itself, stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub version: String,
    pub hash: String,
}

impl ClientInfo {
    pub fn new(version: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            hash: hash.into(),
        }
    }

    /// Build info of this crate. The hash comes from `CALLBEACON_BUILD_HASH`
    /// at compile time.
    pub fn current() -> Self {
        Self::new(
            env!("CARGO_PKG_VERSION"),
            option_env!("CALLBEACON_BUILD_HASH").unwrap_or("unknown"),
        )
    }
}

/// A redacted event stamped with client metadata, as uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedRecord {
    #[serde(flatten)]
    pub fields: RedactedEvent,
    pub client_version: String,
    pub client_hash: String,
    pub clock_skew: Skew,
}

impl PreparedRecord {
    pub fn new(fields: RedactedEvent, client: &ClientInfo, skew: Skew) -> Self {
        Self {
            fields,
            client_version: client.version.clone(),
            client_hash: client.hash.clone(),
            clock_skew: skew,
        }
    }
}
