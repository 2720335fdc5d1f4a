//! Field redaction
//!
//! Applies the host's [`PrivacyConfig`] to a [`RawEvent`] before anything
//! about the call is queued.

use crate::types::{FieldPermissions, PrivacyConfig, RawEvent, RedactedEvent};

/// Strip every field the policy does not allow.
///
/// An empty result means the event must not be queued. A non-empty
/// permission map always keeps the ungated fields, even when every gated
/// category is switched off.
pub fn prepare(raw: &RawEvent, config: &PrivacyConfig) -> RedactedEvent {
    match config {
        PrivacyConfig::Flag(false) => RedactedEvent::default(),
        PrivacyConfig::Flag(true) => RedactedEvent::from(raw),
        PrivacyConfig::Fields(perms) if perms.is_empty() => RedactedEvent::default(),
        PrivacyConfig::Fields(perms) => apply_permissions(raw, perms),
    }
}

fn apply_permissions(raw: &RawEvent, perms: &FieldPermissions) -> RedactedEvent {
    let mut event = RedactedEvent::from(raw);

    if !perms.allows_auth_type() {
        event.auth = None;
    }
    if !perms.allows_status_code() {
        event.status_code = None;
    }
    if !perms.allows_timings() {
        event.started_at = None;
        event.finished_at = None;
    }

    event
}
