//! Device status derivation from state events.

use chrono::{DateTime, Utc};
use gungnir_types::{Status, STATE_OFFLINE, STATE_ONLINE};

use crate::decode::StateEvent;

/// A candidate status plus the session it came from.
struct EventTuple {
    status: Status,
    session_id: String,
}

/// Derives a device's current status from its decoded state events.
///
/// The most recent `online` and `offline` events are tracked independently;
/// on equal timestamps the first one seen is kept. Returns `None` when
/// neither kind is present.
pub fn derive_status(device_id: &str, events: &[StateEvent], now: DateTime<Utc>) -> Option<Status> {
    let mut last_online: Option<EventTuple> = None;
    let mut last_offline: Option<EventTuple> = None;
    let mut last_reason: Option<(DateTime<Utc>, &str)> = None;

    for state in events {
        let since = DateTime::from_timestamp_nanos(state.event.birth_date);

        if !state.offline_reason.is_empty() && last_reason.map_or(true, |(at, _)| since > at) {
            last_reason = Some((since, state.offline_reason.as_str()));
        }

        let message = &state.event.message;
        let slot = match message.state_name() {
            STATE_ONLINE => &mut last_online,
            STATE_OFFLINE => &mut last_offline,
            _ => continue,
        };
        if slot.as_ref().map_or(true, |t| since > t.status.since) {
            *slot = Some(EventTuple {
                status: Status {
                    device_id: device_id.to_string(),
                    state: message.state_name().to_string(),
                    since,
                    now,
                    last_offline_reason: String::new(),
                    partner_ids: message.partner_ids.clone(),
                },
                session_id: message.session_id.clone(),
            });
        }
    }

    let mut status = determine_status(last_online, last_offline)?;
    if let Some((_, reason)) = last_reason {
        status.last_offline_reason = reason.to_string();
    }
    Some(status)
}

/// Picks between the latest online and offline events.
///
/// When either session is unknown or the sessions differ, a strictly newer
/// online event wins. Otherwise an offline event with the same session id as
/// the online event closes that session and wins regardless of timestamps;
/// two unknown sessions count as the same. Any remaining case falls back to
/// online, including different sessions with the online event not newer.
fn determine_status(online: Option<EventTuple>, offline: Option<EventTuple>) -> Option<Status> {
    match (online, offline) {
        (None, None) => None,
        (Some(on), None) => Some(on.status),
        (None, Some(off)) => Some(off.status),
        (Some(on), Some(off)) => {
            let same_session = on.session_id == off.session_id;
            let unknown_session = on.session_id.is_empty() || off.session_id.is_empty();
            if (unknown_session || !same_session) && on.status.since > off.status.since {
                Some(on.status)
            } else if same_session {
                Some(off.status)
            } else {
                Some(on.status)
            }
        }
    }
}
