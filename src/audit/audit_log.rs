use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde_json::Value;

use crate::audit::audit_flag::AuditFlag;
use crate::audit::audit_record::AuditRecord;
use crate::log::log_sink::LogSink;
use crate::relay::signaling_message::MessageKind;
use crate::utils::lock_or_recover;
use crate::{sink_debug, sink_info, sink_warn};

const FINGERPRINT_TOKEN: &str = "fingerprint";
const HOST_CANDIDATE_TOKEN: &str = "typ host";
const SRFLX_CANDIDATE_TOKEN: &str = "typ srflx";
/// Candidate lines are logged truncated to this many characters.
const CANDIDATE_PREVIEW_CHARS: usize = 80;

/// Process-wide, append-only trail of relayed signaling messages.
///
/// Shared as an `Arc<AuditLog>` by every session; records keep arrival order.
pub struct AuditLog {
    records: Mutex<Vec<AuditRecord>>,
    log: Arc<dyn LogSink>,
}

/// Totals reported when the server stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub total: usize,
    pub fingerprint_exposures: usize,
    pub local_address_exposures: usize,
    pub public_address_exposures: usize,
}

impl fmt::Display for AuditSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} messages logged ({} SDP fingerprints, {} local IPs, {} public IPs exposed)",
            self.total,
            self.fingerprint_exposures,
            self.local_address_exposures,
            self.public_address_exposures
        )
    }
}

impl AuditLog {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            log,
        }
    }

    /// Append a record for a relayed message and report what it exposes.
    pub fn record(&self, message_type: &str, room_id: &str, data: &Value) -> Vec<AuditFlag> {
        let kind = MessageKind::from_type(message_type);
        let flags = inspect(&kind, data);

        self.lock().push(AuditRecord {
            timestamp: Utc::now(),
            message_type: message_type.to_string(),
            room_id: room_id.to_string(),
            data: data.clone(),
            flags: flags.clone(),
        });

        self.report(&kind, room_id, data, &flags);
        flags
    }

    /// Snapshot of the trail in arrival order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The whole trail as a JSON array, oldest first.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&*self.lock())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn summary(&self) -> AuditSummary {
        let records = self.lock();
        let mut summary = AuditSummary {
            total: records.len(),
            ..AuditSummary::default()
        };
        for flag in records.iter().flat_map(|r| r.flags.iter()) {
            match flag {
                AuditFlag::FingerprintExposed => summary.fingerprint_exposures += 1,
                AuditFlag::LocalAddressExposed { .. } => summary.local_address_exposures += 1,
                AuditFlag::PublicAddressExposed { .. } => summary.public_address_exposures += 1,
            }
        }
        summary
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AuditRecord>> {
        lock_or_recover(&self.records)
    }

    fn report(&self, kind: &MessageKind, room_id: &str, data: &Value, flags: &[AuditFlag]) {
        match kind {
            MessageKind::Offer | MessageKind::Answer => {
                sink_warn!(
                    self.log,
                    "SDP {} relayed in room {} (carries DTLS fingerprints)",
                    kind.as_str().to_uppercase(),
                    room_id
                );
            }
            MessageKind::IceCandidate => {
                if let Some(candidate) = str_field(data, "candidate").filter(|c| !c.is_empty()) {
                    let preview: String = candidate.chars().take(CANDIDATE_PREVIEW_CHARS).collect();
                    sink_info!(self.log, "ICE candidate in room {}: {}", room_id, preview);
                }
            }
            _ => {
                sink_debug!(self.log, "relayed {} in room {}", kind.as_str(), room_id);
            }
        }

        for flag in flags {
            sink_warn!(self.log, "{} (room {})", flag, room_id);
        }
    }
}

/// Pattern checks on a message; pure.
///
/// Matches are plain substrings of the `sdp`/`candidate` text, not a parse of
/// SDP or candidate grammar. A host candidate is reported in preference to srflx.
pub fn inspect(kind: &MessageKind, data: &Value) -> Vec<AuditFlag> {
    match kind {
        MessageKind::Offer | MessageKind::Answer => str_field(data, "sdp")
            .filter(|sdp| sdp.contains(FINGERPRINT_TOKEN))
            .map(|_| vec![AuditFlag::FingerprintExposed])
            .unwrap_or_default(),
        MessageKind::IceCandidate => {
            let Some(candidate) = str_field(data, "candidate") else {
                return Vec::new();
            };
            let address = candidate_address(candidate);
            if candidate.contains(HOST_CANDIDATE_TOKEN) {
                vec![AuditFlag::LocalAddressExposed { address }]
            } else if candidate.contains(SRFLX_CANDIDATE_TOKEN) {
                vec![AuditFlag::PublicAddressExposed { address }]
            } else {
                Vec::new()
            }
        }
        MessageKind::Welcome | MessageKind::Other(_) => Vec::new(),
    }
}

fn str_field<'a>(data: &'a Value, name: &str) -> Option<&'a str> {
    data.get(name).and_then(Value::as_str)
}

/// Connection address of a candidate line:
/// `candidate:<foundation> <component> <transport> <priority> <address> <port> typ ...`
fn candidate_address(candidate: &str) -> Option<String> {
    candidate.split_whitespace().nth(4).map(str::to_string)
}
