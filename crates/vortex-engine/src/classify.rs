use crate::keypool::FailureKind;

/// Substring markers mapped to failure kinds, checked in order.
///
/// The backend's error channel is opaque text, so classification is
/// necessarily heuristic; keeping the table in one place keeps the
/// heuristic testable on its own.
const RULES: &[(&[&str], FailureKind)] = &[
    (&["API_KEY_INVALID", "invalid"], FailureKind::Invalid),
    (&["quota", "429"], FailureKind::Quota),
];

/// Classify a backend failure message into a credential failure kind.
/// Anything unrecognized counts as a server-side fault.
pub fn classify(message: &str) -> FailureKind {
    for (markers, kind) in RULES {
        if markers.iter().any(|m| message.contains(m)) {
            return *kind;
        }
    }
    FailureKind::ServerError
}
