//! Audit trail
//!
//! Security-relevant actions are emitted as structured events on the `audit`
//! tracing target so they can be routed separately from application logs.

/// Record that `actor` performed `event` on `target`
pub fn record(event: &str, actor: Option<i64>, target: &str) {
    tracing::info!(target: "audit", event, actor = ?actor, target_ref = target, "audit");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_subscriber() {
        record("content.deleted", Some(1), "content:42");
        record("auth.recover_requested", None, "someone@example.com");
    }
}
