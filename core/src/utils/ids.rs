/// Locally generated event ids
///
/// UUID v7 values embed a millisecond timestamp followed by random bits, so
/// ids sort by creation time and do not collide across restarts.
use uuid::Uuid;

/// Correlation id for an optimistic local send
pub fn local_event_id() -> String {
    Uuid::now_v7().to_string()
}

/// Id for a synthetic system notice
pub fn system_event_id() -> String {
    format!("system-{}", Uuid::now_v7())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| local_event_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_system_ids_are_prefixed() {
        assert!(system_event_id().starts_with("system-"));
    }
}
