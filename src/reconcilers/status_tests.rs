// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::reconcilers::status::{
        condition_changed, conditions_equal, create_condition, find_condition,
        update_condition_in_memory,
    };

    const CONDITION_TYPE_AVAILABLE: &str = "Available";
    const STATUS_TRUE: &str = "True";
    const STATUS_FALSE: &str = "False";

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(
            CONDITION_TYPE_AVAILABLE,
            STATUS_TRUE,
            "DeploymentsReady",
            "All deployments are ready",
        );

        assert_eq!(condition.r#type, CONDITION_TYPE_AVAILABLE);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason.as_deref(), Some("DeploymentsReady"));
        assert!(condition.last_transition_time.unwrap().contains('T'));
    }

    #[test]
    fn test_condition_changed_ignores_timestamp() {
        let mut existing = create_condition("Ready", STATUS_TRUE, "Imported", "ok");
        existing.last_transition_time = Some("2020-01-01T00:00:00Z".into());
        let new_cond = create_condition("Ready", STATUS_TRUE, "Imported", "ok");

        assert!(!condition_changed(Some(&existing), &new_cond));
    }

    #[test]
    fn test_condition_changed_detects_status_and_message() {
        let existing = create_condition("Ready", STATUS_TRUE, "Imported", "ok");

        let flipped = create_condition("Ready", STATUS_FALSE, "Imported", "ok");
        assert!(condition_changed(Some(&existing), &flipped));

        let reworded = create_condition("Ready", STATUS_TRUE, "Imported", "different");
        assert!(condition_changed(Some(&existing), &reworded));

        assert!(condition_changed(None, &existing));
    }

    #[test]
    fn test_find_condition() {
        let conditions = vec![
            create_condition("Available", STATUS_TRUE, "A", "a"),
            create_condition("Ready", STATUS_FALSE, "B", "b"),
        ];

        assert_eq!(find_condition(&conditions, "Ready").unwrap().status, STATUS_FALSE);
        assert!(find_condition(&conditions, "Degraded").is_none());
    }

    #[test]
    fn test_update_condition_preserves_time_when_status_unchanged() {
        let mut conditions = vec![create_condition("Ready", STATUS_TRUE, "Imported", "ok")];
        conditions[0].last_transition_time = Some("2020-01-01T00:00:00Z".into());

        update_condition_in_memory(&mut conditions, "Ready", STATUS_TRUE, "Imported", "again");
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00Z")
        );
        assert_eq!(conditions[0].message.as_deref(), Some("again"));

        update_condition_in_memory(&mut conditions, "Ready", STATUS_FALSE, "Failed", "broken");
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_update_condition_appends_new_type() {
        let mut conditions = Vec::new();
        update_condition_in_memory(&mut conditions, "Available", STATUS_FALSE, "Starting", "");
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn test_conditions_equal() {
        let a = vec![create_condition("Ready", STATUS_TRUE, "Imported", "ok")];
        let mut b = a.clone();
        b[0].last_transition_time = None;
        assert!(conditions_equal(&a, &b));

        b[0].status = STATUS_FALSE.into();
        assert!(!conditions_equal(&a, &b));
        assert!(!conditions_equal(&a, &[]));
    }
}
