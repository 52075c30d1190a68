// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn publish_fields_name_the_event() {
    let effect = Effect::Publish(Event::WorkflowCompleted {
        correlation_id: WorkflowId::new("wf-3"),
    });

    assert_eq!(effect.name(), "publish");
    assert_eq!(
        effect.fields(),
        vec![
            ("event", "workflow:completed".to_string()),
            ("correlation_id", "wf-3".to_string()),
        ]
    );
    assert!(effect.published().is_some());
}

#[test]
fn forget_join_publishes_nothing() {
    let effect = Effect::ForgetJoin {
        correlation_id: WorkflowId::new("wf-3"),
    };
    assert_eq!(effect.name(), "forget_join");
    assert!(effect.published().is_none());
}
