//! End-to-end acknowledgement workflow against the in-memory Aggregator.

use std::sync::Arc;

use ackgate_core::prelude::*;

const SELECTOR: &str = "ccx_rules_ocp.external.rules.nodes_kubelet_version_check|NODE_KUBELET_VERSION";

fn key(user: &str) -> Result<AckKey> {
    Ok(AckKey::new(
        OrgId::new(42),
        UserId::new(user),
        RuleSelector::parse(SELECTOR)?,
    ))
}

#[tokio::test]
async fn acknowledge_update_delete() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let aggregator = Arc::new(MemoryAggregator::new());
    let orchestrator = AckOrchestrator::new(Arc::clone(&aggregator) as Arc<dyn Aggregator>);
    let key = key("alice")?;

    let outcome = orchestrator.acknowledge(&key, "first").await?;
    assert_eq!(outcome.mutation(), Mutation::Created);
    let record = outcome.record().ok_or("created record missing")?;
    assert_eq!(record.rule, SELECTOR);
    assert_eq!(record.created_by, "alice");

    let outcome = orchestrator.update(&key, "second").await?;
    assert_eq!(outcome.mutation(), Mutation::Updated);
    assert_eq!(
        outcome.record().map(|r| r.justification.as_str()),
        Some("second")
    );

    orchestrator.delete(&key).await?;
    assert!(aggregator.is_empty()?);
    assert!(matches!(
        orchestrator.get(&key).await,
        Err(AckError::NotAcknowledged { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn list_only_shows_callers_acknowledgements() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let orchestrator = AckOrchestrator::new(Arc::new(MemoryAggregator::new()));
    orchestrator.acknowledge(&key("alice")?, "mine").await?;
    orchestrator.acknowledge(&key("bob")?, "theirs").await?;

    let list = orchestrator.list(OrgId::new(42), &UserId::new("alice")).await?;
    assert_eq!(list.count(), 1);
    assert_eq!(list.items[0].justification, "mine");

    let empty = orchestrator.list(OrgId::new(7), &UserId::new("alice")).await?;
    assert!(empty.is_empty());
    Ok(())
}

#[test]
fn selector_rejects_malformed_input() {
    for input in ["", "no-delimiter", "a|b|c", "|b", "a|"] {
        assert!(
            matches!(RuleSelector::parse(input), Err(Error::MalformedSelector { .. })),
            "{input:?} should be rejected"
        );
    }
}
