//! Basic usage example demonstrating the acknowledgement workflow.
//!
//! Run with: `cargo run --example basic_usage`

use std::sync::Arc;

use ackgate_core::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse a rule selector
    let selector = RuleSelector::parse(
        "ccx_rules_ocp.external.rules.nodes_kubelet_version_check|NODE_KUBELET_VERSION",
    )?;
    println!("Rule: {} / {}", selector.rule_id(), selector.error_key());

    // Acknowledge it against the in-memory Aggregator
    let orchestrator = AckOrchestrator::new(Arc::new(MemoryAggregator::new()));
    let key = AckKey::new(OrgId::new(42), UserId::new("alice"), selector);

    match orchestrator.acknowledge(&key, "tracked upstream").await {
        Ok(outcome) => println!("Outcome: {:?}", outcome.mutation()),
        Err(err) => println!("Failed: {err}"),
    }

    if let Ok(list) = orchestrator.list(key.org_id, &key.user_id).await {
        println!("Acknowledged rules: {}", list.count());
    }

    Ok(())
}
