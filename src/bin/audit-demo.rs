//! Audit trail demo.
//!
//! Records a handful of audit events, saves the chain, queries login events and
//! shows that rewriting a stored event is caught.
//!
//! Usage: `audit-demo [OUTPUT_PATH]` (default `audit_chain.json`).

use hashledger::ledger::{payload_from_value, Chain, LedgerConfig};
use hashledger::testing::TamperProbe;
use serde_json::json;
use tracing_subscriber::EnvFilter;

const DEMO_DIFFICULTY: u32 = 12;

fn main() -> hashledger::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "audit_chain.json".to_string());

    let mut chain = Chain::with_config(LedgerConfig::with_difficulty(DEMO_DIFFICULTY))?;
    let now = chrono::Utc::now().timestamp();

    let events = [
        json!({"event_type": "login", "user_id": "user123", "timestamp": now,
               "ip_address": "192.168.1.1", "success": true}),
        json!({"event_type": "data_access", "user_id": "user123", "timestamp": now,
               "resource": "customer_database", "action": "read"}),
        json!({"event_type": "login", "user_id": "user456", "timestamp": now,
               "ip_address": "192.168.1.2", "success": false}),
        json!({"event_type": "data_modification", "user_id": "admin001", "timestamp": now,
               "resource": "user_settings", "action": "update"}),
    ];
    for event in events {
        chain.append(payload_from_value(event)?)?;
    }

    chain.save_to_file(&output)?;

    println!("\nLogin Events:");
    for block in chain.find_by("event_type", &json!("login")) {
        let field = |key: &str| {
            block
                .payload()
                .get(key)
                .map(|v| v.to_string())
                .unwrap_or_default()
        };
        println!(
            "Block #{} - User: {}, Success: {}",
            block.index(),
            field("user_id"),
            field("success")
        );
    }

    println!("\nAttempting to tamper with block 2:");
    let mut forged = match chain.get(2) {
        Some(block) => block.payload().clone(),
        None => return Err(hashledger::Error::EmptyChain),
    };
    forged.insert("success".to_string(), json!(true));
    let report = TamperProbe::new(&mut chain).attempt_mutation(2, forged)?;
    println!("{}", report.message);

    let verification = chain.validate()?;
    println!("\nIs blockchain valid? {}", verification.valid);
    if let Some(failure) = verification.failure {
        println!("{}", failure);
    }

    Ok(())
}
