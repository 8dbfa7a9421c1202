//! Integration tests for the external command queue

use concord_engine::{
    CommandBridge, CommandStatus, Concept, InMemoryCommandQueue, Invariant, Runner,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn player() -> Concept {
    Concept::new("Player")
        .with_state("x", json!(0))
        .with_state("y", json!(0))
        .on("move", |ctx, payload| {
            let dx = payload
                .as_object()
                .and_then(|p| p.get("dx"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let dy = payload
                .as_object()
                .and_then(|p| p.get("dy"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let x = ctx.get("x").and_then(Value::as_i64).unwrap_or(0);
            let y = ctx.get("y").and_then(Value::as_i64).unwrap_or(0);
            ctx.set("x", json!(x + dx));
            ctx.set("y", json!(y + dy));
        })
}

#[test]
fn test_commands_drive_normal_dispatch() {
    let mut runner = Runner::new();
    let id = runner.register_concept(player()).unwrap();
    runner.start();

    let queue = Arc::new(InMemoryCommandQueue::new());
    let h1 = queue.push("Player", "move", json!({"dx": 1, "dy": 0}));
    let h2 = queue.push("Player", "move", json!({"dx": 0, "dy": 1}));

    let executed = runner.poll_and_execute_commands(queue.as_ref());
    assert_eq!(executed, 2);
    assert_eq!(queue.status(h1), Some(CommandStatus::Done));
    assert_eq!(queue.status(h2), Some(CommandStatus::Done));
    assert!(queue.pending_commands().is_empty());

    assert_eq!(runner.concept(id).unwrap().peek_state("x"), Some(&json!(1)));
    assert_eq!(runner.concept(id).unwrap().peek_state("y"), Some(&json!(1)));
    // each command is its own tick
    assert_eq!(runner.tick(), 2);
}

#[test]
fn test_bad_command_isolated_from_batch() {
    let mut runner = Runner::new();
    runner.register_concept(player()).unwrap();
    runner.start();

    let queue = Arc::new(InMemoryCommandQueue::new());
    let good_before = queue.push("Player", "move", json!({"dx": 1, "dy": 0}));
    let bad_target = queue.push("Ghost", "move", json!({}));
    let bad_action = queue.push("Player", "fly", json!({}));
    let good_after = queue.push("Player", "move", json!({"dx": 1, "dy": 0}));

    let executed = runner.poll_and_execute_commands(queue.as_ref());
    assert_eq!(executed, 2);

    assert_eq!(queue.status(good_before), Some(CommandStatus::Done));
    assert_eq!(queue.status(good_after), Some(CommandStatus::Done));

    match queue.status(bad_target) {
        Some(CommandStatus::Failed(message)) => assert!(message.contains("Ghost")),
        other => panic!("unexpected status: {other:?}"),
    }
    match queue.status(bad_action) {
        Some(CommandStatus::Failed(message)) => assert!(message.contains("fly")),
        other => panic!("unexpected status: {other:?}"),
    }

    let id = runner.concept_by_name("Player").unwrap();
    assert_eq!(runner.concept(id).unwrap().peek_state("x"), Some(&json!(2)));
}

#[test]
fn test_invariant_failure_recorded_per_command() {
    let mut runner = Runner::new();
    let wallet = runner
        .register_concept(
            Concept::new("Wallet")
                .with_state("balance", json!(10))
                .on("spend", |ctx, payload| {
                    let amount = payload
                        .as_object()
                        .and_then(|p| p.get("amount"))
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    let balance = ctx.get("balance").and_then(Value::as_i64).unwrap_or(0);
                    ctx.set("balance", json!(balance - amount));
                }),
        )
        .unwrap();
    runner.register_invariant(Invariant::new(
        "NoDebt",
        move |state| {
            state
                .get(&wallet)
                .and_then(|s| s.get("balance"))
                .and_then(Value::as_i64)
                .map(|b| b >= 0)
                .unwrap_or(true)
        },
        "Balance cannot be negative",
    ));
    runner.start();

    let queue = Arc::new(InMemoryCommandQueue::new());
    let overdraw = queue.push("Wallet", "spend", json!({"amount": 60}));

    let executed = runner.poll_and_execute_commands(queue.as_ref());
    assert_eq!(executed, 0);
    match queue.status(overdraw) {
        Some(CommandStatus::Failed(message)) => assert!(message.contains("NoDebt")),
        other => panic!("unexpected status: {other:?}"),
    }
}
