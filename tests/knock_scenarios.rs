use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use futures::stream;
use knockwatch::domain::entities::{KnockEvent, KnockerBuilder, KnockerSpec, PortSelector};
use knockwatch::domain::errors::EngineError;
use knockwatch::domain::ports::trigger::FnTrigger;
use knockwatch::domain::services::KnockEngine;
use knockwatch::infrastructure::capture::parse_field_line;

const S1: u16 = 7000;
const S2: u16 = 8000;
const S3: u16 = 9000;

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

fn dst(source: &str, port: u16) -> KnockEvent {
    KnockEvent::new(addr(source), port, 40000)
}

fn ssh_knocker() -> KnockerSpec {
    KnockerBuilder::new()
        .name("ssh")
        .sequence([S1, S2, S3])
        .build()
        .unwrap()
}

/// Run an engine over a finite stream and return the addresses it fired for.
async fn completions(spec: KnockerSpec, events: Vec<KnockEvent>) -> Vec<IpAddr> {
    let fired = Arc::new(Mutex::new(Vec::new()));
    let sink = fired.clone();
    let trigger = FnTrigger::new(move |event: &KnockEvent| {
        sink.lock().unwrap().push(event.source_address);
    });

    let mut engine = KnockEngine::new(spec);
    let result = engine.run(stream::iter(events), &trigger).await;
    assert_eq!(result.unwrap_err(), EngineError::StreamClosed);

    let fired = fired.lock().unwrap().clone();
    fired
}

#[tokio::test]
async fn interleaved_hosts_complete_independently() {
    let events = vec![
        dst("10.0.0.1", S1),
        dst("10.0.0.2", S1),
        dst("10.0.0.1", S2),
        dst("10.0.0.3", 22),
        dst("10.0.0.2", S2),
        dst("10.0.0.2", S3),
        dst("10.0.0.1", S3),
    ];

    let fired = completions(ssh_knocker(), events).await;
    assert_eq!(fired, vec![addr("10.0.0.2"), addr("10.0.0.1")]);
}

#[tokio::test]
async fn mismatch_discards_all_progress() {
    let events = vec![
        dst("10.0.0.1", S1),
        dst("10.0.0.1", S2),
        dst("10.0.0.1", 443),
        dst("10.0.0.1", S1),
        dst("10.0.0.1", S2),
        dst("10.0.0.1", S3),
    ];

    assert_eq!(completions(ssh_knocker(), events).await.len(), 1);
}

#[tokio::test]
async fn repeated_sequences_fire_each_time() {
    let events = [S1, S2, S3, S1, S2, S3]
        .into_iter()
        .map(|port| dst("192.0.2.9", port))
        .collect();

    assert_eq!(completions(ssh_knocker(), events).await.len(), 2);
}

#[tokio::test]
async fn partial_sequence_never_fires() {
    let events = vec![dst("10.0.0.1", S1), dst("10.0.0.1", S2)];
    assert!(completions(ssh_knocker(), events).await.is_empty());
}

#[tokio::test]
async fn repeated_first_port_does_not_double_advance() {
    // Each event advances at most one position
    let spec = KnockerBuilder::new().sequence([S1, S1, S2]).build().unwrap();
    let events = vec![dst("10.0.0.1", S1), dst("10.0.0.1", S1), dst("10.0.0.1", S2)];
    assert_eq!(completions(spec, events).await.len(), 1);

    // With [S1, S2] the second S1 resets and is not taken as a fresh start
    let spec = KnockerBuilder::new().sequence([S1, S2]).build().unwrap();
    let events = vec![dst("10.0.0.1", S1), dst("10.0.0.1", S1), dst("10.0.0.1", S2)];
    assert!(completions(spec, events).await.is_empty());
}

#[tokio::test]
async fn source_selector_follows_source_ports() {
    let spec = KnockerBuilder::new()
        .sequence([1111, 2222])
        .selector(PortSelector::Source)
        .build()
        .unwrap();
    let events = vec![
        KnockEvent::new(addr("10.0.0.5"), 80, 1111),
        KnockEvent::new(addr("10.0.0.5"), 443, 2222),
    ];

    assert_eq!(completions(spec, events).await, vec![addr("10.0.0.5")]);
}

#[tokio::test]
async fn destination_selector_ignores_source_ports() {
    let events = [S1, S2, S3]
        .into_iter()
        .map(|port| KnockEvent::new(addr("10.0.0.6"), 22, port))
        .collect();

    assert!(completions(ssh_knocker(), events).await.is_empty());
}

#[tokio::test]
async fn tshark_field_lines_drive_the_engine() {
    let output = "\
10.1.1.1\t51000\t7000
garbage line
10.1.1.1\t51001\t8000
fe80::1\t51002\t9000
10.1.1.1\t51003\t9000
";
    let events: Vec<KnockEvent> = output.lines().filter_map(parse_field_line).collect();
    assert_eq!(events.len(), 3);

    assert_eq!(completions(ssh_knocker(), events).await, vec![addr("10.1.1.1")]);
}
