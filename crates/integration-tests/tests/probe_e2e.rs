//! End-to-end probe runs against real subprocesses
//!
//! The client is a shell stand-in, so the whole launch, classify and
//! tree-termination path is exercised without openvpn.

#![cfg(unix)]

mod common;

use common::*;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vmate_core::application::{OutputClassifier, ProbeConfig, Prober};
use vmate_core::domain::{FailureReason, Location, ProbeEvent, ProbeOutcome};
use vmate_core::port::location_resolver::mocks::StaticLocationResolver;
use vmate_core::port::time_provider::SystemTimeProvider;
use vmate_core::port::CandidateStore;
use vmate_infra_fs::{discover_configs, FlatFileCandidateStore};
use vmate_infra_system::SubprocessLauncher;

fn prober(resolver: StaticLocationResolver) -> Prober {
    Prober::new(
        Arc::new(SubprocessLauncher::new()),
        Arc::new(resolver),
        OutputClassifier::default(),
        Arc::new(SystemTimeProvider),
    )
}

fn probe_config(lab: &Lab, max_workers: usize, success_limit: usize) -> ProbeConfig {
    ProbeConfig {
        max_workers,
        success_limit,
        per_probe_timeout: SHORT,
        client_binary: lab.client.clone(),
    }
}

#[tokio::test]
async fn test_mixed_configs_only_working_one_found() {
    let lab = Lab::new();
    let good = lab.config("good.ovpn", CONNECTS);
    let bad = lab.config("bad.ovpn", AUTH_FAILS);
    let silent = lab.config("silent.ovpn", SILENT);
    let exits = lab.config("exits.ovpn", EXITS);

    let resolver = StaticLocationResolver::new(Location::Unknown)
        .with_answer(&good, Location::Country("NL".to_string()));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    let found = prober(resolver)
        .probe_all(
            vec![good.clone(), bad.clone(), silent.clone(), exits.clone()],
            &probe_config(&lab, 4, 10),
            CancellationToken::new(),
            Some(tx),
        )
        .await;

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].path, good);
    assert_eq!(found[0].location, Location::Country("NL".to_string()));
    // Silent config is bounded by the per-probe timeout, not its own sleep
    assert!(started.elapsed() < SHORT * 4);

    let mut outcomes = Vec::new();
    while let Ok(ProbeEvent::Completed { path, outcome }) = rx.try_recv() {
        outcomes.push((path, outcome));
    }
    assert_eq!(outcomes.len(), 4);
    let outcome_of = |p: &str| {
        outcomes
            .iter()
            .find(|(path, _)| path == p)
            .map(|(_, o)| o.clone())
            .unwrap()
    };
    assert_eq!(outcome_of(&good), ProbeOutcome::Success);
    assert_eq!(
        outcome_of(&bad),
        ProbeOutcome::Failure(FailureReason::KeywordMatch("AUTH_FAILED".to_string()))
    );
    assert_eq!(
        outcome_of(&silent),
        ProbeOutcome::Failure(FailureReason::Timeout)
    );
    assert_eq!(
        outcome_of(&exits),
        ProbeOutcome::Failure(FailureReason::ProcessExitedUnexpectedly)
    );

    assert_all_gone(&lab.recorded_pids("good.ovpn"));
    assert_all_gone(&lab.recorded_pids("silent.ovpn"));
    println!("✅ Mixed configs: 1 found, every process tree torn down");
}

#[tokio::test]
async fn test_limit_stops_run_early() {
    let lab = Lab::new();
    let paths: Vec<String> = (0..3)
        .map(|i| lab.config(&format!("ok{}.ovpn", i), CONNECTS))
        .chain((0..3).map(|i| lab.config(&format!("quiet{}.ovpn", i), SILENT)))
        .collect();

    let started = Instant::now();
    let found = prober(StaticLocationResolver::new(Location::Unknown))
        .probe_all(
            paths,
            &probe_config(&lab, 6, 1),
            CancellationToken::new(),
            None,
        )
        .await;

    assert_eq!(found.len(), 1);
    // Quiet configs were cancelled, not waited out
    assert!(started.elapsed() < SHORT);

    for i in 0..3 {
        assert_all_gone(&lab.recorded_pids(&format!("ok{}.ovpn", i)));
        assert_all_gone(&lab.recorded_pids(&format!("quiet{}.ovpn", i)));
    }
    println!("✅ Limit of 1 reached, remaining probes cancelled");
}

#[tokio::test]
async fn test_discover_probe_and_save() {
    let lab = Lab::new();
    let nested = lab.path().join("providers");
    std::fs::create_dir_all(&nested).unwrap();
    lab.config("providers/a.ovpn", CONNECTS);
    lab.config("providers/b.ovpn", AUTH_FAILS);
    lab.config("c.ovpn", CONNECTS);
    lab.config("readme.txt", "not a config");

    let paths = discover_configs(lab.path()).unwrap();
    assert_eq!(paths.len(), 3);

    let sweden = Location::Country("SE".to_string());
    let found = prober(StaticLocationResolver::new(sweden.clone()))
        .probe_all(
            paths,
            &probe_config(&lab, 2, 10),
            CancellationToken::new(),
            None,
        )
        .await;
    assert_eq!(found.len(), 2);

    let store = FlatFileCandidateStore::new(lab.path().join("history").join("recent.txt"));
    assert!(store.save(&found).await.unwrap());

    let loaded = store.load().await.unwrap();
    assert_eq!(loaded, found);
    assert!(loaded.iter().all(|c| c.location == sweden));
    println!("✅ Discovered 3, found 2, history round-trips");
}

#[tokio::test]
async fn test_external_cancel_stops_everything() {
    let lab = Lab::new();
    let paths: Vec<String> = (0..4)
        .map(|i| lab.config(&format!("quiet{}.ovpn", i), SILENT))
        .collect();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let found = prober(StaticLocationResolver::new(Location::Unknown))
        .probe_all(paths, &probe_config(&lab, 4, 10), cancel, None)
        .await;

    assert!(found.is_empty());
    assert!(started.elapsed() < SHORT);
    for i in 0..4 {
        assert_all_gone(&lab.recorded_pids(&format!("quiet{}.ovpn", i)));
    }
    println!("✅ Cancellation tore down all in-flight probes");
}
