//! Registry behaviour under each policy and under concurrent load.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use super::*;

const URL: &str = "https://example.com/file.iso";

fn first(decision: Decision) -> Arc<Emitter> {
    match decision {
        Decision::First(e) => e,
        other => panic!("expected First, got {}", other.label()),
    }
}

#[test]
fn checkout_on_empty_registry_is_first() {
    let registry = Registry::new();
    let emitter = first(registry.checkout(URL));
    assert_eq!(emitter.url(), URL);
    assert_eq!(emitter.outcome(), Outcome::Pending);
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(URL));
}

#[test]
fn overlay_returns_same_emitter_and_keeps_one_entry() {
    let registry = Registry::with_policy(ConflictPolicy::Overlay);
    let original = first(registry.checkout(URL));
    match registry.checkout(URL) {
        Decision::Overlay(e) => assert!(Arc::ptr_eq(&e, &original)),
        other => panic!("expected Overlay, got {}", other.label()),
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn overlay_double_clear_only_first_counts() {
    let registry = Registry::with_policy(ConflictPolicy::Overlay);
    let original = first(registry.checkout(URL));
    let _overlay = registry.checkout(URL);
    assert!(registry.clear_break(URL));
    assert!(!registry.clear_success(URL));
    assert_eq!(original.outcome(), Outcome::Failed);
    assert!(registry.is_empty());
}

#[test]
fn stale_owned_clear_keeps_newer_entry() {
    let registry = Registry::with_policy(ConflictPolicy::WaitAfter);
    let old = first(registry.checkout(URL));
    assert!(registry.clear_owned(URL, &old, Outcome::Succeeded));

    let newer = first(registry.checkout(URL));
    assert!(!registry.clear_owned(URL, &old, Outcome::Failed));
    assert!(Arc::ptr_eq(&registry.in_flight(URL).unwrap(), &newer));
    assert_eq!(newer.outcome(), Outcome::Pending);
    assert!(!newer.is_signalled());

    assert!(registry.clear_owned(URL, &newer, Outcome::Succeeded));
    assert!(registry.is_empty());
}

#[test]
fn cancel_does_not_touch_registry() {
    let registry = Registry::with_policy(ConflictPolicy::Cancel);
    let original = first(registry.checkout(URL));
    let decision = registry.checkout(URL);
    assert!(matches!(decision, Decision::Cancel));
    assert!(decision.emitter().is_none());
    assert!(!decision.must_report());
    assert_eq!(registry.len(), 1);
    assert!(Arc::ptr_eq(&registry.in_flight(URL).unwrap(), &original));
}

#[test]
fn unknown_policy_code_cancels_duplicates() {
    let registry = Registry::new();
    registry.set_policy_code(42);
    assert_eq!(registry.policy(), ConflictPolicy::Cancel);
    let _ = first(registry.checkout(URL));
    assert!(matches!(registry.checkout(URL), Decision::Cancel));
}

#[test]
fn clearing_unknown_url_is_noop() {
    let registry = Registry::new();
    let _ = first(registry.checkout(URL));
    assert!(!registry.clear_success("https://example.com/other"));
    assert!(!registry.clear_break("https://example.com/other"));
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(URL));
}

#[test]
fn checkout_after_clear_is_first_again() {
    let registry = Registry::new();
    let a = first(registry.checkout(URL));
    assert!(registry.clear_success(URL));
    assert!(registry.is_empty());
    assert_eq!(a.outcome(), Outcome::Succeeded);
    assert!(a.is_signalled());
    let b = first(registry.checkout(URL));
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(b.outcome(), Outcome::Pending);
}

#[test]
fn wait_after_blocks_until_clear_and_adopts_success() {
    let registry = Arc::new(Registry::with_policy(ConflictPolicy::WaitAfter));
    let _original = first(registry.checkout(URL));

    let waiter = match registry.checkout(URL) {
        Decision::WaitAfter(e) => e,
        other => panic!("expected WaitAfter, got {}", other.label()),
    };
    let handle = thread::spawn(move || waiter.wait(None));

    thread::sleep(Duration::from_millis(50));
    assert!(!handle.is_finished(), "waiter must block while the task is in flight");

    registry.clear_success(URL);
    assert_eq!(handle.join().unwrap(), Ok(Outcome::Succeeded));
    assert!(!registry.contains(URL));
}

#[test]
fn wait_after_end_to_end_failure() {
    let registry = Arc::new(Registry::with_policy(ConflictPolicy::WaitAfter));
    let ready = Arc::new(Barrier::new(2));

    let t1 = {
        let registry = Arc::clone(&registry);
        let ready = Arc::clone(&ready);
        thread::spawn(move || {
            let _ = first(registry.checkout("u1"));
            ready.wait();
            thread::sleep(Duration::from_millis(50));
            registry.clear_break("u1");
        })
    };

    let t2 = {
        let registry = Arc::clone(&registry);
        let ready = Arc::clone(&ready);
        thread::spawn(move || {
            ready.wait();
            match registry.checkout("u1") {
                Decision::WaitAfter(e) => e.wait(None),
                other => panic!("expected WaitAfter, got {}", other.label()),
            }
        })
    };

    t1.join().unwrap();
    assert_eq!(t2.join().unwrap(), Ok(Outcome::Failed));
    assert!(!registry.contains("u1"));
}

#[test]
fn waiter_released_after_policy_change() {
    let registry = Arc::new(Registry::with_policy(ConflictPolicy::WaitAfter));
    let _ = first(registry.checkout(URL));
    let waiter = match registry.checkout(URL) {
        Decision::WaitAfter(e) => e,
        other => panic!("expected WaitAfter, got {}", other.label()),
    };
    let handle = thread::spawn(move || waiter.wait(None));

    registry.set_policy(ConflictPolicy::Overlay);
    thread::sleep(Duration::from_millis(20));
    registry.clear_success(URL);

    assert_eq!(handle.join().unwrap(), Ok(Outcome::Succeeded));
}

#[test]
fn policy_change_only_affects_future_checkouts() {
    let registry = Registry::with_policy(ConflictPolicy::Cancel);
    let original = first(registry.checkout(URL));
    assert!(matches!(registry.checkout(URL), Decision::Cancel));
    registry.set_policy(ConflictPolicy::Overlay);
    match registry.checkout(URL) {
        Decision::Overlay(e) => assert!(Arc::ptr_eq(&e, &original)),
        other => panic!("expected Overlay, got {}", other.label()),
    }
}

#[test]
fn many_waiters_all_released() {
    let registry = Arc::new(Registry::with_policy(ConflictPolicy::WaitAfter));
    let _ = first(registry.checkout(URL));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let emitter = registry.checkout(URL).emitter().cloned().unwrap();
            thread::spawn(move || emitter.wait(None))
        })
        .collect();
    thread::sleep(Duration::from_millis(30));
    registry.clear_success(URL);
    for h in handles {
        assert_eq!(h.join().unwrap(), Ok(Outcome::Succeeded));
    }
}

#[test]
fn blocked_waiter_does_not_stall_other_urls() {
    let registry = Arc::new(Registry::with_policy(ConflictPolicy::WaitAfter));
    let _ = first(registry.checkout(URL));
    let emitter = registry.checkout(URL).emitter().cloned().unwrap();
    let handle = thread::spawn(move || emitter.wait(None));
    thread::sleep(Duration::from_millis(20));

    let other = first(registry.checkout("https://example.com/other"));
    assert!(registry.clear_success(other.url()));

    registry.clear_success(URL);
    assert_eq!(handle.join().unwrap(), Ok(Outcome::Succeeded));
}

#[test]
fn concurrent_checkouts_yield_exactly_one_first() {
    for policy in [
        ConflictPolicy::Overlay,
        ConflictPolicy::WaitAfter,
        ConflictPolicy::Cancel,
    ] {
        let registry = Arc::new(Registry::with_policy(policy));
        let start = Arc::new(Barrier::new(16));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    registry.checkout(URL)
                })
            })
            .collect();
        let decisions: Vec<Decision> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let firsts = decisions.iter().filter(|d| d.is_first()).count();
        assert_eq!(firsts, 1, "policy {policy}: exactly one First");
        assert_eq!(registry.len(), 1);

        let original = decisions
            .iter()
            .find(|d| d.is_first())
            .and_then(Decision::emitter)
            .unwrap();
        for d in &decisions {
            if let Some(e) = d.emitter() {
                assert!(Arc::ptr_eq(e, original));
            }
        }
    }
}

#[test]
fn concurrent_clears_remove_once() {
    let registry = Arc::new(Registry::new());
    let emitter = first(registry.checkout(URL));
    let start = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                if i % 2 == 0 {
                    registry.clear_success(URL)
                } else {
                    registry.clear_break(URL)
                }
            })
        })
        .collect();
    let removed = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|r| *r)
        .count();
    assert_eq!(removed, 1);
    assert!(registry.is_empty());
    assert!(emitter.outcome().is_terminal());
}

#[test]
fn at_most_one_entry_per_url_under_churn() {
    let registry = Arc::new(Registry::with_policy(ConflictPolicy::Overlay));
    let urls = ["a", "b", "c"];
    let handles: Vec<_> = (0..12)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let url = urls[i % urls.len()];
            thread::spawn(move || {
                for round in 0..200 {
                    let decision = registry.checkout(url);
                    if let Some(e) = decision.emitter() {
                        assert_eq!(e.url(), url);
                        let live = registry.in_flight(url);
                        if let Some(live) = live {
                            assert_eq!(live.url(), url);
                        }
                    }
                    assert!(registry.len() <= urls.len());
                    if decision.must_report() {
                        if round % 3 == 0 {
                            registry.clear_break(url);
                        } else {
                            registry.clear_success(url);
                        }
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert!(registry.is_empty());
}

#[test]
fn interrupted_waiter_leaves_task_registered() {
    let registry = Arc::new(Registry::with_policy(ConflictPolicy::WaitAfter));
    let _ = first(registry.checkout(URL));
    let emitter = registry.checkout(URL).emitter().cloned().unwrap();
    let interrupt = Interrupt::new();
    let handle = {
        let interrupt = interrupt.clone();
        thread::spawn(move || emitter.wait(Some(&interrupt)))
    };
    thread::sleep(Duration::from_millis(20));
    interrupt.interrupt();
    assert_eq!(handle.join().unwrap(), Err(WaitError::Interrupted));
    assert!(registry.contains(URL));
}
