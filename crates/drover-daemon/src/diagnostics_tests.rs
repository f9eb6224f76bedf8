
use super::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn spawn_parked(name: &str, stop: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    let label = name.to_string();
    std::thread::Builder::new()
        .name(label.clone())
        .spawn(move || {
            register_current_thread(&label);
            while !stop.load(Ordering::SeqCst) {
                std::thread::park_timeout(Duration::from_millis(25));
            }
            deregister_current_thread();
        })
        .unwrap()
}

#[test]
fn test_own_stack_is_always_captured() {
    let stacks = capture_all_stacks();
    assert!(!stacks.is_empty());
    assert!(stacks[0].frames().count() > 0);
}

#[cfg(unix)]
#[test]
fn test_registered_threads_are_captured() {
    let stop = Arc::new(AtomicBool::new(false));
    let one = spawn_parked("worker-one", stop.clone());
    let two = spawn_parked("worker-two", stop.clone());

    // Let both workers reach their registration call.
    std::thread::sleep(Duration::from_millis(100));

    let stacks = capture_all_stacks();
    let names: Vec<&str> = stacks.iter().map(|s| s.thread_name()).collect();
    assert!(names.contains(&"worker-one"), "missing from {names:?}");
    assert!(names.contains(&"worker-two"), "missing from {names:?}");
    assert!(!names.contains(&"worker-three"));

    for stack in &stacks {
        assert!(stack.frames().count() > 0);
    }

    stop.store(true, Ordering::SeqCst);
    one.join().unwrap();
    two.join().unwrap();
}

#[cfg(unix)]
#[test]
fn test_deregistered_thread_is_not_captured() {
    let stop = Arc::new(AtomicBool::new(false));
    let worker = spawn_parked("worker-transient", stop.clone());

    std::thread::sleep(Duration::from_millis(100));
    stop.store(true, Ordering::SeqCst);
    worker.join().unwrap();

    let stacks = capture_all_stacks();
    assert!(stacks.iter().all(|s| s.thread_name() != "worker-transient"));
}

#[cfg(unix)]
#[test]
fn test_reregistration_replaces_entry() {
    register_current_thread("first-name");
    register_current_thread("second-name");

    let own = pthread_self();
    let count = REGISTRY
        .lock()
        .iter()
        .filter(|(_, t)| *t == own)
        .count();
    assert_eq!(count, 1);

    deregister_current_thread();
}
