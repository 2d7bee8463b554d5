//! EDF Tests
//!
//! Tests for deadline-driven dispatching:
//! - Background tasks order by priority, like a priority instance
//! - Any task with a deadline runs ahead of every background task
//! - Earlier deadline wins, FIFO among equal deadlines
//! - Cancelling a deadline returns the task to background priority

use super::{block_current, create, spawn, uni};
use crate::scheduler::{SchedAlgorithm, SchedError, TaskId, TaskState, WaitFlags};

#[test]
fn test_background_tasks_order_by_priority() {
    let (mut sys, handle) = uni(SchedAlgorithm::Edf);
    let priorities = [9, 3, 200, 3, 0];
    let tasks: Vec<TaskId> = priorities.iter().map(|p| create(&mut sys, *p)).collect();
    super::start_together(&mut sys, &tasks);

    for _ in 0..priorities.len() - 1 {
        block_current(&mut sys, 0);
    }
    let expected = vec![tasks[4], tasks[1], tasks[3], tasks[0], tasks[2]];
    assert_eq!(handle.dispatched(), expected);
}

#[test]
fn test_deadline_preempts_background() {
    let (mut sys, _handle) = uni(SchedAlgorithm::Edf);
    let background = spawn(&mut sys, 1);
    let periodic = spawn(&mut sys, 200);
    assert_eq!(sys.executing(0), Some(background));

    sys.install_deadline(periodic, 50).unwrap();
    assert_eq!(sys.executing(0), Some(periodic));
    assert_eq!(sys.state(background), TaskState::Ready);
    assert_eq!(sys.task(background).unwrap().preempt_count, 1);
}

#[test]
fn test_earlier_deadline_wins() {
    let (mut sys, _handle) = uni(SchedAlgorithm::Edf);
    let a = spawn(&mut sys, 10);
    sys.install_deadline(a, 100).unwrap();
    let b = spawn(&mut sys, 10);
    assert_eq!(sys.executing(0), Some(a));

    sys.install_deadline(b, 30).unwrap();
    assert_eq!(sys.executing(0), Some(b));
    assert_eq!(sys.get_deadline(b).unwrap(), Some(30));
    assert_eq!(sys.get_deadline(a).unwrap(), Some(100));
}

#[test]
fn test_cancel_deadline_returns_to_background() {
    let (mut sys, _handle) = uni(SchedAlgorithm::Edf);
    let a = spawn(&mut sys, 10);
    sys.install_deadline(a, 100).unwrap();
    let b = spawn(&mut sys, 10);
    sys.install_deadline(b, 30).unwrap();

    sys.cancel_deadline(b).unwrap();
    assert_eq!(sys.get_deadline(b).unwrap(), None);
    assert_eq!(sys.executing(0), Some(a));
    assert_eq!(sys.state(b), TaskState::Ready);
}

#[test]
fn test_equal_deadlines_are_fifo() {
    let (mut sys, _handle) = uni(SchedAlgorithm::Edf);
    let a = create(&mut sys, 50);
    let b = create(&mut sys, 1);

    sys.dispatch_disable();
    sys.start_task(a).unwrap();
    sys.start_task(b).unwrap();
    sys.install_deadline(a, 40).unwrap();
    sys.install_deadline(b, 40).unwrap();
    sys.dispatch_enable();

    // Priority is irrelevant between deadline tasks
    assert_eq!(sys.executing(0), Some(a));
    block_current(&mut sys, 0);
    assert_eq!(sys.executing(0), Some(b));
}

#[test]
fn test_deadline_is_relative_to_now() {
    let (mut sys, _handle) = uni(SchedAlgorithm::Edf);
    let a = spawn(&mut sys, 10);
    sys.advance(10);
    sys.install_deadline(a, 5).unwrap();
    assert_eq!(sys.get_deadline(a).unwrap(), Some(15));
}

#[test]
fn test_blocked_task_keeps_deadline() {
    let (mut sys, _handle) = uni(SchedAlgorithm::Edf);
    let background = spawn(&mut sys, 0);
    let a = spawn(&mut sys, 10);
    sys.install_deadline(a, 20).unwrap();
    assert_eq!(sys.executing(0), Some(a));

    sys.block(a, WaitFlags::PERIOD).unwrap();
    assert_eq!(sys.executing(0), Some(background));
    sys.unblock(a, WaitFlags::PERIOD).unwrap();
    assert_eq!(sys.executing(0), Some(a));
    assert_eq!(sys.get_deadline(a).unwrap(), Some(20));
}

#[test]
fn test_deadline_ignored_by_priority_instance() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 10);
    let b = spawn(&mut sys, 20);

    sys.install_deadline(b, 1).unwrap();
    assert_eq!(sys.get_deadline(b).unwrap(), None);
    assert_eq!(sys.executing(0), Some(a));
}

#[test]
fn test_install_deadline_errors() {
    let (mut sys, _handle) = uni(SchedAlgorithm::Edf);
    let dormant = create(&mut sys, 10);
    let running = spawn(&mut sys, 10);

    assert_eq!(sys.install_deadline(running, 0), Err(SchedError::InvalidNumber));
    assert_eq!(sys.install_deadline(dormant, 10), Err(SchedError::IncorrectState));
    assert_eq!(sys.install_deadline(TaskId(99), 10), Err(SchedError::InvalidId));
    assert_eq!(sys.get_deadline(running).unwrap(), None);
}
