//! Task State Machine Tests
//!
//! Tests for the task life cycle and blocked-state bookkeeping:
//! - dormant -> ready on start, rejection of illegal transitions
//! - blocked -> ready only once every wait reason is clear
//! - restart and delete from every state, with linkage torn down
//! - timed waits and timeout cancellation
//!
//! Status code mapping follows the directive surface: unknown tasks report
//! `InvalidId`, illegal transitions `IncorrectState`.

use super::{boot, create, spawn, uni, FIRST};
use crate::config::SystemConfig;
use crate::mock::PlatformEvent;
use crate::scheduler::{
    SchedAlgorithm, SchedError, TaskCounts, TaskId, TaskParams, TaskState, WaitFlags,
};

// ============================================================================
// Creation and Start
// ============================================================================

#[test]
fn test_created_task_is_dormant() {
    let (mut sys, handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = create(&mut sys, 5);
    assert_eq!(sys.state(a), TaskState::Dormant);
    assert_eq!(sys.executing(0), None);
    assert!(handle.events().is_empty());
}

#[test]
fn test_start_enters_ready_and_runs() {
    let (mut sys, handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = create(&mut sys, 5);
    sys.start_task(a).unwrap();

    assert_eq!(sys.state(a), TaskState::Executing);
    assert_eq!(handle.events()[0], PlatformEvent::InitContext(a));
}

#[test]
fn test_start_twice_rejected() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    assert_eq!(sys.start_task(a), Err(SchedError::IncorrectState));
}

#[test]
fn test_unknown_task_rejected() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let ghost = TaskId(42);
    assert_eq!(sys.state(ghost), TaskState::NonExistent);
    assert_eq!(sys.start_task(ghost), Err(SchedError::InvalidId));
    assert_eq!(sys.delete_task(ghost), Err(SchedError::InvalidId));
    assert_eq!(sys.suspend(ghost), Err(SchedError::InvalidId));
    assert_eq!(sys.set_priority(ghost, 1), Err(SchedError::InvalidId));
}

#[test]
fn test_create_validates_parameters() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    assert_eq!(
        sys.create_task(TaskParams::new(256)).err(),
        Some(SchedError::InvalidPriority)
    );
    assert_eq!(
        sys.create_task(TaskParams::new(1).on(crate::scheduler::SchedulerId(3))).err(),
        Some(SchedError::InvalidId)
    );
}

#[test]
fn test_task_table_capacity() {
    let (mut sys, _handle) = boot(
        SystemConfig::uniprocessor(SchedAlgorithm::DeterministicPriority).with_max_tasks(2),
    );
    let a = create(&mut sys, 1);
    let _b = create(&mut sys, 1);
    assert_eq!(sys.create_task(TaskParams::new(1)).err(), Some(SchedError::TooMany));

    sys.delete_task(a).unwrap();
    let c = create(&mut sys, 1);
    assert_eq!(c, a, "freed slot is reused");
}

// ============================================================================
// Blocking
// ============================================================================

#[test]
fn test_block_ready_task_leaves_queue() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let _a = spawn(&mut sys, 1);
    let b = spawn(&mut sys, 5);

    sys.block(b, WaitFlags::MESSAGE).unwrap();
    assert_eq!(sys.state(b), TaskState::Blocked);
    assert!(sys.ready_order(FIRST).unwrap().is_empty());

    sys.unblock(b, WaitFlags::MESSAGE).unwrap();
    assert_eq!(sys.state(b), TaskState::Ready);
    assert_eq!(sys.ready_order(FIRST).unwrap(), vec![b]);
}

#[test]
fn test_block_rejects_bad_reason_and_dormant_task() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = create(&mut sys, 5);
    assert_eq!(sys.block(a, WaitFlags::DELAY), Err(SchedError::IncorrectState));
    sys.start_task(a).unwrap();
    assert_eq!(sys.block(a, WaitFlags::empty()), Err(SchedError::InvalidNumber));
    assert_eq!(sys.block(a, WaitFlags::SUSPENDED), Err(SchedError::InvalidNumber));
}

#[test]
fn test_unblock_requires_matching_reason() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    assert_eq!(sys.unblock(a, WaitFlags::EVENT), Err(SchedError::IncorrectState));

    sys.block(a, WaitFlags::EVENT).unwrap();
    assert_eq!(sys.unblock(a, WaitFlags::BARRIER), Err(SchedError::IncorrectState));
    sys.release(a).unwrap();
    assert_eq!(sys.state(a), TaskState::Executing);
}

#[test]
fn test_suspended_and_waiting_needs_both_cleared() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    sys.block(a, WaitFlags::SEMAPHORE).unwrap();
    sys.suspend(a).unwrap();
    assert_eq!(
        sys.wait_flags(a).unwrap(),
        WaitFlags::SEMAPHORE | WaitFlags::SUSPENDED
    );

    sys.unblock(a, WaitFlags::SEMAPHORE).unwrap();
    assert_eq!(sys.state(a), TaskState::Blocked);
    assert!(sys.is_suspended(a).unwrap());

    sys.resume(a).unwrap();
    assert_eq!(sys.state(a), TaskState::Executing);
}

#[test]
fn test_resume_before_condition_keeps_blocked() {
    let (mut sys, _handle) = uni(SchedAlgorithm::SimplePriority);
    let a = spawn(&mut sys, 5);
    sys.block(a, WaitFlags::MESSAGE).unwrap();
    sys.suspend(a).unwrap();
    sys.resume(a).unwrap();
    assert_eq!(sys.state(a), TaskState::Blocked);
    assert_eq!(sys.wait_flags(a).unwrap(), WaitFlags::MESSAGE);
}

#[test]
fn test_suspend_twice_and_resume_unsuspended() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    assert_eq!(sys.resume(a), Err(SchedError::IncorrectState));
    sys.suspend(a).unwrap();
    assert_eq!(sys.suspend(a), Err(SchedError::IncorrectState));
    assert_eq!(sys.executing(0), None);
}

// ============================================================================
// Restart and Delete
// ============================================================================

#[test]
fn test_delete_executing_task_frees_processor() {
    let (mut sys, handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 1);
    let b = spawn(&mut sys, 5);

    sys.delete_task(a).unwrap();
    assert_eq!(sys.state(a), TaskState::NonExistent);
    assert_eq!(sys.executing(0), Some(b));
    // The deleted context is never saved
    assert_eq!(handle.switches().last(), Some(&(0, None, Some(b))));
}

#[test]
fn test_delete_from_every_state() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let dormant = create(&mut sys, 1);
    let running = spawn(&mut sys, 2);
    let ready = spawn(&mut sys, 3);
    let blocked = spawn(&mut sys, 4);
    sys.block(blocked, WaitFlags::DELAY).unwrap();

    for id in [dormant, ready, blocked, running] {
        sys.delete_task(id).unwrap();
        assert_eq!(sys.state(id), TaskState::NonExistent);
    }
    assert_eq!(sys.executing(0), None);
    assert!(sys.ready_order(FIRST).unwrap().is_empty());
    assert_eq!(sys.task_counts(), TaskCounts::default());
}

#[test]
fn test_restart_dormant_rejected() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = create(&mut sys, 1);
    assert_eq!(sys.restart_task(a), Err(SchedError::IncorrectState));
}

#[test]
fn test_restart_blocked_task_discards_wait() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    sys.block(a, WaitFlags::MESSAGE).unwrap();
    sys.suspend(a).unwrap();

    sys.restart_task(a).unwrap();
    assert_eq!(sys.state(a), TaskState::Executing);
    assert!(sys.wait_flags(a).unwrap().is_empty());
}

#[test]
fn test_restart_restores_initial_parameters() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    sys.set_priority(a, 20).unwrap();
    sys.set_preemption(a, false).unwrap();

    sys.restart_task(a).unwrap();
    let tcb = sys.task(a).unwrap();
    assert_eq!(tcb.priority, 5);
    assert!(tcb.preemptible);
}

#[test]
fn test_restart_executing_task_reinitializes_context() {
    let (mut sys, handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    handle.clear();

    sys.restart_task(a).unwrap();
    assert_eq!(
        handle.events(),
        vec![
            PlatformEvent::InitContext(a),
            PlatformEvent::Switch { cpu: 0, from: None, to: Some(a) },
        ]
    );
    assert_eq!(sys.executing(0), Some(a));
}

// ============================================================================
// Timed Waits
// ============================================================================

#[test]
fn test_timeout_readies_task() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    sys.block_with_timeout(a, WaitFlags::SEMAPHORE, 10).unwrap();
    assert_eq!(sys.remaining_timeout(a).unwrap(), Some(10));

    sys.advance(9);
    assert_eq!(sys.state(a), TaskState::Blocked);
    assert_eq!(sys.remaining_timeout(a).unwrap(), Some(1));
    sys.advance(1);
    assert_eq!(sys.state(a), TaskState::Executing);
    assert_eq!(sys.stats().timeouts_fired, 1);
}

#[test]
fn test_unblock_cancels_timeout() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    sys.block_with_timeout(a, WaitFlags::MESSAGE, 5).unwrap();
    sys.unblock(a, WaitFlags::MESSAGE).unwrap();
    assert_eq!(sys.remaining_timeout(a).unwrap(), None);

    sys.block(a, WaitFlags::MESSAGE).unwrap();
    sys.advance(10);
    assert_eq!(sys.state(a), TaskState::Blocked);
    assert_eq!(sys.stats().timeouts_fired, 0);
}

#[test]
fn test_timeout_leaves_suspension() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    sys.block_with_timeout(a, WaitFlags::SEMAPHORE, 3).unwrap();
    sys.suspend(a).unwrap();

    sys.advance(3);
    assert_eq!(sys.state(a), TaskState::Blocked);
    assert_eq!(sys.wait_flags(a).unwrap(), WaitFlags::SUSPENDED);
    sys.resume(a).unwrap();
    assert_eq!(sys.state(a), TaskState::Executing);
}

#[test]
fn test_timeouts_fire_in_expiry_then_arming_order() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = create(&mut sys, 5);
    let b = create(&mut sys, 5);
    let c = create(&mut sys, 5);
    for id in [a, b, c] {
        sys.start_task(id).unwrap();
    }
    sys.block_with_timeout(c, WaitFlags::DELAY, 4).unwrap();
    sys.block_with_timeout(b, WaitFlags::DELAY, 2).unwrap();
    sys.block_with_timeout(a, WaitFlags::DELAY, 4).unwrap();

    sys.advance(4);
    // b woke first and runs; c and a follow in arming order
    assert_eq!(sys.executing(0), Some(b));
    assert_eq!(sys.ready_order(FIRST).unwrap(), vec![c, a]);
}

#[test]
fn test_wake_after() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    let b = spawn(&mut sys, 5);

    sys.wake_after(a, 2).unwrap();
    assert_eq!(sys.executing(0), Some(b));
    sys.advance(2);
    assert_eq!(sys.state(a), TaskState::Ready);

    // Zero delay yields to the peer
    sys.wake_after(b, 0).unwrap();
    assert_eq!(sys.executing(0), Some(a));
}

#[test]
fn test_delete_cancels_timeout() {
    let (mut sys, _handle) = uni(SchedAlgorithm::DeterministicPriority);
    let a = spawn(&mut sys, 5);
    sys.block_with_timeout(a, WaitFlags::DELAY, 2).unwrap();
    sys.delete_task(a).unwrap();

    sys.advance(5);
    assert_eq!(sys.stats().timeouts_fired, 0);
    assert_eq!(sys.state(a), TaskState::NonExistent);
}
