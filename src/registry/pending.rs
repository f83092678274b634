//! Deferred setup requests of a data link.
//!
//! A request that arrives while the link state machine is mid-transaction is
//! queued here and replayed when the machine next settles in IDLE or
//! SCHEDULE_ESTABLISHED.

use std::collections::VecDeque;

use crate::core::Role;

/// Kind of deferred work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Renegotiate the link schedule.
    NdlSetup,
    /// Set up a data path.
    NdpSetup,
}

/// One queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    /// What to start.
    pub kind: RequestKind,
    /// Role to negotiate in.
    pub role: Role,
    /// Session slot for [`RequestKind::NdpSetup`].
    pub ndp: Option<usize>,
}

impl PendingRequest {
    /// Link schedule request.
    pub fn ndl_setup(role: Role) -> Self {
        Self {
            kind: RequestKind::NdlSetup,
            role,
            ndp: None,
        }
    }

    /// Data path setup request for session slot `ndp`.
    pub fn ndp_setup(role: Role, ndp: usize) -> Self {
        Self {
            kind: RequestKind::NdpSetup,
            role,
            ndp: Some(ndp),
        }
    }
}

/// FIFO of pending requests.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    queue: VecDeque<PendingRequest>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail.
    pub fn push(&mut self, request: PendingRequest) {
        self.queue.push_back(request);
    }

    /// Take the head.
    pub fn pop(&mut self) -> Option<PendingRequest> {
        self.queue.pop_front()
    }

    /// Drop everything.
    pub fn flush(&mut self) {
        self.queue.clear();
    }

    /// Drop data path requests that reference session slot `ndp`.
    pub fn remove_ndp(&mut self, ndp: usize) {
        self.queue
            .retain(|r| !(r.kind == RequestKind::NdpSetup && r.ndp == Some(ndp)));
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut q = PendingQueue::new();
        q.push(PendingRequest::ndp_setup(Role::Initiator, 2));
        q.push(PendingRequest::ndl_setup(Role::Responder));

        assert_eq!(q.pop(), Some(PendingRequest::ndp_setup(Role::Initiator, 2)));
        assert_eq!(q.pop(), Some(PendingRequest::ndl_setup(Role::Responder)));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_remove_ndp_keeps_others() {
        let mut q = PendingQueue::new();
        q.push(PendingRequest::ndp_setup(Role::Initiator, 1));
        q.push(PendingRequest::ndl_setup(Role::Initiator));
        q.push(PendingRequest::ndp_setup(Role::Responder, 3));

        q.remove_ndp(1);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().map(|r| r.kind), Some(RequestKind::NdlSetup));
        assert_eq!(q.pop().and_then(|r| r.ndp), Some(3));
    }

    #[test]
    fn test_flush() {
        let mut q = PendingQueue::new();
        q.push(PendingRequest::ndl_setup(Role::Initiator));
        q.flush();
        assert!(q.is_empty());
    }
}
