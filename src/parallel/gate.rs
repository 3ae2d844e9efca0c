use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

struct GateState<S> {
    next: u64,
    abandoned: bool,
    sink: S,
}

/// Serializes side effects on a shared sink into ascending sequence order.
///
/// A caller holding sequence number `n` sleeps until every number below `n`
/// has committed, then runs its action with exclusive access to the sink.
/// Sequence numbers must be dense: a number that is never committed blocks
/// every later one forever.
pub struct OrderedGate<S> {
    state: Mutex<GateState<S>>,
    turn: Condvar,
}

impl<S> OrderedGate<S> {
    pub fn new(sink: S) -> Self {
        Self {
            state: Mutex::new(GateState {
                next: 0,
                abandoned: false,
                sink,
            }),
            turn: Condvar::new(),
        }
    }

    /// Block until `seq` is due, run `action` on the sink, then hand the turn
    /// to `seq + 1`.
    ///
    /// Returns `None` without running the action if the gate was abandoned.
    pub fn commit<F, R>(&self, seq: u64, action: F) -> Option<R>
    where
        F: FnOnce(&mut S) -> R,
    {
        let mut guard = self.lock();
        debug_assert!(
            guard.next <= seq,
            "sequence {seq} committed twice (gate already at {})",
            guard.next
        );
        while !guard.abandoned && guard.next != seq {
            guard = self.turn.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
        if guard.abandoned {
            return None;
        }

        let result = action(&mut guard.sink);
        guard.next += 1;
        drop(guard);
        self.turn.notify_all();
        Some(result)
    }

    /// Release every waiter; later commits return `None`.
    ///
    /// Used when a worker dies so the rest of the pool can unwind instead of
    /// waiting on a sequence number that will never arrive.
    pub fn abandon(&self) {
        self.lock().abandoned = true;
        self.turn.notify_all();
    }

    /// The sequence number allowed to commit next; equals the number of
    /// commits so far.
    pub fn next_sequence(&self) -> u64 {
        self.lock().next
    }

    pub fn is_abandoned(&self) -> bool {
        self.lock().abandoned
    }

    pub fn into_inner(self) -> S {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
    }

    fn lock(&self) -> MutexGuard<'_, GateState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
