//! C5: schedules transaction injections at simulated ticks and runs an
//! ordered expectation/assertion/action pipeline against observed
//! responses, reporting pass/fail at teardown.

use crate::clock::{Clock, SimClock};
use crate::controller::BridgeController;
use crate::downstream::Downstream;
use crate::payload::SharedPayload;
use crate::phase::Phase;
use log::{info, warn};
use std::collections::{HashMap, VecDeque};
use std::fmt;

pub enum Outcome {
    Pass,
    Fail(String),
}

/// An action queue with waiting semantics: expectations and assertions
/// both produce a pass/fail; the difference is only what happens on
/// fail. `DO`/`DO_WAIT`
/// are both `Action::Plain`, distinguished by `waits`.
pub enum Action {
    Plain {
        name: String,
        cb: Box<dyn FnMut(&mut GeneratorTransaction)>,
        waits: bool,
    },
    Expectation {
        name: String,
        cb: Box<dyn FnMut(&mut GeneratorTransaction) -> Outcome>,
    },
    Assertion {
        name: String,
        cb: Box<dyn FnMut(&mut GeneratorTransaction) -> Outcome>,
    },
}

impl Action {
    pub fn plain(name: impl Into<String>, cb: impl FnMut(&mut GeneratorTransaction) + 'static) -> Action {
        Action::Plain {
            name: name.into(),
            cb: Box::new(cb),
            waits: false,
        }
    }

    /// `DO_WAIT`: runs, then yields the dispatch loop until the next
    /// upstream beat.
    pub fn wait(name: impl Into<String>, cb: impl FnMut(&mut GeneratorTransaction) + 'static) -> Action {
        Action::Plain {
            name: name.into(),
            cb: Box::new(cb),
            waits: true,
        }
    }

    pub fn expect(
        name: impl Into<String>,
        cb: impl FnMut(&mut GeneratorTransaction) -> Outcome + 'static,
    ) -> Action {
        Action::Expectation {
            name: name.into(),
            cb: Box::new(cb),
        }
    }

    pub fn assert(
        name: impl Into<String>,
        cb: impl FnMut(&mut GeneratorTransaction) -> Outcome + 'static,
    ) -> Action {
        Action::Assertion {
            name: name.into(),
            cb: Box::new(cb),
        }
    }

    fn waits(&self) -> bool {
        matches!(self, Action::Plain { waits: true, .. })
    }
}

pub struct GeneratorTransaction {
    pub name: String,
    pub payload: SharedPayload,
    pub phase: Phase,
    pub actions: VecDeque<Action>,
    pub passed: bool,
}

impl GeneratorTransaction {
    pub fn new(name: impl Into<String>, payload: SharedPayload, phase: Phase) -> GeneratorTransaction {
        GeneratorTransaction {
            name: name.into(),
            payload,
            phase,
            actions: VecDeque::new(),
            passed: true,
        }
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push_back(action);
        self
    }
}

impl fmt::Display for GeneratorTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (txn_id={}, passed={}, {} actions remaining)",
            self.name,
            self.phase.txn_id,
            self.passed,
            self.actions.len()
        )
    }
}

pub struct Generator {
    clock: SimClock,
    scheduled: HashMap<u16, GeneratorTransaction>,
    pending: HashMap<u16, GeneratorTransaction>,
}

impl Generator {
    pub fn new() -> Generator {
        Generator {
            clock: SimClock::new(),
            scheduled: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Enqueues an injection event at simulated tick `when`. Events are
    /// ordered primarily by tick, with same-tick ties broken by enqueue
    /// order.
    pub fn schedule_at(&mut self, when: u64, txn: GeneratorTransaction) {
        let txn_id = txn.phase.txn_id;
        self.clock.schedule_at(when, txn_id);
        self.scheduled.insert(txn_id, txn);
    }

    /// Hands `(payload, phase)` to the controller immediately. If `txn`
    /// has any registered actions, it is tracked in the pending map under
    /// `phase.txn_id` so a later `recv` can find it.
    pub fn inject<D: Downstream>(&mut self, txn: GeneratorTransaction, ctl: &mut BridgeController<D>) {
        let has_actions = !txn.actions.is_empty();
        let payload = txn.payload.clone();
        let phase = txn.phase;
        if has_actions {
            self.pending.insert(phase.txn_id, txn);
        }
        ctl.send_msg(payload, phase);
    }

    /// Pops every scheduled injection whose tick is `<= tick` and injects
    /// it, in order.
    pub fn run_until<D: Downstream>(&mut self, tick: u64, ctl: &mut BridgeController<D>) {
        for txn_id in self.clock.pop_ready(tick) {
            if let Some(txn) = self.scheduled.remove(&txn_id) {
                self.inject(txn, ctl);
            }
        }
    }

    /// The controller's `bw` callback, wired in by the caller (typically
    /// via `Rc<RefCell<Generator>>`, mirroring how `Payload` is shared).
    pub fn recv(&mut self, payload: SharedPayload, phase: Phase) {
        if let Some(txn) = self.pending.get_mut(&phase.txn_id) {
            txn.payload = payload;
            txn.phase = phase;
            Self::dispatch(txn);
        } else {
            warn!("no pending transaction for txn_id={}, dropping upstream beat", phase.txn_id);
        }
    }

    fn dispatch(txn: &mut GeneratorTransaction) {
        while let Some(action) = txn.actions.pop_front() {
            let waits = action.waits();
            match action {
                Action::Plain { mut cb, .. } => cb(txn),
                Action::Expectation { name, mut cb } => match cb(txn) {
                    Outcome::Pass => info!("expectation '{}' passed for txn_id={}", name, txn.phase.txn_id),
                    Outcome::Fail(msg) => {
                        warn!("expectation '{}' failed for txn_id={}: {}", name, txn.phase.txn_id, msg);
                        txn.passed = false;
                    }
                },
                Action::Assertion { name, mut cb } => match cb(txn) {
                    Outcome::Pass => info!("assertion '{}' passed for txn_id={}", name, txn.phase.txn_id),
                    Outcome::Fail(msg) => {
                        panic!("assertion '{}' failed for txn_id={}: {}", name, txn.phase.txn_id, msg)
                    }
                },
            }
            if waits {
                break;
            }
        }
    }

    /// Whether every scheduled injection has fired. Does not consider
    /// `pending`: a transaction can sit there forever if the downstream
    /// side never replies; there is no timeout.
    pub fn is_idle(&self) -> bool {
        self.scheduled.is_empty()
    }

    /// A transaction with `passed == false` or a
    /// non-empty action queue is a suite failure. Returns the failing
    /// transactions' names for reporting.
    pub fn teardown(&self) -> Vec<String> {
        self.pending
            .values()
            .filter(|t| !t.passed || !t.actions.is_empty())
            .map(|t| t.to_string())
            .collect()
    }
}

impl Default for Generator {
    fn default() -> Self {
        Generator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, Size};
    use crate::phase::Channel;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn waiting_action_breaks_the_dispatch_loop() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let payload = Payload::new(0x1000, Size::B64, 64);
        let phase = Phase::new(Channel::Req, 1);
        let o1 = order.clone();
        let o2 = order.clone();
        let o3 = order.clone();
        let txn = GeneratorTransaction::new("t", payload, phase)
            .then(Action::plain("a", move |_| o1.borrow_mut().push("a")))
            .then(Action::wait("b", move |_| o2.borrow_mut().push("b")))
            .then(Action::plain("c", move |_| o3.borrow_mut().push("c")));

        let mut gen = Generator::new();
        gen.pending.insert(1, txn);
        let txn = gen.pending.get_mut(&1).unwrap();
        Generator::dispatch(txn);

        assert_eq!(*order.borrow(), vec!["a", "b"]);
        assert_eq!(gen.pending.get(&1).unwrap().actions.len(), 1);
    }

    #[test]
    fn expectation_failure_marks_transaction_failed_but_continues() {
        let payload = Payload::new(0x1000, Size::B64, 64);
        let phase = Phase::new(Channel::Req, 2);
        let txn = GeneratorTransaction::new("t", payload, phase)
            .then(Action::expect("always fails", |_| Outcome::Fail("nope".into())))
            .then(Action::plain("after", |t| t.passed = t.passed && true));

        let mut gen = Generator::new();
        gen.pending.insert(2, txn);
        let txn = gen.pending.get_mut(&2).unwrap();
        Generator::dispatch(txn);

        assert!(!txn.passed);
        assert!(txn.actions.is_empty());
    }

    #[test]
    #[should_panic(expected = "assertion 'must hold' failed")]
    fn assertion_failure_aborts_the_suite() {
        let payload = Payload::new(0x1000, Size::B64, 64);
        let phase = Phase::new(Channel::Req, 3);
        let txn = GeneratorTransaction::new("t", payload, phase)
            .then(Action::assert("must hold", |_| Outcome::Fail("boom".into())));
        let mut gen = Generator::new();
        gen.pending.insert(3, txn);
        let txn = gen.pending.get_mut(&3).unwrap();
        Generator::dispatch(txn);
    }

    #[test]
    fn teardown_reports_unterminated_transactions() {
        let payload = Payload::new(0x1000, Size::B64, 64);
        let phase = Phase::new(Channel::Req, 4);
        let txn = GeneratorTransaction::new("stuck", payload, phase)
            .then(Action::plain("never runs twice", |_| {}));
        let mut gen = Generator::new();
        gen.pending.insert(4, txn);
        // one action was never dispatched, so the queue is non-empty
        assert_eq!(gen.teardown().len(), 1);
    }
}
