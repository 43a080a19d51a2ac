//! Manages page locks with wound-wait deadlock avoidance.
//!
//! One mutex guards all lock state; each active page carries a condition
//! variable on that mutex for its waiters. Requests are granted in FIFO
//! order per page, except that wound-wait aborts younger conflicting
//! transactions and a sole holder may upgrade ahead of the queue. A younger
//! transaction therefore never makes an older one wait, so the wait-for
//! graph cannot contain a cycle.

use crate::error::{Error, Result};
use crate::transaction::TransactionId;
use crate::PageId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

/// Represents the two modes of locking a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReqState {
    WaitingShared,
    WaitingExclusive,
    Granted,
    Aborted,
}

/// Lock state for one page: who holds it, in which mode, and who waits.
#[derive(Default)]
struct PageLocks {
    holders: HashSet<TransactionId>,
    // Meaningful only while holders is non-empty.
    exclusive: bool,
    // FIFO queue of waiting transactions. Never contains a duplicate tid or
    // an aborted request.
    queue: VecDeque<TransactionId>,
    cond: Arc<Condvar>,
}

impl PageLocks {
    fn is_idle(&self) -> bool {
        self.holders.is_empty() && self.queue.is_empty()
    }
}

/// Per-transaction bookkeeping.
#[derive(Default)]
struct TxnLocks {
    should_abort: bool,
    // The at-most-one outstanding request, with the page it names.
    pending: Option<(PageId, ReqState)>,
    held: HashSet<PageId>,
}

#[derive(Default)]
struct LockTables {
    pages: HashMap<PageId, PageLocks>,
    txns: HashMap<TransactionId, TxnLocks>,
}

/// The lock manager. Shared/exclusive page locks, granted FIFO per page,
/// with wound-wait: an older transaction aborts any younger one that holds
/// or awaits a conflicting lock instead of waiting behind it.
#[derive(Default)]
pub struct LockManager {
    tables: Mutex<LockTables>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires (or upgrades to) the given lock, blocking until it is
    /// granted. Fails with [`Error::TransactionAborted`] when the
    /// transaction has been wounded, either before the call or while
    /// waiting.
    pub fn lock(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();

        {
            let txn = tables.txns.entry(tid).or_default();
            assert!(
                txn.pending.is_none(),
                "{tid} already has an outstanding lock request"
            );
            if txn.should_abort {
                return Err(Error::TransactionAborted);
            }
        }

        let (is_holder, holder_victims, waiter_candidates) = {
            let page = tables.pages.entry(pid).or_default();
            let is_holder = page.holders.contains(&tid);
            if is_holder && (page.exclusive || mode == LockMode::Shared) {
                // The held mode already satisfies the request.
                return Ok(());
            }
            let conflicts_with_holders = page.exclusive || mode == LockMode::Exclusive;
            let holder_victims: Vec<TransactionId> = page
                .holders
                .iter()
                .copied()
                .filter(|h| *h > tid && conflicts_with_holders)
                .collect();
            let waiter_candidates: Vec<TransactionId> =
                page.queue.iter().copied().filter(|q| *q > tid).collect();
            (is_holder, holder_victims, waiter_candidates)
        };

        // Wound step: abort every younger holder and waiter this request
        // conflicts with.
        for victim in holder_victims {
            wound(&mut tables, victim);
        }
        for victim in waiter_candidates {
            let wants_exclusive = matches!(
                tables.txns.get(&victim).and_then(|t| t.pending),
                Some((p, ReqState::WaitingExclusive)) if p == pid
            );
            if wants_exclusive || mode == LockMode::Exclusive {
                wound(&mut tables, victim);
            }
        }

        if is_holder {
            // Upgrade. Anything still queued after a progress pass would be
            // an older writer, which would have wounded this request above.
            make_progress(&mut tables, pid);
            let page = tables.pages.get(&pid).expect("page entry vanished");
            assert!(
                page.queue.is_empty(),
                "upgrade by {tid} with a non-empty request queue"
            );
        }

        let state = match mode {
            LockMode::Shared => ReqState::WaitingShared,
            LockMode::Exclusive => ReqState::WaitingExclusive,
        };
        tables
            .pages
            .get_mut(&pid)
            .expect("page entry vanished")
            .queue
            .push_back(tid);
        tables.txns.get_mut(&tid).expect("txn entry vanished").pending = Some((pid, state));

        loop {
            make_progress(&mut tables, pid);
            let outcome = tables.txns.get(&tid).expect("txn entry vanished").pending;
            match outcome {
                Some((p, ReqState::Granted)) => {
                    debug_assert_eq!(p, pid);
                    tables.txns.get_mut(&tid).unwrap().pending = None;
                    return Ok(());
                }
                Some((_, ReqState::Aborted)) => {
                    tables.txns.get_mut(&tid).unwrap().pending = None;
                    return Err(Error::TransactionAborted);
                }
                Some(_) => {
                    let cond = tables
                        .pages
                        .get(&pid)
                        .expect("page entry vanished")
                        .cond
                        .clone();
                    tables = cond.wait(tables).unwrap();
                }
                None => unreachable!("pending request vanished for {tid}"),
            }
        }
    }

    /// Releases one page lock. Unlocking a page the transaction does not
    /// hold is a programmer error.
    pub fn unlock(&self, tid: TransactionId, pid: PageId) {
        let mut tables = self.tables.lock().unwrap();
        let txn = tables
            .txns
            .get_mut(&tid)
            .unwrap_or_else(|| panic!("unlock by unknown transaction {tid}"));
        assert!(txn.held.remove(&pid), "{tid} does not hold {pid:?}");
        unlock_one(&mut tables, tid, pid);
    }

    /// Releases every lock the transaction holds and retires its state.
    /// Must only be called when the transaction has no outstanding request,
    /// i.e. after its thread has returned from every `lock` call.
    pub fn unlock_all(&self, tid: TransactionId) {
        let mut tables = self.tables.lock().unwrap();
        let Some(txn) = tables.txns.remove(&tid) else {
            return;
        };
        assert!(
            txn.pending.is_none(),
            "unlock_all for {tid} with an outstanding lock request"
        );
        for pid in txn.held {
            unlock_one(&mut tables, tid, pid);
        }
    }

    /// Whether the transaction currently holds any lock on the page.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.tables
            .lock()
            .unwrap()
            .pages
            .get(&pid)
            .is_some_and(|p| p.holders.contains(&tid))
    }
}

/// Marks the victim for abort and, if it is parked in some queue, removes
/// the request and wakes the victim so it can observe the abort.
fn wound(tables: &mut LockTables, victim: TransactionId) {
    let txn = tables
        .txns
        .get_mut(&victim)
        .unwrap_or_else(|| panic!("wounded transaction {victim} has no state"));
    txn.should_abort = true;
    let Some((pid, state)) = txn.pending else {
        return;
    };
    if state != ReqState::WaitingShared && state != ReqState::WaitingExclusive {
        // Granted but not yet observed by its thread; it will abort on its
        // next lock call instead.
        return;
    }
    txn.pending = Some((pid, ReqState::Aborted));
    let page = tables
        .pages
        .get_mut(&pid)
        .expect("pending request names a page with no lock state");
    let before = page.queue.len();
    page.queue.retain(|&t| t != victim);
    assert_eq!(before, page.queue.len() + 1, "waiter missing from queue");
    page.cond.notify_all();
}

/// Pops the head of the page's queue while it can be granted: the page is
/// free, or it is shared and the head wants shared access, or the head is
/// the page's only holder (self-upgrade).
fn make_progress(tables: &mut LockTables, pid: PageId) {
    loop {
        let Some(page) = tables.pages.get(&pid) else {
            return;
        };
        let Some(&head) = page.queue.front() else {
            return;
        };
        let holders_empty = page.holders.is_empty();
        let exclusive = page.exclusive;
        let sole_self_holder = page.holders.len() == 1 && page.holders.contains(&head);

        let head_mode = match tables.txns.get(&head).and_then(|t| t.pending) {
            Some((p, ReqState::WaitingShared)) if p == pid => LockMode::Shared,
            Some((p, ReqState::WaitingExclusive)) if p == pid => LockMode::Exclusive,
            other => panic!("queued {head} has no matching pending request: {other:?}"),
        };

        let grantable = holders_empty
            || (!exclusive && head_mode == LockMode::Shared)
            || sole_self_holder;
        if !grantable {
            return;
        }

        let page = tables.pages.get_mut(&pid).unwrap();
        page.queue.pop_front();
        page.holders.insert(head);
        page.exclusive = head_mode == LockMode::Exclusive;
        page.cond.notify_all();

        let txn = tables.txns.get_mut(&head).unwrap();
        txn.pending = Some((pid, ReqState::Granted));
        txn.held.insert(pid);
    }
}

fn unlock_one(tables: &mut LockTables, tid: TransactionId, pid: PageId) {
    let page = tables
        .pages
        .get_mut(&pid)
        .unwrap_or_else(|| panic!("unlock of {pid:?} which has no lock state"));
    assert!(page.holders.remove(&tid), "{tid} is not a holder of {pid:?}");
    if !page.queue.is_empty() {
        page.cond.notify_all();
    }
    if page.is_idle() {
        tables.pages.remove(&pid);
    }
}
