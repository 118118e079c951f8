//! Listener lists that tolerate mutation while they are being notified
//!
//! Notification takes the entries out of the list, so a callback may add or
//! remove listeners (or poke the simulation that owns the list) without
//! tripping over a live borrow. Removals requested mid-notification are
//! queued and applied when the entries are put back. An event raised from
//! inside a listener is queued too, and delivered once the current pass is
//! over.

use std::cell::RefCell;
use std::collections::VecDeque;

/// Handle returned when a listener is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Box<dyn FnMut(&E)>;

struct Inner<E> {
    entries: Vec<(ListenerId, Callback<E>)>,
    pending_removals: Vec<ListenerId>,
    queued: VecDeque<E>,
    notifying: bool,
    next_id: u64,
}

pub(crate) struct Listeners<E> {
    inner: RefCell<Inner<E>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            inner: RefCell::new(Inner {
                entries: Vec::new(),
                pending_removals: Vec::new(),
                queued: VecDeque::new(),
                notifying: false,
                next_id: 0,
            }),
        }
    }
}

impl<E> Listeners<E> {
    pub fn add(&self, listener: impl FnMut(&E) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, Box::new(listener)));
        id
    }

    pub fn remove(&self, id: ListenerId) {
        let mut inner = self.inner.borrow_mut();
        if inner.notifying {
            inner.pending_removals.push(id);
        }
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Deliver `event` to every listener registered when its pass begins.
    pub fn notify(&self, event: E) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.notifying {
                // The outer pass owns the entries; it delivers this one next
                inner.queued.push_back(event);
                return;
            }
            inner.notifying = true;
        }

        let mut next = Some(event);
        while let Some(event) = next {
            let mut taken = std::mem::take(&mut self.inner.borrow_mut().entries);

            for (id, listener) in taken.iter_mut() {
                let removed = self.inner.borrow().pending_removals.contains(id);
                if !removed {
                    listener(&event);
                }
            }

            let mut inner = self.inner.borrow_mut();
            let added = std::mem::take(&mut inner.entries);
            taken.extend(added);
            let removals = std::mem::take(&mut inner.pending_removals);
            taken.retain(|(id, _)| !removals.contains(id));
            inner.entries = taken;
            next = inner.queued.pop_front();
        }

        self.inner.borrow_mut().notifying = false;
    }
}
