use {
    crate::{
        hwmem::{BufferHandle, GlobalName},
        it::test_error::{TestError, TestResult},
    },
    ahash::{AHashMap, AHashSet},
    hwblit_algorithms::rect::Rect,
    std::cell::RefCell,
};

/// Something a mock device observed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Alloc { handle: BufferHandle, size: u32 },
    Export { handle: BufferHandle, name: GlobalName },
    Import { name: GlobalName, handle: BufferHandle },
    Release { handle: BufferHandle },
    SetDomain { handle: BufferHandle },
    Map { handle: BufferHandle },
    Request { id: u32, names: Vec<GlobalName> },
    Busy,
    Synch,
    ResetScanOffset,
    Damage(Vec<Rect>),
}

/// The events of all mocks of a test run in the order they happened.
#[derive(Default)]
pub struct EventLog {
    events: RefCell<Vec<Event>>,
}

impl EventLog {
    pub fn push(&self, event: Event) {
        log::trace!("{:?}", event);
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn count(&self, f: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| f(e)).count()
    }

    pub fn allocs(&self) -> usize {
        self.count(|e| matches!(e, Event::Alloc { .. }))
    }

    pub fn releases(&self) -> usize {
        self.count(|e| matches!(e, Event::Release { .. }))
    }

    pub fn requests(&self) -> usize {
        self.count(|e| matches!(e, Event::Request { .. }))
    }

    pub fn synchs(&self) -> usize {
        self.count(|e| matches!(e, Event::Synch))
    }

    /// Fails if a buffer was released while a request that references it
    /// had not been waited for.
    pub fn check_drain_before_release(&self) -> TestResult {
        let mut globals = AHashMap::new();
        let mut in_flight = AHashSet::new();
        for (idx, event) in self.events.borrow().iter().enumerate() {
            match event {
                Event::Export { handle, name } | Event::Import { name, handle } => {
                    globals.insert(*handle, *name);
                }
                Event::Request { names, .. } => in_flight.extend(names.iter().copied()),
                Event::Synch => in_flight.clear(),
                Event::Release { handle } => {
                    if let Some(name) = globals.remove(handle) {
                        if in_flight.contains(&name) {
                            return Err(TestError::new(format!(
                                "Event {}: buffer {} (global name {}) was released while in flight",
                                idx, handle, name
                            )));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}
