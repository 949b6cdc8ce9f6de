use {
    crate::{
        blit::BltRequest,
        blt::{BltEngine, BltError},
        it::test_events::{Event, EventLog},
        utils::oserror::OsError,
    },
    std::{
        cell::{Cell, RefCell},
        rc::Rc,
    },
    uapi::c,
};

/// An engine that records requests instead of executing them.
pub struct TestBltEngine {
    events: Rc<EventLog>,
    next_id: Cell<u32>,
    requests: RefCell<Vec<BltRequest>>,
    /// The number of upcoming requests that are rejected as busy.
    pub busy: Cell<u32>,
    pub always_busy: Cell<bool>,
    pub fail: Cell<bool>,
}

impl TestBltEngine {
    pub fn new(events: &Rc<EventLog>) -> Rc<Self> {
        Rc::new(Self {
            events: events.clone(),
            next_id: Cell::new(1),
            requests: Default::default(),
            busy: Cell::new(0),
            always_busy: Cell::new(false),
            fail: Cell::new(false),
        })
    }

    pub fn requests(&self) -> Vec<BltRequest> {
        self.requests.borrow().clone()
    }

    pub fn last_request(&self) -> Option<BltRequest> {
        self.requests.borrow().last().cloned()
    }
}

impl BltEngine for TestBltEngine {
    fn request(&self, req: &BltRequest) -> Result<u32, BltError> {
        if self.always_busy.get() || self.busy.get() > 0 {
            self.busy.set(self.busy.get().saturating_sub(1));
            self.events.push(Event::Busy);
            return Err(BltError::Busy(OsError(c::EBUSY)));
        }
        if self.fail.get() {
            return Err(BltError::Request(OsError(c::EINVAL)));
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.requests.borrow_mut().push(req.clone());
        self.events.push(Event::Request {
            id,
            names: req.referenced_names().to_vec(),
        });
        Ok(id)
    }

    fn synch(&self, _marker: u32) -> Result<(), BltError> {
        self.events.push(Event::Synch);
        Ok(())
    }
}
