
use {
    crate::{
        blit::BltRequest,
        blt::{BltEngine, BltError},
        hwmem::GlobalName,
    },
    ahash::AHashSet,
    std::{
        cell::{Cell, RefCell},
        rc::Rc,
        time::{Duration, Instant},
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("The blit engine stayed busy for {attempts} attempts ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },
    #[error(transparent)]
    Engine(#[from] BltError),
}

/// Bounds on how long a request is retried while the engine is busy.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub limit: u32,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            limit: 1000,
            timeout: Duration::from_millis(100),
        }
    }
}

/// The only path through which requests reach the engine.
///
/// The gate remembers which buffers are referenced by requests that have
/// not been drained yet.
pub struct BlitGate {
    engine: Rc<dyn BltEngine>,
    policy: Cell<RetryPolicy>,
    in_flight: RefCell<AHashSet<GlobalName>>,
    pending: Cell<bool>,
}

impl BlitGate {
    pub fn new(engine: Rc<dyn BltEngine>, policy: RetryPolicy) -> Self {
        Self {
            engine,
            policy: Cell::new(policy),
            in_flight: Default::default(),
            pending: Cell::new(false),
        }
    }

    pub fn set_policy(&self, policy: RetryPolicy) {
        self.policy.set(policy);
    }

    pub fn submit(&self, req: &BltRequest) -> Result<u32, GateError> {
        let policy = self.policy.get();
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.engine.request(req) {
                Ok(id) => {
                    self.in_flight
                        .borrow_mut()
                        .extend(req.referenced_names());
                    self.pending.set(true);
                    return Ok(id);
                }
                Err(e) if e.is_busy() => {
                    let elapsed = start.elapsed();
                    if attempts >= policy.limit || elapsed >= policy.timeout {
                        return Err(GateError::Timeout { attempts, elapsed });
                    }
                    log::trace!("Blit engine busy, retrying (attempt {})", attempts);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Waits for all submitted requests.
    pub fn drain(&self) -> Result<(), GateError> {
        if !self.pending.get() {
            return Ok(());
        }
        let res = self.engine.synch(0);
        self.pending.set(false);
        self.in_flight.borrow_mut().clear();
        res.map_err(GateError::Engine)
    }

    /// Markers never outlive a drain, so there is nothing to wait for.
    pub fn wait_marker(&self, _marker: i32) {}

    pub fn is_in_flight(&self, name: GlobalName) -> bool {
        self.in_flight.borrow().contains(&name)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.get()
    }
}
