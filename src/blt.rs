mod sys;

use {
    crate::{blit::BltRequest, utils::oserror::OsError},
    libloading::Library,
    thiserror::Error,
    uapi::c,
};

#[derive(Debug, Error)]
pub enum BltError {
    #[error("Could not load {0}")]
    Load(String, #[source] libloading::Error),
    #[error("{0} does not export {1}")]
    MissingSymbol(String, &'static str, #[source] libloading::Error),
    #[error("Could not open the blit engine")]
    Open(#[source] OsError),
    #[error("The blit engine is busy")]
    Busy(#[source] OsError),
    #[error("The blit engine rejected the request")]
    Request(#[source] OsError),
    #[error("Could not wait for the blit engine")]
    Synch(#[source] OsError),
}

impl BltError {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}

/// An asynchronous 2D blit engine.
pub trait BltEngine {
    /// Queues a request. Returns the id of the job.
    ///
    /// Transient conditions that go away when the request is repeated are
    /// reported as [`BltError::Busy`].
    fn request(&self, req: &BltRequest) -> Result<u32, BltError>;

    /// Blocks until the job `marker` and all jobs queued before it have
    /// completed. A marker of 0 waits for all jobs.
    fn synch(&self, marker: u32) -> Result<(), BltError>;
}

type BltOpen = unsafe extern "C" fn() -> c::c_int;
type BltClose = unsafe extern "C" fn(handle: c::c_int);
type BltRequestFn = unsafe extern "C" fn(handle: c::c_int, req: *mut sys::blt_req) -> c::c_int;
type BltSynch = unsafe extern "C" fn(handle: c::c_int, request_id: c::c_int) -> c::c_int;

/// The B2R2 engine accessed through `libblt_hw`.
pub struct LibBlt {
    handle: c::c_int,
    request: BltRequestFn,
    synch: BltSynch,
    close: BltClose,
    _lib: Library,
}

impl LibBlt {
    pub fn open(path: &str) -> Result<Self, BltError> {
        let lib = match unsafe { Library::new(path) } {
            Ok(l) => l,
            Err(e) => return Err(BltError::Load(path.to_string(), e)),
        };
        macro_rules! sym {
            ($name:literal, $ty:ty) => {
                match unsafe { lib.get::<$ty>(concat!($name, "\0").as_bytes()) } {
                    Ok(s) => *s,
                    Err(e) => return Err(BltError::MissingSymbol(path.to_string(), $name, e)),
                }
            };
        }
        let open = sym!("blt_open", BltOpen);
        let close = sym!("blt_close", BltClose);
        let request = sym!("blt_request", BltRequestFn);
        let synch = sym!("blt_synch", BltSynch);
        let handle = unsafe { open() };
        if handle < 0 {
            return Err(BltError::Open(OsError::default()));
        }
        log::info!("Opened blit engine from {}", path);
        Ok(Self {
            handle,
            request,
            synch,
            close,
            _lib: lib,
        })
    }
}

impl BltEngine for LibBlt {
    fn request(&self, req: &BltRequest) -> Result<u32, BltError> {
        let mut raw = sys::blt_req(req);
        let res = unsafe { (self.request)(self.handle, &mut raw) };
        if res >= 0 {
            return Ok(res as u32);
        }
        let err = OsError::default();
        match err.is_transient() {
            true => Err(BltError::Busy(err)),
            false => Err(BltError::Request(err)),
        }
    }

    fn synch(&self, marker: u32) -> Result<(), BltError> {
        let res = unsafe { (self.synch)(self.handle, marker as c::c_int) };
        if res < 0 {
            return Err(BltError::Synch(OsError::default()));
        }
        Ok(())
    }
}

impl Drop for LibBlt {
    fn drop(&mut self) {
        unsafe {
            (self.close)(self.handle);
        }
    }
}
