use {
    std::{
        error::Error,
        fmt::{Display, Formatter},
        io,
    },
    uapi::{Errno, c},
};

/// An errno value returned by the kernel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OsError(pub c::c_int);

impl OsError {
    /// Whether the error signals a condition that goes away if the request
    /// is retried.
    pub fn is_transient(&self) -> bool {
        matches!(self.0, c::EAGAIN | c::EINTR | c::EBUSY)
    }
}

impl From<Errno> for OsError {
    fn from(e: Errno) -> Self {
        Self(e.0)
    }
}

impl From<c::c_int> for OsError {
    fn from(v: c::c_int) -> Self {
        Self(v)
    }
}

impl From<io::Error> for OsError {
    fn from(v: io::Error) -> Self {
        Self(v.raw_os_error().unwrap_or(c::EINVAL))
    }
}

impl Default for OsError {
    fn default() -> Self {
        Errno::default().into()
    }
}

impl Error for OsError {}

impl Display for OsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&io::Error::from_raw_os_error(self.0), f)
    }
}
