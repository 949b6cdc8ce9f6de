use {
    crate::utils::{compat::ioctl_number, oserror::OsError},
    uapi::c,
};

/// Performs an ioctl whose argument is a pointer to `t`. Interrupted calls
/// are restarted.
pub unsafe fn ioctl<T>(fd: c::c_int, request: u64, t: &mut T) -> Result<c::c_int, OsError> {
    loop {
        let ret = unsafe { c::ioctl(fd, ioctl_number(request), &mut *t) };
        if ret != -1 {
            return Ok(ret);
        }
        let err = uapi::get_errno();
        if err != c::EINTR {
            return Err(OsError(err));
        }
    }
}

/// Performs an ioctl whose argument is passed by value.
pub fn ioctl_arg(fd: c::c_int, request: u64, arg: c::c_ulong) -> Result<c::c_int, OsError> {
    loop {
        let ret = unsafe { c::ioctl(fd, ioctl_number(request), arg) };
        if ret != -1 {
            return Ok(ret);
        }
        let err = uapi::get_errno();
        if err != c::EINTR {
            return Err(OsError(err));
        }
    }
}
