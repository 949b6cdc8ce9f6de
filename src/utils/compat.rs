use {cfg_if::cfg_if, uapi::c};

cfg_if! {
    if #[cfg(target_env = "musl")] {
        pub type IoctlNumber = c::c_int;
    } else {
        pub type IoctlNumber = c::c_ulong;
    }
}

/// The request number as expected by the libc `ioctl` prototype.
pub const fn ioctl_number(request: u64) -> IoctlNumber {
    request as IoctlNumber
}
