use {
    crate::utils::oserror::OsError,
    std::ptr::{self, NonNull},
    uapi::c,
};

/// A shared read/write mapping of a device file. Unmapped on drop.
pub struct Mmapped {
    ptr: NonNull<u8>,
    len: usize,
}

pub fn mmap_shared(fd: c::c_int, len: usize, offset: c::off_t) -> Result<Mmapped, OsError> {
    let res = unsafe {
        c::mmap(
            ptr::null_mut(),
            len,
            c::PROT_READ | c::PROT_WRITE,
            c::MAP_SHARED,
            fd,
            offset,
        )
    };
    if res == c::MAP_FAILED {
        return Err(OsError::default());
    }
    match NonNull::new(res.cast::<u8>()) {
        Some(ptr) => Ok(Mmapped { ptr, len }),
        None => Err(OsError(c::EFAULT)),
    }
}

impl Mmapped {
    pub fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for Mmapped {
    fn drop(&mut self) {
        let res = unsafe { c::munmap(self.ptr.as_ptr().cast(), self.len) };
        if res != 0 {
            log::error!("Could not unmap {} bytes: {}", self.len, OsError::default());
        }
    }
}
