#![allow(non_camel_case_types)]

use {
    crate::utils::{
        ioctl::{ioctl, ioctl_arg},
        oserror::OsError,
    },
    uapi::c,
};

const HWMEM_IOC_MAGIC: u64 = 0xd9;

#[repr(C)]
struct hwmem_alloc_request {
    size: u32,
    flags: u32,
    default_access: u32,
    mem_type: u32,
}

#[repr(C)]
struct hwmem_region {
    offset: u32,
    count: u32,
    start: u32,
    end: u32,
    size: u32,
}

#[repr(C)]
struct hwmem_set_domain_request {
    id: i32,
    domain: u32,
    access: u32,
    region: hwmem_region,
}

const HWMEM_ALLOC_IOC: u64 = uapi::_IOW::<hwmem_alloc_request>(HWMEM_IOC_MAGIC, 1);
const HWMEM_RELEASE_IOC: u64 = uapi::_IO(HWMEM_IOC_MAGIC, 3);
const HWMEM_SET_DOMAIN_IOC: u64 = uapi::_IOW::<hwmem_set_domain_request>(HWMEM_IOC_MAGIC, 4);
const HWMEM_EXPORT_IOC: u64 = uapi::_IO(HWMEM_IOC_MAGIC, 10);
const HWMEM_IMPORT_IOC: u64 = uapi::_IO(HWMEM_IOC_MAGIC, 11);

pub fn alloc(
    fd: c::c_int,
    size: u32,
    flags: u32,
    default_access: u32,
    mem_type: u32,
) -> Result<c::c_int, OsError> {
    let mut req = hwmem_alloc_request {
        size,
        flags,
        default_access,
        mem_type,
    };
    unsafe { ioctl(fd, HWMEM_ALLOC_IOC, &mut req) }
}

pub fn release(fd: c::c_int, handle: c::c_int) -> Result<(), OsError> {
    ioctl_arg(fd, HWMEM_RELEASE_IOC, handle as c::c_ulong).map(drop)
}

pub fn set_domain(
    fd: c::c_int,
    handle: c::c_int,
    domain: u32,
    access: u32,
    start: u32,
    end: u32,
    size: u32,
) -> Result<(), OsError> {
    let mut req = hwmem_set_domain_request {
        id: handle,
        domain,
        access,
        region: hwmem_region {
            offset: 0,
            count: 1,
            start,
            end,
            size,
        },
    };
    unsafe { ioctl(fd, HWMEM_SET_DOMAIN_IOC, &mut req).map(drop) }
}

pub fn export(fd: c::c_int, handle: c::c_int) -> Result<c::c_int, OsError> {
    ioctl_arg(fd, HWMEM_EXPORT_IOC, handle as c::c_ulong)
}

pub fn import(fd: c::c_int, name: c::c_int) -> Result<c::c_int, OsError> {
    ioctl_arg(fd, HWMEM_IMPORT_IOC, name as c::c_ulong)
}
