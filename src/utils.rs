pub mod compat;
pub mod errorfmt;
pub mod ioctl;
pub mod mmap;
pub mod numcell;
pub mod oserror;
