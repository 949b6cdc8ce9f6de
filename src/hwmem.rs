mod sys;

use {
    crate::utils::{
        errorfmt::ErrorFmt,
        mmap::{Mmapped, mmap_shared},
        oserror::OsError,
    },
    std::{
        fmt::{Debug, Display, Formatter},
        ptr::NonNull,
        rc::Rc,
    },
    thiserror::Error,
    uapi::{OwnedFd, c},
};

#[derive(Debug, Error)]
pub enum HwmemError {
    #[error("Could not open {0}")]
    Open(String, #[source] OsError),
    #[error("Could not allocate {0} bytes")]
    Alloc(usize, #[source] OsError),
    #[error("The device returned a null handle for an allocation of {0} bytes")]
    NullHandle(usize),
    #[error("Could not export buffer {0}")]
    Export(BufferHandle, #[source] OsError),
    #[error("The device returned a null global name for buffer {0}")]
    NullName(BufferHandle),
    #[error("Could not import global name {0}")]
    Import(GlobalName, #[source] OsError),
    #[error("Could not release buffer {0}")]
    Release(BufferHandle, #[source] OsError),
    #[error("Could not move buffer {0} into the {1:?} domain")]
    SetDomain(BufferHandle, Domain, #[source] OsError),
    #[error("Could not map buffer {0}")]
    Map(BufferHandle, #[source] OsError),
    #[error("Buffer size {0} is not addressable by the device")]
    TooLarge(usize),
    #[error("Buffers must not be empty")]
    Empty,
}

bitflags! {
    HwmemAccess: u32;
        HWMEM_ACCESS_READ = 1 << 0,
        HWMEM_ACCESS_WRITE = 1 << 1,
        HWMEM_ACCESS_IMPORT = 1 << 2,
}

bitflags! {
    HwmemAllocFlags: u32;
        HWMEM_ALLOC_HINT_WRITE_COMBINE = 1 << 0,
        HWMEM_ALLOC_HINT_NO_WRITE_COMBINE = 1 << 1,
        HWMEM_ALLOC_HINT_CACHED = 1 << 2,
        HWMEM_ALLOC_HINT_UNCACHED = 1 << 3,
}

pub const HWMEM_ACCESS_RWI: HwmemAccess =
    HwmemAccess(HWMEM_ACCESS_READ.0 | HWMEM_ACCESS_WRITE.0 | HWMEM_ACCESS_IMPORT.0);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemType {
    Scattered = 0,
    ContiguousSys = 1,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Domain {
    Cpu = 0,
    Sync = 1,
}

/// A byte range of a buffer that takes part in a domain transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DomainRegion {
    pub start: u32,
    pub end: u32,
    pub size: u32,
}

impl DomainRegion {
    pub fn whole(size: u32) -> Self {
        Self {
            start: 0,
            end: size,
            size,
        }
    }
}

/// A process-local handle of a buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BufferHandle(pub i32);

/// A name under which a buffer can be referenced by other processes and by
/// the blit engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GlobalName(pub i32);

impl Display for BufferHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Display for GlobalName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

pub trait CpuMapping {
    fn ptr(&self) -> NonNull<u8>;
    fn len(&self) -> usize;
}

impl CpuMapping for Mmapped {
    fn ptr(&self) -> NonNull<u8> {
        Mmapped::ptr(self)
    }

    fn len(&self) -> usize {
        Mmapped::len(self)
    }
}

pub trait BufferDevice {
    fn alloc(
        &self,
        size: u32,
        flags: HwmemAllocFlags,
        access: HwmemAccess,
        mem_type: MemType,
    ) -> Result<BufferHandle, HwmemError>;
    fn import(&self, name: GlobalName) -> Result<BufferHandle, HwmemError>;
    fn export(&self, handle: BufferHandle) -> Result<GlobalName, HwmemError>;
    fn release(&self, handle: BufferHandle) -> Result<(), HwmemError>;
    fn set_domain(
        &self,
        handle: BufferHandle,
        domain: Domain,
        access: HwmemAccess,
        region: DomainRegion,
    ) -> Result<(), HwmemError>;
    fn map(&self, handle: BufferHandle, size: usize) -> Result<Box<dyn CpuMapping>, HwmemError>;
}

/// The hwmem character device.
pub struct Hwmem {
    fd: OwnedFd,
}

impl Hwmem {
    pub fn open(path: &str) -> Result<Rc<Self>, HwmemError> {
        match uapi::open(path, c::O_RDWR | c::O_CLOEXEC, 0) {
            Ok(fd) => Ok(Rc::new(Self { fd })),
            Err(e) => Err(HwmemError::Open(path.to_string(), e.into())),
        }
    }
}

impl BufferDevice for Hwmem {
    fn alloc(
        &self,
        size: u32,
        flags: HwmemAllocFlags,
        access: HwmemAccess,
        mem_type: MemType,
    ) -> Result<BufferHandle, HwmemError> {
        let res = sys::alloc(
            self.fd.raw(),
            size,
            flags.raw(),
            access.raw(),
            mem_type as u32,
        );
        match res {
            Ok(0) => Err(HwmemError::NullHandle(size as usize)),
            Ok(h) => Ok(BufferHandle(h)),
            Err(e) => Err(HwmemError::Alloc(size as usize, e)),
        }
    }

    fn import(&self, name: GlobalName) -> Result<BufferHandle, HwmemError> {
        match sys::import(self.fd.raw(), name.0) {
            Ok(h) => Ok(BufferHandle(h)),
            Err(e) => Err(HwmemError::Import(name, e)),
        }
    }

    fn export(&self, handle: BufferHandle) -> Result<GlobalName, HwmemError> {
        match sys::export(self.fd.raw(), handle.0) {
            Ok(0) => Err(HwmemError::NullName(handle)),
            Ok(n) => Ok(GlobalName(n)),
            Err(e) => Err(HwmemError::Export(handle, e)),
        }
    }

    fn release(&self, handle: BufferHandle) -> Result<(), HwmemError> {
        sys::release(self.fd.raw(), handle.0).map_err(|e| HwmemError::Release(handle, e))
    }

    fn set_domain(
        &self,
        handle: BufferHandle,
        domain: Domain,
        access: HwmemAccess,
        region: DomainRegion,
    ) -> Result<(), HwmemError> {
        sys::set_domain(
            self.fd.raw(),
            handle.0,
            domain as u32,
            access.raw(),
            region.start,
            region.end,
            region.size,
        )
        .map_err(|e| HwmemError::SetDomain(handle, domain, e))
    }

    fn map(&self, handle: BufferHandle, size: usize) -> Result<Box<dyn CpuMapping>, HwmemError> {
        match mmap_shared(self.fd.raw(), size, handle.0 as c::off_t) {
            Ok(m) => Ok(Box::new(m)),
            Err(e) => Err(HwmemError::Map(handle, e)),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferOrigin {
    Allocated,
    Imported,
}

/// One physical allocation known to the device.
///
/// The CPU mapping is created on the first call to
/// [`MemoryManager::prepare_cpu_access`] and lives until the buffer is
/// released.
pub struct MemoryBuffer {
    handle: BufferHandle,
    name: GlobalName,
    size: usize,
    origin: BufferOrigin,
    mapping: Option<Box<dyn CpuMapping>>,
    domain: Option<Domain>,
}

impl Debug for MemoryBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBuffer")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("origin", &self.origin)
            .field("mapped", &self.mapping.is_some())
            .field("domain", &self.domain)
            .finish()
    }
}

impl MemoryBuffer {
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn name(&self) -> GlobalName {
        self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn origin(&self) -> BufferOrigin {
        self.origin
    }

    pub fn is_mapped(&self) -> bool {
        self.mapping.is_some()
    }

    pub fn domain(&self) -> Option<Domain> {
        self.domain
    }
}

/// Outcome of [`MemoryManager::resize`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Resize {
    Unchanged,
    Released,
}

pub struct MemoryManager {
    dev: Rc<dyn BufferDevice>,
}

impl MemoryManager {
    pub fn new(dev: Rc<dyn BufferDevice>) -> Self {
        Self { dev }
    }

    /// Resolves a buffer owned by somebody else. `size` is the number of
    /// bytes the caller is going to access.
    pub fn import(&self, name: GlobalName, size: usize) -> Result<MemoryBuffer, HwmemError> {
        let handle = self.dev.import(name)?;
        log::debug!("Imported global name {} as buffer {}", name, handle);
        Ok(MemoryBuffer {
            handle,
            name,
            size,
            origin: BufferOrigin::Imported,
            mapping: None,
            domain: None,
        })
    }

    pub fn allocate(&self, size: usize, cacheable: bool) -> Result<MemoryBuffer, HwmemError> {
        if size == 0 {
            return Err(HwmemError::Empty);
        }
        let Ok(dev_size) = u32::try_from(size) else {
            return Err(HwmemError::TooLarge(size));
        };
        let flags = match cacheable {
            true => HWMEM_ALLOC_HINT_CACHED,
            false => HWMEM_ALLOC_HINT_UNCACHED,
        };
        let handle = self
            .dev
            .alloc(dev_size, flags, HWMEM_ACCESS_RWI, MemType::ContiguousSys)?;
        let name = match self.dev.export(handle) {
            Ok(n) => n,
            Err(e) => {
                if let Err(e) = self.dev.release(handle) {
                    log::error!("Could not release an unexported buffer: {}", ErrorFmt(e));
                }
                return Err(e);
            }
        };
        log::debug!(
            "Allocated buffer {} ({} bytes) with global name {}",
            handle,
            size,
            name
        );
        Ok(MemoryBuffer {
            handle,
            name,
            size,
            origin: BufferOrigin::Allocated,
            mapping: None,
            domain: None,
        })
    }

    /// Whether [`Self::resize`] would release the bound buffer.
    pub fn resize_releases(binding: &Option<MemoryBuffer>, size: usize) -> bool {
        match binding {
            Some(b) => b.size != size && b.size != 0,
            None => false,
        }
    }

    /// Adjusts the binding to a new size.
    ///
    /// A bound buffer of a different size is released and the binding
    /// cleared. Nothing is ever allocated here; the next operation that
    /// needs the buffer allocates it.
    pub fn resize(&self, binding: &mut Option<MemoryBuffer>, size: usize) -> Resize {
        if !Self::resize_releases(binding, size) {
            return Resize::Unchanged;
        }
        if let Some(buffer) = binding.take() {
            log::debug!(
                "Releasing buffer {} to resize it from {} to {} bytes",
                buffer.handle,
                buffer.size,
                size
            );
            if let Err(e) = self.release(buffer) {
                log::error!("Could not release a buffer: {}", ErrorFmt(e));
            }
        }
        Resize::Released
    }

    /// Moves the buffer into the CPU domain and returns its mapping.
    pub fn prepare_cpu_access(&self, buffer: &mut MemoryBuffer) -> Result<NonNull<u8>, HwmemError> {
        let region = DomainRegion::whole(buffer.size as u32);
        match self
            .dev
            .set_domain(buffer.handle, Domain::Cpu, HWMEM_ACCESS_RWI, region)
        {
            Ok(()) => buffer.domain = Some(Domain::Cpu),
            Err(e) => {
                buffer.domain = None;
                log::warn!("{}", ErrorFmt(e));
            }
        }
        if let Some(m) = &buffer.mapping {
            return Ok(m.ptr());
        }
        let mapping = self.dev.map(buffer.handle, buffer.size)?;
        let ptr = mapping.ptr();
        buffer.mapping = Some(mapping);
        Ok(ptr)
    }

    pub fn release(&self, mut buffer: MemoryBuffer) -> Result<(), HwmemError> {
        buffer.mapping.take();
        log::debug!("Releasing buffer {}", buffer.handle);
        self.dev.release(buffer.handle)
    }
}
