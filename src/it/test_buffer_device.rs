use {
    crate::{
        hwmem::{
            BufferDevice, BufferHandle, CpuMapping, Domain, DomainRegion, GlobalName, HwmemAccess,
            HwmemAllocFlags, HwmemError, MemType,
        },
        it::test_events::{Event, EventLog},
        utils::oserror::OsError,
    },
    ahash::AHashMap,
    std::{
        cell::{Cell, RefCell},
        ptr::NonNull,
        rc::Rc,
    },
    uapi::c,
};

/// Memory shared by all handles of one buffer.
struct TestMemory {
    bytes: Box<[Cell<u8>]>,
}

impl TestMemory {
    fn new(size: usize) -> Rc<Self> {
        Rc::new(Self {
            bytes: (0..size).map(|_| Cell::new(0)).collect(),
        })
    }

    fn ptr(&self) -> NonNull<u8> {
        NonNull::from(&*self.bytes).cast()
    }
}

struct TestMapping {
    memory: Rc<TestMemory>,
    len: usize,
}

impl CpuMapping for TestMapping {
    fn ptr(&self) -> NonNull<u8> {
        self.memory.ptr()
    }

    fn len(&self) -> usize {
        self.len
    }
}

pub struct BufferInfo {
    pub size: usize,
    pub flags: HwmemAllocFlags,
    pub access: HwmemAccess,
    pub mem_type: MemType,
    pub domain: Option<Domain>,
    memory: Rc<TestMemory>,
}

/// A buffer device backed by process memory.
#[derive(Default)]
pub struct TestBufferDevice {
    events: Rc<EventLog>,
    next_handle: Cell<i32>,
    next_name: Cell<i32>,
    buffers: RefCell<AHashMap<BufferHandle, BufferInfo>>,
    globals: RefCell<AHashMap<GlobalName, Rc<TestMemory>>>,
    pub fail_alloc: Cell<bool>,
    pub fail_export: Cell<bool>,
    pub fail_set_domain: Cell<bool>,
}

impl TestBufferDevice {
    pub fn new(events: &Rc<EventLog>) -> Rc<Self> {
        Rc::new(Self {
            events: events.clone(),
            next_handle: Cell::new(1),
            next_name: Cell::new(100),
            ..Default::default()
        })
    }

    fn next_name(&self) -> GlobalName {
        let name = self.next_name.get();
        self.next_name.set(name + 1);
        GlobalName(name)
    }

    /// Registers memory owned by another process, e.g. the scanout buffer.
    pub fn add_external(&self, size: usize) -> (GlobalName, NonNull<u8>) {
        let memory = TestMemory::new(size);
        let name = self.next_name();
        let ptr = memory.ptr();
        self.globals.borrow_mut().insert(name, memory);
        (name, ptr)
    }

    pub fn live_handles(&self) -> Vec<BufferHandle> {
        let mut handles: Vec<_> = self.buffers.borrow().keys().copied().collect();
        handles.sort_by_key(|h| h.0);
        handles
    }

    pub fn info<T>(&self, handle: BufferHandle, f: impl FnOnce(&BufferInfo) -> T) -> Option<T> {
        self.buffers.borrow().get(&handle).map(f)
    }

    pub fn read(&self, name: GlobalName) -> Vec<u8> {
        match self.globals.borrow().get(&name) {
            Some(m) => m.bytes.iter().map(|b| b.get()).collect(),
            None => vec![],
        }
    }

    pub fn write(&self, name: GlobalName, offset: usize, bytes: &[u8]) {
        if let Some(m) = self.globals.borrow().get(&name) {
            for (dst, src) in m.bytes[offset..].iter().zip(bytes) {
                dst.set(*src);
            }
        }
    }
}

impl BufferDevice for TestBufferDevice {
    fn alloc(
        &self,
        size: u32,
        flags: HwmemAllocFlags,
        access: HwmemAccess,
        mem_type: MemType,
    ) -> Result<BufferHandle, HwmemError> {
        if self.fail_alloc.get() {
            return Err(HwmemError::Alloc(size as usize, OsError(c::ENOMEM)));
        }
        let handle = BufferHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.buffers.borrow_mut().insert(
            handle,
            BufferInfo {
                size: size as usize,
                flags,
                access,
                mem_type,
                domain: None,
                memory: TestMemory::new(size as usize),
            },
        );
        self.events.push(Event::Alloc { handle, size });
        Ok(handle)
    }

    fn import(&self, name: GlobalName) -> Result<BufferHandle, HwmemError> {
        let Some(memory) = self.globals.borrow().get(&name).cloned() else {
            return Err(HwmemError::Import(name, OsError(c::ENOENT)));
        };
        let handle = BufferHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.buffers.borrow_mut().insert(
            handle,
            BufferInfo {
                size: memory.bytes.len(),
                flags: HwmemAllocFlags::none(),
                access: HwmemAccess::none(),
                mem_type: MemType::ContiguousSys,
                domain: None,
                memory,
            },
        );
        self.events.push(Event::Import { name, handle });
        Ok(handle)
    }

    fn export(&self, handle: BufferHandle) -> Result<GlobalName, HwmemError> {
        if self.fail_export.get() {
            return Err(HwmemError::Export(handle, OsError(c::EPERM)));
        }
        let Some(memory) = self.buffers.borrow().get(&handle).map(|b| b.memory.clone()) else {
            return Err(HwmemError::Export(handle, OsError(c::EINVAL)));
        };
        let name = self.next_name();
        self.globals.borrow_mut().insert(name, memory);
        self.events.push(Event::Export { handle, name });
        Ok(name)
    }

    fn release(&self, handle: BufferHandle) -> Result<(), HwmemError> {
        if self.buffers.borrow_mut().remove(&handle).is_none() {
            return Err(HwmemError::Release(handle, OsError(c::EINVAL)));
        }
        self.events.push(Event::Release { handle });
        Ok(())
    }

    fn set_domain(
        &self,
        handle: BufferHandle,
        domain: Domain,
        _access: HwmemAccess,
        region: DomainRegion,
    ) -> Result<(), HwmemError> {
        if self.fail_set_domain.get() {
            return Err(HwmemError::SetDomain(handle, domain, OsError(c::EIO)));
        }
        let mut buffers = self.buffers.borrow_mut();
        let Some(buffer) = buffers.get_mut(&handle) else {
            return Err(HwmemError::SetDomain(handle, domain, OsError(c::EINVAL)));
        };
        if region.size as usize > buffer.memory.bytes.len() {
            return Err(HwmemError::SetDomain(handle, domain, OsError(c::ERANGE)));
        }
        buffer.domain = Some(domain);
        self.events.push(Event::SetDomain { handle });
        Ok(())
    }

    fn map(&self, handle: BufferHandle, size: usize) -> Result<Box<dyn CpuMapping>, HwmemError> {
        let buffers = self.buffers.borrow();
        let Some(buffer) = buffers.get(&handle) else {
            return Err(HwmemError::Map(handle, OsError(c::EINVAL)));
        };
        if size > buffer.memory.bytes.len() {
            return Err(HwmemError::Map(handle, OsError(c::EINVAL)));
        }
        self.events.push(Event::Map { handle });
        Ok(Box::new(TestMapping {
            memory: buffer.memory.clone(),
            len: size,
        }))
    }
}
