use {
    crate::{
        blit::BltImage,
        display::{Display, DisplayError},
        format::blt_format_for_bpp,
        gate::BlitGate,
        hwmem::{GlobalName, HwmemError, MemoryBuffer, MemoryManager},
        utils::errorfmt::ErrorFmt,
    },
    ahash::AHashMap,
    hwblit_algorithms::layout::row_pitch,
    std::{
        cell::{Cell, RefCell},
        ptr::NonNull,
        rc::Rc,
    },
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Surface {0} does not exist")]
    Unknown(SurfaceId),
    #[error("Could not query the framebuffer")]
    FramebufferName(#[source] DisplayError),
    #[error("Could not import the framebuffer")]
    ImportFramebuffer(#[source] HwmemError),
    #[error("The surface wraps pixels that are not backed by a device buffer")]
    ForeignPixels,
    #[error("The surface has no buffer")]
    NoBuffer,
    #[error("Could not allocate a buffer for the surface")]
    Allocate(#[source] HwmemError),
    #[error("Could not map the buffer of the surface")]
    Map(#[source] HwmemError),
}

linear_ids!(SurfaceIds, SurfaceId);

/// Arguments of a header modification. Non-positive numbers leave the
/// corresponding property unchanged.
#[derive(Copy, Clone, Debug, Default)]
pub struct SurfaceHeader {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
    pub bits_per_pixel: i32,
    pub pitch: i32,
    pub pixels: Option<NonNull<u8>>,
}

pub struct Surface {
    pub id: SurfaceId,
    pub width: Cell<i32>,
    pub height: Cell<i32>,
    pub depth: Cell<u32>,
    pub bits_per_pixel: Cell<u32>,
    pub pitch: Cell<u32>,
    pub is_primary: Cell<bool>,
    /// The pixel address currently handed out to the server.
    pub pixels: Cell<Option<NonNull<u8>>>,
    pub buffer: RefCell<Option<MemoryBuffer>>,
}

impl Surface {
    fn new(id: SurfaceId) -> Self {
        Self {
            id,
            width: Cell::new(0),
            height: Cell::new(0),
            depth: Cell::new(0),
            bits_per_pixel: Cell::new(0),
            pitch: Cell::new(0),
            is_primary: Cell::new(false),
            pixels: Cell::new(None),
            buffer: RefCell::new(None),
        }
    }

    fn apply(&self, hdr: &SurfaceHeader) {
        if hdr.width > 0 {
            self.width.set(hdr.width);
        }
        if hdr.height > 0 {
            self.height.set(hdr.height);
        }
        if hdr.depth > 0 {
            self.depth.set(hdr.depth as u32);
        }
        if hdr.bits_per_pixel > 0 {
            self.bits_per_pixel.set(hdr.bits_per_pixel as u32);
        }
        if hdr.pitch > 0 {
            self.pitch.set(hdr.pitch as u32);
        }
        if hdr.pixels.is_some() {
            self.pixels.set(hdr.pixels);
        }
    }

    pub fn byte_size(&self) -> usize {
        self.pitch.get() as usize * self.height.get().max(0) as usize
    }

    pub fn buffer_name(&self) -> Option<GlobalName> {
        self.buffer.borrow().as_ref().map(|b| b.name())
    }

    /// Describes the surface as an engine image. Requires a bound buffer.
    pub fn blt_image(&self) -> Result<BltImage, SurfaceError> {
        let Some(name) = self.buffer_name() else {
            return Err(SurfaceError::NoBuffer);
        };
        Ok(BltImage::hwmem(
            blt_format_for_bpp(self.bits_per_pixel.get()),
            name,
            self.width.get(),
            self.height.get(),
            self.pitch.get(),
        ))
    }

    /// Binds the surface to storage after the server changed its header.
    ///
    /// The surface whose pixels are the framebuffer becomes the primary
    /// surface and imports the scanout buffer once. It stays primary across
    /// updates that leave the pixels unchanged. Off-screen surfaces get
    /// an 8-byte aligned pitch and lose their buffer if its size no longer
    /// matches; a new one is allocated lazily.
    pub fn modify_header(
        &self,
        hdr: &SurfaceHeader,
        mm: &MemoryManager,
        display: &dyn Display,
        gate: &BlitGate,
    ) -> Result<(), SurfaceError> {
        self.apply(hdr);
        let scans_out = match hdr.pixels {
            Some(pixels) => Some(pixels) == display.framebuffer_ptr(),
            None => self.is_primary.get(),
        };
        if scans_out {
            self.is_primary.set(true);
            if self.buffer.borrow().is_some() {
                return Ok(());
            }
            let name = display
                .framebuffer_name()
                .map_err(SurfaceError::FramebufferName)?;
            let buffer = mm
                .import(name, self.byte_size())
                .map_err(SurfaceError::ImportFramebuffer)?;
            log::info!(
                "Surface {} is the framebuffer (global name {}, {} bytes)",
                self.id,
                name,
                buffer.size(),
            );
            *self.buffer.borrow_mut() = Some(buffer);
            return Ok(());
        }
        self.is_primary.set(false);
        if hdr.pixels.is_some() {
            return match self.buffer.borrow().is_some() {
                true => Ok(()),
                false => Err(SurfaceError::ForeignPixels),
            };
        }
        let width = self.width.get().max(0) as u32;
        self.pitch
            .set(row_pitch(width, self.bits_per_pixel.get(), 8));
        let size = self.byte_size();
        let mut buffer = self.buffer.borrow_mut();
        if MemoryManager::resize_releases(&buffer, size) {
            if let Some(b) = &*buffer {
                drain_if_in_flight(gate, b);
            }
            self.pixels.set(None);
        }
        mm.resize(&mut buffer, size);
        Ok(())
    }

    /// Returns the global name of the buffer, allocating one for off-screen
    /// surfaces that lost theirs.
    pub fn ensure_buffer(&self, mm: &MemoryManager) -> Result<GlobalName, SurfaceError> {
        if let Some(name) = self.buffer_name() {
            return Ok(name);
        }
        let size = self.byte_size();
        if self.is_primary.get() || size == 0 {
            return Err(SurfaceError::NoBuffer);
        }
        let buffer = mm.allocate(size, true).map_err(SurfaceError::Allocate)?;
        let name = buffer.name();
        *self.buffer.borrow_mut() = Some(buffer);
        Ok(name)
    }

    /// Makes the pixels available to the CPU.
    pub fn prepare_access(&self, mm: &MemoryManager) -> Result<NonNull<u8>, SurfaceError> {
        self.ensure_buffer(mm)?;
        let mut buffer = self.buffer.borrow_mut();
        let Some(buffer) = buffer.as_mut() else {
            return Err(SurfaceError::NoBuffer);
        };
        let ptr = mm.prepare_cpu_access(buffer).map_err(SurfaceError::Map)?;
        self.pixels.set(Some(ptr));
        Ok(ptr)
    }

    /// Revokes the CPU pointer. The mapping itself is kept.
    pub fn finish_access(&self) {
        if self.buffer.borrow().is_none() {
            return;
        }
        self.pixels.set(None);
    }

    pub fn release_buffer(&self, mm: &MemoryManager, gate: &BlitGate) {
        let Some(buffer) = self.buffer.borrow_mut().take() else {
            return;
        };
        drain_if_in_flight(gate, &buffer);
        self.pixels.set(None);
        if let Err(e) = mm.release(buffer) {
            log::error!(
                "Could not release the buffer of surface {}: {}",
                self.id,
                ErrorFmt(e)
            );
        }
    }
}

fn drain_if_in_flight(gate: &BlitGate, buffer: &MemoryBuffer) {
    if gate.is_in_flight(buffer.name()) {
        log::debug!(
            "Buffer {} is used by the engine, draining before release",
            buffer.handle()
        );
        if let Err(e) = gate.drain() {
            log::error!("Could not drain the blit engine: {}", ErrorFmt(e));
        }
    }
}

#[derive(Default)]
pub struct SurfaceRegistry {
    ids: SurfaceIds,
    surfaces: RefCell<AHashMap<SurfaceId, Rc<Surface>>>,
}

impl SurfaceRegistry {
    pub fn create(&self) -> Rc<Surface> {
        let surface = Rc::new(Surface::new(self.ids.next()));
        self.surfaces
            .borrow_mut()
            .insert(surface.id, surface.clone());
        surface
    }

    pub fn get(&self, id: SurfaceId) -> Result<Rc<Surface>, SurfaceError> {
        match self.surfaces.borrow().get(&id) {
            Some(s) => Ok(s.clone()),
            None => Err(SurfaceError::Unknown(id)),
        }
    }

    pub fn remove(&self, id: SurfaceId) -> Option<Rc<Surface>> {
        self.surfaces.borrow_mut().remove(&id)
    }

    pub fn primary(&self) -> Option<Rc<Surface>> {
        self.surfaces
            .borrow()
            .values()
            .find(|s| s.is_primary.get())
            .cloned()
    }

    pub fn take_all(&self) -> Vec<Rc<Surface>> {
        self.surfaces.borrow_mut().drain().map(|(_, s)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.surfaces.borrow().len()
    }
}
