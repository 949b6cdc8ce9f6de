
use {
    crate::{
        blit::{self, accel_caps},
        blt::{BltEngine, BltError, LibBlt},
        config::DriverConfig,
        display::{Display, DisplayError, Fbdev},
        gate::{BlitGate, GateError},
        hwmem::{BufferDevice, Hwmem, HwmemError, MemoryManager},
        logger::{self, Logger},
        overlap,
        scratch::ScratchContext,
        surface::{Surface, SurfaceError, SurfaceHeader, SurfaceId, SurfaceRegistry},
        utils::errorfmt::ErrorFmt,
        video::VideoAdaptor,
    },
    hwblit_algorithms::rect::{CopyPath, Rect},
    log::Level,
    std::{
        cell::{Cell, RefCell},
        ptr::NonNull,
        rc::Rc,
        sync::Arc,
    },
    thiserror::Error,
};

include!(concat!(env!("OUT_DIR"), "/version.rs"));

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{0} is not accelerated for {1} bits per pixel")]
    Unsupported(&'static str, u32),
    #[error("Composite operations are not accelerated")]
    CompositeUnsupported,
    #[error("No copy has been prepared")]
    NoPendingSource,
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("Could not open the buffer device")]
    Hwmem(#[from] HwmemError),
    #[error("Could not open the blit engine")]
    Blt(#[from] BltError),
    #[error("Could not open the display")]
    Display(#[from] DisplayError),
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Which side of an operation the server is about to touch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AccessIndex {
    Dest,
    Source,
    Mask,
    AuxDest,
    AuxSource,
    AuxMask,
}

/// The acceleration hooks the display server calls.
///
/// Drawing operations come in prepare/execute/done triples. A failed
/// prepare tells the server to fall back to software rendering. Execute and
/// done never fail visibly; problems are logged and the pixels stay as they
/// were.
pub trait AccelDriver {
    fn prepare_solid(
        &self,
        surface: SurfaceId,
        alu: u32,
        planemask: u32,
        fg: u32,
    ) -> Result<(), DriverError>;
    fn solid(&self, surface: SurfaceId, x1: i32, y1: i32, x2: i32, y2: i32);
    fn done_solid(&self, surface: SurfaceId);

    fn prepare_copy(
        &self,
        src: SurfaceId,
        dst: SurfaceId,
        xdir: i32,
        ydir: i32,
        alu: u32,
        planemask: u32,
    ) -> Result<(), DriverError>;
    #[allow(clippy::too_many_arguments)]
    fn copy(
        &self,
        dst: SurfaceId,
        src_x: i32,
        src_y: i32,
        dst_x: i32,
        dst_y: i32,
        width: i32,
        height: i32,
    );
    fn done_copy(&self, dst: SurfaceId);

    fn check_composite(&self, op: u32) -> Result<(), DriverError>;
    fn prepare_composite(
        &self,
        op: u32,
        src: SurfaceId,
        mask: Option<SurfaceId>,
        dst: SurfaceId,
    ) -> Result<(), DriverError>;
    fn composite(&self, dst: SurfaceId, src: (i32, i32), mask: (i32, i32), rect: Rect);
    fn done_composite(&self, dst: SurfaceId);

    fn wait_marker(&self, marker: i32);

    fn create_surface(&self) -> SurfaceId;
    fn destroy_surface(&self, surface: SurfaceId);
    fn modify_surface_header(
        &self,
        surface: SurfaceId,
        header: &SurfaceHeader,
    ) -> Result<(), DriverError>;
    fn is_surface_offscreen(&self, surface: SurfaceId) -> bool;
    fn prepare_access(
        &self,
        surface: SurfaceId,
        index: AccessIndex,
    ) -> Result<NonNull<u8>, DriverError>;
    fn finish_access(&self, surface: SurfaceId, index: AccessIndex);
}

/// State shared by the drawing hooks and the video adaptor.
pub struct DriverContext {
    pub config: DriverConfig,
    pub mm: MemoryManager,
    pub gate: BlitGate,
    pub surfaces: SurfaceRegistry,
    pub display: Rc<dyn Display>,
    fill_color: Cell<u32>,
    pending_source: Cell<Option<SurfaceId>>,
    pub scratch: RefCell<Option<ScratchContext>>,
}

impl DriverContext {
    pub fn new(
        config: DriverConfig,
        dev: Rc<dyn BufferDevice>,
        engine: Rc<dyn BltEngine>,
        display: Rc<dyn Display>,
    ) -> Rc<Self> {
        Rc::new(Self {
            mm: MemoryManager::new(dev),
            gate: BlitGate::new(engine, config.retry),
            surfaces: Default::default(),
            display,
            fill_color: Cell::new(0),
            pending_source: Cell::new(None),
            scratch: Default::default(),
            config,
        })
    }

    /// The vertical offset of the visible part of a destination.
    pub fn dst_offset(&self, surface: &Surface) -> i32 {
        match surface.is_primary.get() {
            true => self.display.scan_offset(),
            false => 0,
        }
    }

    /// Grants the CPU access to the pixels of a surface once the engine no
    /// longer uses them.
    pub fn cpu_access(&self, surface: &Surface) -> Result<NonNull<u8>, DriverError> {
        if let Some(name) = surface.buffer_name() {
            if self.gate.is_in_flight(name) {
                self.gate.drain()?;
            }
        }
        Ok(surface.prepare_access(&self.mm)?)
    }

    pub fn drain(&self) {
        if let Err(e) = self.gate.drain() {
            log::error!("Could not drain the blit engine: {}", ErrorFmt(e));
        }
    }

    /// Waits for the engine and releases every buffer.
    pub fn shutdown(&self) {
        self.drain();
        self.scratch.take();
        self.pending_source.take();
        for surface in self.surfaces.take_all() {
            surface.release_buffer(&self.mm, &self.gate);
        }
    }

    fn solid_(&self, surface: SurfaceId, rect: Rect) -> Result<(), DriverError> {
        let surface = self.surfaces.get(surface)?;
        surface.ensure_buffer(&self.mm)?;
        let dst = surface.blt_image()?;
        let rect = rect.translate(0, self.dst_offset(&surface));
        let req = blit::solid_fill(dst, self.fill_color.get(), rect);
        self.gate.submit(&req)?;
        Ok(())
    }

    fn copy_(
        &self,
        dst: SurfaceId,
        src_rect: Rect,
        dst_x: i32,
        dst_y: i32,
    ) -> Result<CopyPath, DriverError> {
        let Some(src) = self.pending_source.get() else {
            return Err(DriverError::NoPendingSource);
        };
        let src = self.surfaces.get(src)?;
        let dst = self.surfaces.get(dst)?;
        overlap::copy(self, &src, &dst, src_rect, dst_x, dst_y)
    }
}

pub struct BlitDriver {
    ctx: Rc<DriverContext>,
    logger: Option<Arc<Logger>>,
}

impl BlitDriver {
    pub fn new(
        config: DriverConfig,
        dev: Rc<dyn BufferDevice>,
        engine: Rc<dyn BltEngine>,
        display: Rc<dyn Display>,
    ) -> Self {
        log::info!("hwblit {} loaded", VERSION);
        Self {
            ctx: DriverContext::new(config, dev, engine, display),
            logger: None,
        }
    }

    /// Installs the logger and opens the buffer device and the blit engine
    /// named in the configuration.
    pub fn open(config: DriverConfig, display: Rc<dyn Display>) -> Result<Self, DriverError> {
        let logger = logger::try_install(config.log_level);
        let dev = Hwmem::open(&config.hwmem_device)?;
        let engine = Rc::new(LibBlt::open(&config.blt_library)?);
        let mut slf = Self::new(config, dev, engine, display);
        slf.logger = logger;
        Ok(slf)
    }

    /// Like `open` but also opens the framebuffer device named in the
    /// configuration. The server records the address of its mapping with
    /// `Fbdev::set_framebuffer_ptr` before binding the screen pixmap.
    pub fn open_fbdev(config: DriverConfig) -> Result<(Self, Rc<Fbdev>), DriverError> {
        let fbdev = Fbdev::open(&config.fb_device)?;
        let driver = Self::open(config, fbdev.clone())?;
        Ok((driver, fbdev))
    }

    pub fn set_log_level(&self, level: Level) {
        if let Some(logger) = &self.logger {
            logger.set_level(level);
        }
    }

    pub fn context(&self) -> &Rc<DriverContext> {
        &self.ctx
    }

    pub fn video_adaptor(&self) -> VideoAdaptor {
        VideoAdaptor::new(&self.ctx)
    }
}

impl Drop for BlitDriver {
    fn drop(&mut self) {
        self.ctx.shutdown();
    }
}

impl AccelDriver for BlitDriver {
    fn prepare_solid(
        &self,
        surface: SurfaceId,
        _alu: u32,
        _planemask: u32,
        fg: u32,
    ) -> Result<(), DriverError> {
        let surface = self.ctx.surfaces.get(surface)?;
        let bpp = surface.bits_per_pixel.get();
        if !accel_caps(bpp).solid {
            return Err(DriverError::Unsupported("Solid fill", bpp));
        }
        self.ctx.fill_color.set(fg);
        Ok(())
    }

    fn solid(&self, surface: SurfaceId, x1: i32, y1: i32, x2: i32, y2: i32) {
        let Some(rect) = Rect::from_corners(x1, y1, x2, y2) else {
            log::warn!("Ignoring inverted fill rectangle ({x1}, {y1})-({x2}, {y2})");
            return;
        };
        if let Err(e) = self.ctx.solid_(surface, rect) {
            log::error!("Could not fill surface {}: {}", surface, ErrorFmt(e));
        }
    }

    fn done_solid(&self, _surface: SurfaceId) {
        self.ctx.fill_color.set(0);
        self.ctx.drain();
    }

    fn prepare_copy(
        &self,
        src: SurfaceId,
        dst: SurfaceId,
        _xdir: i32,
        _ydir: i32,
        _alu: u32,
        _planemask: u32,
    ) -> Result<(), DriverError> {
        for id in [src, dst] {
            let bpp = self.ctx.surfaces.get(id)?.bits_per_pixel.get();
            if !accel_caps(bpp).copy {
                return Err(DriverError::Unsupported("Copy", bpp));
            }
        }
        self.ctx.pending_source.set(Some(src));
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn copy(
        &self,
        dst: SurfaceId,
        src_x: i32,
        src_y: i32,
        dst_x: i32,
        dst_y: i32,
        width: i32,
        height: i32,
    ) {
        let src_rect = Rect::new(src_x, src_y, width, height);
        match self.ctx.copy_(dst, src_rect, dst_x, dst_y) {
            Ok(path) => log::trace!("Copied {:?} to ({dst_x}, {dst_y}) via {:?}", src_rect, path),
            Err(e) => log::error!("Could not copy to surface {}: {}", dst, ErrorFmt(e)),
        }
    }

    fn done_copy(&self, _dst: SurfaceId) {
        self.ctx.scratch.take();
        self.ctx.drain();
    }

    fn check_composite(&self, _op: u32) -> Result<(), DriverError> {
        Err(DriverError::CompositeUnsupported)
    }

    fn prepare_composite(
        &self,
        _op: u32,
        _src: SurfaceId,
        _mask: Option<SurfaceId>,
        _dst: SurfaceId,
    ) -> Result<(), DriverError> {
        Err(DriverError::CompositeUnsupported)
    }

    fn composite(&self, _dst: SurfaceId, _src: (i32, i32), _mask: (i32, i32), _rect: Rect) {
        // unreachable since prepare always fails
    }

    fn done_composite(&self, _dst: SurfaceId) {}

    fn wait_marker(&self, marker: i32) {
        self.ctx.gate.wait_marker(marker);
    }

    fn create_surface(&self) -> SurfaceId {
        self.ctx.surfaces.create().id
    }

    fn destroy_surface(&self, surface: SurfaceId) {
        if self.ctx.pending_source.get() == Some(surface) {
            self.ctx.pending_source.take();
        }
        if let Some(surface) = self.ctx.surfaces.remove(surface) {
            surface.release_buffer(&self.ctx.mm, &self.ctx.gate);
        }
    }

    fn modify_surface_header(
        &self,
        surface: SurfaceId,
        header: &SurfaceHeader,
    ) -> Result<(), DriverError> {
        let surface = self.ctx.surfaces.get(surface)?;
        let res = surface.modify_header(
            header,
            &self.ctx.mm,
            &*self.ctx.display,
            &self.ctx.gate,
        );
        if let Err(e) = &res {
            log::error!(
                "Could not bind storage to surface {}: {}",
                surface.id,
                ErrorFmt(e)
            );
        }
        Ok(res?)
    }

    fn is_surface_offscreen(&self, surface: SurfaceId) -> bool {
        match self.ctx.surfaces.get(surface) {
            Ok(s) => s.is_primary.get() || s.pixels.get().is_none(),
            Err(_) => false,
        }
    }

    fn prepare_access(
        &self,
        surface: SurfaceId,
        index: AccessIndex,
    ) -> Result<NonNull<u8>, DriverError> {
        let surface = self.ctx.surfaces.get(surface)?;
        let res = self.ctx.cpu_access(&surface);
        if let Err(e) = &res {
            log::error!(
                "Could not prepare surface {} for {:?} access: {}",
                surface.id,
                index,
                ErrorFmt(e)
            );
        }
        res
    }

    fn finish_access(&self, surface: SurfaceId, _index: AccessIndex) {
        if let Ok(surface) = self.ctx.surfaces.get(surface) {
            surface.finish_access();
        }
    }
}
