use {
    crate::{
        config::DriverConfig,
        driver::{AccelDriver, BlitDriver, DriverContext},
        it::{
            test_blt_engine::TestBltEngine,
            test_buffer_device::TestBufferDevice,
            test_display::TestDisplay,
            test_error::{TestErrorExt, TestResult},
            test_events::EventLog,
        },
        surface::{Surface, SurfaceHeader, SurfaceId},
    },
    hwblit_algorithms::layout::bytes_per_pixel,
    std::rc::Rc,
};

pub struct TestRun {
    pub events: Rc<EventLog>,
    pub dev: Rc<TestBufferDevice>,
    pub engine: Rc<TestBltEngine>,
    pub display: Rc<TestDisplay>,
    pub driver: BlitDriver,
}

fn depth_for_bpp(bits_per_pixel: u32) -> u32 {
    match bits_per_pixel {
        32 => 24,
        n => n,
    }
}

impl TestRun {
    pub fn new() -> Rc<Self> {
        let events = Rc::new(EventLog::default());
        let dev = TestBufferDevice::new(&events);
        let engine = TestBltEngine::new(&events);
        let display = TestDisplay::new(&events);
        let driver = BlitDriver::new(
            DriverConfig::default(),
            dev.clone(),
            engine.clone(),
            display.clone(),
        );
        Rc::new(Self {
            events,
            dev,
            engine,
            display,
            driver,
        })
    }

    pub fn ctx(&self) -> &Rc<DriverContext> {
        self.driver.context()
    }

    pub fn surface(&self, id: SurfaceId) -> TestResult<Rc<Surface>> {
        Ok(self.ctx().surfaces.get(id)?)
    }

    /// Creates an off-screen surface the way the server does for a pixmap.
    pub fn create_surface(&self, width: i32, height: i32, bpp: u32) -> TestResult<SurfaceId> {
        let id = self.driver.create_surface();
        let header = SurfaceHeader {
            width,
            height,
            depth: depth_for_bpp(bpp) as i32,
            bits_per_pixel: bpp as i32,
            ..Default::default()
        };
        self.driver
            .modify_surface_header(id, &header)
            .with_context(|| format!("Could not create a {width}x{height} surface"))?;
        Ok(id)
    }

    /// Creates the screen pixmap on top of a scanout buffer of the given
    /// size.
    pub fn create_primary(&self, width: i32, height: i32, bpp: u32) -> TestResult<SurfaceId> {
        let pitch = width * bytes_per_pixel(bpp) as i32;
        let (name, ptr) = self.dev.add_external((pitch * height) as usize);
        self.display.framebuffer.set(Some((name, ptr)));
        self.display.size.set((width, height));
        let id = self.driver.create_surface();
        let header = SurfaceHeader {
            width,
            height,
            depth: depth_for_bpp(bpp) as i32,
            bits_per_pixel: bpp as i32,
            pitch,
            pixels: Some(ptr),
        };
        self.driver
            .modify_surface_header(id, &header)
            .with_context(|| "Could not bind the screen pixmap")?;
        Ok(id)
    }
}
