
use {
    crate::{
        blit::{BLT_FLAG_ASYNCH, BLT_FLAG_DESTINATION_CLIP, BltBuf, BltImage, BltRequest},
        driver::DriverContext,
        format::{
            FOURCC_I420, FOURCC_STE0, FOURCC_YUMB, FOURCC_YV12, FourCc, FourCcFmt, VIDEO_FORMATS,
            VideoFormat, video_format,
        },
        gate::GateError,
        hwmem::{HwmemError, MemoryBuffer},
        surface::{SurfaceError, SurfaceId},
        utils::errorfmt::ErrorFmt,
    },
    byteorder::{NativeEndian, ReadBytesExt},
    hwblit_algorithms::{
        layout::{ImageLayout, align_up, opaque, packed_422, planar_420},
        rect::Rect,
    },
    std::{cell::RefCell, io, ptr, rc::Rc},
    thiserror::Error,
};

pub const VIDEO_IMAGE_MAX_WIDTH: u32 = 1920;
pub const VIDEO_IMAGE_MAX_HEIGHT: u32 = 1280;

const NUM_OVERLAY_PORTS: usize = 1;
const VIDEO_ALIGN: u32 = 16;

bitflags! {
    AdaptorType: u32;
        XV_INPUT_MASK = 1 << 0,
        XV_OUTPUT_MASK = 1 << 1,
        XV_VIDEO_MASK = 1 << 2,
        XV_STILL_MASK = 1 << 3,
        XV_IMAGE_MASK = 1 << 4,
        XV_PIXMAP_MASK = 1 << 16,
        XV_WINDOW_MASK = 1 << 17,
}

bitflags! {
    AdaptorFlags: u32;
        VIDEO_NO_CLIPPING = 1 << 0,
        VIDEO_INVERT_CLIPLIST = 1 << 1,
        VIDEO_OVERLAID_IMAGES = 1 << 2,
        VIDEO_OVERLAID_STILLS = 1 << 3,
        VIDEO_CLIP_TO_VIEWPORT = 1 << 4,
}

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Unsupported image format {0}")]
    UnknownFormat(FourCcFmt),
    #[error("The image contains {actual} bytes but {expected} are required")]
    ShortImage { expected: usize, actual: usize },
    #[error("Could not read the frame descriptor")]
    FrameDescriptor(#[source] io::Error),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("Could not prepare the staging buffer")]
    Staging(#[source] HwmemError),
    #[error(transparent)]
    Gate(#[from] GateError),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VideoEncoding {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub rate: (u32, u32),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VisualClass {
    TrueColor,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VisualFormat {
    pub depth: u8,
    pub class: VisualClass,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PortAttribute {
    pub name: &'static str,
    pub min: i32,
    pub max: i32,
    pub gettable: bool,
    pub settable: bool,
}

pub static ENCODINGS: &[VideoEncoding] = &[VideoEncoding {
    name: "XV_IMAGE",
    width: VIDEO_IMAGE_MAX_WIDTH,
    height: VIDEO_IMAGE_MAX_HEIGHT,
    rate: (1, 1),
}];

pub static VISUAL_FORMATS: &[VisualFormat] = &[
    VisualFormat {
        depth: 15,
        class: VisualClass::TrueColor,
    },
    VisualFormat {
        depth: 16,
        class: VisualClass::TrueColor,
    },
    VisualFormat {
        depth: 24,
        class: VisualClass::TrueColor,
    },
];

pub static ATTRIBUTES: &[PortAttribute] = &[
    PortAttribute {
        name: "XV_COLORKEY",
        min: 0,
        max: 65535,
        gettable: true,
        settable: true,
    },
    PortAttribute {
        name: "XV_AUTOPAINT_COLORKEY",
        min: 0,
        max: 1,
        gettable: true,
        settable: true,
    },
];

/// The header the decoder places in front of zero-copy frames.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameDescriptor {
    pub pool_id: u32,
    pub logical_address: u32,
    pub physical_address: u32,
    pub size: u32,
}

impl FrameDescriptor {
    pub fn parse(mut buf: &[u8]) -> Result<Self, io::Error> {
        Ok(Self {
            pool_id: buf.read_u32::<NativeEndian>()?,
            logical_address: buf.read_u32::<NativeEndian>()?,
            physical_address: buf.read_u32::<NativeEndian>()?,
            size: buf.read_u32::<NativeEndian>()?,
        })
    }
}

/// One frame handed to the overlay by a client.
#[derive(Copy, Clone, Debug)]
pub struct PutImage<'a> {
    pub src: Rect,
    pub dst: Rect,
    pub fourcc: FourCc,
    pub buf: &'a [u8],
    pub width: i32,
    pub height: i32,
    pub clip: &'a [Rect],
    /// The surface backing the target drawable.
    pub drawable: SurfaceId,
    /// The size of the target drawable, which can be smaller than its
    /// backing surface.
    pub drawable_size: (i32, i32),
}

#[derive(Default)]
pub struct VideoPortState {
    pub src: Rect,
    pub dst: Rect,
    pub image_width: i32,
    pub image_height: i32,
    pub fourcc: Option<FourCc>,
    pub staging: Option<MemoryBuffer>,
}

impl VideoPortState {
    pub fn staging_valid(&self) -> bool {
        self.staging.is_some()
    }
}

pub struct VideoPort {
    ctx: Rc<DriverContext>,
    pub state: RefCell<VideoPortState>,
}

/// Clamps the destination to the largest image the engine accepts. A
/// destination covering the whole of it is moved to the origin.
pub fn clamp_destination(dst: Rect) -> Rect {
    let width = dst.width.min(VIDEO_IMAGE_MAX_WIDTH as i32);
    let height = dst.height.min(VIDEO_IMAGE_MAX_HEIGHT as i32);
    if width == VIDEO_IMAGE_MAX_WIDTH as i32 && height == VIDEO_IMAGE_MAX_HEIGHT as i32 {
        return Rect::new(0, 0, width, height);
    }
    Rect::new(dst.x, dst.y, width, height)
}

fn align_video(value: i32) -> i32 {
    align_up(value.max(0) as u32, VIDEO_ALIGN) as i32
}

impl VideoPort {
    fn new(ctx: &Rc<DriverContext>) -> Self {
        Self {
            ctx: ctx.clone(),
            state: Default::default(),
        }
    }

    /// Blits one frame onto its drawable and waits for the engine.
    pub fn put_image(&self, img: &PutImage<'_>) -> Result<(), VideoError> {
        let res = self.put_image_(img);
        if let Err(e) = &res {
            log::error!("Could not display a video frame: {}", ErrorFmt(e));
        }
        res
    }

    fn put_image_(&self, img: &PutImage<'_>) -> Result<(), VideoError> {
        let Some(fmt) = video_format(img.fourcc) else {
            return Err(VideoError::UnknownFormat(FourCcFmt(img.fourcc)));
        };
        let dst = clamp_destination(img.dst);
        let drawable = self.ctx.surfaces.get(img.drawable)?;
        drawable.ensure_buffer(&self.ctx.mm)?;
        let mut dst_img = drawable.blt_image()?;
        let src_img = {
            let mut state = self.state.borrow_mut();
            self.update_state(&mut state, img, dst);
            self.source_image(&mut state, fmt, img)?
        };
        let is_primary = drawable.is_primary.get();
        let (dst_rect, clip) = if is_primary {
            let (width, height) = self.ctx.display.screen_size();
            dst_img.width = width;
            dst_img.height = height;
            (dst, Rect::new(0, 0, width, height))
        } else {
            let (width, height) = img.drawable_size;
            dst_img.width = width;
            dst_img.height = height;
            let rect = Rect::new(0, 0, dst.width, dst.height);
            (rect, rect)
        };
        let req = BltRequest {
            flags: BLT_FLAG_ASYNCH | BLT_FLAG_DESTINATION_CLIP,
            prio: self.ctx.config.video_priority,
            src_img,
            src_rect: img.src,
            dst_img,
            dst_rect,
            dst_clip_rect: clip,
            global_alpha: 255,
            ..Default::default()
        };
        self.ctx.gate.submit(&req)?;
        self.ctx.gate.drain()?;
        if is_primary {
            if let Err(e) = self.ctx.display.reset_scan_offset() {
                log::warn!("Could not reset the scan offset: {}", ErrorFmt(e));
            }
        }
        self.ctx.display.damage(img.clip);
        Ok(())
    }

    /// Records the geometry of the frame and drops the staging buffer if
    /// it no longer fits.
    fn update_state(&self, state: &mut VideoPortState, img: &PutImage<'_>, dst: Rect) {
        let changed = state.src != img.src
            || state.dst != dst
            || state.fourcc != Some(img.fourcc)
            || state.image_width != img.width
            || state.image_height != img.height;
        if changed {
            if let Some(staging) = state.staging.take() {
                log::debug!("Video geometry changed, dropping staging buffer {}", staging.handle());
                self.release_staging(staging);
            }
        }
        state.src = img.src;
        state.dst = dst;
        state.image_width = img.width;
        state.image_height = img.height;
        state.fourcc = Some(img.fourcc);
    }

    fn source_image(
        &self,
        state: &mut VideoPortState,
        fmt: &VideoFormat,
        img: &PutImage<'_>,
    ) -> Result<BltImage, VideoError> {
        let width = img.width.max(0) as u32;
        let height = img.height.max(0) as u32;
        let Some(size) = fmt.layout.copy_size(width, height) else {
            let desc = FrameDescriptor::parse(img.buf).map_err(VideoError::FrameDescriptor)?;
            return Ok(BltImage {
                fmt: fmt.blt,
                buf: BltBuf::Physical {
                    addr: desc.physical_address,
                },
                width: align_video(img.src.width),
                height: align_video(img.src.height),
                pitch: 0,
            });
        };
        if img.buf.len() < size {
            return Err(VideoError::ShortImage {
                expected: size,
                actual: img.buf.len(),
            });
        }
        let staging = match state.staging.take() {
            Some(s) if s.size() >= size => s,
            old => {
                if let Some(old) = old {
                    self.release_staging(old);
                }
                self.ctx
                    .mm
                    .allocate(size, true)
                    .map_err(VideoError::Staging)?
            }
        };
        let staging = state.staging.insert(staging);
        let ptr = self
            .ctx
            .mm
            .prepare_cpu_access(staging)
            .map_err(VideoError::Staging)?;
        unsafe {
            ptr::copy_nonoverlapping(img.buf.as_ptr(), ptr.as_ptr(), size);
        }
        Ok(BltImage {
            fmt: fmt.blt,
            buf: BltBuf::HwmemName {
                name: staging.name(),
                offset: 0,
            },
            width: img.width,
            height: img.height,
            pitch: 0,
        })
    }

    fn release_staging(&self, staging: MemoryBuffer) {
        if self.ctx.gate.is_in_flight(staging.name()) {
            self.ctx.drain();
        }
        if let Err(e) = self.ctx.mm.release(staging) {
            log::error!("Could not release the staging buffer: {}", ErrorFmt(e));
        }
    }

    pub fn stop(&self, _exit: bool) {}

    /// Attributes are advertised but not stored.
    pub fn get_port_attribute(&self, _name: &str) -> Option<i32> {
        None
    }

    pub fn set_port_attribute(&self, _name: &str, _value: i32) -> Result<(), VideoError> {
        Ok(())
    }

    /// The size the overlay prefers for a `dst_w` x `dst_h` destination.
    pub fn query_best_size(&self, _vid: (u32, u32), dst_w: u32, dst_h: u32) -> (u32, u32) {
        (
            align_up(dst_w.min(VIDEO_IMAGE_MAX_WIDTH), VIDEO_ALIGN),
            align_up(dst_h.min(VIDEO_IMAGE_MAX_HEIGHT), VIDEO_ALIGN),
        )
    }

    pub fn query_image_attributes(&self, fourcc: FourCc, width: u32, height: u32) -> ImageLayout {
        query_image_attributes(fourcc, width, height)
    }

    pub fn teardown(&self) {
        let staging = self.state.borrow_mut().staging.take();
        if let Some(staging) = staging {
            self.release_staging(staging);
        }
    }
}

/// The layout a client has to use for an image of the given format.
///
/// The dimensions are capped to the largest image and aligned to 16
/// pixels first.
pub fn query_image_attributes(fourcc: FourCc, width: u32, height: u32) -> ImageLayout {
    let width = align_up(width.min(VIDEO_IMAGE_MAX_WIDTH), VIDEO_ALIGN);
    let height = align_up(height.min(VIDEO_IMAGE_MAX_HEIGHT), VIDEO_ALIGN);
    match fourcc {
        FOURCC_YUMB => opaque(width, height, width * height * 3 / 2),
        FOURCC_STE0 => opaque(width, height, width * height * 2),
        FOURCC_YV12 | FOURCC_I420 => planar_420(width, height),
        _ => packed_422(width, height),
    }
}

/// The overlay adaptor the server registers for this screen.
pub struct VideoAdaptor {
    ports: Vec<VideoPort>,
}

impl VideoAdaptor {
    pub const NAME: &'static str = "B2R2 Overlay Video Accelerator";
    pub const TYPE: AdaptorType = AdaptorType(
        XV_WINDOW_MASK.raw() | XV_INPUT_MASK.raw() | XV_IMAGE_MASK.raw(),
    );
    pub const FLAGS: AdaptorFlags =
        AdaptorFlags(VIDEO_CLIP_TO_VIEWPORT.raw() | VIDEO_OVERLAID_IMAGES.raw());

    pub fn new(ctx: &Rc<DriverContext>) -> Self {
        let ports = (0..NUM_OVERLAY_PORTS).map(|_| VideoPort::new(ctx)).collect();
        log::info!("Registering {} with {} port(s)", Self::NAME, NUM_OVERLAY_PORTS);
        Self { ports }
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn encodings(&self) -> &'static [VideoEncoding] {
        ENCODINGS
    }

    pub fn formats(&self) -> &'static [VisualFormat] {
        VISUAL_FORMATS
    }

    pub fn attributes(&self) -> &'static [PortAttribute] {
        ATTRIBUTES
    }

    pub fn images(&self) -> &'static [VideoFormat] {
        VIDEO_FORMATS
    }

    pub fn ports(&self) -> &[VideoPort] {
        &self.ports
    }

    pub fn port(&self, idx: usize) -> Option<&VideoPort> {
        self.ports.get(idx)
    }
}

impl Drop for VideoAdaptor {
    fn drop(&mut self) {
        for port in &self.ports {
            port.teardown();
        }
    }
}
