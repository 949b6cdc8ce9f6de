
use {
    crate::{format::BltFmt, hwmem::GlobalName},
    arrayvec::ArrayVec,
    hwblit_algorithms::rect::Rect,
};

bitflags! {
    BltFlags: u32;
        BLT_FLAG_ASYNCH = 1 << 0,
        BLT_FLAG_DRY_RUN = 1 << 1,
        BLT_FLAG_PER_PIXEL_ALPHA_BLEND = 1 << 2,
        BLT_FLAG_GLOBAL_ALPHA_BLEND = 1 << 3,
        BLT_FLAG_SOURCE_COLOR_KEY = 1 << 4,
        BLT_FLAG_SOURCE_FILL = 1 << 5,
        BLT_FLAG_SOURCE_FILL_RAW = 1 << 6,
        BLT_FLAG_DEST_COLOR_KEY = 1 << 7,
        BLT_FLAG_SRC_IS_NOT_PREMULT = 1 << 8,
        BLT_FLAG_DITHER = 1 << 9,
        BLT_FLAG_BLUR = 1 << 10,
        BLT_FLAG_SOURCE_MASK = 1 << 11,
        BLT_FLAG_DESTINATION_CLIP = 1 << 12,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum BltTransform {
    #[default]
    None = 0,
}

/// Where the engine finds the pixels of an image.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum BltBuf {
    #[default]
    None,
    HwmemName {
        name: GlobalName,
        offset: u32,
    },
    Physical {
        addr: u32,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BltImage {
    pub fmt: BltFmt,
    pub buf: BltBuf,
    pub width: i32,
    pub height: i32,
    pub pitch: u32,
}

impl Default for BltImage {
    fn default() -> Self {
        Self {
            fmt: BltFmt::Unused,
            buf: BltBuf::None,
            width: 0,
            height: 0,
            pitch: 0,
        }
    }
}

impl BltImage {
    pub fn hwmem(fmt: BltFmt, name: GlobalName, width: i32, height: i32, pitch: u32) -> Self {
        Self {
            fmt,
            buf: BltBuf::HwmemName { name, offset: 0 },
            width,
            height,
            pitch,
        }
    }

    pub fn name(&self) -> Option<GlobalName> {
        match self.buf {
            BltBuf::HwmemName { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A single job for the blit engine.
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct BltRequest {
    pub flags: BltFlags,
    pub transform: BltTransform,
    pub prio: u32,
    pub src_color: u32,
    pub src_img: BltImage,
    pub src_mask: BltImage,
    pub src_rect: Rect,
    pub dst_img: BltImage,
    pub dst_rect: Rect,
    pub dst_clip_rect: Rect,
    pub global_alpha: u32,
}

impl BltRequest {
    /// The global names of all buffers the engine touches while executing
    /// this request.
    pub fn referenced_names(&self) -> ArrayVec<GlobalName, 3> {
        [&self.src_img, &self.src_mask, &self.dst_img]
            .into_iter()
            .filter_map(|img| img.name())
            .collect()
    }
}

/// Operations the engine can take over for drawables of a given depth.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AccelCaps {
    pub solid: bool,
    pub copy: bool,
}

pub fn accel_caps(bits_per_pixel: u32) -> AccelCaps {
    let supported = bits_per_pixel > 8;
    AccelCaps {
        solid: supported,
        copy: supported,
    }
}

/// Fills `rect` of `dst` with the raw pixel value `color`.
pub fn solid_fill(dst: BltImage, color: u32, rect: Rect) -> BltRequest {
    BltRequest {
        flags: BLT_FLAG_ASYNCH | BLT_FLAG_SOURCE_FILL_RAW,
        src_color: color,
        dst_img: dst,
        dst_rect: rect,
        dst_clip_rect: rect,
        ..Default::default()
    }
}

/// Copies `src_rect` of `src` to `dst_rect` of `dst` without scaling.
pub fn copy(src: BltImage, dst: BltImage, src_rect: Rect, dst_rect: Rect) -> BltRequest {
    BltRequest {
        flags: BLT_FLAG_ASYNCH,
        src_img: src,
        src_rect,
        dst_img: dst,
        dst_rect,
        dst_clip_rect: dst_rect,
        ..Default::default()
    }
}
