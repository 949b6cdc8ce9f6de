
use {
    ahash::AHashMap,
    std::{
        fmt::{Debug, Display, Formatter},
        sync::LazyLock,
    },
};

pub type FourCc = u32;

pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> FourCc {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

pub const FOURCC_YV12: FourCc = fourcc(b'Y', b'V', b'1', b'2');
pub const FOURCC_I420: FourCc = fourcc(b'I', b'4', b'2', b'0');
pub const FOURCC_UYVY: FourCc = fourcc(b'U', b'Y', b'V', b'Y');
pub const FOURCC_YUY2: FourCc = fourcc(b'Y', b'U', b'Y', b'2');
/// Macroblock tiled 4:2:0 frames produced by the video decoder.
pub const FOURCC_YUMB: FourCc = fourcc(b'Y', b'U', b'M', b'B');
/// Packed CbYCrY frames produced by the camera pipeline.
pub const FOURCC_STE0: FourCc = fourcc(b'S', b'T', b'E', b'0');

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FourCcFmt(pub FourCc);

impl Display for FourCcFmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let bytes = self.0.to_le_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for b in bytes {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "0x{:08x}", self.0)
        }
    }
}

/// Pixel formats understood by the blit engine.
///
/// The discriminants are the values of `enum blt_fmt` in `blt_api.h`.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BltFmt {
    Unused = 0,
    Argb1555 = 5,
    Rgb565 = 6,
    Rgb888 = 11,
    Argb8888 = 16,
    Yuv420PackedPlanar = 20,
    YCbYCr = 23,
    CbYCrY = 24,
    Yvu420PackedPlanar = 0x7f00_0002,
    Yuv420PackedSemiplanarMbSte = 0x7f00_0004,
}

impl BltFmt {
    pub fn raw(self) -> u32 {
        self as u32
    }
}

/// Maps the bits per pixel of a drawable onto the engine format.
///
/// Depths the engine cannot address produce `BltFmt::Unused`, which the
/// engine rejects when the request is validated.
pub fn blt_format_for_bpp(bits_per_pixel: u32) -> BltFmt {
    match bits_per_pixel {
        15 => BltFmt::Argb1555,
        16 => BltFmt::Rgb565,
        24 => BltFmt::Rgb888,
        32 => BltFmt::Argb8888,
        _ => {
            log::warn!("Unknown bit depth {}", bits_per_pixel);
            BltFmt::Unused
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VideoLayout {
    /// Three planes, chroma subsampled in both directions.
    Planar420,
    /// One plane, two bytes per pixel.
    Packed422,
    /// Referenced in place through the physical address of the frame.
    ZeroCopyMacroblock,
    ZeroCopyPacked,
}

impl VideoLayout {
    pub fn is_zero_copy(self) -> bool {
        matches!(self, Self::ZeroCopyMacroblock | Self::ZeroCopyPacked)
    }

    /// The number of bytes that have to be copied into a staging buffer for
    /// a `width` x `height` frame. `None` for zero-copy layouts.
    pub fn copy_size(self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            Self::Planar420 => Some(pixels * 3 / 2),
            Self::Packed422 => Some(pixels * 2),
            Self::ZeroCopyMacroblock | Self::ZeroCopyPacked => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImageType {
    Rgb,
    Yuv,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ByteOrder {
    LsbFirst,
    MsbFirst,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ImageFormat {
    Packed,
    Planar,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScanlineOrder {
    TopToBottom,
    BottomToTop,
}

/// A video format together with the image record the server advertises for
/// it.
pub struct VideoFormat {
    pub name: &'static str,
    pub fourcc: FourCc,
    pub blt: BltFmt,
    pub layout: VideoLayout,
    pub image_type: ImageType,
    pub byte_order: ByteOrder,
    pub guid: [u8; 16],
    pub bits_per_pixel: u32,
    pub format: ImageFormat,
    pub num_planes: u32,
    /// Bits per Y, U and V sample.
    pub sample_bits: [u32; 3],
    /// Horizontal subsampling period of Y, U and V.
    pub horz_period: [u32; 3],
    /// Vertical subsampling period of Y, U and V.
    pub vert_period: [u32; 3],
    pub component_order: &'static str,
    pub scanline_order: ScanlineOrder,
}

impl Debug for VideoFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFormat")
            .field("name", &self.name)
            .field("blt", &self.blt)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl PartialEq for VideoFormat {
    fn eq(&self, other: &Self) -> bool {
        self.fourcc == other.fourcc
    }
}

impl Eq for VideoFormat {}

const fn guid(fourcc: FourCc) -> [u8; 16] {
    let b = fourcc.to_le_bytes();
    [
        b[0], b[1], b[2], b[3], 0x00, 0x00, 0x00, 0x10, 0x80, 0x00, 0x00, 0xaa, 0x00, 0x38, 0x9b,
        0x71,
    ]
}

const fn yuv(
    name: &'static str,
    fourcc: FourCc,
    blt: BltFmt,
    layout: VideoLayout,
    format: ImageFormat,
    component_order: &'static str,
) -> VideoFormat {
    let (bits_per_pixel, num_planes, vert_period) = match layout {
        VideoLayout::Planar420 => (12, 3, [1, 2, 2]),
        VideoLayout::ZeroCopyMacroblock => (12, 3, [1, 2, 2]),
        VideoLayout::Packed422 | VideoLayout::ZeroCopyPacked => (16, 1, [1, 1, 1]),
    };
    VideoFormat {
        name,
        fourcc,
        blt,
        layout,
        image_type: ImageType::Yuv,
        byte_order: ByteOrder::LsbFirst,
        guid: guid(fourcc),
        bits_per_pixel,
        format,
        num_planes,
        sample_bits: [8, 8, 8],
        horz_period: [1, 2, 2],
        vert_period,
        component_order,
        scanline_order: ScanlineOrder::TopToBottom,
    }
}

pub static VIDEO_FORMATS: &[VideoFormat] = &[
    yuv(
        "YV12",
        FOURCC_YV12,
        BltFmt::Yvu420PackedPlanar,
        VideoLayout::Planar420,
        ImageFormat::Planar,
        "YVU",
    ),
    yuv(
        "I420",
        FOURCC_I420,
        BltFmt::Yuv420PackedPlanar,
        VideoLayout::Planar420,
        ImageFormat::Planar,
        "YUV",
    ),
    yuv(
        "UYVY",
        FOURCC_UYVY,
        BltFmt::CbYCrY,
        VideoLayout::Packed422,
        ImageFormat::Packed,
        "UYVY",
    ),
    yuv(
        "YUY2",
        FOURCC_YUY2,
        BltFmt::YCbYCr,
        VideoLayout::Packed422,
        ImageFormat::Packed,
        "YUYV",
    ),
    // The macroblock layout is reported as packed since the server never
    // touches the planes.
    yuv(
        "YUMB",
        FOURCC_YUMB,
        BltFmt::Yuv420PackedSemiplanarMbSte,
        VideoLayout::ZeroCopyMacroblock,
        ImageFormat::Packed,
        "YVU",
    ),
    yuv(
        "STE0",
        FOURCC_STE0,
        BltFmt::CbYCrY,
        VideoLayout::ZeroCopyPacked,
        ImageFormat::Packed,
        "STE0",
    ),
];

static VIDEO_FORMATS_MAP: LazyLock<AHashMap<FourCc, &'static VideoFormat>> = LazyLock::new(|| {
    let mut map = AHashMap::new();
    for format in VIDEO_FORMATS {
        assert!(map.insert(format.fourcc, format).is_none());
    }
    map
});

pub fn video_format(fourcc: FourCc) -> Option<&'static VideoFormat> {
    VIDEO_FORMATS_MAP.get(&fourcc).copied()
}

/// How the engine reads a video frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VideoSource {
    pub fmt: BltFmt,
    pub zero_copy: bool,
}

impl VideoSource {
    pub const UNKNOWN: Self = Self {
        fmt: BltFmt::Unused,
        zero_copy: false,
    };
}

/// Maps a fourcc onto the way the engine has to read frames of that format.
pub fn blt_source_for_fourcc(fourcc: FourCc) -> VideoSource {
    match video_format(fourcc) {
        Some(f) => VideoSource {
            fmt: f.blt,
            zero_copy: f.layout.is_zero_copy(),
        },
        None => {
            log::warn!("Unknown video format {}", FourCcFmt(fourcc));
            VideoSource::UNKNOWN
        }
    }
}
