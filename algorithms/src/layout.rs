
/// Rounds `value` up to the next multiple of `align`, which must be a power
/// of two.
pub const fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + (align - 1)) & !(align - 1)
}

/// The number of bytes in a row of `width` pixels of `bpp` bits, padded to
/// `align` bytes.
pub const fn row_pitch(width: u32, bpp: u32, align: u32) -> u32 {
    align_up((width * bpp).div_ceil(8), align)
}

/// The number of bytes used by one pixel of `bpp` bits.
pub const fn bytes_per_pixel(bpp: u32) -> u32 {
    bpp.div_ceil(8)
}

pub const MAX_PLANES: usize = 3;

/// Memory layout of a video image in client memory.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    pub size: u32,
    pub num_planes: usize,
    pub pitches: [u32; MAX_PLANES],
    pub offsets: [u32; MAX_PLANES],
}

impl ImageLayout {
    pub fn pitches(&self) -> &[u32] {
        &self.pitches[..self.num_planes]
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets[..self.num_planes]
    }
}

/// Layout of a three-plane 4:2:0 image.
///
/// The height is rounded up to an even number of rows. Each plane has its
/// pitch aligned to four bytes and the chroma planes follow the luma plane.
pub fn planar_420(width: u32, height: u32) -> ImageLayout {
    let height = (height + 1) & !1;
    let luma_pitch = align_up(width, 4);
    let luma_size = luma_pitch * height;
    let chroma_pitch = align_up(width >> 1, 4);
    let chroma_size = chroma_pitch * (height >> 1);
    ImageLayout {
        width,
        height,
        size: luma_size + 2 * chroma_size,
        num_planes: 3,
        pitches: [luma_pitch, chroma_pitch, chroma_pitch],
        offsets: [0, luma_size, luma_size + chroma_size],
    }
}

/// Layout of a single-plane image with two bytes per pixel.
pub fn packed_422(width: u32, height: u32) -> ImageLayout {
    let pitch = width << 1;
    ImageLayout {
        width,
        height,
        size: pitch * height,
        num_planes: 1,
        pitches: [pitch, 0, 0],
        offsets: [0; MAX_PLANES],
    }
}

/// Layout of an image whose planes are described out of band. Only the
/// total size is known.
pub fn opaque(width: u32, height: u32, size: u32) -> ImageLayout {
    ImageLayout {
        width,
        height,
        size,
        num_planes: 1,
        pitches: [0; MAX_PLANES],
        offsets: [0; MAX_PLANES],
    }
}
