
use {
    hwblit_algorithms::{layout::bytes_per_pixel, rect::Rect},
    std::ptr::{self, NonNull},
};

/// The pixels of a surface as seen by the CPU.
#[derive(Copy, Clone, Debug)]
pub struct PixelView {
    pub ptr: NonNull<u8>,
    pub width: i32,
    pub height: i32,
    pub pitch: usize,
    pub bits_per_pixel: u32,
}

impl PixelView {
    fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// Drawing state for copies the engine cannot perform.
///
/// Created on the first software copy of a batch and dropped when the batch
/// is done.
pub struct ScratchContext {
    depth: u32,
    copies: u32,
}

impl ScratchContext {
    pub fn new(depth: u32) -> Self {
        log::trace!("Creating a scratch context for depth {}", depth);
        Self { depth, copies: 0 }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn copies(&self) -> u32 {
        self.copies
    }

    /// Copies `src_rect` of `src` to `(dst_x, dst_y)` in `dst`.
    ///
    /// The rectangle is clipped against both surfaces. Source and
    /// destination may be the same memory and may overlap. Returns the
    /// rectangle that was written, if any.
    ///
    /// # Safety
    ///
    /// Both views must describe live mappings of at least
    /// `pitch * height` bytes.
    pub unsafe fn copy_area(
        &mut self,
        src: &PixelView,
        dst: &PixelView,
        src_rect: Rect,
        dst_x: i32,
        dst_y: i32,
    ) -> Option<Rect> {
        if src.bits_per_pixel != dst.bits_per_pixel {
            log::warn!(
                "Cannot copy between {} and {} bits per pixel",
                src.bits_per_pixel,
                dst.bits_per_pixel
            );
            return None;
        }
        let dx = dst_x - src_rect.x;
        let dy = dst_y - src_rect.y;
        let src_rect = src_rect.intersect(&src.bounds());
        let dst_rect = src_rect.translate(dx, dy).intersect(&dst.bounds());
        if dst_rect.is_empty() {
            return None;
        }
        let src_rect = dst_rect.translate(-dx, -dy);
        let bpp = bytes_per_pixel(src.bits_per_pixel) as usize;
        let row_len = dst_rect.width as usize * bpp;
        let rows = dst_rect.height as usize;
        let src_base = src.ptr.as_ptr();
        let dst_base = dst.ptr.as_ptr();
        let row = |base: *mut u8, pitch: usize, x: i32, y: i32, i: usize| unsafe {
            base.add((y as usize + i) * pitch + x as usize * bpp)
        };
        let copy_row = |i: usize| unsafe {
            ptr::copy(
                row(src_base, src.pitch, src_rect.x, src_rect.y, i),
                row(dst_base, dst.pitch, dst_rect.x, dst_rect.y, i),
                row_len,
            );
        };
        if src_base == dst_base && dst_rect.y > src_rect.y {
            (0..rows).rev().for_each(copy_row);
        } else {
            (0..rows).for_each(copy_row);
        }
        self.copies += 1;
        Some(dst_rect)
    }
}
