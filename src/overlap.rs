use {
    crate::{
        blit,
        driver::{DriverContext, DriverError},
        scratch::{PixelView, ScratchContext},
        surface::Surface,
    },
    hwblit_algorithms::rect::{CopyPath, Rect, copy_path},
    run_on_drop::on_drop,
    std::ptr::NonNull,
};

/// Copies `src_rect` of `src` to `(dst_x, dst_y)` of `dst` on the engine if
/// possible and on the CPU otherwise.
pub fn copy(
    ctx: &DriverContext,
    src: &Surface,
    dst: &Surface,
    src_rect: Rect,
    dst_x: i32,
    dst_y: i32,
) -> Result<CopyPath, DriverError> {
    let path = copy_path(src.id == dst.id, src_rect, dst_x, dst_y);
    match path {
        CopyPath::Hardware => hardware_copy(ctx, src, dst, src_rect, dst_x, dst_y)?,
        CopyPath::Software => software_copy(ctx, src, dst, src_rect, dst_x, dst_y)?,
    }
    Ok(path)
}

fn hardware_copy(
    ctx: &DriverContext,
    src: &Surface,
    dst: &Surface,
    src_rect: Rect,
    dst_x: i32,
    dst_y: i32,
) -> Result<(), DriverError> {
    src.ensure_buffer(&ctx.mm)?;
    dst.ensure_buffer(&ctx.mm)?;
    let dst_rect = src_rect.at(dst_x, dst_y + ctx.dst_offset(dst));
    let req = blit::copy(src.blt_image()?, dst.blt_image()?, src_rect, dst_rect);
    ctx.gate.submit(&req)?;
    Ok(())
}

fn view(surface: &Surface, ptr: NonNull<u8>) -> PixelView {
    PixelView {
        ptr,
        width: surface.width.get(),
        height: surface.height.get(),
        pitch: surface.pitch.get() as usize,
        bits_per_pixel: surface.bits_per_pixel.get(),
    }
}

fn software_copy(
    ctx: &DriverContext,
    src: &Surface,
    dst: &Surface,
    src_rect: Rect,
    dst_x: i32,
    dst_y: i32,
) -> Result<(), DriverError> {
    let src_ptr = ctx.cpu_access(src)?;
    let _finish_src = on_drop(|| src.finish_access());
    let dst_ptr = ctx.cpu_access(dst)?;
    let _finish_dst = on_drop(|| dst.finish_access());
    let mut scratch = ctx.scratch.borrow_mut();
    let depth = dst.depth.get();
    if scratch.as_ref().is_some_and(|s| s.depth() != depth) {
        scratch.take();
    }
    let scratch = scratch.get_or_insert_with(|| ScratchContext::new(depth));
    let written =
        unsafe { scratch.copy_area(&view(src, src_ptr), &view(dst, dst_ptr), src_rect, dst_x, dst_y) };
    if written.is_none() {
        log::debug!("Software copy of {:?} was clipped away", src_rect);
    }
    Ok(())
}
