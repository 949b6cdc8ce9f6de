
use {
    crate::{
        hwmem::GlobalName,
        utils::{
            ioctl::{ioctl, ioctl_arg},
            oserror::OsError,
        },
    },
    hwblit_algorithms::rect::Rect,
    std::{
        cell::{Cell, RefCell},
        ptr::NonNull,
        rc::Rc,
    },
    thiserror::Error,
    uapi::{OwnedFd, c},
};

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Could not open {0}")]
    Open(String, #[source] OsError),
    #[error("Could not read the variable screen info")]
    GetVarScreenInfo(#[source] OsError),
    #[error("Could not update the variable screen info")]
    PutVarScreenInfo(#[source] OsError),
    #[error("Could not query the global name of the framebuffer")]
    BufferName(#[source] OsError),
}

/// The parts of the display the blit paths depend on.
pub trait Display {
    /// The global name under which the scanout buffer can be imported.
    fn framebuffer_name(&self) -> Result<GlobalName, DisplayError>;
    /// The CPU address the server uses for the pixels of the screen.
    fn framebuffer_ptr(&self) -> Option<NonNull<u8>>;
    fn screen_size(&self) -> (i32, i32);
    /// The first line of the scanout buffer that is currently displayed.
    fn scan_offset(&self) -> i32;
    /// Pans back to the top of the scanout buffer and forces the controller
    /// to apply the change.
    fn reset_scan_offset(&self) -> Result<(), DisplayError>;
    fn damage(&self, rects: &[Rect]);
}

/// Damage reports are merged into their bounding box once this many are
/// pending.
const MAX_DAMAGE_RECTS: usize = 16;

const FBIOGET_VSCREENINFO: u64 = 0x4600;
const FBIOPUT_VSCREENINFO: u64 = 0x4601;
const FB_ACTIVATE_FORCE: u32 = 128;
const MCDE_GET_BUFFER_NAME_IOC: u64 = uapi::_IO(b'M' as u64, 1);

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
#[allow(non_camel_case_types)]
struct fb_bitfield {
    offset: u32,
    length: u32,
    msb_right: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
#[allow(non_camel_case_types)]
struct fb_var_screeninfo {
    xres: u32,
    yres: u32,
    xres_virtual: u32,
    yres_virtual: u32,
    xoffset: u32,
    yoffset: u32,
    bits_per_pixel: u32,
    grayscale: u32,
    red: fb_bitfield,
    green: fb_bitfield,
    blue: fb_bitfield,
    transp: fb_bitfield,
    nonstd: u32,
    activate: u32,
    height: u32,
    width: u32,
    accel_flags: u32,
    pixclock: u32,
    left_margin: u32,
    right_margin: u32,
    upper_margin: u32,
    lower_margin: u32,
    hsync_len: u32,
    vsync_len: u32,
    sync: u32,
    vmode: u32,
    rotate: u32,
    colorspace: u32,
    reserved: [u32; 4],
}

/// A linux framebuffer device driven by the MCDE display controller.
pub struct Fbdev {
    fd: OwnedFd,
    var: RefCell<fb_var_screeninfo>,
    fb_ptr: Cell<Option<NonNull<u8>>>,
    damage: RefCell<Vec<Rect>>,
}

impl Fbdev {
    pub fn open(path: &str) -> Result<Rc<Self>, DisplayError> {
        let fd = match uapi::open(path, c::O_RDWR | c::O_CLOEXEC, 0) {
            Ok(fd) => fd,
            Err(e) => return Err(DisplayError::Open(path.to_string(), e.into())),
        };
        let slf = Rc::new(Self {
            fd,
            var: Default::default(),
            fb_ptr: Cell::new(None),
            damage: Default::default(),
        });
        slf.refresh()?;
        let var = *slf.var.borrow();
        log::info!(
            "Framebuffer {}: {}x{} ({}x{} virtual), {} bpp",
            path,
            var.xres,
            var.yres,
            var.xres_virtual,
            var.yres_virtual,
            var.bits_per_pixel,
        );
        Ok(slf)
    }

    /// Re-reads the screen info after the server changed the mode or panned.
    pub fn refresh(&self) -> Result<(), DisplayError> {
        let mut var = fb_var_screeninfo::default();
        if let Err(e) = unsafe { ioctl(self.fd.raw(), FBIOGET_VSCREENINFO, &mut var) } {
            return Err(DisplayError::GetVarScreenInfo(e));
        }
        *self.var.borrow_mut() = var;
        Ok(())
    }

    /// Records the address at which the server mapped the framebuffer.
    pub fn set_framebuffer_ptr(&self, ptr: Option<NonNull<u8>>) {
        self.fb_ptr.set(ptr);
    }

    /// Returns the regions damaged by the blit paths since the last call.
    ///
    /// The server polls this once per frame. Until then reports accumulate,
    /// merged into a single box once more than `MAX_DAMAGE_RECTS` are
    /// pending.
    pub fn take_damage(&self) -> Vec<Rect> {
        self.damage.take()
    }
}

impl Display for Fbdev {
    fn framebuffer_name(&self) -> Result<GlobalName, DisplayError> {
        match ioctl_arg(self.fd.raw(), MCDE_GET_BUFFER_NAME_IOC, 0) {
            Ok(n) => Ok(GlobalName(n)),
            Err(e) => Err(DisplayError::BufferName(e)),
        }
    }

    fn framebuffer_ptr(&self) -> Option<NonNull<u8>> {
        self.fb_ptr.get()
    }

    fn screen_size(&self) -> (i32, i32) {
        let var = self.var.borrow();
        (var.xres as i32, var.yres as i32)
    }

    fn scan_offset(&self) -> i32 {
        self.var.borrow().yoffset as i32
    }

    fn reset_scan_offset(&self) -> Result<(), DisplayError> {
        let mut var = self.var.borrow_mut();
        var.yoffset = 0;
        var.activate |= FB_ACTIVATE_FORCE;
        if let Err(e) = unsafe { ioctl(self.fd.raw(), FBIOPUT_VSCREENINFO, &mut *var) } {
            return Err(DisplayError::PutVarScreenInfo(e));
        }
        Ok(())
    }

    fn damage(&self, rects: &[Rect]) {
        accumulate_damage(&mut self.damage.borrow_mut(), rects);
    }
}

fn accumulate_damage(pending: &mut Vec<Rect>, rects: &[Rect]) {
    pending.extend(rects.iter().filter(|r| !r.is_empty()));
    if pending.len() > MAX_DAMAGE_RECTS {
        let bounds = pending
            .drain(..)
            .fold(Rect::default(), |acc, r| acc.union(&r));
        pending.push(bounds);
    }
}
