#![allow(non_camel_case_types)]

use {
    crate::blit::{BltBuf, BltImage, BltRequest},
    hwblit_algorithms::rect::Rect,
    std::{mem, ptr},
    uapi::c,
};

pub const BLT_PTR_NONE: u32 = 0;
pub const BLT_PTR_PHYSICAL: u32 = 2;
pub const BLT_PTR_HWMEM_BUF_NAME_OFFSET: u32 = 4;

#[repr(C)]
pub struct blt_rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[repr(C)]
pub struct blt_buf {
    pub type_: u32,
    pub hwmem_buf_name: i32,
    pub fd: i32,
    pub offset: u32,
    pub len: u32,
    pub bits: *mut c::c_void,
}

#[repr(C)]
pub struct blt_img {
    pub fmt: u32,
    pub buf: blt_buf,
    pub width: i32,
    pub height: i32,
    pub pitch: u32,
}

#[repr(C)]
pub struct blt_req {
    pub size: u32,
    pub flags: u32,
    pub transform: u32,
    pub prio: u32,
    pub src_color: u32,
    pub src_img: blt_img,
    pub src_mask: blt_img,
    pub src_rect: blt_rect,
    pub dst_img: blt_img,
    pub dst_rect: blt_rect,
    pub dst_clip_rect: blt_rect,
    pub global_alpha: u32,
    pub report1: u32,
    pub report2: u32,
}

fn rect(r: &Rect) -> blt_rect {
    blt_rect {
        x: r.x,
        y: r.y,
        width: r.width,
        height: r.height,
    }
}

fn img(i: &BltImage) -> blt_img {
    let (type_, name, offset) = match i.buf {
        BltBuf::None => (BLT_PTR_NONE, 0, 0),
        BltBuf::HwmemName { name, offset } => (BLT_PTR_HWMEM_BUF_NAME_OFFSET, name.0, offset),
        BltBuf::Physical { addr } => (BLT_PTR_PHYSICAL, 0, addr),
    };
    blt_img {
        fmt: i.fmt.raw(),
        buf: blt_buf {
            type_,
            hwmem_buf_name: name,
            fd: 0,
            offset,
            len: 0,
            bits: ptr::null_mut(),
        },
        width: i.width,
        height: i.height,
        pitch: i.pitch,
    }
}

pub fn blt_req(req: &BltRequest) -> blt_req {
    blt_req {
        size: mem::size_of::<blt_req>() as u32,
        flags: req.flags.raw(),
        transform: req.transform as u32,
        prio: req.prio,
        src_color: req.src_color,
        src_img: img(&req.src_img),
        src_mask: img(&req.src_mask),
        src_rect: rect(&req.src_rect),
        dst_img: img(&req.dst_img),
        dst_rect: rect(&req.dst_rect),
        dst_clip_rect: rect(&req.dst_clip_rect),
        global_alpha: req.global_alpha,
        report1: 0,
        report2: 0,
    }
}
