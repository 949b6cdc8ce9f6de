use {
    crate::{
        blit::BltBuf,
        format::{BltFmt, FOURCC_I420, FOURCC_STE0, FOURCC_YUMB},
        it::{test_error::TestResult, testrun::TestRun},
        video::{PutImage, VideoError},
    },
    hwblit_algorithms::rect::Rect,
    std::rc::Rc,
};

testcase!();

fn descriptor(physical: u32) -> Vec<u8> {
    let mut buf = vec![];
    for v in [1u32, 0xb000_0000, physical, 100 * 50 * 3 / 2] {
        buf.extend_from_slice(&v.to_ne_bytes());
    }
    buf
}

fn test(run: Rc<TestRun>) -> TestResult {
    let screen = run.create_primary(800, 600, 32)?;
    let adaptor = run.driver.video_adaptor();
    let Some(port) = adaptor.port(0) else {
        bail!("The adaptor has no port");
    };
    let desc = descriptor(0x1234_0000);
    let mut img = PutImage {
        src: Rect::new(0, 0, 100, 50),
        dst: Rect::new(0, 0, 200, 100),
        fourcc: FOURCC_YUMB,
        buf: &desc,
        width: 100,
        height: 50,
        clip: &[],
        drawable: screen,
        drawable_size: (800, 600),
    };
    port.put_image(&img)?;
    tassert_eq!(run.events.allocs(), 0);
    let Some(req) = run.engine.last_request() else {
        bail!("No request was submitted");
    };
    tassert_eq!(req.src_img.fmt, BltFmt::Yuv420PackedSemiplanarMbSte);
    tassert_eq!(req.src_img.buf, BltBuf::Physical { addr: 0x1234_0000 });
    tassert_eq!((req.src_img.width, req.src_img.height), (112, 64));
    tassert_eq!(req.src_img.pitch, 0);
    tassert_eq!(req.referenced_names().len(), 1);

    img.fourcc = FOURCC_STE0;
    port.put_image(&img)?;
    tassert_eq!(run.events.allocs(), 0);
    tassert!(!port.state.borrow().staging_valid());

    let short = [0u8; 8];
    img.buf = &short;
    tassert!(matches!(
        port.put_image(&img),
        Err(VideoError::FrameDescriptor(_))
    ));

    img.fourcc = 0x3232_3232;
    tassert!(matches!(
        port.put_image(&img),
        Err(VideoError::UnknownFormat(_))
    ));

    tassert_eq!(port.query_image_attributes(FOURCC_I420, 64, 48).size, 4608);
    tassert_eq!(port.query_best_size((64, 48), 100, 50), (112, 64));
    tassert_eq!(port.query_best_size((64, 48), 5000, 5000), (1920, 1280));
    tassert_eq!(port.get_port_attribute("XV_COLORKEY"), None);
    port.set_port_attribute("XV_COLORKEY", 7)?;
    port.stop(false);
    Ok(())
}
