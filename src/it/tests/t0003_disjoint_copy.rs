use {
    crate::{
        blit::BLT_FLAG_ASYNCH,
        driver::AccelDriver,
        it::{test_error::TestResult, testrun::TestRun},
    },
    hwblit_algorithms::rect::Rect,
    std::rc::Rc,
};

testcase!();

fn test(run: Rc<TestRun>) -> TestResult {
    let id = run.create_surface(200, 200, 16)?;
    run.driver.prepare_copy(id, id, 1, 1, 3, !0)?;
    run.driver.copy(id, 0, 0, 60, 60, 50, 50);
    run.driver.done_copy(id);
    tassert_eq!(run.events.requests(), 1);
    let Some(req) = run.engine.last_request() else {
        bail!("No request was submitted");
    };
    tassert_eq!(req.flags, BLT_FLAG_ASYNCH);
    tassert_eq!(req.src_rect, Rect::new(0, 0, 50, 50));
    tassert_eq!(req.dst_rect, Rect::new(60, 60, 50, 50));
    tassert_eq!(req.dst_clip_rect, Rect::new(60, 60, 50, 50));
    tassert_eq!(req.src_img, req.dst_img);

    let other = run.create_surface(64, 64, 16)?;
    run.driver.prepare_copy(other, id, 1, 1, 3, !0)?;
    run.driver.copy(id, 0, 0, 10, 10, 64, 64);
    run.driver.done_copy(id);
    tassert_eq!(run.events.requests(), 2);
    let Some(req) = run.engine.last_request() else {
        bail!("No request was submitted");
    };
    tassert_eq!(req.src_img.name(), run.surface(other)?.buffer_name());
    tassert_eq!(req.dst_img.name(), run.surface(id)?.buffer_name());
    tassert_eq!(run.events.synchs(), 2);
    Ok(())
}
