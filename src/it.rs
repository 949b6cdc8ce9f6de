use {
    crate::it::{testrun::TestRun, tests::TestCase},
    isnt::std_1::vec::IsntVecExt,
    log::Level,
    std::{rc::Rc, sync::Once, time::SystemTime},
    uapi::c,
};

mod test_error;
#[macro_use]
mod test_macros;
pub mod test_blt_engine;
pub mod test_buffer_device;
mod test_display;
pub mod test_events;
mod test_logger;
mod testrun;
mod tests;

static INSTALL_LOGGER: Once = Once::new();

fn run_tests_(tests: Vec<&'static dyn TestCase>) {
    INSTALL_LOGGER.call_once(|| {
        test_logger::install();
        test_logger::set_level(Level::Trace);
    });
    let path = format!(
        "{}/testruns/{}",
        env!("CARGO_MANIFEST_DIR"),
        humantime::format_rfc3339_millis(SystemTime::now())
    );
    let mut failed = vec![];
    for test in tests {
        let errors = run_test(&path, test);
        if errors.is_not_empty() {
            failed.push((test.name(), errors));
        }
    }
    if failed.is_not_empty() {
        log::error!("The following tests failed:");
        for (name, errors) in &failed {
            log::error!("    {}:", name);
            for error in errors {
                log::error!("        {}", error);
            }
        }
        panic!("Some tests failed");
    }
}

fn run_test(path: &str, test: &'static dyn TestCase) -> Vec<String> {
    log::info!("Running {}", test.name());
    let dir = format!("{}/{}", path, test.name());
    let _ = std::fs::create_dir_all(&dir);
    let log_path = format!("{}/log", dir);
    if let Ok(file) = uapi::open(log_path.as_str(), c::O_WRONLY | c::O_CREAT | c::O_CLOEXEC, 0o644)
    {
        test_logger::set_file(Rc::new(file));
    }
    let mut errors = vec![];
    let run = TestRun::new();
    let events = run.events.clone();
    let dev = run.dev.clone();
    if let Err(e) = test.run(run) {
        errors.push(e.to_string());
    }
    if let Err(e) = events.check_drain_before_release() {
        errors.push(e.to_string());
    }
    let leaked = dev.live_handles();
    if leaked.is_not_empty() {
        errors.push(format!("Buffers were not released: {:?}", leaked));
    }
    if errors.is_not_empty() {
        log::error!("The following errors occurred:");
        for e in &errors {
            log::error!("    {}", e);
        }
    }
    test_logger::unset_file();
    errors
}
