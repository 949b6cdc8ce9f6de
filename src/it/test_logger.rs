use {
    log::{Level, LevelFilter, Log, Metadata, Record},
    std::{
        cell::RefCell,
        io::Write,
        rc::Rc,
        sync::atomic::{AtomicUsize, Ordering},
        time::SystemTime,
    },
    uapi::{Fd, OwnedFd},
};

static LEVEL: AtomicUsize = AtomicUsize::new(Level::Info as usize);

thread_local! {
    static FILE: RefCell<Option<Rc<OwnedFd>>> = const { RefCell::new(None) };
}

pub fn install() {
    if log::set_logger(&TestLogger).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

pub fn set_level(level: Level) {
    LEVEL.store(level as usize, Ordering::Relaxed);
    log::set_max_level(level.to_level_filter());
}

pub fn set_file(file: Rc<OwnedFd>) {
    FILE.with(|f| *f.borrow_mut() = Some(file));
}

pub fn unset_file() {
    FILE.with(|f| f.borrow_mut().take());
}

struct TestLogger;

impl Log for TestLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() as usize <= LEVEL.load(Ordering::Relaxed)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "[{} {:5} {}] {}\n",
            humantime::format_rfc3339_millis(SystemTime::now()),
            record.level(),
            record.module_path().unwrap_or("?"),
            record.args(),
        );
        let file = FILE.with(|f| f.borrow().clone());
        let mut fd = match &file {
            Some(f) => f.borrow(),
            None => Fd::new(2),
        };
        let _ = fd.write_all(line.as_bytes());
    }

    fn flush(&self) {}
}
