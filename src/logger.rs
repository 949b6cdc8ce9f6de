use {
    crate::utils::{errorfmt::ErrorFmt, oserror::OsError},
    backtrace::Backtrace,
    log::{Level, Log, Metadata, Record, SetLoggerError},
    std::{
        io::Write,
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering::Relaxed},
        },
        time::SystemTime,
    },
    thiserror::Error,
    uapi::{Fd, OwnedFd},
};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Could not dup stderr")]
    Dup(#[source] OsError),
    #[error("A logger is already installed")]
    AlreadyInstalled(#[source] SetLoggerError),
}

/// Writes log records to a file descriptor, one line per record.
///
/// The display server redirects stderr into its own log file, so records
/// emitted here end up next to the server's messages.
pub struct Logger {
    level: AtomicU32,
    file: OwnedFd,
}

impl Logger {
    pub fn install_stderr(level: Level) -> Result<Arc<Self>, LoggerError> {
        let file = match uapi::fcntl_dupfd_cloexec(2, 0) {
            Ok(fd) => fd,
            Err(e) => return Err(LoggerError::Dup(e.into())),
        };
        let slf = Arc::new(Self {
            level: AtomicU32::new(level as _),
            file,
        });
        let wrapper = LogWrapper {
            logger: slf.clone(),
        };
        if let Err(e) = log::set_boxed_logger(Box::new(wrapper)) {
            return Err(LoggerError::AlreadyInstalled(e));
        }
        log::set_max_level(level.to_level_filter());
        install_panic_hook();
        Ok(slf)
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level as _, Relaxed);
        log::set_max_level(level.to_level_filter());
    }

    fn enabled(&self, level: Level) -> bool {
        level as u32 <= self.level.load(Relaxed)
    }
}

/// Installs the logger unless another one is already active. Failures are
/// reported to stderr since there is no logger to report them to.
pub fn try_install(level: Level) -> Option<Arc<Logger>> {
    match Logger::install_stderr(level) {
        Ok(l) => Some(l),
        Err(e) => {
            eprintln!("hwblit: Could not install the logger: {}", ErrorFmt(e));
            None
        }
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|p| {
        match p.location() {
            Some(loc) => log::error!(
                "Panic at {} line {} column {}",
                loc.file(),
                loc.line(),
                loc.column()
            ),
            None => log::error!("Panic at unknown location"),
        }
        if let Some(msg) = p.payload().downcast_ref::<&str>() {
            log::error!("Message: {}", msg);
        }
        if let Some(msg) = p.payload().downcast_ref::<String>() {
            log::error!("Message: {}", msg);
        }
        log::error!("Backtrace:\n{:?}", Backtrace::new());
    }));
}

struct LogWrapper {
    logger: Arc<Logger>,
}

impl Log for LogWrapper {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.logger.enabled(metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.logger.enabled(record.level()) {
            return;
        }
        let mut buffer = Vec::with_capacity(128);
        let now = humantime::format_rfc3339_millis(SystemTime::now());
        let _ = match record.module_path() {
            Some(mp) => writeln!(
                buffer,
                "[{} {:5} {}] {}",
                now,
                record.level(),
                mp,
                record.args(),
            ),
            None => writeln!(buffer, "[{} {:5}] {}", now, record.level(), record.args()),
        };
        let mut fd = Fd::new(self.logger.file.raw());
        let _ = fd.write_all(&buffer);
    }

    fn flush(&self) {
        // nothing
    }
}
