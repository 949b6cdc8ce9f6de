
use {
    crate::{gate::RetryPolicy, utils::errorfmt::ErrorFmt},
    linearize::{Linearize, LinearizeExt},
    log::Level,
    std::{num::ParseIntError, str::FromStr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown option `{0}`")]
    UnknownOption(String),
    #[error("Option {0} expects an integer but got `{1}`")]
    InvalidInteger(&'static str, String, #[source] ParseIntError),
    #[error("Option {0} expects a duration but got `{1}`")]
    InvalidDuration(&'static str, String, #[source] humantime::DurationError),
    #[error("Option {0} expects a log level but got `{1}`")]
    InvalidLevel(&'static str, String, #[source] log::ParseLevelError),
    #[error("Option {0} must not be {1}")]
    OutOfRange(&'static str, u64),
    #[error("Option {0} must not be empty")]
    Empty(&'static str),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Linearize)]
pub enum DriverOption {
    BlitRetryLimit,
    BlitRetryTimeout,
    HwmemDevice,
    BltLibrary,
    FbDevice,
    LogLevel,
    VideoPriority,
}

impl DriverOption {
    pub fn name(self) -> &'static str {
        match self {
            Self::BlitRetryLimit => "BlitRetryLimit",
            Self::BlitRetryTimeout => "BlitRetryTimeout",
            Self::HwmemDevice => "HwmemDevice",
            Self::BltLibrary => "BltLibrary",
            Self::FbDevice => "FbDevice",
            Self::LogLevel => "LogLevel",
            Self::VideoPriority => "VideoPriority",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Self::BlitRetryLimit => "HWBLIT_BLIT_RETRY_LIMIT",
            Self::BlitRetryTimeout => "HWBLIT_BLIT_RETRY_TIMEOUT",
            Self::HwmemDevice => "HWBLIT_HWMEM_DEVICE",
            Self::BltLibrary => "HWBLIT_BLT_LIBRARY",
            Self::FbDevice => "HWBLIT_FB_DEVICE",
            Self::LogLevel => "HWBLIT_LOG_LEVEL",
            Self::VideoPriority => "HWBLIT_VIDEO_PRIORITY",
        }
    }

    /// Option names are matched like the server matches them: ignoring
    /// case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::variants().find(|o| o.name().eq_ignore_ascii_case(name))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DriverConfig {
    pub retry: RetryPolicy,
    pub hwmem_device: String,
    pub blt_library: String,
    pub fb_device: String,
    pub log_level: Level,
    pub video_priority: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            hwmem_device: "/dev/hwmem".to_string(),
            blt_library: "libblt_hw.so".to_string(),
            fb_device: "/dev/fb0".to_string(),
            log_level: Level::Info,
            video_priority: 4,
        }
    }
}

fn parse_int<T: FromStr<Err = ParseIntError>>(
    opt: DriverOption,
    value: &str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidInteger(opt.name(), value.to_string(), e))
}

fn parse_path(opt: DriverOption, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Empty(opt.name()));
    }
    Ok(value.to_string())
}

impl DriverConfig {
    /// Builds the configuration from the options of the device section and
    /// the environment.
    pub fn load<'a>(options: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut config = Self::from_options(options);
        config.apply_env_from(|name| std::env::var(name).ok());
        config
    }

    /// Invalid options are logged and ignored.
    pub fn from_options<'a>(options: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut config = Self::default();
        for (name, value) in options {
            let res = match DriverOption::from_name(name) {
                Some(opt) => config.set(opt, value),
                None => Err(ConfigError::UnknownOption(name.to_string())),
            };
            if let Err(e) = res {
                log::warn!("Ignoring option: {}", ErrorFmt(e));
            }
        }
        config
    }

    pub fn apply_env_from(&mut self, get: impl Fn(&str) -> Option<String>) {
        for opt in DriverOption::variants() {
            let Some(value) = get(opt.env_var()) else {
                continue;
            };
            if let Err(e) = self.set(opt, &value) {
                log::warn!("Ignoring {}: {}", opt.env_var(), ErrorFmt(e));
            }
        }
    }

    pub fn set(&mut self, opt: DriverOption, value: &str) -> Result<(), ConfigError> {
        match opt {
            DriverOption::BlitRetryLimit => {
                let limit: u32 = parse_int(opt, value)?;
                if limit == 0 {
                    return Err(ConfigError::OutOfRange(opt.name(), 0));
                }
                self.retry.limit = limit;
            }
            DriverOption::BlitRetryTimeout => {
                let timeout = match humantime::parse_duration(value.trim()) {
                    Ok(t) => t,
                    Err(e) => {
                        return Err(ConfigError::InvalidDuration(
                            opt.name(),
                            value.to_string(),
                            e,
                        ));
                    }
                };
                if timeout == Duration::ZERO {
                    return Err(ConfigError::OutOfRange(opt.name(), 0));
                }
                self.retry.timeout = timeout;
            }
            DriverOption::HwmemDevice => self.hwmem_device = parse_path(opt, value)?,
            DriverOption::BltLibrary => self.blt_library = parse_path(opt, value)?,
            DriverOption::FbDevice => self.fb_device = parse_path(opt, value)?,
            DriverOption::LogLevel => {
                self.log_level = value
                    .trim()
                    .parse()
                    .map_err(|e| ConfigError::InvalidLevel(opt.name(), value.to_string(), e))?;
            }
            DriverOption::VideoPriority => self.video_priority = parse_int(opt, value)?,
        }
        Ok(())
    }
}
