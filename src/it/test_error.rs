use {
    crate::utils::errorfmt::ErrorFmt,
    std::{
        error::Error,
        fmt::{Debug, Display, Formatter},
    },
};

pub type TestResult<T = ()> = Result<T, TestError>;

/// A test failure: a message plus the messages of everything that caused it.
pub struct TestError {
    chain: Vec<String>,
}

impl TestError {
    pub fn new<D: Display>(d: D) -> Self {
        Self {
            chain: vec![d.to_string()],
        }
    }

    fn context<D: Display>(mut self, d: D) -> Self {
        self.chain.insert(0, d.to_string());
        self
    }
}

impl Debug for TestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.chain).finish()
    }
}

impl Display for TestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.chain.join(": "))
    }
}

impl<E: Error> From<E> for TestError {
    fn from(e: E) -> Self {
        Self::new(ErrorFmt(e))
    }
}

pub trait TestErrorExt<T> {
    fn with_context<D, F>(self, f: F) -> TestResult<T>
    where
        D: Display,
        F: FnOnce() -> D;
}

impl<T, E: Into<TestError>> TestErrorExt<T> for Result<T, E> {
    fn with_context<D, F>(self, f: F) -> TestResult<T>
    where
        D: Display,
        F: FnOnce() -> D,
    {
        self.map_err(|e| e.into().context(f()))
    }
}
