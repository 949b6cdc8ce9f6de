macro_rules! bail {
    ($($tt:tt)*) => {
        return Err(crate::it::test_error::TestError::new(format!($($tt)*)))
    };
}

macro_rules! tassert {
    ($cond:expr) => {
        if !$cond {
            bail!(
                "`{}` does not hold ({}:{})",
                stringify!($cond),
                file!(),
                line!()
            );
        }
    };
}

macro_rules! tassert_eq {
    ($left:expr, $right:expr) => {{
        let left = $left;
        let right = $right;
        if left != right {
            bail!(
                "`{}` is {:?} but `{}` is {:?} ({}:{})",
                stringify!($left),
                left,
                stringify!($right),
                right,
                file!(),
                line!()
            );
        }
    }};
}
