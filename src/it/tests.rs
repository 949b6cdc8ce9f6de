use {
    crate::it::{test_error::TestResult, testrun::TestRun},
    std::rc::Rc,
};

macro_rules! testcase {
    () => {
        pub struct Test;

        impl crate::it::tests::TestCase for Test {
            fn name(&self) -> &'static str {
                let path = module_path!();
                path.strip_prefix("hwblit::it::tests::").unwrap_or(path)
            }

            fn run(
                &self,
                run: std::rc::Rc<crate::it::testrun::TestRun>,
            ) -> crate::it::test_error::TestResult {
                test(run)
            }
        }

        #[test]
        fn single() {
            crate::it::run_tests_(vec![&Test])
        }
    };
}

mod t0003_disjoint_copy;
mod t0009_video_zero_copy;

pub trait TestCase: Sync {
    fn name(&self) -> &'static str;
    fn run(&self, run: Rc<TestRun>) -> TestResult;
}
