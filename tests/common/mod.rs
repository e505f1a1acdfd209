#![allow(dead_code, unused_imports)]

pub use chainsvc_test_utils::builders::BANNER_LINE;
pub use chainsvc_test_utils::{
    FakeDownloader, FakeLauncher, Harness, HarnessBuilder, RecordingNotifier, init_tracing,
    with_timeout,
};
