//! Switchboard Test
//!
//! In-memory fakes for every backend interface. Each fake records its calls
//! in a [`CallLog`], answers canned responses before falling back to its own
//! state, and counts the writes it applied so tests can assert that a
//! rejected call reached nothing.

pub mod calls;
pub mod containers;
pub mod fixtures;
pub mod packages;
pub mod process;
pub mod vcs;

pub use calls::{CallLog, CallRecord, Recorder, Stubs};
pub use containers::FakeContainers;
pub use fixtures::{server_record, test_context, FakeBackends};
pub use packages::FakePackageManager;
pub use process::FakeProcessExecutor;
pub use vcs::{FakeVersionControl, FakeWorkspace};
