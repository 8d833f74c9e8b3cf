//! Mock providers for tests.
//!
//! Both mocks keep their state behind a mutex, script the answers the
//! pipeline sees and record every call so tests can assert on the exact
//! requests that would have reached AWS.

mod cluster;
mod storage;

pub use cluster::MockCluster;
pub use storage::{MockStorage, StorageCall};
