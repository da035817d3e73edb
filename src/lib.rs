//! Shared bootstrap for the `mr-fetcher` and `mr-analyzer` binaries.

pub mod telemetry;
