// Copyright (c) 2024 Mike Tsao

//! Version information for log banners and `--version`.

/// The crate version, or the version-control description of the build if the
/// build environment supplied one (`GIT_DESCRIBE`, then `GIT_REV_PARSE`).
pub fn app_version() -> &'static str {
    option_env!("GIT_DESCRIBE")
        .or(option_env!("GIT_REV_PARSE"))
        .unwrap_or(env!("CARGO_PKG_VERSION"))
}
