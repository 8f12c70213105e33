//! # Configuration
//!
//! Environment-driven knobs and the filesystem layout contract shared with
//! the PCP MMV PMDA. The PMDA discovers files under `$PCP_TMP_DIR/mmv/`, so
//! both sides must resolve the same base directory.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `PCP_TMP_DIR` | Base directory for the `mmv/` file directory | `/var/tmp` |
//! | `MMV_MAXSTRSIZE` | Per-slot size of interned strings, in bytes | 256 |
//!
//! The string slot size is captured once per [`Client`](crate::client::Client)
//! at construction, so a mid-run environment change cannot desynchronize the
//! layout from the live update path.

use std::env;
use std::path::PathBuf;

use crate::format::STRING_BLOCK_LEN;

/// Smallest usable string slot: one content byte plus the trailing NUL.
pub const MIN_STRING_SIZE: usize = 2;

/// Base temporary directory shared with the PCP installation.
pub fn tmp_dir() -> PathBuf {
    env::var_os("PCP_TMP_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/tmp"))
}

/// Directory the MMV PMDA scans for mapped files.
pub fn mmv_dir() -> PathBuf {
    tmp_dir().join("mmv")
}

/// Full path of the mapped file for a client named `name`.
pub fn mmv_path(name: &str) -> PathBuf {
    mmv_dir().join(name)
}

/// Per-slot string size, overridable through `MMV_MAXSTRSIZE`.
///
/// Unparseable or absurdly small overrides fall back to the v1 default.
pub fn max_string_size() -> usize {
    env::var("MMV_MAXSTRSIZE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n >= MIN_STRING_SIZE)
        .unwrap_or(STRING_BLOCK_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_size_defaults_to_v1_block() {
        // MMV_MAXSTRSIZE is only touched by this test in the unit-test binary.
        env::remove_var("MMV_MAXSTRSIZE");
        assert_eq!(max_string_size(), STRING_BLOCK_LEN);

        env::set_var("MMV_MAXSTRSIZE", "1024");
        assert_eq!(max_string_size(), 1024);

        env::set_var("MMV_MAXSTRSIZE", "1");
        assert_eq!(max_string_size(), STRING_BLOCK_LEN);

        env::set_var("MMV_MAXSTRSIZE", "not a number");
        assert_eq!(max_string_size(), STRING_BLOCK_LEN);

        env::remove_var("MMV_MAXSTRSIZE");
    }

    #[test]
    fn mmv_path_lands_under_the_mmv_directory() {
        let p = mmv_path("test.client");
        assert!(p.ends_with("mmv/test.client"));
    }
}
