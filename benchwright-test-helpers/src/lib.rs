// SPDX-License-Identifier: Apache-2.0

//! Test support: scratch directories, golden files, and stand-in simulator
//! executables for exercising the compile/run sequence without real tools.

use std::path::{Path, PathBuf};

/// Name of the log each fake tool appends its invocation to.
pub const INVOCATIONS_LOG: &str = "invocations.log";

/// Compare arbitrary text against a golden file on disk. Setting
/// BENCHWRIGHT_UPDATE_GOLDEN (or a missing/empty golden file) rewrites it.
pub fn compare_golden_text(got: &str, relpath: &str) {
    let golden_path = Path::new(relpath);
    if std::env::var("BENCHWRIGHT_UPDATE_GOLDEN").is_ok()
        || !golden_path.exists()
        || golden_path.metadata().map(|m| m.len()).unwrap_or(0) == 0
    {
        log::info!(
            "compare_golden_text; writing golden file to {}",
            golden_path.display()
        );
        std::fs::write(golden_path, got).expect("write golden");
    } else {
        log::info!(
            "compare_golden_text; reading golden file from {}",
            golden_path.display()
        );
        let want = std::fs::read_to_string(golden_path).expect("read golden");
        assert_eq!(
            got, want,
            "Golden mismatch; run with BENCHWRIGHT_UPDATE_GOLDEN=1 to update."
        );
    }
}

/// Creates a unique temporary directory under the system temp dir, named
/// from `base_prefix`, the process id and a nanosecond timestamp. Removed
/// when the returned `TempDir` is dropped.
pub fn make_test_tmpdir(base_prefix: &str) -> tempfile::TempDir {
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let prefix = format!("{}_{}_{}", base_prefix, pid, nanos);
    tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(std::env::temp_dir())
        .expect("tempdir create")
}

/// Locates a real simulator executable on `PATH`, for tests that only make
/// sense when one is installed.
pub fn find_simulator(name: &str) -> Option<PathBuf> {
    match which::which(name) {
        Ok(path) => Some(path),
        Err(e) => {
            log::info!("find_simulator; {} not available: {}", name, e);
            None
        }
    }
}

#[cfg(unix)]
fn sh_single_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

/// Writes an executable `sh` script named `name` into `dir` that records
/// its invocation in `dir/invocations.log`, prints `stdout` and exits with
/// `exit_code`.
#[cfg(unix)]
pub fn write_fake_tool(dir: &Path, name: &str, stdout: &str, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log_path = dir.join(INVOCATIONS_LOG);
    let script = format!(
        "#!/bin/sh\necho \"{name} $*\" >> {log}\nprintf '%s' {stdout}\nexit {code}\n",
        name = name,
        log = sh_single_quote(&log_path.display().to_string()),
        stdout = sh_single_quote(stdout),
        code = exit_code
    );
    let path = dir.join(name);
    std::fs::write(&path, script).expect("write fake tool");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake tool executable");
    log::info!("write_fake_tool; wrote {}", path.display());
    path
}

/// The current `PATH` with `dir` in front, suitable for a child process
/// environment overlay.
pub fn path_with_prepended(dir: &Path) -> String {
    match std::env::var_os("PATH") {
        Some(path) => {
            let mut dirs = vec![dir.to_path_buf()];
            dirs.extend(std::env::split_paths(&path));
            std::env::join_paths(dirs)
                .expect("join PATH entries")
                .to_string_lossy()
                .to_string()
        }
        None => dir.display().to_string(),
    }
}

/// Lines recorded by fake tools in `dir`, in invocation order.
pub fn read_invocations(dir: &Path) -> Vec<String> {
    match std::fs::read_to_string(dir.join(INVOCATIONS_LOG)) {
        Ok(text) => text.lines().map(|l| l.to_string()).collect(),
        Err(_) => vec![],
    }
}
