#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative_path, content) in files {
        let path = root.join(relative_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("fixture parent directory should be creatable");
        }
        fs::write(&path, content).expect("fixture file should be writable");
    }
}

pub fn run_driftpatch(root: &Path, patch_path: &Path, extra_args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_driftpatch"));
    command.current_dir(root);
    command.arg(patch_path);
    command.args(extra_args);
    command.output().expect("failed to run driftpatch binary")
}

pub fn read_file(root: &Path, relative_path: &str) -> String {
    fs::read_to_string(root.join(relative_path))
        .unwrap_or_else(|_| panic!("expected '{relative_path}' to be readable under {root:?}"))
}
