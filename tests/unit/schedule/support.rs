//! Shell-script apps for scheduler tests.

use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};

use crate::config::manifest::{AppCatalog, MANIFEST_FILE};

pub(crate) fn scratch(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("unit-schedule").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Install an app whose entrypoint is `script` run by `/bin/sh`.
pub(crate) fn install_app(root: &Path, id: &str, script: &str) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(MANIFEST_FILE),
        format!(r#"{{"id":"{id}","version":"0.1.0","entrypoint":"run.sh"}}"#),
    )
    .unwrap();
    let path = dir.join("run.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

/// Shell snippet printing one frame carrying the three-byte `payload`.
pub(crate) fn emit3(payload: &str) -> String {
    assert_eq!(payload.len(), 3);
    format!("printf '\\000\\000\\000\\003{payload}'")
}

pub(crate) fn catalog(root: &Path) -> AppCatalog {
    AppCatalog::new(root)
}
