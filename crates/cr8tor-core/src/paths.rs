use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Resource layout
// ---------------------------------------------------------------------------

pub const GOVERNANCE_DIR: &str = "governance";
pub const ACCESS_DIR: &str = "access";
pub const METADATA_DIR: &str = "metadata";

pub const PROJECT_FILE: &str = "project.toml";
pub const ACCESS_FILE: &str = "access.toml";
pub const DATASET_PREFIX: &str = "dataset";
pub const DATASET_EXT: &str = "toml";

// ---------------------------------------------------------------------------
// Provenance document layout
// ---------------------------------------------------------------------------

pub const BAGIT_DATA_DIR: &str = "data";
pub const CRATE_METADATA_FILE: &str = "ro-crate-metadata.json";

pub const CONFIG_FILE: &str = "cr8tor.yaml";
pub const LOCK_SUFFIX: &str = "lock";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn project_path(resources_dir: &Path) -> PathBuf {
    resources_dir.join(GOVERNANCE_DIR).join(PROJECT_FILE)
}

pub fn access_path(resources_dir: &Path) -> PathBuf {
    resources_dir.join(ACCESS_DIR).join(ACCESS_FILE)
}

pub fn metadata_dir(resources_dir: &Path) -> PathBuf {
    resources_dir.join(METADATA_DIR)
}

pub fn crate_metadata_path(bagit_dir: &Path) -> PathBuf {
    bagit_dir.join(BAGIT_DATA_DIR).join(CRATE_METADATA_FILE)
}

pub fn lock_path(document: &Path) -> PathBuf {
    let mut name = document
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(LOCK_SUFFIX);
    document.with_file_name(name)
}

/// True for `metadata/dataset*.toml` file names.
pub fn is_dataset_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.starts_with(DATASET_PREFIX)
        && path.extension().and_then(|e| e.to_str()) == Some(DATASET_EXT)
}

/// Path of `file` relative to `base`, with `/` separators, for use as a crate entity id.
pub fn relative_id(base: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(base).unwrap_or(file);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
