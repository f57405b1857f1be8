use cr8tor_core::config::Config;
use cr8tor_core::crate_doc::CrateBuilder;
use cr8tor_core::paths;
use cr8tor_core::store::ProjectStore;
use std::path::{Path, PathBuf};

const RESOURCES_DIR: &str = "resources";
const BAGIT_DIR: &str = "bagit";

/// Directories and files one invocation works against.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub resources_dir: PathBuf,
    pub bagit_dir: PathBuf,
    pub config_path: PathBuf,
}

impl Workspace {
    /// Resolve the workspace.
    ///
    /// The resources directory is, in order:
    /// 1. `--resources-dir` / `CR8TOR_RESOURCES_DIR` (passed in as `resources`)
    /// 2. the nearest `resources/` holding `governance/project.toml`, walking
    ///    upward from `cwd`
    /// 3. `./resources`
    ///
    /// The bagit directory and `cr8tor.yaml` default to siblings of the
    /// resources directory.
    pub fn resolve(resources: Option<&Path>, bagit: Option<&Path>, config: Option<&Path>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let resources_dir = match resources {
            Some(p) => p.to_path_buf(),
            None => find_resources(&cwd).unwrap_or_else(|| cwd.join(RESOURCES_DIR)),
        };
        let project_root = resources_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        Self {
            bagit_dir: bagit
                .map(Path::to_path_buf)
                .unwrap_or_else(|| project_root.join(BAGIT_DIR)),
            config_path: config
                .map(Path::to_path_buf)
                .unwrap_or_else(|| project_root.join(paths::CONFIG_FILE)),
            resources_dir,
        }
    }

    pub fn load_config(&self) -> cr8tor_core::Result<Config> {
        Config::load(&self.config_path)
    }

    pub fn store(&self) -> ProjectStore {
        ProjectStore::new(&self.resources_dir)
    }

    pub fn writer(&self, config: &Config) -> CrateBuilder {
        CrateBuilder::new(&self.bagit_dir, config.crate_meta.clone())
    }
}

fn find_resources(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(RESOURCES_DIR);
        if paths::project_path(&candidate).is_file() {
            return Some(candidate);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => return None,
        }
    }
}
