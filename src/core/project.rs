//! Project discovery and on-disk layout
//!
//! A project is a directory holding a `.tplm/` marker. Entities live in
//! plain YAML files next to it:
//!
//! ```text
//! parts/<NUMBER>.tplm.yaml
//! links.tplm.yaml
//! products/<ID>.tplm.yaml
//! baselines/<ID>.tplm.yaml
//! instances/<PRODUCT>--<SERIAL>.tplm.yaml
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::error::{PlmError, PlmResult};
use crate::core::workspace::Workspace;
use crate::entities::baseline::{ProductBaseline, ProductInstance};
use crate::entities::link::LinkArena;
use crate::entities::part::PartMaster;
use crate::entities::product::ConfigurationItem;
use crate::structure::loader::PartLoader;

/// Marker directory at the project root
pub const PROJECT_DIR: &str = ".tplm";

/// Suffix of every entity file
pub const FILE_SUFFIX: &str = ".tplm.yaml";

const PARTS_DIR: &str = "parts";
const PRODUCTS_DIR: &str = "products";
const BASELINES_DIR: &str = "baselines";
const INSTANCES_DIR: &str = "instances";
const LINKS_FILE: &str = "links.tplm.yaml";

const DEFAULT_CONFIG: &str = "\
# Tessera PLM project configuration
# user: jdoe
default_filter: wip
default_depth: -1
diverge: false
";

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not inside a tplm project (no {PROJECT_DIR}/ directory found). Run 'tplm init' first")]
    NotFound,

    #[error("A tplm project already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a project root
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Find the project containing the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Walk up from `start` to the first directory holding `.tplm/`
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        start
            .ancestors()
            .find(|dir| dir.join(PROJECT_DIR).is_dir())
            .map(|dir| Project {
                root: dir.to_path_buf(),
            })
            .ok_or(ProjectError::NotFound)
    }

    /// Scaffold a new project at `path`
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let marker = path.join(PROJECT_DIR);
        if marker.exists() {
            return Err(ProjectError::AlreadyExists(path.to_path_buf()));
        }
        fs::create_dir_all(&marker)?;
        fs::write(marker.join("config.yaml"), DEFAULT_CONFIG)?;
        for dir in [PARTS_DIR, PRODUCTS_DIR, BASELINES_DIR, INSTANCES_DIR] {
            fs::create_dir_all(path.join(dir))?;
        }
        Ok(Project {
            root: path.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(PROJECT_DIR).join("config.yaml")
    }

    /// Read every entity file into a workspace
    pub fn load_workspace(&self) -> PlmResult<Workspace> {
        let links_file = self.root.join(LINKS_FILE);
        let links: LinkArena = if links_file.exists() {
            read_yaml(&links_file)?
        } else {
            LinkArena::new()
        };
        let masters: Vec<PartMaster> = self.read_dir(PARTS_DIR)?;
        let products: Vec<ConfigurationItem> = self.read_dir(PRODUCTS_DIR)?;
        let baselines: Vec<ProductBaseline> = self.read_dir(BASELINES_DIR)?;
        let instances: Vec<ProductInstance> = self.read_dir(INSTANCES_DIR)?;
        debug!(
            root = %self.root.display(),
            masters = masters.len(),
            links = links.len(),
            products = products.len(),
            "workspace loaded"
        );
        Ok(Workspace::from_parts(
            masters, links, products, baselines, instances,
        ))
    }

    /// Write every entity and delete files of entities that no longer exist
    pub fn save_workspace(&self, workspace: &Workspace) -> PlmResult<()> {
        write_yaml(&self.root.join(LINKS_FILE), workspace.links())?;
        self.write_dir(
            PARTS_DIR,
            workspace.masters().map(|m| (m.number.to_string(), m)),
        )?;
        self.write_dir(
            PRODUCTS_DIR,
            workspace.products().map(|p| (p.id.clone(), p)),
        )?;
        self.write_dir(
            BASELINES_DIR,
            workspace.baselines().map(|b| (b.id.to_string(), b)),
        )?;
        self.write_dir(
            INSTANCES_DIR,
            workspace
                .instances()
                .map(|i| (ProductInstance::file_stem(&i.product, &i.serial), i)),
        )?;
        Ok(())
    }

    fn entity_files(&self, dir: &str) -> Vec<PathBuf> {
        let dir = self.root.join(dir);
        if !dir.exists() {
            return Vec::new();
        }
        let mut files: Vec<PathBuf> = WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().to_string_lossy().ends_with(FILE_SUFFIX))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }

    fn read_dir<T: DeserializeOwned>(&self, dir: &str) -> PlmResult<Vec<T>> {
        self.entity_files(dir)
            .iter()
            .map(|path| read_yaml(path))
            .collect()
    }

    fn write_dir<'a, T, I>(&self, dir: &str, entities: I) -> PlmResult<()>
    where
        T: Serialize + 'a,
        I: Iterator<Item = (String, &'a T)>,
    {
        let target = self.root.join(dir);
        fs::create_dir_all(&target)?;
        let mut written = BTreeSet::new();
        for (stem, entity) in entities {
            let path = target.join(format!("{}{}", stem, FILE_SUFFIX));
            write_yaml(&path, entity)?;
            written.insert(path);
        }
        for stale in self.entity_files(dir) {
            if !written.contains(&stale) {
                debug!(file = %stale.display(), "removing file of deleted entity");
                fs::remove_file(&stale)?;
            }
        }
        Ok(())
    }
}

/// Parse one YAML file, naming the file in the error
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> PlmResult<T> {
    let content = fs::read_to_string(path)?;
    serde_yml::from_str(&content).map_err(|e| PlmError::Yaml {
        file: path.display().to_string(),
        message: e.to_string(),
    })
}

pub fn write_yaml<T: Serialize + ?Sized>(path: &Path, value: &T) -> PlmResult<()> {
    let content = serde_yml::to_string(value).map_err(|e| PlmError::Yaml {
        file: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::PartKey;
    use crate::entities::baseline::{BaselineChoices, BaselineKind};
    use crate::entities::link::NewUsage;
    use tempfile::TempDir;

    fn key(s: &str) -> PartKey {
        PartKey::new(s).unwrap()
    }

    #[test]
    fn test_init_and_discover() {
        let tmp = TempDir::new().unwrap();
        Project::init(tmp.path()).unwrap();
        assert!(tmp.path().join(".tplm/config.yaml").exists());
        assert!(tmp.path().join("parts").is_dir());

        let nested = tmp.path().join("parts");
        let found = Project::discover_from(&nested).unwrap();
        assert_eq!(found.root(), tmp.path());

        assert!(matches!(
            Project::init(tmp.path()).unwrap_err(),
            ProjectError::AlreadyExists(_)
        ));
    }

    #[test]
    fn test_discover_outside_project() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Project::discover_from(tmp.path()).unwrap_err(),
            ProjectError::NotFound
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        let mut ws = Workspace::new();
        ws.create_master("ASM", "Assembly", "alice").unwrap();
        ws.create_master("BOLT", "Bolt", "alice").unwrap();
        ws.add_component(&key("ASM"), "alice", NewUsage::of(key("BOLT")).amount(4.0))
            .unwrap();
        ws.check_in(&key("BOLT"), "A", "alice").unwrap();
        ws.check_in(&key("ASM"), "A", "alice").unwrap();
        ws.create_product("PRD", &key("ASM"), None).unwrap();
        ws.create_baseline("PRD", "b1", BaselineKind::Latest, None, "alice", BaselineChoices::default())
            .unwrap();
        ws.create_product_instance("PRD", "SN-1", 1, "alice").unwrap();
        project.save_workspace(&ws).unwrap();

        assert!(tmp.path().join("parts/ASM.tplm.yaml").exists());
        assert!(tmp.path().join("baselines/1.tplm.yaml").exists());
        assert!(tmp.path().join("instances/PRD--SN-1.tplm.yaml").exists());

        let loaded = project.load_workspace().unwrap();
        assert_eq!(loaded.masters().count(), 2);
        assert_eq!(loaded.links().len(), 1);
        assert_eq!(loaded.baseline("PRD", 1).unwrap().configuration.parts.len(), 2);
        assert!(loaded.product_instance("PRD", "SN-1").is_ok());

        // ids keep counting from where the saved arena stopped
        let mut loaded = loaded;
        loaded.check_out(&key("ASM"), "A", "alice").unwrap();
        let working = loaded.master(&key("ASM")).unwrap().iteration(
            &crate::core::identity::IterationRef::new("A", 2),
        ).unwrap().components.clone();
        assert_eq!(working, vec![crate::core::identity::LinkId(3)]);
    }

    #[test]
    fn test_save_removes_deleted_entities() {
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let mut ws = Workspace::new();
        ws.create_master("GONE", "Temporary", "alice").unwrap();
        project.save_workspace(&ws).unwrap();
        assert!(tmp.path().join("parts/GONE.tplm.yaml").exists());

        ws.delete_master(&key("GONE")).unwrap();
        project.save_workspace(&ws).unwrap();
        assert!(!tmp.path().join("parts/GONE.tplm.yaml").exists());
    }

    #[test]
    fn test_yaml_error_names_file() {
        let tmp = TempDir::new().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("parts/BAD.tplm.yaml"), "number: [\n").unwrap();
        let err = project.load_workspace().unwrap_err();
        match err {
            PlmError::Yaml { file, .. } => assert!(file.ends_with("BAD.tplm.yaml")),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
