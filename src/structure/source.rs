//! The structure-loading capability: candidate id → native and predicted monomers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::model::Structure;
use super::pdb::parse_pdb;
use crate::error::StructureLoadError;

pub const NATIVE_RECEPTOR_FILE: &str = "native_receptor.pdb";
pub const NATIVE_LIGAND_FILE: &str = "native_ligand.pdb";
pub const PRED_RECEPTOR_FILE: &str = "pred_receptor.pdb";
pub const PRED_LIGAND_FILE: &str = "pred_ligand.pdb";

/// All substructures known for one candidate.
#[derive(Debug, Clone)]
pub struct CandidateStructures {
    pub id: String,
    pub native_receptor: Option<Structure>,
    pub native_ligand: Option<Structure>,
    pub pred_receptor: Option<Structure>,
    pub pred_ligand: Option<Structure>,
}

impl CandidateStructures {
    /// Both native monomers, or which one is missing.
    pub fn native_pair(&self) -> Result<(&Structure, &Structure), StructureLoadError> {
        let missing = |side| StructureLoadError::MissingNative {
            id: self.id.clone(),
            side,
        };
        let receptor = self.native_receptor.as_ref().ok_or_else(|| missing("receptor"))?;
        let ligand = self.native_ligand.as_ref().ok_or_else(|| missing("ligand"))?;
        Ok((receptor, ligand))
    }

    /// Both predicted monomers, if both exist.
    pub fn predicted_pair(&self) -> Option<(&Structure, &Structure)> {
        self.pred_receptor.as_ref().zip(self.pred_ligand.as_ref())
    }

    /// The monomer pair the sub-entity predicates judge: predicted when both
    /// predicted monomers exist, native otherwise.
    pub fn sub_entity_pair(&self) -> Result<(&Structure, &Structure), StructureLoadError> {
        match self.predicted_pair() {
            Some(pair) => Ok(pair),
            None => self.native_pair(),
        }
    }
}

/// Anything that can produce [`CandidateStructures`] by candidate id.
pub trait StructureSource: Send + Sync {
    /// Verify the source is usable before a run starts. An error here is fatal.
    fn check(&self) -> Result<(), String>;

    fn load(&self, id: &str) -> Result<CandidateStructures, StructureLoadError>;
}

/// Reads `<root>/<id>/{native,pred}_{receptor,ligand}.pdb`.
#[derive(Debug, Clone)]
pub struct DirectoryStructureSource {
    root: PathBuf,
}

impl DirectoryStructureSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_optional(&self, dir: &Path, file: &str, id: String) -> Result<Option<Structure>, StructureLoadError> {
        let path = dir.join(file);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| StructureLoadError::Io {
            path: path.clone(),
            source,
        })?;
        parse_pdb(&id, &contents)
            .map(Some)
            .map_err(|message| StructureLoadError::Parse { path, message })
    }
}

impl StructureSource for DirectoryStructureSource {
    fn check(&self) -> Result<(), String> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(format!("{} is not a directory", self.root.display()))
        }
    }

    fn load(&self, id: &str) -> Result<CandidateStructures, StructureLoadError> {
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(StructureLoadError::NotFound {
                id: id.to_string(),
                path: dir,
            });
        }
        Ok(CandidateStructures {
            id: id.to_string(),
            native_receptor: self.read_optional(&dir, NATIVE_RECEPTOR_FILE, format!("{id}-R"))?,
            native_ligand: self.read_optional(&dir, NATIVE_LIGAND_FILE, format!("{id}-L"))?,
            pred_receptor: self.read_optional(&dir, PRED_RECEPTOR_FILE, format!("{id}-pred-R"))?,
            pred_ligand: self.read_optional(&dir, PRED_LIGAND_FILE, format!("{id}-pred-L"))?,
        })
    }
}

/// Structures held in memory, keyed by candidate id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStructureSource {
    systems: HashMap<String, CandidateStructures>,
}

impl InMemoryStructureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, structures: CandidateStructures) {
        self.systems.insert(structures.id.clone(), structures);
    }
}

impl StructureSource for InMemoryStructureSource {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }

    fn load(&self, id: &str) -> Result<CandidateStructures, StructureLoadError> {
        self.systems
            .get(id)
            .cloned()
            .ok_or_else(|| StructureLoadError::NotFound {
                id: id.to_string(),
                path: PathBuf::from("<memory>"),
            })
    }
}
