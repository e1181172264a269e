//! Complex assembly: two monomers → one two-chain structure file.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::model::{Atom, ResidueKey, Structure};
use super::pdb::write_pdb;
use crate::error::StructureAssemblyError;

pub const RECEPTOR_CHAIN: char = 'R';
pub const LIGAND_CHAIN: char = 'L';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Renumber each chain's residues consecutively from 1.
    pub renumber_residues: bool,
    /// Drop atoms absent from the reference monomer of the same side.
    pub remove_differing_atoms: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            renumber_residues: true,
            remove_differing_atoms: true,
        }
    }
}

/// An assembled receptor–ligand complex.
#[derive(Debug, Clone)]
pub struct Complex {
    /// Output identifier; names the written file.
    pub id: String,
    /// Receptor atoms (chain R) followed by ligand atoms (chain L).
    pub atoms: Vec<Atom>,
}

impl Complex {
    /// Write `<dir>/<id>.pdb` and return its path.
    pub fn write_pdb(&self, dir: &Path) -> Result<PathBuf, StructureAssemblyError> {
        let path = dir.join(format!("{}.pdb", self.id));
        let write_err = |source| StructureAssemblyError::Write {
            path: path.clone(),
            source,
        };
        let file = File::create(&path).map_err(write_err)?;
        let mut out = BufWriter::new(file);
        write_pdb(&mut out, &self.atoms).map_err(write_err)?;
        Ok(path)
    }
}

/// The complex-assembly capability.
pub trait ComplexAssembler: Send + Sync {
    /// Assemble `receptor` and `ligand`. `reference` is the native
    /// (receptor, ligand) pair the inputs are compared against when pruning.
    fn assemble(
        &self,
        receptor: &Structure,
        ligand: &Structure,
        reference: (&Structure, &Structure),
        options: AssemblyOptions,
    ) -> Result<Complex, StructureAssemblyError>;
}

/// Concatenates both chains after optional pruning and renumbering.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainAssembler;

impl ComplexAssembler for ChainAssembler {
    fn assemble(
        &self,
        receptor: &Structure,
        ligand: &Structure,
        reference: (&Structure, &Structure),
        options: AssemblyOptions,
    ) -> Result<Complex, StructureAssemblyError> {
        let r = prepare_side(receptor, reference.0, RECEPTOR_CHAIN, options);
        if r.is_empty() {
            return Err(StructureAssemblyError::EmptySide { side: "receptor" });
        }
        let l = prepare_side(ligand, reference.1, LIGAND_CHAIN, options);
        if l.is_empty() {
            return Err(StructureAssemblyError::EmptySide { side: "ligand" });
        }

        let mut atoms = r;
        atoms.extend(l);
        Ok(Complex {
            id: complex_id(&receptor.id, &ligand.id),
            atoms,
        })
    }
}

fn prepare_side(side: &Structure, reference: &Structure, chain: char, options: AssemblyOptions) -> Vec<Atom> {
    let keep: Option<HashSet<(ResidueKey, &str)>> = options.remove_differing_atoms.then(|| {
        reference
            .atoms
            .iter()
            .map(|a| (a.residue_key(), a.name.as_str()))
            .collect()
    });

    let mut atoms: Vec<Atom> = side
        .atoms
        .iter()
        .filter(|a| {
            keep.as_ref()
                .map_or(true, |k| k.contains(&(a.residue_key(), a.name.as_str())))
        })
        .cloned()
        .collect();

    if options.renumber_residues {
        let mut numbering: HashMap<(char, ResidueKey), i32> = HashMap::new();
        for atom in &mut atoms {
            let next = numbering.len() as i32 + 1;
            let seq = *numbering
                .entry((atom.chain_id, atom.residue_key()))
                .or_insert(next);
            atom.residue_seq = seq;
            atom.insertion_code = None;
        }
    }
    for atom in &mut atoms {
        atom.chain_id = chain;
    }
    atoms
}

/// `<base>` when the sides are `<base>-R` and `<base>-L`, else `<receptor>--<ligand>`.
pub fn complex_id(receptor_id: &str, ligand_id: &str) -> String {
    match (receptor_id.strip_suffix("-R"), ligand_id.strip_suffix("-L")) {
        (Some(r), Some(l)) if r == l => r.to_string(),
        _ => format!("{receptor_id}--{ligand_id}"),
    }
}
