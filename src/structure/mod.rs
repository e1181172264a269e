//! Structural layer: monomer structures, PDB IO, the loading capability and
//! complex assembly.

pub mod assembly;
pub mod geometry;
pub mod model;
pub mod pdb;
pub mod source;

pub use assembly::{AssemblyOptions, ChainAssembler, Complex, ComplexAssembler};
pub use model::{Atom, Structure};
pub use source::{CandidateStructures, DirectoryStructureSource, InMemoryStructureSource, StructureSource};
