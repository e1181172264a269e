//! Candidate filter pipeline.
//!
//! Three layers, all conjunctive:
//!
//! 1. row-level bounds on the joined table ([`RowBounds`]), cheapest, run first;
//! 2. whole-candidate predicates on the native receptor/ligand pair;
//! 3. sub-entity predicates on each monomer of the judged pair (predicted when
//!    both predictions exist, native otherwise) against its native counterpart.
//!
//! A predicate that cannot evaluate a candidate rejects it; the run goes on.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::config::{CurationConfig, FilterConfig};
use crate::data::filter::{RowBounds, filtered_indices};
use crate::data::index::CandidateIndex;
use crate::data::model::CandidateRecord;
use crate::error::FilterEvaluationError;
use crate::structure::geometry::{connected_components, count_contacts, rmsd};
use crate::structure::model::{ResidueKey, Structure};
use crate::structure::source::{CandidateStructures, StructureSource};

/// Predicate over a candidate's full set of substructures.
pub trait CandidatePredicate: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, structures: &CandidateStructures) -> Result<bool, FilterEvaluationError>;
}

/// Predicate over one monomer judged against its native counterpart.
pub trait SubEntityPredicate: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, monomer: &Structure, native: &Structure) -> Result<bool, FilterEvaluationError>;
}

// ---------------------------------------------------------------------------
// Whole-candidate predicates
// ---------------------------------------------------------------------------

/// Both native monomers must exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireNativePair;

impl CandidatePredicate for RequireNativePair {
    fn name(&self) -> &'static str {
        "require_native_pair"
    }

    fn evaluate(&self, structures: &CandidateStructures) -> Result<bool, FilterEvaluationError> {
        Ok(structures.native_pair().is_ok())
    }
}

/// At least `min_contacts` receptor–ligand residue pairs within `radius`.
#[derive(Debug, Clone, Copy)]
pub struct InterfaceContacts {
    pub min_contacts: usize,
    pub radius: f64,
    pub calpha_only: bool,
}

impl CandidatePredicate for InterfaceContacts {
    fn name(&self) -> &'static str {
        "interface_contacts"
    }

    fn evaluate(&self, structures: &CandidateStructures) -> Result<bool, FilterEvaluationError> {
        let (r, l) = structures.native_pair()?;
        let contacts = count_contacts(
            &r.residue_coords(self.calpha_only),
            &l.residue_coords(self.calpha_only),
            self.radius,
        );
        Ok(contacts >= self.min_contacts)
    }
}

/// Neither native monomer falls apart into more than `max_components` pieces.
#[derive(Debug, Clone, Copy)]
pub struct DetachedNative {
    pub radius: f64,
    pub max_components: usize,
}

impl CandidatePredicate for DetachedNative {
    fn name(&self) -> &'static str {
        "detached_native"
    }

    fn evaluate(&self, structures: &CandidateStructures) -> Result<bool, FilterEvaluationError> {
        let (r, l) = structures.native_pair()?;
        Ok([r, l]
            .iter()
            .all(|s| connected_components(&s.residue_coords(false), self.radius) <= self.max_components))
    }
}

// ---------------------------------------------------------------------------
// Sub-entity predicates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct MinAtomTypes {
    pub min_atom_types: usize,
}

impl SubEntityPredicate for MinAtomTypes {
    fn name(&self) -> &'static str {
        "min_atom_types"
    }

    fn evaluate(&self, monomer: &Structure, _native: &Structure) -> Result<bool, FilterEvaluationError> {
        Ok(monomer.atom_type_count() >= self.min_atom_types)
    }
}

/// At least `min_overlap` residues present in both the monomer and the native.
#[derive(Debug, Clone, Copy)]
pub struct NativeOverlap {
    pub min_overlap: usize,
}

impl SubEntityPredicate for NativeOverlap {
    fn name(&self) -> &'static str {
        "native_overlap"
    }

    fn evaluate(&self, monomer: &Structure, native: &Structure) -> Result<bool, FilterEvaluationError> {
        let native_keys: HashMap<ResidueKey, &str> = residue_names(native);
        let shared = monomer
            .residues()
            .iter()
            .filter(|r| native_keys.contains_key(&r.key))
            .count();
        Ok(shared >= self.min_overlap)
    }
}

/// Fraction of native residues matched by an identical residue in the monomer.
#[derive(Debug, Clone, Copy)]
pub struct SequenceIdentity {
    pub min_identity: f64,
}

impl SubEntityPredicate for SequenceIdentity {
    fn name(&self) -> &'static str {
        "sequence_identity"
    }

    fn evaluate(&self, monomer: &Structure, native: &Structure) -> Result<bool, FilterEvaluationError> {
        let native_residues = residue_names(native);
        if native_residues.is_empty() {
            return Err(FilterEvaluationError::NoCommonAtoms { what: "native sequence" });
        }
        let identical = residue_names(monomer)
            .iter()
            .filter(|(key, name)| native_residues.get(*key) == Some(*name))
            .count();
        Ok(identical as f64 / native_residues.len() as f64 >= self.min_identity)
    }
}

/// CA RMSD against the native on shared residues, without superposition.
#[derive(Debug, Clone, Copy)]
pub struct RmsdToNative {
    pub cutoff: f64,
}

impl SubEntityPredicate for RmsdToNative {
    fn name(&self) -> &'static str {
        "rmsd_to_native"
    }

    fn evaluate(&self, monomer: &Structure, native: &Structure) -> Result<bool, FilterEvaluationError> {
        let native_ca: HashMap<ResidueKey, [f64; 3]> = native
            .residues()
            .iter()
            .filter_map(|r| r.calpha().map(|a| (r.key, a.coord)))
            .collect();
        let pairs: Vec<([f64; 3], [f64; 3])> = monomer
            .residues()
            .iter()
            .filter_map(|r| {
                let ca = r.calpha()?;
                native_ca.get(&r.key).map(|n| (ca.coord, *n))
            })
            .collect();
        let value = rmsd(&pairs).ok_or(FilterEvaluationError::NoCommonAtoms { what: "CA pairing" })?;
        Ok(value <= self.cutoff)
    }
}

/// The judged monomer does not fall apart into more than `max_components` pieces.
#[derive(Debug, Clone, Copy)]
pub struct DetachedSub {
    pub radius: f64,
    pub max_components: usize,
}

impl SubEntityPredicate for DetachedSub {
    fn name(&self) -> &'static str {
        "detached_sub"
    }

    fn evaluate(&self, monomer: &Structure, _native: &Structure) -> Result<bool, FilterEvaluationError> {
        Ok(connected_components(&monomer.residue_coords(false), self.radius) <= self.max_components)
    }
}

fn log_report(index: &CandidateIndex, passed: usize, report: &FilterReport) {
    log::info!(
        "{}: {} of {} candidates pass filters ({} by bounds, {} by structure, {} unevaluable)",
        index.split,
        passed,
        report.input,
        report.rejected_by_bounds,
        report.rejected_by_structure,
        report.evaluation_errors
    );
}

fn residue_names(s: &Structure) -> HashMap<ResidueKey, &str> {
    s.residues().iter().map(|r| (r.key, r.name())).collect()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Default whole-candidate predicates, cheapest first.
pub fn default_candidate_predicates(config: &FilterConfig) -> Vec<Box<dyn CandidatePredicate>> {
    vec![
        Box::new(RequireNativePair),
        Box::new(InterfaceContacts {
            min_contacts: config.min_contacts,
            radius: config.contact_radius,
            calpha_only: config.calpha_only,
        }),
        Box::new(DetachedNative {
            radius: config.detached_radius,
            max_components: config.max_components,
        }),
    ]
}

/// Default sub-entity predicates, cheapest first.
pub fn default_sub_entity_predicates(config: &FilterConfig) -> Vec<Box<dyn SubEntityPredicate>> {
    vec![
        Box::new(MinAtomTypes {
            min_atom_types: config.min_atom_types,
        }),
        Box::new(NativeOverlap {
            min_overlap: config.min_overlap,
        }),
        Box::new(SequenceIdentity {
            min_identity: config.min_sequence_identity,
        }),
        Box::new(RmsdToNative {
            cutoff: config.rmsd_cutoff,
        }),
        Box::new(DetachedSub {
            radius: config.detached_radius,
            max_components: config.max_components,
        }),
    ]
}

/// Counts from one filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub input: usize,
    pub rejected_by_bounds: usize,
    pub rejected_by_structure: usize,
    /// Candidates rejected because a predicate could not be evaluated.
    pub evaluation_errors: usize,
}

enum Verdict {
    Pass,
    Reject(&'static str),
    Error(FilterEvaluationError),
}

pub struct FilterPipeline {
    bounds: RowBounds,
    candidate_predicates: Vec<Box<dyn CandidatePredicate>>,
    sub_entity_predicates: Vec<Box<dyn SubEntityPredicate>>,
}

impl FilterPipeline {
    /// Build the pipeline from configuration. With `filters.structural` off
    /// only the row-level bounds apply.
    pub fn new(config: &CurationConfig) -> Self {
        let bounds = RowBounds::new(&config.selection);
        if config.filters.structural {
            Self::with_predicates(
                bounds,
                default_candidate_predicates(&config.filters),
                default_sub_entity_predicates(&config.filters),
            )
        } else {
            Self::with_predicates(bounds, Vec::new(), Vec::new())
        }
    }

    pub fn with_predicates(
        bounds: RowBounds,
        candidate_predicates: Vec<Box<dyn CandidatePredicate>>,
        sub_entity_predicates: Vec<Box<dyn SubEntityPredicate>>,
    ) -> Self {
        Self {
            bounds,
            candidate_predicates,
            sub_entity_predicates,
        }
    }

    fn is_structural(&self) -> bool {
        !self.candidate_predicates.is_empty() || !self.sub_entity_predicates.is_empty()
    }

    /// Records of `index` that pass every layer, in input order.
    pub fn apply(
        &self,
        index: &CandidateIndex,
        source: &dyn StructureSource,
    ) -> (Vec<CandidateRecord>, FilterReport) {
        let mut report = FilterReport {
            input: index.len(),
            ..FilterReport::default()
        };

        let bounded = filtered_indices(&index.records, &self.bounds);
        report.rejected_by_bounds = index.len() - bounded.len();

        if !self.is_structural() {
            let passed: Vec<CandidateRecord> = bounded.iter().map(|&i| index.records[i].clone()).collect();
            log_report(index, passed.len(), &report);
            return (passed, report);
        }

        let verdicts: Vec<(usize, Verdict)> = bounded
            .par_iter()
            .map(|&i| (i, self.evaluate(&index.records[i].id, source)))
            .collect();

        let mut passed = Vec::new();
        for (i, verdict) in verdicts {
            let id = &index.records[i].id;
            match verdict {
                Verdict::Pass => passed.push(index.records[i].clone()),
                Verdict::Reject(predicate) => {
                    log::debug!("{id}: rejected by {predicate}");
                    report.rejected_by_structure += 1;
                }
                Verdict::Error(e) => {
                    log::debug!("{id}: filtered out, predicate input malformed: {e}");
                    report.evaluation_errors += 1;
                }
            }
        }
        log_report(index, passed.len(), &report);
        (passed, report)
    }

    fn evaluate(&self, id: &str, source: &dyn StructureSource) -> Verdict {
        match self.evaluate_structures(id, source) {
            Ok(None) => Verdict::Pass,
            Ok(Some(name)) => Verdict::Reject(name),
            Err(e) => Verdict::Error(e),
        }
    }

    /// `Ok(None)` when every structural predicate holds, otherwise the name of
    /// the first one that does not.
    pub fn evaluate_structures(
        &self,
        id: &str,
        source: &dyn StructureSource,
    ) -> Result<Option<&'static str>, FilterEvaluationError> {
        let structures = source.load(id)?;

        for p in &self.candidate_predicates {
            if !p.evaluate(&structures)? {
                return Ok(Some(p.name()));
            }
        }

        if self.sub_entity_predicates.is_empty() {
            return Ok(None);
        }
        let (native_r, native_l) = structures.native_pair()?;
        let (sub_r, sub_l) = structures.sub_entity_pair()?;
        for p in &self.sub_entity_predicates {
            if !p.evaluate(sub_r, native_r)? || !p.evaluate(sub_l, native_l)? {
                return Ok(Some(p.name()));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionConfig;
    use crate::data::model::{DomainSet, Split};
    use crate::structure::model::tests::chain;
    use crate::structure::source::InMemoryStructureSource;

    fn record(id: &str) -> CandidateRecord {
        CandidateRecord {
            cluster_id: Some("C1".into()),
            cluster_id_l: Some("L".into()),
            cluster_id_r: Some("R".into()),
            length1: Some(60),
            length2: Some(60),
            length: Some(120),
            resolution: Some(2.0),
            method: Some("X-RAY DIFFRACTION".into()),
            label: Some("BIO".into()),
            uniprot_l: Some("P1".into()),
            uniprot_r: Some("P2".into()),
            ecod_names_l: Some(DomainSet::parse("a")),
            ecod_names_r: Some(DomainSet::parse("b")),
            ..CandidateRecord::new(id)
        }
    }

    /// Two parallel 8-residue chains 6 Å apart: plenty of CA contacts.
    fn system(id: &str, with_prediction: bool) -> CandidateStructures {
        let pred = |side: &str, origin| with_prediction.then(|| chain(&format!("{id}-pred-{side}"), 8, origin));
        CandidateStructures {
            id: id.to_string(),
            native_receptor: Some(chain(&format!("{id}-R"), 8, [0.0; 3])),
            native_ligand: Some(chain(&format!("{id}-L"), 8, [0.0, 6.0, 0.0])),
            pred_receptor: pred("R", [0.5, 0.0, 0.0]),
            pred_ligand: pred("L", [0.5, 6.0, 0.0]),
        }
    }

    fn pipeline(config: &FilterConfig) -> FilterPipeline {
        FilterPipeline::with_predicates(
            RowBounds::new(&SelectionConfig::default()),
            default_candidate_predicates(config),
            default_sub_entity_predicates(config),
        )
    }

    #[test]
    fn well_formed_system_passes_every_predicate() {
        let mut source = InMemoryStructureSource::new();
        source.insert(system("a", true));
        let p = pipeline(&FilterConfig::default());
        assert_eq!(p.evaluate_structures("a", &source).unwrap(), None);
    }

    #[test]
    fn lowering_rmsd_cutoff_below_actual_rejects() {
        let mut source = InMemoryStructureSource::new();
        source.insert(system("a", true));
        // predictions are shifted by 0.5 Å
        let config = FilterConfig {
            rmsd_cutoff: 0.4,
            ..FilterConfig::default()
        };
        assert_eq!(
            pipeline(&config).evaluate_structures("a", &source).unwrap(),
            Some("rmsd_to_native")
        );
    }

    #[test]
    fn raising_contact_threshold_rejects() {
        let mut source = InMemoryStructureSource::new();
        source.insert(system("a", false));
        let config = FilterConfig {
            min_contacts: 10_000,
            ..FilterConfig::default()
        };
        assert_eq!(
            pipeline(&config).evaluate_structures("a", &source).unwrap(),
            Some("interface_contacts")
        );
    }

    #[test]
    fn missing_native_ligand_is_rejected() {
        let mut sys = system("a", false);
        sys.native_ligand = None;
        let mut source = InMemoryStructureSource::new();
        source.insert(sys);
        assert_eq!(
            pipeline(&FilterConfig::default()).evaluate_structures("a", &source).unwrap(),
            Some("require_native_pair")
        );
    }

    #[test]
    fn detached_chain_is_rejected() {
        let mut sys = system("a", false);
        if let Some(r) = sys.native_receptor.as_mut() {
            for a in r.atoms.iter_mut().filter(|a| a.residue_seq > 4) {
                a.coord[2] += 100.0;
            }
            for a in r.atoms.iter_mut().filter(|a| a.residue_seq > 6) {
                a.coord[2] += 100.0;
            }
        }
        let mut source = InMemoryStructureSource::new();
        source.insert(sys);
        assert_eq!(
            pipeline(&FilterConfig::default()).evaluate_structures("a", &source).unwrap(),
            Some("detached_native")
        );
    }

    #[test]
    fn mutated_prediction_fails_identity() {
        let mut sys = system("a", true);
        if let Some(l) = sys.pred_ligand.as_mut() {
            for a in l.atoms.iter_mut().filter(|a| a.residue_seq <= 3) {
                a.residue_name = "GLY".into();
            }
        }
        let mut source = InMemoryStructureSource::new();
        source.insert(sys);
        assert_eq!(
            pipeline(&FilterConfig::default()).evaluate_structures("a", &source).unwrap(),
            Some("sequence_identity")
        );
    }

    #[test]
    fn raising_atom_type_minimum_rejects() {
        let mut source = InMemoryStructureSource::new();
        source.insert(system("a", true));
        // chains carry N, CA, C, O and H
        let config = FilterConfig {
            min_atom_types: 6,
            ..FilterConfig::default()
        };
        assert_eq!(
            pipeline(&config).evaluate_structures("a", &source).unwrap(),
            Some("min_atom_types")
        );
    }

    #[test]
    fn raising_overlap_minimum_rejects() {
        let mut source = InMemoryStructureSource::new();
        source.insert(system("a", true));
        let config = FilterConfig {
            min_overlap: 9,
            ..FilterConfig::default()
        };
        assert_eq!(
            pipeline(&config).evaluate_structures("a", &source).unwrap(),
            Some("native_overlap")
        );
    }

    #[test]
    fn detached_prediction_is_rejected() {
        let mut sys = system("a", true);
        if let Some(r) = sys.pred_receptor.as_mut() {
            for a in r.atoms.iter_mut().filter(|a| a.residue_seq > 4) {
                a.coord[2] += 100.0;
            }
            for a in r.atoms.iter_mut().filter(|a| a.residue_seq > 6) {
                a.coord[2] += 100.0;
            }
        }
        let mut source = InMemoryStructureSource::new();
        source.insert(sys);
        let config = FilterConfig {
            rmsd_cutoff: 1_000.0,
            ..FilterConfig::default()
        };
        assert_eq!(
            pipeline(&config).evaluate_structures("a", &source).unwrap(),
            Some("detached_sub")
        );
        // the default cutoff catches the same displacement first
        assert_eq!(
            pipeline(&FilterConfig::default()).evaluate_structures("a", &source).unwrap(),
            Some("rmsd_to_native")
        );
    }

    #[test]
    fn apply_fails_closed_on_unloadable_candidates() {
        let mut source = InMemoryStructureSource::new();
        source.insert(system("good", true));
        let index = CandidateIndex {
            split: Split::Train,
            records: vec![record("good"), record("unknown")],
        };
        let (passed, report) = pipeline(&FilterConfig::default()).apply(&index, &source);
        assert_eq!(passed.len(), 1);
        assert_eq!(passed[0].id, "good");
        assert_eq!(report.evaluation_errors, 1);
    }

    #[test]
    fn table_only_pipeline_skips_structures() {
        let config = CurationConfig {
            filters: FilterConfig {
                structural: false,
                ..FilterConfig::default()
            },
            ..CurationConfig::default()
        };
        let mut short = record("short");
        short.length1 = Some(10);
        let index = CandidateIndex {
            split: Split::Test,
            records: vec![record("a"), short],
        };
        let (passed, report) = FilterPipeline::new(&config).apply(&index, &InMemoryStructureSource::new());
        assert_eq!(passed.len(), 1);
        assert_eq!(report.rejected_by_bounds, 1);
    }
}
