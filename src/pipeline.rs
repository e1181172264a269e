//! End-to-end run: per split index → filters → cluster selection, then one
//! materialization task per selected id, then the manifest.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::config::CurationConfig;
use crate::data::index::CandidateIndex;
use crate::data::model::Split;
use crate::error::{CurationError, Result};
use crate::filters::FilterPipeline;
use crate::manifest::{Manifest, RowStatus};
use crate::materialize::{Task, WorkerPool};
use crate::select::ClusterSelector;
use crate::structure::assembly::{ChainAssembler, ComplexAssembler};
use crate::structure::source::{DirectoryStructureSource, StructureSource};

/// Selected candidate ids per split.
pub type Selection = BTreeMap<Split, BTreeSet<String>>;

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub selected: BTreeMap<Split, usize>,
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
}

pub struct CurationPipeline {
    config: CurationConfig,
    filters: FilterPipeline,
    selector: ClusterSelector,
    source: Box<dyn StructureSource>,
    assembler: Box<dyn ComplexAssembler>,
    pool: WorkerPool,
}

impl CurationPipeline {
    /// Pipeline reading structures from `paths.structure_root`.
    pub fn from_config(config: CurationConfig) -> Result<Self> {
        let source = DirectoryStructureSource::new(config.paths.structure_root.clone());
        Self::new(config, Box::new(source), Box::new(ChainAssembler))
    }

    pub fn new(
        config: CurationConfig,
        source: Box<dyn StructureSource>,
        assembler: Box<dyn ComplexAssembler>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filters: FilterPipeline::new(&config),
            selector: ClusterSelector::new(config.selection.max_per_cluster),
            pool: WorkerPool::new(config.workers.width, config.workers.progress)?,
            source,
            assembler,
            config,
        })
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    /// Filter and cluster-cap one split's candidates.
    pub fn select_from_index(&self, index: &CandidateIndex) -> BTreeSet<String> {
        let (passed, _report) = self
            .pool
            .install(|| self.filters.apply(index, self.source.as_ref()));
        let selected = self.selector.select(&passed);
        log::info!(
            "{}: selected {} of {} filtered candidates",
            index.split,
            selected.len(),
            passed.len()
        );
        selected
    }

    /// Load every configured split and select its ids.
    pub fn select_ids(&self) -> Result<Selection> {
        let mut selection = Selection::new();
        for &split in &self.config.paths.splits {
            let index = CandidateIndex::load_split(&self.config.paths.data_root, split)?;
            selection.insert(split, self.select_from_index(&index));
        }
        Ok(selection)
    }

    pub fn tasks(&self, selection: &Selection) -> Vec<Task> {
        selection
            .iter()
            .flat_map(|(&split, ids)| {
                ids.iter().map(move |id| Task {
                    id: id.clone(),
                    split,
                    output_root: self.config.paths.output_root.clone(),
                })
            })
            .collect()
    }

    /// Materialize `selection` and persist the manifest.
    pub fn materialize(&self, selection: &Selection) -> Result<RunSummary> {
        let output_root = &self.config.paths.output_root;
        std::fs::create_dir_all(output_root).map_err(|source| CurationError::Io {
            path: output_root.clone(),
            source,
        })?;

        let tasks = self.tasks(selection);
        let outcomes = self.pool.run(&tasks, self.source.as_ref(), self.assembler.as_ref());
        let manifest = Manifest::from_outcomes(outcomes);

        let manifest_path = self.config.manifest_path();
        manifest.persist(&manifest_path, self.config.paths.manifest_format)?;

        log::info!(
            "{} tasks: {} native+predicted, {} native only, {} failed",
            manifest.len(),
            manifest.count(RowStatus::NativeAndPredicted),
            manifest.count(RowStatus::NativeOnly),
            manifest.count(RowStatus::Failed)
        );
        Ok(RunSummary {
            selected: selection.iter().map(|(s, ids)| (*s, ids.len())).collect(),
            manifest,
            manifest_path,
        })
    }

    /// Full run. Fails early if the structure source is unusable.
    pub fn run(&self) -> Result<RunSummary> {
        self.source.check().map_err(CurationError::StructureSource)?;
        let selection = self.select_ids()?;
        self.materialize(&selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterConfig;
    use crate::data::model::{CandidateRecord, DomainSet};
    use crate::structure::source::InMemoryStructureSource;

    fn record(id: &str, cluster: &str, resolution: f32, l1: u32) -> CandidateRecord {
        CandidateRecord {
            cluster_id: Some(cluster.into()),
            cluster_id_l: Some(format!("{id}-L")),
            cluster_id_r: Some(format!("{id}-R")),
            length1: Some(l1),
            length2: Some(100),
            length: Some(l1 + 100),
            resolution: Some(resolution),
            method: Some("X-RAY DIFFRACTION".into()),
            label: Some("BIO".into()),
            uniprot_l: Some("P1".into()),
            uniprot_r: Some("P2".into()),
            ecod_names_l: Some(DomainSet::parse("x")),
            ecod_names_r: Some(DomainSet::parse("y")),
            ..CandidateRecord::new(id)
        }
    }

    fn table_only(output_root: PathBuf) -> CurationConfig {
        let mut config = CurationConfig::default();
        config.filters = FilterConfig {
            structural: false,
            ..FilterConfig::default()
        };
        config.workers.width = 2;
        config.workers.progress = false;
        config.paths.output_root = output_root;
        config
    }

    #[test]
    fn selection_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CurationPipeline::new(
            table_only(dir.path().to_path_buf()),
            Box::new(InMemoryStructureSource::new()),
            Box::new(ChainAssembler),
        )
        .unwrap();
        let index = CandidateIndex {
            split: Split::Val,
            records: vec![
                record("a", "C1", 1.2, 100),
                record("b", "C1", 2.5, 100),
                record("c", "C1", 0.5, 100),
                record("d", "C2", 0.9, 100),
            ],
        };
        let first = pipeline.select_from_index(&index);
        assert_eq!(first, pipeline.select_from_index(&index));
        assert_eq!(first.into_iter().collect::<Vec<_>>(), vec!["a", "c", "d"]);
    }

    #[test]
    fn tasks_cover_every_selected_id_per_split() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = CurationPipeline::new(
            table_only(dir.path().to_path_buf()),
            Box::new(InMemoryStructureSource::new()),
            Box::new(ChainAssembler),
        )
        .unwrap();
        let mut selection = Selection::new();
        selection.insert(Split::Train, ["x".to_string(), "y".to_string()].into());
        selection.insert(Split::Test, ["z".to_string()].into());
        let tasks = pipeline.tasks(&selection);
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.output_root == dir.path()));
        assert_eq!(tasks.iter().filter(|t| t.split == Split::Train).count(), 2);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = CurationConfig::default();
        config.selection.max_per_cluster = 0;
        let result = CurationPipeline::new(
            config,
            Box::new(InMemoryStructureSource::new()),
            Box::new(ChainAssembler),
        );
        assert!(matches!(result, Err(CurationError::Config(_))));
    }

    #[test]
    fn unusable_structure_root_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = table_only(dir.path().join("out"));
        config.paths.structure_root = dir.path().join("no_such_dir");
        let pipeline = CurationPipeline::from_config(config).unwrap();
        assert!(matches!(pipeline.run(), Err(CurationError::StructureSource(_))));
    }
}
