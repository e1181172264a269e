//! Materialization: one task per selected candidate, run on a bounded pool.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use crate::data::model::Split;
use crate::error::{CurationError, StructureAssemblyError, StructureLoadError};
use crate::structure::assembly::{AssemblyOptions, ComplexAssembler};
use crate::structure::model::Structure;
use crate::structure::source::{CandidateStructures, StructureSource};

/// Unit of work: write the complexes of `id` under `<output_root>/<split>/<id>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub split: Split,
    pub output_root: PathBuf,
}

impl Task {
    pub fn output_dir(&self) -> PathBuf {
        self.output_root.join(self.split.as_str()).join(&self.id)
    }
}

/// What a completed task wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub id: String,
    pub native_output_id: String,
    pub predicted_output_id: Option<String>,
    pub split: Split,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Predicted inputs were absent; only the native complex exists.
    NativeOnly(ResultRow),
    NativeAndPredicted(ResultRow),
    /// Loading, assembly or writing failed. `native_output_id` is set when
    /// the native file had already been written.
    Failed {
        id: String,
        split: Split,
        native_output_id: Option<String>,
        error: String,
    },
}

impl TaskOutcome {
    pub fn id(&self) -> &str {
        match self {
            TaskOutcome::NativeOnly(row) | TaskOutcome::NativeAndPredicted(row) => &row.id,
            TaskOutcome::Failed { id, .. } => id,
        }
    }

    pub fn split(&self) -> Split {
        match self {
            TaskOutcome::NativeOnly(row) | TaskOutcome::NativeAndPredicted(row) => row.split,
            TaskOutcome::Failed { split, .. } => *split,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TaskOutcome::Failed { .. })
    }
}

struct PartialFailure {
    native_output_id: Option<String>,
    error: StructureAssemblyError,
}

impl From<StructureAssemblyError> for PartialFailure {
    fn from(error: StructureAssemblyError) -> Self {
        Self {
            native_output_id: None,
            error,
        }
    }
}

impl From<StructureLoadError> for PartialFailure {
    fn from(error: StructureLoadError) -> Self {
        StructureAssemblyError::from(error).into()
    }
}

/// Load, assemble and write one candidate's complexes.
pub fn materialize_candidate(
    task: &Task,
    source: &dyn StructureSource,
    assembler: &dyn ComplexAssembler,
) -> TaskOutcome {
    match try_materialize(task, source, assembler) {
        Ok(outcome) => outcome,
        Err(PartialFailure {
            native_output_id,
            error,
        }) => TaskOutcome::Failed {
            id: task.id.clone(),
            split: task.split,
            native_output_id,
            error: error.to_string(),
        },
    }
}

fn try_materialize(
    task: &Task,
    source: &dyn StructureSource,
    assembler: &dyn ComplexAssembler,
) -> Result<TaskOutcome, PartialFailure> {
    let structures = source.load(&task.id)?;
    let CandidateStructures {
        id,
        native_receptor,
        native_ligand,
        pred_receptor,
        pred_ligand,
    } = structures;
    let missing = |side| StructureLoadError::MissingNative {
        id: id.clone(),
        side,
    };
    let mut native_r = native_receptor.ok_or_else(|| missing("receptor"))?;
    let mut native_l = native_ligand.ok_or_else(|| missing("ligand"))?;

    let dir = task.output_dir();
    create_dir_idempotent(&dir)?;

    let options = AssemblyOptions::default();
    native_r.remove_hydrogens();
    native_l.remove_hydrogens();
    let native = assembler.assemble(&native_r, &native_l, (&native_r, &native_l), options)?;
    native.write_pdb(&dir)?;

    let mut row = ResultRow {
        id: task.id.clone(),
        native_output_id: native.id,
        predicted_output_id: None,
        split: task.split,
    };

    let (mut pred_r, mut pred_l) = match (pred_receptor, pred_ligand) {
        (Some(r), Some(l)) => (r, l),
        (r, l) => {
            log::debug!(
                "{}: predicted {} missing, native complex only",
                task.id,
                missing_sides(r.as_ref(), l.as_ref())
            );
            return Ok(TaskOutcome::NativeOnly(row));
        }
    };

    let with_native = |error: StructureAssemblyError| PartialFailure {
        native_output_id: Some(row.native_output_id.clone()),
        error,
    };
    pred_r.remove_hydrogens();
    pred_l.remove_hydrogens();
    let predicted = assembler
        .assemble(&pred_r, &pred_l, (&native_r, &native_l), options)
        .map_err(with_native)?;
    predicted.write_pdb(&dir).map_err(with_native)?;

    row.predicted_output_id = Some(predicted.id);
    Ok(TaskOutcome::NativeAndPredicted(row))
}

fn missing_sides(r: Option<&Structure>, l: Option<&Structure>) -> &'static str {
    match (r.is_none(), l.is_none()) {
        (true, true) => "receptor and ligand",
        (true, false) => "receptor",
        _ => "ligand",
    }
}

/// `create_dir_all` tolerating a concurrent creator.
fn create_dir_idempotent(dir: &Path) -> Result<(), StructureAssemblyError> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(_) if dir.is_dir() => Ok(()),
        Err(source) => Err(StructureAssemblyError::Write {
            path: dir.to_path_buf(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// Worker pool
// ---------------------------------------------------------------------------

/// Fixed-width pool. Tasks are independent; outcomes come back one per task
/// in no guaranteed order relative to completion.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    width: usize,
    progress: bool,
}

impl WorkerPool {
    pub fn new(width: usize, progress: bool) -> Result<Self, CurationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(width)
            .thread_name(|i| format!("curate-worker-{i}"))
            .build()
            .map_err(|e| CurationError::WorkerPool(e.to_string()))?;
        Ok(Self {
            pool,
            width,
            progress,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `op` inside the pool so its parallel iterators use these workers.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }

    /// Run every task. A panicking task becomes a failed outcome; siblings
    /// keep running.
    pub fn run(
        &self,
        tasks: &[Task],
        source: &dyn StructureSource,
        assembler: &dyn ComplexAssembler,
    ) -> Vec<TaskOutcome> {
        let bar = self.progress_bar(tasks.len());
        log::info!("materializing {} tasks on {} workers", tasks.len(), self.width);

        let outcomes: Vec<TaskOutcome> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let outcome = run_guarded(task, source, assembler);
                    if let TaskOutcome::Failed { error, .. } = &outcome {
                        log::warn!("{} ({}): {error}", task.id, task.split);
                    }
                    bar.inc(1);
                    outcome
                })
                .collect()
        });

        bar.finish_and_clear();
        outcomes
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("█▓▒░"));
        }
        bar
    }
}

fn run_guarded(task: &Task, source: &dyn StructureSource, assembler: &dyn ComplexAssembler) -> TaskOutcome {
    panic::catch_unwind(AssertUnwindSafe(|| materialize_candidate(task, source, assembler)))
        .unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            TaskOutcome::Failed {
                id: task.id.clone(),
                split: task.split,
                native_output_id: None,
                error: format!("worker panicked: {message}"),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::assembly::{ChainAssembler, Complex};
    use crate::structure::model::tests::chain;
    use crate::structure::source::InMemoryStructureSource;

    fn system(id: &str, pred_r: bool, pred_l: bool) -> CandidateStructures {
        CandidateStructures {
            id: id.to_string(),
            native_receptor: Some(chain(&format!("{id}-R"), 4, [0.0; 3])),
            native_ligand: Some(chain(&format!("{id}-L"), 3, [0.0, 6.0, 0.0])),
            pred_receptor: pred_r.then(|| chain(&format!("{id}-pred-R"), 4, [0.2, 0.0, 0.0])),
            pred_ligand: pred_l.then(|| chain(&format!("{id}-pred-L"), 3, [0.2, 6.0, 0.0])),
        }
    }

    fn task(root: &Path, id: &str) -> Task {
        Task {
            id: id.to_string(),
            split: Split::Train,
            output_root: root.to_path_buf(),
        }
    }

    fn pdb_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_native_and_predicted_complexes() {
        let root = tempfile::tempdir().unwrap();
        let mut source = InMemoryStructureSource::new();
        source.insert(system("s1", true, true));

        let t = task(root.path(), "s1");
        let outcome = materialize_candidate(&t, &source, &ChainAssembler);
        let row = match outcome {
            TaskOutcome::NativeAndPredicted(row) => row,
            other => panic!("expected both complexes, got {other:?}"),
        };
        assert_eq!(row.native_output_id, "s1");
        assert_eq!(row.predicted_output_id.as_deref(), Some("s1-pred"));
        assert_eq!(pdb_files(&t.output_dir()), vec!["s1-pred.pdb", "s1.pdb"]);

        let written = std::fs::read_to_string(t.output_dir().join("s1.pdb")).unwrap();
        assert!(!written.lines().any(|l| l.ends_with(" H")));
    }

    #[test]
    fn missing_predicted_ligand_yields_native_only() {
        let root = tempfile::tempdir().unwrap();
        let mut source = InMemoryStructureSource::new();
        source.insert(system("s2", true, false));

        let t = task(root.path(), "s2");
        let outcome = materialize_candidate(&t, &source, &ChainAssembler);
        let row = match outcome {
            TaskOutcome::NativeOnly(row) => row,
            other => panic!("expected native only, got {other:?}"),
        };
        assert_eq!(row.predicted_output_id, None);
        assert_eq!(pdb_files(&t.output_dir()), vec!["s2.pdb"]);
    }

    #[test]
    fn load_failure_becomes_failed_outcome() {
        let root = tempfile::tempdir().unwrap();
        let source = InMemoryStructureSource::new();
        let outcome = materialize_candidate(&task(root.path(), "ghost"), &source, &ChainAssembler);
        assert!(outcome.is_failed());
        assert_eq!(outcome.id(), "ghost");
    }

    struct PanickingAssembler;

    impl ComplexAssembler for PanickingAssembler {
        fn assemble(
            &self,
            _receptor: &Structure,
            _ligand: &Structure,
            _reference: (&Structure, &Structure),
            _options: AssemblyOptions,
        ) -> Result<Complex, StructureAssemblyError> {
            panic!("geometry exploded")
        }
    }

    #[test]
    fn panicking_task_does_not_take_down_the_pool() {
        let root = tempfile::tempdir().unwrap();
        let mut source = InMemoryStructureSource::new();
        source.insert(system("p1", false, false));
        source.insert(system("p2", false, false));
        let tasks = vec![task(root.path(), "p1"), task(root.path(), "p2")];

        let outcomes = WorkerPool::new(2, false)
            .unwrap()
            .run(&tasks, &source, &PanickingAssembler);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(TaskOutcome::is_failed));
    }

    #[test]
    fn concurrent_tasks_share_directories_without_errors() {
        let root = tempfile::tempdir().unwrap();
        let mut source = InMemoryStructureSource::new();
        source.insert(system("same", true, true));
        let tasks: Vec<Task> = (0..16).map(|_| task(root.path(), "same")).collect();

        let outcomes = WorkerPool::new(8, false)
            .unwrap()
            .run(&tasks, &source, &ChainAssembler);
        assert_eq!(outcomes.len(), 16);
        assert!(outcomes.iter().all(|o| !o.is_failed()), "{outcomes:?}");
    }
}
