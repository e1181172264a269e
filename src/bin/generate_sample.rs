//! Writes a small synthetic dataset for trying the curator end to end:
//! `<out>/<split>/{index,metadata}.parquet` plus `<out>/structures/<id>/*.pdb`.
//!
//! ```bash
//! cargo run --bin generate_sample -- data
//! complex-curator --data-root data --structure-root data/structures
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use complex_curator::data::model::Split;
use complex_curator::structure::pdb::write_pdb;
use complex_curator::structure::source::{
    NATIVE_LIGAND_FILE, NATIVE_RECEPTOR_FILE, PRED_LIGAND_FILE, PRED_RECEPTOR_FILE,
};
use complex_curator::structure::Atom;

const RESIDUES: [&str; 6] = ["ALA", "GLY", "SER", "LEU", "LYS", "GLU"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range(&mut self, lo: u32, hi: u32) -> u32 {
        lo + (self.next_u64() % u64::from(hi - lo + 1)) as u32
    }

    fn jitter(&mut self, scale: f64) -> f64 {
        (self.next_f64() - 0.5) * 2.0 * scale
    }
}

/// One synthetic index row with its metadata.
struct Candidate {
    id: String,
    cluster_id: String,
    length1: u32,
    length2: u32,
    ecod_l: String,
    ecod_r: String,
    resolution: f64,
    predicted: bool,
}

/// Backbone chain along x at height `y`, 3.8 Å between residues.
fn backbone(chain_id: char, residues: u32, y: f64, noise: f64, rng: &mut SimpleRng) -> Vec<Atom> {
    let mut atoms = Vec::new();
    for i in 0..residues {
        let x = 3.8 * f64::from(i);
        let residue_name = RESIDUES[i as usize % RESIDUES.len()];
        for (name, dx, dy) in [("N", -1.2, 0.3), ("CA", 0.0, 0.0), ("C", 1.2, 0.3), ("O", 1.6, 1.2), ("CB", 0.0, -1.5)] {
            atoms.push(Atom {
                serial: 0,
                name: name.to_string(),
                residue_name: residue_name.to_string(),
                chain_id,
                residue_seq: i as i32 + 1,
                insertion_code: None,
                coord: [x + dx + rng.jitter(noise), y + dy + rng.jitter(noise), rng.jitter(noise)],
                occupancy: 1.0,
                b_factor: 20.0,
                element: name[..1].to_string(),
                is_hetatm: false,
            });
        }
    }
    atoms
}

fn write_structure(path: &Path, atoms: &[Atom]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_pdb(&mut BufWriter::new(file), atoms).with_context(|| format!("writing {}", path.display()))
}

fn write_structures(root: &Path, c: &Candidate, rng: &mut SimpleRng) -> Result<()> {
    let dir = root.join(&c.id);
    std::fs::create_dir_all(&dir)?;
    // Receptor and ligand run side by side 6 Å apart so CA contacts abound.
    write_structure(&dir.join(NATIVE_RECEPTOR_FILE), &backbone('A', c.length1, 0.0, 0.2, rng))?;
    write_structure(&dir.join(NATIVE_LIGAND_FILE), &backbone('B', c.length2, 6.0, 0.2, rng))?;
    if c.predicted {
        write_structure(&dir.join(PRED_RECEPTOR_FILE), &backbone('A', c.length1, 0.0, 1.0, rng))?;
        write_structure(&dir.join(PRED_LIGAND_FILE), &backbone('B', c.length2, 6.0, 1.0, rng))?;
    }
    Ok(())
}

fn candidates(split: Split, count: usize, rng: &mut SimpleRng) -> Vec<Candidate> {
    (0..count)
        .map(|i| {
            let mut c = Candidate {
                id: format!("{}_{i:03}", split.as_str()),
                cluster_id: format!("{}_cluster_{}", split.as_str(), i / 3),
                length1: rng.range(60, 180),
                length2: rng.range(60, 180),
                ecod_l: format!("e{}.1", i % 4),
                ecod_r: format!("e{}.2", i % 4),
                resolution: 1.0 + (rng.next_f64() * 30.0).round() / 10.0,
                predicted: i % 4 != 3,
            };
            // A few rows that the table-level bounds reject.
            match i % 7 {
                5 => c.length1 = 600,
                6 => c.ecod_r = c.ecod_l.clone(),
                _ => {}
            }
            c
        })
        .collect()
}

fn write_parquet(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<()> {
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn strings<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from(values.collect::<Vec<_>>()))
}

fn write_tables(dir: &Path, rows: &[Candidate]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let cluster_l: Vec<String> = rows.iter().map(|c| format!("{}-L", c.cluster_id)).collect();
    let cluster_r: Vec<String> = rows.iter().map(|c| format!("{}-R", c.cluster_id)).collect();
    let uniprot_l: Vec<String> = rows.iter().map(|c| format!("P{}L", c.id)).collect();
    let uniprot_r: Vec<String> = rows.iter().map(|c| format!("P{}R", c.id)).collect();

    let text = |name: &str| Field::new(name, DataType::Utf8, false);
    let index_schema = Arc::new(Schema::new(vec![
        text("id"),
        text("cluster_id"),
        text("cluster_id_L"),
        text("cluster_id_R"),
        Field::new("length1", DataType::Int64, false),
        Field::new("length2", DataType::Int64, false),
        text("uniprot_L"),
        text("uniprot_R"),
        text("ECOD_names_L"),
        text("ECOD_names_R"),
        text("label"),
        text("method"),
    ]));
    write_parquet(
        &dir.join("index.parquet"),
        index_schema,
        vec![
            strings(rows.iter().map(|c| c.id.as_str())),
            strings(rows.iter().map(|c| c.cluster_id.as_str())),
            strings(cluster_l.iter().map(String::as_str)),
            strings(cluster_r.iter().map(String::as_str)),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|c| i64::from(c.length1)))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|c| i64::from(c.length2)))),
            strings(uniprot_l.iter().map(String::as_str)),
            strings(uniprot_r.iter().map(String::as_str)),
            strings(rows.iter().map(|c| c.ecod_l.as_str())),
            strings(rows.iter().map(|c| c.ecod_r.as_str())),
            strings(rows.iter().map(|_| "BIO")),
            strings(rows.iter().map(|_| "X-RAY DIFFRACTION")),
        ],
    )?;

    let metadata_schema = Arc::new(Schema::new(vec![
        text("id"),
        Field::new("resolution", DataType::Float64, true),
    ]));
    write_parquet(
        &dir.join("metadata.parquet"),
        metadata_schema,
        vec![
            strings(rows.iter().map(|c| c.id.as_str())),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|c| c.resolution))),
        ],
    )
}

fn main() -> Result<()> {
    let out = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data"));
    let structure_root = out.join("structures");
    let mut rng = SimpleRng::new(42);

    let mut total = 0;
    for (split, count) in [(Split::Train, 24), (Split::Val, 9), (Split::Test, 9)] {
        let rows = candidates(split, count, &mut rng);
        write_tables(&out.join(split.as_str()), &rows)?;
        for c in &rows {
            write_structures(&structure_root, c, &mut rng)?;
        }
        total += rows.len();
    }

    println!("Wrote {total} candidates to {}", out.display());
    Ok(())
}
