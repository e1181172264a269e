//! Atom and chain representation.

/// Residue identity within one chain: sequence number plus insertion code.
pub type ResidueKey = (i32, Option<char>);

/// A single atom record.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub serial: u32,
    /// Atom name (e.g. "CA", "CB", "N")
    pub name: String,
    pub residue_name: String,
    pub chain_id: char,
    pub residue_seq: i32,
    pub insertion_code: Option<char>,
    /// Ångström.
    pub coord: [f64; 3],
    pub occupancy: f64,
    pub b_factor: f64,
    /// Element symbol, upper case (e.g. "C", "N", "H")
    pub element: String,
    pub is_hetatm: bool,
}

impl Atom {
    pub fn residue_key(&self) -> ResidueKey {
        (self.residue_seq, self.insertion_code)
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == "H"
    }

    pub fn is_calpha(&self) -> bool {
        self.name == "CA" && !self.is_hetatm
    }

    pub fn distance(&self, other: &Atom) -> f64 {
        distance(&self.coord, &other.coord)
    }
}

pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// One residue's slice of a [`Structure`]'s atoms.
#[derive(Debug, Clone, Copy)]
pub struct ResidueView<'a> {
    pub key: ResidueKey,
    pub atoms: &'a [Atom],
}

impl<'a> ResidueView<'a> {
    pub fn name(&self) -> &'a str {
        &self.atoms[0].residue_name
    }

    pub fn calpha(&self) -> Option<&'a Atom> {
        self.atoms.iter().find(|a| a.is_calpha())
    }

    /// CA when present, otherwise the first atom.
    pub fn representative(&self) -> &'a Atom {
        self.calpha().unwrap_or(&self.atoms[0])
    }
}

/// A monomer (one chain) or any ordered atom collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Identifier of the substructure, e.g. `<candidate>-R`.
    pub id: String,
    pub atoms: Vec<Atom>,
}

impl Structure {
    pub fn new(id: impl Into<String>, atoms: Vec<Atom>) -> Self {
        Self { id: id.into(), atoms }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Drop hydrogen atoms in place. Returns how many were removed.
    pub fn remove_hydrogens(&mut self) -> usize {
        let before = self.atoms.len();
        self.atoms.retain(|a| !a.is_hydrogen());
        before - self.atoms.len()
    }

    /// Residues in file order. Consecutive atoms with the same chain and
    /// residue key form one residue.
    pub fn residues(&self) -> Vec<ResidueView<'_>> {
        let mut out = Vec::new();
        let mut start = 0;
        for i in 1..=self.atoms.len() {
            let boundary = i == self.atoms.len() || {
                let (prev, cur) = (&self.atoms[i - 1], &self.atoms[i]);
                prev.chain_id != cur.chain_id || prev.residue_key() != cur.residue_key()
            };
            if boundary && start < i {
                out.push(ResidueView {
                    key: self.atoms[start].residue_key(),
                    atoms: &self.atoms[start..i],
                });
                start = i;
            }
        }
        out
    }

    /// Number of distinct atom names. CA-only or backbone-only models score low.
    pub fn atom_type_count(&self) -> usize {
        let mut names: Vec<&str> = self.atoms.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }

    /// Reduced representation: one coordinate per residue.
    pub fn residue_coords(&self, calpha_only: bool) -> Vec<[f64; 3]> {
        self.residues()
            .iter()
            .filter_map(|r| {
                if calpha_only {
                    r.calpha().map(|a| a.coord)
                } else {
                    Some(r.representative().coord)
                }
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Test atom at `coord` in residue `seq`.
    pub(crate) fn atom(name: &str, residue_name: &str, seq: i32, coord: [f64; 3]) -> Atom {
        Atom {
            serial: 0,
            name: name.to_string(),
            residue_name: residue_name.to_string(),
            chain_id: 'A',
            residue_seq: seq,
            insertion_code: None,
            coord,
            occupancy: 1.0,
            b_factor: 0.0,
            element: name.chars().next().map(|c| c.to_string()).unwrap_or_default(),
            is_hetatm: false,
        }
    }

    /// A straight chain of residues with N, CA, C, O and one hydrogen each,
    /// 3.8 Å apart along x starting at `origin`.
    pub(crate) fn chain(id: &str, residues: usize, origin: [f64; 3]) -> Structure {
        let mut atoms = Vec::new();
        for i in 0..residues {
            let x = origin[0] + 3.8 * i as f64;
            let seq = i as i32 + 1;
            for (name, dx) in [("N", -1.2), ("CA", 0.0), ("C", 1.2), ("O", 1.6), ("H", -1.9)] {
                atoms.push(atom(name, "ALA", seq, [x + dx, origin[1], origin[2]]));
            }
        }
        Structure::new(id, atoms)
    }

    #[test]
    fn hydrogen_removal_keeps_heavy_atoms() {
        let mut s = chain("a", 3, [0.0; 3]);
        assert_eq!(s.remove_hydrogens(), 3);
        assert_eq!(s.len(), 12);
        assert!(s.atoms.iter().all(|a| !a.is_hydrogen()));
    }

    #[test]
    fn residues_group_consecutive_atoms() {
        let s = chain("a", 4, [0.0; 3]);
        let residues = s.residues();
        assert_eq!(residues.len(), 4);
        assert_eq!(residues[2].key, (3, None));
        assert_eq!(residues[2].atoms.len(), 5);
        assert_eq!(residues[0].calpha().map(|a| a.coord[0]), Some(0.0));
    }

    #[test]
    fn atom_types_count_distinct_names() {
        let s = chain("a", 2, [0.0; 3]);
        assert_eq!(s.atom_type_count(), 5);
    }
}
