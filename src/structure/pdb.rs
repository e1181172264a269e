//! PDB reading and writing for single-model protein chains.

use std::io::{self, Write};
use std::ops::Range;

use super::model::{Atom, Structure};

/// Parse ATOM/HETATM records of the first model.
///
/// Alternate locations other than blank/`A` are skipped. A blank element
/// column is inferred from the atom name.
pub fn parse_pdb(id: &str, contents: &str) -> Result<Structure, String> {
    let mut atoms = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.starts_with("ENDMDL") {
            break;
        }
        let record = line.get(0..6).unwrap_or("").trim();
        if record != "ATOM" && record != "HETATM" {
            continue;
        }
        let alt_loc = line.get(16..17).and_then(extract_char);
        if !matches!(alt_loc, None | Some('A')) {
            continue;
        }
        let atom = parse_atom_line(line, record == "HETATM")
            .map_err(|e| format!("line {}: {e}", line_no + 1))?;
        atoms.push(atom);
    }

    Ok(Structure::new(id, atoms))
}

fn parse_atom_line(line: &str, is_hetatm: bool) -> Result<Atom, String> {
    let name = field(line, 12..16).ok_or("missing atom name")?.to_string();
    let residue_name = field(line, 17..20).unwrap_or("UNK").to_ascii_uppercase();
    let chain_id = line.get(21..22).and_then(extract_char).unwrap_or('A');
    let residue_seq = parse_num::<i32>(line, 22..26, "residue number")?;
    let insertion_code = line.get(26..27).and_then(extract_char);
    let coord = [
        parse_num::<f64>(line, 30..38, "x")?,
        parse_num::<f64>(line, 38..46, "y")?,
        parse_num::<f64>(line, 46..54, "z")?,
    ];
    let element = field(line, 76..78)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| infer_element(&name));

    Ok(Atom {
        serial: field(line, 6..11).and_then(|s| s.parse().ok()).unwrap_or(0),
        name,
        residue_name,
        chain_id,
        residue_seq,
        insertion_code,
        coord,
        occupancy: field(line, 54..60).and_then(|s| s.parse().ok()).unwrap_or(1.0),
        b_factor: field(line, 60..66).and_then(|s| s.parse().ok()).unwrap_or(0.0),
        element,
        is_hetatm,
    })
}

fn field(line: &str, range: Range<usize>) -> Option<&str> {
    let end = range.end.min(line.len());
    line.get(range.start..end).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_num<T: std::str::FromStr>(line: &str, range: Range<usize>, what: &str) -> Result<T, String> {
    let raw = field(line, range).ok_or_else(|| format!("missing {what}"))?;
    raw.parse().map_err(|_| format!("invalid {what} '{raw}'"))
}

fn extract_char(s: &str) -> Option<char> {
    s.chars().next().filter(|c| !c.is_whitespace())
}

fn infer_element(name: &str) -> String {
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

/// Write atoms as ATOM/HETATM records followed by TER per chain and END.
/// Serial numbers are reassigned from 1.
pub fn write_pdb<W: Write>(out: &mut W, atoms: &[Atom]) -> io::Result<()> {
    let mut serial = 0u32;
    for (i, atom) in atoms.iter().enumerate() {
        serial += 1;
        let record = if atom.is_hetatm { "HETATM" } else { "ATOM" };
        let name = if atom.name.len() < 4 && atom.element.len() == 1 {
            format!(" {:<3}", atom.name)
        } else {
            format!("{:<4}", atom.name)
        };
        writeln!(
            out,
            "{:<6}{:>5} {} {:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
            record,
            serial % 100_000,
            name,
            atom.residue_name,
            atom.chain_id,
            atom.residue_seq,
            atom.insertion_code.unwrap_or(' '),
            atom.coord[0],
            atom.coord[1],
            atom.coord[2],
            atom.occupancy,
            atom.b_factor,
            atom.element,
        )?;
        let chain_ends = atoms.get(i + 1).map_or(true, |next| next.chain_id != atom.chain_id);
        if chain_ends {
            serial += 1;
            writeln!(out, "TER   {:>5}      {:>3} {}{:>4}", serial % 100_000, atom.residue_name, atom.chain_id, atom.residue_seq)?;
        }
    }
    writeln!(out, "END")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PDB: &str = "\
HEADER    TRANSFERASE                             01-JAN-00   1ABC
ATOM      1  N   ALA A   1      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  ALA A   1      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  H   ALA A   1      10.500   6.000  -6.900  1.00  0.00           H
ATOM      4  CA AGLY A   2      12.000   7.000  -4.000  0.50  0.00           C
ATOM      5  CA BGLY A   2      12.100   7.100  -4.100  0.50  0.00           C
HETATM    6  O   HOH A 101       1.000   1.000   1.000  1.00  0.00
ENDMDL
ATOM      7  CA  ALA A   1       0.000   0.000   0.000  1.00  0.00           C
";

    #[test]
    fn parses_first_model_and_primary_altloc() {
        let s = parse_pdb("x", PDB).unwrap();
        assert_eq!(s.len(), 5);
        assert_eq!(s.atoms[1].name, "CA");
        assert_eq!(s.atoms[1].coord, [11.639, 6.071, -5.147]);
        assert_eq!(s.atoms[3].residue_name, "GLY");
        assert_eq!(s.atoms[3].occupancy, 0.5);
        assert!(s.atoms[4].is_hetatm);
        assert_eq!(s.atoms[4].element, "O");
    }

    #[test]
    fn bad_coordinate_is_reported_with_line() {
        let bad = "ATOM      1  CA  ALA A   1      xx.xxx   6.071  -5.147  1.00  0.00           C\n";
        let err = parse_pdb("x", bad).unwrap_err();
        assert!(err.starts_with("line 1"));
    }

    #[test]
    fn written_records_parse_back() {
        let s = parse_pdb("x", PDB).unwrap();
        let mut buf = Vec::new();
        write_pdb(&mut buf, &s.atoms).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.lines().next().unwrap().starts_with("ATOM      1  N   ALA A   1"));
        assert!(text.ends_with("END\n"));
        let back = parse_pdb("x", &text).unwrap();
        assert_eq!(back.len(), s.len());
        assert_eq!(back.atoms[1].coord, s.atoms[1].coord);
        assert_eq!(back.atoms[3].residue_name, "GLY");
    }
}
