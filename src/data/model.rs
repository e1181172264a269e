use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CellValue – a single cell of a source table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes found in index/metadata tables.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Arrow type we do not decode; kept so a consumer that needs the column
    /// fails loudly instead of seeing a null.
    Unsupported(String),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Unsupported(t) => write!(f, "<unsupported {t}>"),
            CellValue::Null => write!(f, "<null>"),
        }
    }
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Textual form of a scalar cell; `None` for null.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// RawTable – an untyped table as read from disk
// ---------------------------------------------------------------------------

/// Column-named rows exactly as read from a csv or parquet file.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Column names in file order.
    pub columns: Vec<String>,
    pub rows: Vec<BTreeMap<String, CellValue>>,
}

impl RawTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    #[serde(alias = "validation")]
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "val" | "validation" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            other => Err(format!("unknown split '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// DomainSet – parsed ECOD domain names of one side
// ---------------------------------------------------------------------------

/// Comma-delimited domain/family names parsed once into a set.
/// Blank tokens are dropped, so an empty field is the empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet(BTreeSet<String>);

impl DomainSet {
    pub fn parse(field: &str) -> Self {
        DomainSet(
            field
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_disjoint(&self, other: &DomainSet) -> bool {
        self.0.is_disjoint(&other.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CandidateRecord – one joined row
// ---------------------------------------------------------------------------

/// One candidate complex after the index/metadata join.
///
/// Everything except `id` is nullable because metadata comes from a left
/// join and upstream tables are not trusted to be complete.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub id: String,
    pub cluster_id: Option<String>,
    pub cluster_id_l: Option<String>,
    pub cluster_id_r: Option<String>,
    pub length1: Option<u32>,
    pub length2: Option<u32>,
    /// `length1 + length2` when both are known.
    pub length: Option<u32>,
    pub resolution: Option<f32>,
    pub method: Option<String>,
    pub label: Option<String>,
    pub uniprot_l: Option<String>,
    pub uniprot_r: Option<String>,
    /// `None` when the source field was null.
    pub ecod_names_l: Option<DomainSet>,
    pub ecod_names_r: Option<DomainSet>,
}

impl CandidateRecord {
    /// A record with only the identifier set.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cluster_id: None,
            cluster_id_l: None,
            cluster_id_r: None,
            length1: None,
            length2: None,
            length: None,
            resolution: None,
            method: None,
            label: None,
            uniprot_l: None,
            uniprot_r: None,
            ecod_names_l: None,
            ecod_names_r: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_set_parsing_trims_and_drops_blanks() {
        let set = DomainSet::parse(" Rossmann-like , ,TIM barrel,");
        assert_eq!(set.len(), 2);
        assert!(DomainSet::parse("").is_empty());
    }

    #[test]
    fn any_shared_domain_breaks_disjointness() {
        let l = DomainSet::parse("A,B,C");
        let r = DomainSet::parse("D,C");
        assert!(!l.is_disjoint(&r));
        assert!(l.is_disjoint(&DomainSet::parse("D,E")));
        assert!(DomainSet::parse("").is_disjoint(&DomainSet::parse("")));
    }

    #[test]
    fn padding_after_commas_does_not_hide_a_shared_domain() {
        assert!(!DomainSet::parse("A, B").is_disjoint(&DomainSet::parse("B")));
    }

    #[test]
    fn split_names_round_trip_through_from_str() {
        for split in Split::ALL {
            assert_eq!(split.as_str().parse::<Split>().unwrap(), split);
        }
        assert_eq!("validation".parse::<Split>().unwrap(), Split::Val);
        assert!("holdout".parse::<Split>().is_err());
    }
}
