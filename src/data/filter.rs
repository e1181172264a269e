use crate::config::SelectionConfig;

use super::model::CandidateRecord;

// ---------------------------------------------------------------------------
// Row-level bounds: table predicates every selected candidate must satisfy
// ---------------------------------------------------------------------------

/// Why a record failed the row-level bounds. Used for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    TotalLength,
    MonomerLength,
    Label,
    Method,
    SameSideCluster,
    SameUniprot,
    SharedDomain,
    /// A field the bound needs was null.
    Incomplete(&'static str),
}

/// Conjunctive table-level filter built from [`SelectionConfig`].
#[derive(Debug, Clone)]
pub struct RowBounds {
    max_length: u32,
    min_monomer: u32,
    max_monomer: u32,
    label: String,
    method: String,
}

impl RowBounds {
    pub fn new(config: &SelectionConfig) -> Self {
        Self {
            max_length: config.max_length,
            min_monomer: config.min_length_per_monomer,
            max_monomer: config.max_length_per_monomer,
            label: config.label.clone(),
            method: config.method.clone(),
        }
    }

    /// Check one record. A null field needed by a bound rejects the record.
    pub fn check(&self, rec: &CandidateRecord) -> Result<(), RowRejection> {
        let length = rec.length.ok_or(RowRejection::Incomplete("length"))?;
        if length > self.max_length {
            return Err(RowRejection::TotalLength);
        }
        let l1 = rec.length1.ok_or(RowRejection::Incomplete("length1"))?;
        let l2 = rec.length2.ok_or(RowRejection::Incomplete("length2"))?;
        let monomer_ok = |l: u32| (self.min_monomer..=self.max_monomer).contains(&l);
        if !monomer_ok(l1) || !monomer_ok(l2) {
            return Err(RowRejection::MonomerLength);
        }

        if rec.label.as_deref() != Some(self.label.as_str()) {
            return Err(RowRejection::Label);
        }
        if rec.method.as_deref() != Some(self.method.as_str()) {
            return Err(RowRejection::Method);
        }

        let cl = rec.cluster_id_l.as_ref().ok_or(RowRejection::Incomplete("cluster_id_L"))?;
        let cr = rec.cluster_id_r.as_ref().ok_or(RowRejection::Incomplete("cluster_id_R"))?;
        if cl == cr {
            return Err(RowRejection::SameSideCluster);
        }
        let ul = rec.uniprot_l.as_ref().ok_or(RowRejection::Incomplete("uniprot_L"))?;
        let ur = rec.uniprot_r.as_ref().ok_or(RowRejection::Incomplete("uniprot_R"))?;
        if ul == ur {
            return Err(RowRejection::SameUniprot);
        }

        let dl = rec.ecod_names_l.as_ref().ok_or(RowRejection::Incomplete("ECOD_names_L"))?;
        let dr = rec.ecod_names_r.as_ref().ok_or(RowRejection::Incomplete("ECOD_names_R"))?;
        if !dl.is_disjoint(dr) {
            return Err(RowRejection::SharedDomain);
        }
        Ok(())
    }

    pub fn passes(&self, rec: &CandidateRecord) -> bool {
        self.check(rec).is_ok()
    }
}

/// Return indices of records that pass all row-level bounds.
pub fn filtered_indices(records: &[CandidateRecord], bounds: &RowBounds) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, rec)| match bounds.check(rec) {
            Ok(()) => true,
            Err(reason) => {
                log::debug!("{}: rejected by row bounds ({reason:?})", rec.id);
                false
            }
        })
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::DomainSet;

    fn passing(id: &str) -> CandidateRecord {
        CandidateRecord {
            cluster_id: Some("C1".into()),
            cluster_id_l: Some("L1".into()),
            cluster_id_r: Some("R1".into()),
            length1: Some(100),
            length2: Some(200),
            length: Some(300),
            resolution: Some(2.0),
            method: Some("X-RAY DIFFRACTION".into()),
            label: Some("BIO".into()),
            uniprot_l: Some("P11111".into()),
            uniprot_r: Some("P22222".into()),
            ecod_names_l: Some(DomainSet::parse("Rossmann")),
            ecod_names_r: Some(DomainSet::parse("TIM barrel")),
            ..CandidateRecord::new(id)
        }
    }

    fn bounds() -> RowBounds {
        RowBounds::new(&SelectionConfig::default())
    }

    #[test]
    fn well_formed_record_passes() {
        assert_eq!(bounds().check(&passing("a")), Ok(()));
    }

    #[test]
    fn each_bound_rejects_on_its_own() {
        let b = bounds();
        let cases: [(fn(&mut CandidateRecord), RowRejection); 8] = [
            (|r| { r.length1 = Some(512); r.length2 = Some(513); r.length = Some(1025) }, RowRejection::TotalLength),
            (|r| { r.length1 = Some(49); r.length = Some(249) }, RowRejection::MonomerLength),
            (|r| { r.length2 = Some(513); r.length = Some(613) }, RowRejection::MonomerLength),
            (|r| r.label = Some("NONBIO".into()), RowRejection::Label),
            (|r| r.method = Some("SOLUTION NMR".into()), RowRejection::Method),
            (|r| r.cluster_id_r = Some("L1".into()), RowRejection::SameSideCluster),
            (|r| r.uniprot_r = Some("P11111".into()), RowRejection::SameUniprot),
            (|r| r.ecod_names_r = Some(DomainSet::parse("TIM barrel,Rossmann")), RowRejection::SharedDomain),
        ];
        for (mutate, expected) in cases {
            let mut rec = passing("a");
            mutate(&mut rec);
            assert_eq!(b.check(&rec), Err(expected));
        }
    }

    #[test]
    fn monomer_bounds_are_inclusive() {
        let mut rec = passing("a");
        rec.length1 = Some(50);
        rec.length2 = Some(512);
        rec.length = Some(562);
        assert!(bounds().passes(&rec));
    }

    #[test]
    fn null_domain_annotation_fails_closed() {
        let mut rec = passing("a");
        rec.ecod_names_l = None;
        assert_eq!(bounds().check(&rec), Err(RowRejection::Incomplete("ECOD_names_L")));
    }

    #[test]
    fn empty_domain_annotations_do_not_overlap() {
        let mut rec = passing("a");
        rec.ecod_names_l = Some(DomainSet::parse(""));
        rec.ecod_names_r = Some(DomainSet::parse(""));
        assert!(bounds().passes(&rec));
    }

    #[test]
    fn filtered_indices_keeps_input_order() {
        let mut bad = passing("b");
        bad.label = None;
        let records = vec![passing("a"), bad, passing("c")];
        assert_eq!(filtered_indices(&records, &bounds()), vec![0, 2]);
    }
}
