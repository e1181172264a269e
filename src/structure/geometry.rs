//! Reduced-representation geometry used by the structural predicates.

use super::model::distance;

/// Number of (i, j) pairs across two coordinate sets closer than `radius`.
pub fn count_contacts(a: &[[f64; 3]], b: &[[f64; 3]], radius: f64) -> usize {
    a.iter()
        .map(|p| b.iter().filter(|q| distance(p, q) < radius).count())
        .sum()
}

/// Connected components of the graph linking points closer than `radius`.
pub fn connected_components(points: &[[f64; 3]], radius: f64) -> usize {
    let mut parent: Vec<usize> = (0..points.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            if distance(&points[i], &points[j]) < radius {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }

    (0..points.len())
        .filter(|&i| find(&mut parent, i) == i)
        .count()
}

/// Root-mean-square deviation of paired coordinates, in the frame given.
/// `None` when there are no pairs.
pub fn rmsd(pairs: &[([f64; 3], [f64; 3])]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let sum: f64 = pairs
        .iter()
        .map(|(a, b)| {
            let d = distance(a, b);
            d * d
        })
        .sum();
    Some((sum / pairs.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_count_pairs_within_radius() {
        let a = [[0.0, 0.0, 0.0], [5.0, 0.0, 0.0]];
        let b = [[0.0, 4.0, 0.0], [20.0, 0.0, 0.0]];
        assert_eq!(count_contacts(&a, &b, 10.0), 2);
        assert_eq!(count_contacts(&a, &b, 4.5), 1);
    }

    #[test]
    fn components_split_on_gaps() {
        let pts = [[0.0; 3], [3.8, 0.0, 0.0], [50.0, 0.0, 0.0], [53.8, 0.0, 0.0], [200.0, 0.0, 0.0]];
        assert_eq!(connected_components(&pts, 12.0), 3);
        assert_eq!(connected_components(&pts, 500.0), 1);
        assert_eq!(connected_components(&[], 12.0), 0);
    }

    #[test]
    fn rmsd_of_uniform_shift_is_shift() {
        let pairs: Vec<_> = (0..4)
            .map(|i| ([i as f64, 0.0, 0.0], [i as f64, 2.0, 0.0]))
            .collect();
        assert!((rmsd(&pairs).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(rmsd(&[]), None);
    }
}
