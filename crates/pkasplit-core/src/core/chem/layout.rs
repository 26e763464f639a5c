use crate::core::models::molecule::Molecule;
use nalgebra::{Matrix3, Point3, Vector3};

/// Assigns 2D depiction coordinates to a molecule in place.
pub trait CoordinateLayout {
    fn compute_2d(&self, molecule: &mut Molecule);
}

/// Flattens a structure onto the plane of its two principal axes.
///
/// Coordinates are centred on the centroid, projected onto the two
/// eigenvectors of the positional covariance with the largest eigenvalues,
/// and the z coordinate is set to zero. Planar inputs keep all interatomic
/// distances; the result is deterministic for a given input.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarProjection;

impl CoordinateLayout for PlanarProjection {
    fn compute_2d(&self, molecule: &mut Molecule) {
        let count = molecule.atom_count();
        if count == 0 {
            return;
        }

        let centroid = molecule
            .atoms()
            .iter()
            .fold(Vector3::<f64>::zeros(), |acc, a| acc + a.position.coords)
            / count as f64;

        let mut covariance = Matrix3::<f64>::zeros();
        for atom in molecule.atoms() {
            let d = atom.position.coords - centroid;
            covariance += d * d.transpose();
        }

        let eigen = covariance.symmetric_eigen();
        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
        let u: Vector3<f64> = eigen.eigenvectors.column(order[0]).into_owned();
        let v: Vector3<f64> = eigen.eigenvectors.column(order[1]).into_owned();

        for atom in molecule.atoms_mut() {
            let d = atom.position.coords - centroid;
            atom.position = Point3::new(d.dot(&u), d.dot(&v), 0.0);
        }
    }
}
