//! Leaf pair multiply (§4.6): the column-by-column kernel that multiplies two leaf views
//! (DCSC or shadow, of any index width) into one DCSC leaf over the result's own index
//! width.

use crate::geometry::{Index, Shape};
use crate::leaf::dcsc::{DcscFactory, DcscLeaf};
use crate::leaf::LeafView;
use crate::semiring::Semiring;
use crate::spa::{Spa, SpaLike};
use crate::width::LeafIndex;

/// `A` (over `AIT`) times `B` (over `BIT`), accumulated into a leaf over `RetIT` with shape
/// `dest_shape`. Iterates `B` column by column; for each `(i, b_ij)` looks up `A`'s column
/// `i` and scatter-multiplies it into the destination SpA (§4.6 pseudocode).
pub fn multiply_leaves<T, AIT, BIT, RetIT, AV, BV, S>(
    a: &AV,
    b: &BV,
    dest_shape: Shape,
    use_dense_spa: bool,
    semiring: &S,
) -> DcscLeaf<T, RetIT>
where
    T: Copy,
    AIT: LeafIndex,
    BIT: LeafIndex,
    RetIT: LeafIndex,
    AV: LeafView<T, AIT> + ?Sized,
    BV: LeafView<T, BIT> + ?Sized,
    S: Semiring<T>,
{
    let mut factory: DcscFactory<T, RetIT> = DcscFactory::new(dest_shape);
    let mut spa: Spa<T> = Spa::new(dest_shape.nrows as usize, use_dense_spa);

    for col_b in b.columns() {
        let j = col_b.col;
        for (i, &b_ij) in col_b.rows.zip(col_b.values.iter()) {
            let a_col_index = AIT::from_index(i.to_index());
            if let Some(col_a) = a.get_column(a_col_index) {
                let rows: Vec<Index> = col_a.rows.map(|r| r.to_index()).collect();
                spa.scatter_multiply(&rows, col_a.values, b_ij, semiring);
            }
        }
        if !spa.is_empty() {
            factory.add_column_from_spa(RetIT::from_index(j.to_index()), &mut spa);
        }
        spa.clear();
    }

    factory.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::dcsc::DcscFactory as Factory;
    use crate::semiring::PlusTimes;
    use crate::spa::DenseSpa;

    fn diag(n: i64, scale: f64) -> DcscLeaf<f64, i16> {
        let shape = Shape::new(n, n);
        let mut f: Factory<f64, i16> = Factory::new(shape);
        let sr = PlusTimes;
        for c in 0..n {
            let mut spa = DenseSpa::<f64>::new(n as usize);
            spa.scatter_add(&[c], &[scale], &sr);
            f.add_column_from_spa(c as i16, &mut spa);
        }
        f.finish()
    }

    #[test]
    fn identity_times_diagonal_is_diagonal() {
        let a = diag(4, 1.0);
        let b = diag(4, 3.0);
        let sr = PlusTimes;
        let c = multiply_leaves::<f64, i16, i16, i16, _, _, _>(&a, &b, Shape::new(4, 4), true, &sr);
        assert_eq!(c.nnn(), 4);
        for i in 0..4i16 {
            let col = c.get_column(i).unwrap();
            let vals: Vec<f64> = col.values.to_vec();
            assert_eq!(vals, vec![3.0]);
        }
    }

    #[test]
    fn empty_output_column_is_elided() {
        // a has no column 0; b's column 0 references row 0 of a, which is absent.
        let shape = Shape::new(2, 2);
        let mut fa: Factory<f64, i16> = Factory::new(shape);
        let mut spa = DenseSpa::<f64>::new(2);
        let sr = PlusTimes;
        spa.scatter_add(&[1], &[5.0], &sr);
        fa.add_column_from_spa(1, &mut spa);
        let a = fa.finish();

        let mut fb: Factory<f64, i16> = Factory::new(shape);
        let mut spb = DenseSpa::<f64>::new(2);
        spb.scatter_add(&[0], &[2.0], &sr);
        fb.add_column_from_spa(0, &mut spb);
        let b = fb.finish();

        let c = multiply_leaves::<f64, i16, i16, i16, _, _, _>(&a, &b, shape, true, &sr);
        assert_eq!(c.nnn(), 0);
        assert_eq!(c.num_columns(), 0);
    }
}
