use serde::{Deserialize, Serialize};

/// A number or an arbitrarily nested list of numbers.
///
/// Matrices written by other tools use varying nesting for the same data,
/// e.g. a distortion vector as `[k1, ...]` or `[[k1, ...]]` and a translation
/// as `[tx, ty, tz]` or `[[tx], [ty], [tz]]`. Readers flatten the value in
/// row-major order and check the element count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumArray {
    /// A single number.
    Scalar(f64),
    /// A list of numbers or lists.
    List(Vec<NumArray>),
}

impl NumArray {
    /// All numbers in row-major order.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<f64>) {
        match self {
            NumArray::Scalar(v) => out.push(*v),
            NumArray::List(items) => items.iter().for_each(|i| i.flatten_into(out)),
        }
    }

    /// A flat list.
    pub fn from_slice(values: &[f64]) -> Self {
        NumArray::List(values.iter().map(|v| NumArray::Scalar(*v)).collect())
    }

    /// A column vector, one single element list per value.
    pub fn column(values: &[f64]) -> Self {
        NumArray::List(values.iter().map(|v| NumArray::List(vec![NumArray::Scalar(*v)])).collect())
    }

    /// A matrix as a list of rows.
    pub fn from_rows<const C: usize>(rows: &[[f64; C]]) -> Self {
        NumArray::List(rows.iter().map(|r| Self::from_slice(r)).collect())
    }

    /// Read a `R x C` matrix, whatever the nesting.
    pub fn to_rows<const R: usize, const C: usize>(&self) -> Result<[[f64; C]; R], String> {
        let flat = self.flatten();
        if flat.len() != R * C {
            return Err(format!("expected {} values for a {R}x{C} matrix, got {}", R * C, flat.len()));
        }
        let mut out = [[0.0; C]; R];
        for (i, v) in flat.into_iter().enumerate() {
            out[i / C][i % C] = v;
        }
        Ok(out)
    }

    /// Read a vector of exactly `N` values, whatever the nesting.
    pub fn to_vector<const N: usize>(&self) -> Result<[f64; N], String> {
        let rows: [[f64; N]; 1] = self.to_rows()?;
        Ok(rows[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let flat: NumArray = serde_json::from_str("[-60.0, 0.5, 1.0]")?;
        let column: NumArray = serde_json::from_str("[[-60.0], [0.5], [1.0]]")?;
        assert_eq!(flat.to_vector::<3>()?, [-60.0, 0.5, 1.0]);
        assert_eq!(column.to_vector::<3>()?, [-60.0, 0.5, 1.0]);

        let dist: NumArray = serde_json::from_str("[[0.1, -0.2, 0, 0, 0.05]]")?;
        assert_eq!(dist.flatten(), vec![0.1, -0.2, 0.0, 0.0, 0.05]);
        Ok(())
    }

    #[test]
    fn test_matrix_shape() -> Result<(), Box<dyn std::error::Error>> {
        let m: NumArray = serde_json::from_str("[[1, 0, 2], [0, 1, 3], [0, 0, 1]]")?;
        let rows: [[f64; 3]; 3] = m.to_rows()?;
        assert_eq!(rows[1][2], 3.0);
        assert!(m.to_rows::<3, 4>().is_err());
        assert_eq!(serde_json::to_string(&NumArray::column(&[1.0, 2.0]))?, "[[1.0],[2.0]]");
        Ok(())
    }
}
