//! In-memory feature table.
//!
//! A table is N rows of named `f64` columns, all the same length, plus
//! optional star identifiers. Measurement uncertainties ride along as ordinary
//! columns named `"{feature}_err"`.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    ids: Option<Vec<String>>,
    columns: BTreeMap<String, Vec<f64>>,
    n_rows: usize,
}

impl FeatureTable {
    /// Build a table; every column must have the same length.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut table = FeatureTable::default();
        for (name, values) in columns {
            table.insert_column(name, values)?;
        }
        Ok(table)
    }

    /// Attach star identifiers (one per row).
    pub fn with_ids(mut self, ids: Vec<String>) -> Result<Self> {
        if ids.len() != self.n_rows {
            return Err(Error::Shape(format!(
                "got {} star ids for a table of {} rows",
                ids.len(),
                self.n_rows
            )));
        }
        self.ids = Some(ids);
        Ok(self)
    }

    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if self.columns.is_empty() && self.ids.is_none() {
            self.n_rows = values.len();
        }
        if values.len() != self.n_rows {
            return Err(Error::Shape(format!(
                "column '{name}' has {} rows, expected {}",
                values.len(),
                self.n_rows
            )));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Column by name; a missing column is a shape error naming it.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.get(name)
            .ok_or_else(|| Error::Shape(format!("missing required column '{name}'")))
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// The `"{feature}_err"` column, if present.
    pub fn uncertainty(&self, feature: &str) -> Option<&[f64]> {
        self.get(&uncertainty_column(feature))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &String> {
        self.columns.keys()
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn ids(&self) -> Option<&[String]> {
        self.ids.as_deref()
    }

    /// Identifier for row `i`; rows without ids are numbered from 0.
    pub fn row_id(&self, i: usize) -> String {
        match &self.ids {
            Some(ids) => ids[i].clone(),
            None => i.to_string(),
        }
    }

    /// All row identifiers (explicit or numbered).
    pub fn row_ids(&self) -> Vec<String> {
        (0..self.n_rows).map(|i| self.row_id(i)).collect()
    }

    /// Rows reordered by `order` (a permutation of `0..n_rows`).
    pub fn permuted(&self, order: &[usize]) -> Result<Self> {
        if order.len() != self.n_rows {
            return Err(Error::Shape(format!(
                "permutation has {} entries for {} rows",
                order.len(),
                self.n_rows
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), order.iter().map(|&i| values[i]).collect()))
            .collect();
        let ids = self
            .ids
            .as_ref()
            .map(|ids| order.iter().map(|&i| ids[i].clone()).collect());
        Ok(Self {
            ids,
            columns,
            n_rows: self.n_rows,
        })
    }
}

pub fn uncertainty_column(feature: &str) -> String {
    format!("{feature}_err")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_lengths_are_shape_errors() {
        let err = FeatureTable::new([("a", vec![1.0, 2.0]), ("b", vec![1.0])]).unwrap_err();
        assert!(matches!(err, Error::Shape(msg) if msg.contains("'b'")));
    }

    #[test]
    fn missing_column_names_it() {
        let table = FeatureTable::new([("phi1", vec![0.0])]).unwrap();
        let err = table.column("pm1").unwrap_err();
        assert_eq!(err, Error::Shape("missing required column 'pm1'".into()));
    }

    #[test]
    fn ids_default_to_row_numbers() {
        let table = FeatureTable::new([("x", vec![0.0, 1.0])]).unwrap();
        assert_eq!(table.row_ids(), vec!["0", "1"]);
        let table = table.with_ids(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(table.row_id(1), "b");
    }

    #[test]
    fn uncertainty_column_lookup() {
        let table = FeatureTable::new([("pm1", vec![1.0]), ("pm1_err", vec![0.1])]).unwrap();
        assert_eq!(table.uncertainty("pm1"), Some(&[0.1][..]));
        assert_eq!(table.uncertainty("pm2"), None);
    }
}
