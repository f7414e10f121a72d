//! Result tables keyed by configuration label and loss level.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::LossLevel;

/// A row-labeled table of scalars indexed by `(configuration label, loss)`.
///
/// Rows and columns keep the order in which they were first written, which
/// is the order the matrix visits them. Writing an existing cell replaces
/// its value. Cells never written read back as `None`, so a skipped cell is
/// distinguishable from a measured zero.
///
/// # Examples
///
/// ```rust
/// use lossbench_core::{LossLevel, ResultTable};
///
/// let mut table = ResultTable::new("Time (ms)");
/// let loss = LossLevel::new(5).unwrap();
/// table.insert("RUDP", loss, 20.0);
/// assert_eq!(table.get("RUDP", loss), Some(20.0));
/// assert_eq!(table.get("RUDP", LossLevel::ZERO), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    metric: String,
    rows: Vec<String>,
    columns: Vec<LossLevel>,
    cells: BTreeMap<String, BTreeMap<LossLevel, f64>>,
}

impl ResultTable {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            rows: Vec::new(),
            columns: Vec::new(),
            cells: BTreeMap::new(),
        }
    }

    /// Name of the metric stored in the cells.
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Declares a row without writing any cell, fixing its display position.
    pub fn ensure_row(&mut self, label: &str) {
        if !self.rows.iter().any(|r| r == label) {
            self.rows.push(label.to_string());
        }
    }

    /// Declares a column without writing any cell, fixing its display position.
    pub fn ensure_column(&mut self, loss: LossLevel) {
        if !self.columns.contains(&loss) {
            self.columns.push(loss);
        }
    }

    /// Writes a cell; the last write for a `(label, loss)` pair wins.
    pub fn insert(&mut self, label: &str, loss: LossLevel, value: f64) {
        self.ensure_row(label);
        self.ensure_column(loss);
        self.cells
            .entry(label.to_string())
            .or_default()
            .insert(loss, value);
    }

    pub fn get(&self, label: &str, loss: LossLevel) -> Option<f64> {
        self.cells.get(label).and_then(|row| row.get(&loss)).copied()
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn columns(&self) -> &[LossLevel] {
        &self.columns
    }

    /// Number of cells that hold a value.
    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self
            .rows
            .iter()
            .map(String::len)
            .chain(std::iter::once(self.metric.len()))
            .max()
            .unwrap_or(0);

        write!(f, "{:<label_width$}", self.metric)?;
        for loss in &self.columns {
            write!(f, " {:>12}", loss.to_string())?;
        }
        writeln!(f)?;

        for label in &self.rows {
            write!(f, "{label:<label_width$}")?;
            for &loss in &self.columns {
                match self.get(label, loss) {
                    Some(value) => write!(f, " {value:>12.3}")?,
                    None => write!(f, " {:>12}", "-")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
