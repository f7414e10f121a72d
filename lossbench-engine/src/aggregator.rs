use lossbench_core::{output, LossLevel, ResultTable};

/// Collects per-cell averages into the time and bandwidth tables.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    time: ResultTable,
    bandwidth: ResultTable,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            time: ResultTable::new(output::TIME_COLUMN),
            bandwidth: ResultTable::new(output::SPEED_COLUMN),
        }
    }

    /// Fixes row and column order up front so skipped cells still show up
    /// as gaps rather than vanishing from the tables.
    pub fn declare(&mut self, labels: &[String], losses: &[LossLevel]) {
        for table in [&mut self.time, &mut self.bandwidth] {
            for label in labels {
                table.ensure_row(label);
            }
            for &loss in losses {
                table.ensure_column(loss);
            }
        }
    }

    /// Writes one cell into both tables, replacing any earlier value.
    pub fn record(&mut self, label: &str, loss: LossLevel, mean_time: f64, mean_throughput: f64) {
        self.time.insert(label, loss, mean_time);
        self.bandwidth.insert(label, loss, mean_throughput);
    }

    /// Returns `(time table, bandwidth table)`.
    pub fn finalize(self) -> (ResultTable, ResultTable) {
        (self.time, self.bandwidth)
    }
}
