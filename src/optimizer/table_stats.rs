use log::debug;

use super::histogram::{Histogram, IntHistogram, StringHistogram};
use crate::{
    database::Database,
    error::{DbError, DbResult},
    operator::Op,
    storage::{Field, Type},
    transaction::Transaction,
};

/// Number of bins per histogram. Narrow int columns get one bin per
/// distinct value instead.
pub const NUM_HIST_BINS: usize = 100;

/// Per-table statistics: tuple and page counts plus one histogram per
/// column, built with two scans of the table (min/max first, then counts).
pub struct TableStats {
    num_tuples: usize,
    num_pages: usize,
    io_cost_per_page: usize,
    histograms: Vec<Histogram>,
}

impl TableStats {
    pub fn new(db: &Database, table_id: u32, io_cost_per_page: usize) -> DbResult<Self> {
        let file = db.catalog().get_file(table_id)?;
        let schema = file.get_schema().clone();
        let field_count = schema.field_count();

        let tx = Transaction::new();
        let mut iter = file.iter(db, &tx);

        // pass 1: tuple count and min/max of every int column
        let mut min = vec![i32::MAX; field_count];
        let mut max = vec![i32::MIN; field_count];
        let mut num_tuples = 0usize;
        while let Some(tuple) = iter.next_tuple()? {
            for i in 0..field_count {
                if let Field::Int32(v) = tuple.get_field(i) {
                    min[i] = min[i].min(*v);
                    max[i] = max[i].max(*v);
                }
            }
            num_tuples += 1;
        }

        let mut histograms = Vec::with_capacity(field_count);
        for i in 0..field_count {
            let histogram = match schema.get_field_type(i) {
                Type::Int32 => {
                    // an empty table has no observed range to partition
                    let (lo, hi) = if num_tuples == 0 { (0, 0) } else { (min[i], max[i]) };
                    let span = hi as i64 - lo as i64 + 1;
                    let buckets = (NUM_HIST_BINS as i64).min(span) as usize;
                    Histogram::Int(IntHistogram::new(buckets, lo, hi))
                }
                Type::String => Histogram::Str(StringHistogram::new(NUM_HIST_BINS)),
            };
            histograms.push(histogram);
        }

        // pass 2: populate the histograms
        iter.rewind();
        while let Some(tuple) = iter.next_tuple()? {
            for i in 0..field_count {
                histograms[i].add_value(tuple.get_field(i));
            }
        }

        let num_pages = file.num_pages()?;
        tx.commit(db)?;
        debug!(
            "collected stats for table {}: {} tuples over {} pages",
            table_id, num_tuples, num_pages
        );

        Ok(Self {
            num_tuples,
            num_pages,
            io_cost_per_page,
            histograms,
        })
    }

    /// Cost of a full sequential scan; partial pages cost as much as full
    /// ones.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page) as f64
    }

    /// Expected number of tuples surviving a predicate with the given
    /// selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.num_tuples as f64 * selectivity).round() as usize
    }

    /// Estimated fraction of tuples satisfying `field op constant`.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Field) -> DbResult<f64> {
        match (&self.histograms[field], constant) {
            (Histogram::Int(h), Field::Int32(v)) => Ok(h.estimate_selectivity(op, *v)),
            (Histogram::Str(h), Field::String(s)) => Ok(h.estimate_selectivity(op, s)),
            // a string column compared against an int constant falls back
            // to the underlying code histogram
            (Histogram::Str(h), Field::Int32(v)) => Ok(h.inner().estimate_selectivity(op, *v)),
            (Histogram::Int(_), Field::String(_)) => Err(DbError::db(
                "cannot estimate an int column against a string constant",
            )),
        }
    }

    pub fn total_tuples(&self) -> usize {
        self.num_tuples
    }
}
