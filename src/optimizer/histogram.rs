use crate::{operator::Op, storage::Field};

/// Fenwick tree (binary indexed tree) over bucket counts: point update and
/// range sum in O(log n).
struct Bit {
    n: usize,
    a: Vec<i64>,
}

impl Bit {
    fn new(n: usize) -> Self {
        Self {
            n,
            a: vec![0; n + 1],
        }
    }

    fn lowbit(x: usize) -> usize {
        x & x.wrapping_neg()
    }

    fn inc(&mut self, i: usize) {
        let mut i = i + 1;
        while i <= self.n {
            self.a[i] += 1;
            i += Self::lowbit(i);
        }
    }

    fn prefix(&self, mut i: usize) -> i64 {
        let mut sum = 0;
        while i > 0 {
            sum += self.a[i];
            i -= Self::lowbit(i);
        }
        sum
    }

    /// Sum of buckets `l..=r`.
    fn sum(&self, l: usize, r: usize) -> i64 {
        self.prefix(r + 1) - self.prefix(l)
    }
}

/// A fixed-width histogram over one integer column.
///
/// The closed interval `[min, max]` is split into integer-aligned buckets
/// of as-equal-as-possible size; counts live in a Fenwick tree so that
/// selectivity estimation costs O(log buckets). Range estimates count
/// integers, not real-interval measure.
pub struct IntHistogram {
    buckets: usize,
    start: Vec<i64>,
    size: Vec<i64>,
    count: Bit,
}

impl IntHistogram {
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        assert!(buckets > 0, "a histogram needs at least one bucket");
        assert!(min <= max);

        // bucket boundaries interpolate between min and max + 1 in 64-bit
        // arithmetic; div_euclid keeps the floor exact for negative values
        let lo = min as i64;
        let hi = max as i64 + 1;
        let mut start = Vec::with_capacity(buckets);
        let mut size = Vec::with_capacity(buckets);
        for i in 0..buckets {
            let b = buckets as i64;
            let i = i as i64;
            let cur = (lo * (b - i) + hi * i).div_euclid(b);
            let next = (lo * (b - i - 1) + hi * (i + 1)).div_euclid(b);
            start.push(cur);
            size.push(next - cur);
        }

        Self {
            buckets,
            start,
            size,
            count: Bit::new(buckets),
        }
    }

    /// The bucket whose range contains `v`; `v` must not be below `min`.
    fn floor_bucket(&self, v: i64) -> usize {
        self.start.partition_point(|s| *s <= v) - 1
    }

    pub fn add_value(&mut self, v: i32) {
        let v = (v as i64).max(self.start[0]);
        self.count.inc(self.floor_bucket(v));
    }

    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        let v = v as i64;
        let last = self.buckets - 1;

        // out-of-range operands short-circuit to 0 or 1
        if v < self.start[0] {
            return match op {
                Op::GreaterThan | Op::GreaterThanOrEq | Op::NotEquals => 1.0,
                _ => 0.0,
            };
        }
        if v >= self.start[last] + self.size[last] {
            return match op {
                Op::LessThan | Op::LessThanOrEq | Op::NotEquals => 1.0,
                _ => 0.0,
            };
        }

        let total = self.count.sum(0, last);
        if total == 0 {
            return 0.0;
        }
        self.estimate_count(op, v) / total as f64
    }

    /// Estimated number of matching values: the whole buckets beyond the
    /// operand plus the covered share of the operand's own bucket.
    fn estimate_count(&self, op: Op, v: i64) -> f64 {
        let i = self.floor_bucket(v);
        let last = self.buckets - 1;

        let in_bucket = self.count.sum(i, i) as f64;
        let width = self.size[i] as f64;
        let offset = v - self.start[i];

        let below = if i == 0 { 0 } else { self.count.sum(0, i - 1) } as f64;
        let above = if i == last {
            0
        } else {
            self.count.sum(i + 1, last)
        } as f64;

        match op {
            Op::Equals => in_bucket / width,
            Op::NotEquals => self.count.sum(0, last) as f64 - in_bucket / width,
            Op::GreaterThan => above + in_bucket * (self.size[i] - offset - 1) as f64 / width,
            Op::GreaterThanOrEq => above + in_bucket * (self.size[i] - offset) as f64 / width,
            Op::LessThan => below + in_bucket * offset as f64 / width,
            Op::LessThanOrEq => below + in_bucket * (offset + 1) as f64 / width,
        }
    }
}

/// 128⁴ − 1, the largest 4-char base-128 prefix code.
const STRING_CODE_MAX: i32 = 128 * 128 * 128 * 128 - 1;

/// A histogram over one string column: each string collapses to its
/// canonical 4-character prefix code and the rest is integer machinery.
pub struct StringHistogram {
    hist: IntHistogram,
}

impl StringHistogram {
    pub fn new(buckets: usize) -> Self {
        Self {
            hist: IntHistogram::new(buckets, 0, STRING_CODE_MAX),
        }
    }

    /// Base-128 code of the first four bytes, clamped to 7 bits each;
    /// missing bytes count as zero, so "" maps to 0.
    fn string_to_code(s: &str) -> i32 {
        let bytes = s.as_bytes();
        let mut code: i64 = 0;
        for i in 0..4 {
            let b = bytes.get(i).copied().unwrap_or(0).min(127) as i64;
            code = code * 128 + b;
        }
        code as i32
    }

    pub fn add_value(&mut self, s: &str) {
        self.hist.add_value(Self::string_to_code(s));
    }

    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.hist.estimate_selectivity(op, Self::string_to_code(s))
    }

    /// The underlying int histogram, for predicates that compare a string
    /// column against an integer constant.
    pub fn inner(&self) -> &IntHistogram {
        &self.hist
    }
}

/// Per-column histogram, tagged by the column type.
pub enum Histogram {
    Int(IntHistogram),
    Str(StringHistogram),
}

impl Histogram {
    pub fn add_value(&mut self, field: &Field) {
        match (self, field) {
            (Histogram::Int(h), Field::Int32(v)) => h.add_value(*v),
            (Histogram::Str(h), Field::String(s)) => h.add_value(s),
            // a mismatched field cannot come from a well-typed scan
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_sums() {
        let mut bit = Bit::new(10);
        for i in [0, 0, 3, 9] {
            bit.inc(i);
        }
        assert_eq!(bit.sum(0, 9), 4);
        assert_eq!(bit.sum(0, 0), 2);
        assert_eq!(bit.sum(1, 2), 0);
        assert_eq!(bit.sum(3, 9), 2);
    }

    #[test]
    fn test_uniform_histogram_estimates() {
        let mut hist = IntHistogram::new(10, 1, 100);
        for v in 1..=100 {
            hist.add_value(v);
        }

        assert!((hist.estimate_selectivity(Op::GreaterThan, 50) - 0.5).abs() <= 0.01);
        assert!((hist.estimate_selectivity(Op::Equals, 50) - 0.01).abs() <= 1e-9);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, 200), 0.0);
        assert_eq!(hist.estimate_selectivity(Op::LessThan, 0), 0.0);
    }

    #[test]
    fn test_out_of_range_short_circuits() {
        let mut hist = IntHistogram::new(5, 10, 20);
        for v in 10..=20 {
            hist.add_value(v);
        }

        for op in [Op::GreaterThan, Op::GreaterThanOrEq, Op::NotEquals] {
            assert_eq!(hist.estimate_selectivity(op, 5), 1.0);
            assert_eq!(hist.estimate_selectivity(op, 25), 0.0);
        }
        for op in [Op::LessThan, Op::LessThanOrEq, Op::Equals] {
            assert_eq!(hist.estimate_selectivity(op, 5), 0.0);
        }
        for op in [Op::LessThan, Op::LessThanOrEq, Op::NotEquals] {
            assert_eq!(hist.estimate_selectivity(op, 25), 1.0);
        }
    }

    #[test]
    fn test_uneven_buckets_cover_the_range() {
        // 7 does not divide 1..=100 evenly; bucket sizes must still sum to
        // the whole interval and stay within one of each other
        let hist = IntHistogram::new(7, 1, 100);
        let total: i64 = hist.size.iter().sum();
        assert_eq!(total, 100);
        let min = hist.size.iter().min().unwrap();
        let max = hist.size.iter().max().unwrap();
        assert!(max - min <= 1);
        assert_eq!(hist.start[0], 1);
    }

    #[test]
    fn test_negative_range() {
        let mut hist = IntHistogram::new(4, -20, -1);
        for v in -20..=-1 {
            hist.add_value(v);
        }
        assert!((hist.estimate_selectivity(Op::LessThan, -10) - 0.5).abs() <= 0.05);
        assert_eq!(hist.estimate_selectivity(Op::GreaterThan, 0), 0.0);
    }

    #[test]
    fn test_string_histogram() {
        let mut hist = StringHistogram::new(100);
        for s in ["apple", "banana", "cherry", "date"] {
            hist.add_value(s);
        }

        // everything falls strictly between "" and the top code
        assert_eq!(hist.estimate_selectivity(Op::GreaterThanOrEq, ""), 1.0);
        assert!(hist.estimate_selectivity(Op::GreaterThan, "m") <= 0.5);
        assert!(hist.estimate_selectivity(Op::Equals, "apple") >= 0.0);
    }

    #[test]
    fn test_string_code_ordering() {
        let a = StringHistogram::string_to_code("");
        let b = StringHistogram::string_to_code("a");
        let c = StringHistogram::string_to_code("ab");
        let d = StringHistogram::string_to_code("b");
        assert!(a < b && b < c && c < d);
        assert!(d <= STRING_CODE_MAX);
    }
}
