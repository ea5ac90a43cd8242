//! Per-pixel stack reduction.
//!
//! Each output cell gathers one value per contributing granule together with
//! that granule's quality weight. The stack is reduced to a single value by
//! one of the [`AggregationMethod`]s.

use crate::types::{AggregationMethod, PercentileMode};

/// One granule's valid value at a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedValue {
    pub value: f32,
    pub weight: f32,
}

impl WeightedValue {
    pub fn new(value: f32, weight: f32) -> Self {
        Self { value, weight }
    }
}

/// Reduce a pixel stack. Returns `None` for an empty stack.
///
/// `min_stack` is the shortest stack for which p90/p95 are computed;
/// shorter stacks fall back to the median.
pub fn aggregate(
    stack: &mut [WeightedValue],
    method: AggregationMethod,
    mode: PercentileMode,
    min_stack: usize,
) -> Option<f32> {
    if stack.is_empty() {
        return None;
    }
    if stack.len() == 1 {
        return Some(stack[0].value);
    }

    match method {
        AggregationMethod::Max => stack.iter().map(|s| s.value).reduce(f32::max),
        AggregationMethod::Mean => {
            let sum: f64 = stack.iter().map(|s| s.value as f64).sum();
            Some((sum / stack.len() as f64) as f32)
        }
        AggregationMethod::Median => Some(median(stack, mode)),
        AggregationMethod::P90 | AggregationMethod::P95 => {
            if stack.len() < min_stack {
                return Some(median(stack, mode));
            }
            let p = method.percentile().unwrap_or(0.5);
            sort_by_value(stack);
            Some(match mode {
                PercentileMode::Weighted => weighted_percentile(stack, p),
                PercentileMode::StrictIndex => strict_percentile(stack, p),
            })
        }
    }
}

fn sort_by_value(stack: &mut [WeightedValue]) {
    stack.sort_by(|a, b| a.value.total_cmp(&b.value));
}

fn median(stack: &mut [WeightedValue], mode: PercentileMode) -> f32 {
    sort_by_value(stack);
    match mode {
        PercentileMode::Weighted => weighted_percentile(stack, 0.5),
        PercentileMode::StrictIndex => {
            let mid = stack.len() / 2;
            if stack.len() % 2 == 0 {
                (stack[mid - 1].value + stack[mid].value) / 2.0
            } else {
                stack[mid].value
            }
        }
    }
}

/// Weighted percentile over a value-sorted stack.
///
/// Walks the cumulative weight until it reaches `p * total` and interpolates
/// linearly between the previous and the crossing value. All-zero weights
/// are treated as uniform.
fn weighted_percentile(sorted: &[WeightedValue], p: f64) -> f32 {
    let total: f64 = sorted.iter().map(|s| s.weight.max(0.0) as f64).sum();
    let uniform = total <= 0.0 || !total.is_finite();
    let weight_of = |s: &WeightedValue| {
        if uniform {
            1.0
        } else {
            s.weight.max(0.0) as f64
        }
    };
    let total = if uniform { sorted.len() as f64 } else { total };
    let target = p.clamp(0.0, 1.0) * total;

    let mut cumulative = 0.0;
    for (i, sample) in sorted.iter().enumerate() {
        let w = weight_of(sample);
        let next = cumulative + w;
        if next >= target && w > 0.0 {
            if i == 0 {
                return sample.value;
            }
            let frac = ((target - cumulative) / w).clamp(0.0, 1.0) as f32;
            let prev = sorted[i - 1].value;
            return prev + frac * (sample.value - prev);
        }
        cumulative = next;
    }

    sorted[sorted.len() - 1].value
}

/// Index-based percentile that never selects the maximum's slot.
fn strict_percentile(sorted: &[WeightedValue], p: f64) -> f32 {
    let len = sorted.len();
    let idx = ((len as f64 * p).floor() as usize).min(len.saturating_sub(2));
    sorted[idx].value
}
