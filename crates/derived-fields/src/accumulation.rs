//! Accumulated total precipitation and snowfall-equivalent derivation.
//!
//! Both derivations sum per-bucket results across the forecast-hour series
//! `0..H`. A bucket's contribution is computed once and cached, so
//! extending the series to a later `H` is O(new buckets), not O(H) work
//! repeated from scratch.

use std::collections::HashMap;

use pnw_common::{ForecastHour, RunTime};

use crate::error::{DerivedFieldResult, MissingFieldError};
use crate::model_registry::ModelConfig;

/// One resolved bucket's liquid-equivalent precipitation total, in
/// millimeters, for the whole grid.
#[derive(Debug, Clone)]
pub struct BucketTotal {
    pub mm: Vec<f32>,
}

/// Caches resolved bucket totals for one `(model_id, run_time)`, reused
/// across successive forecast hours of the same run.
#[derive(Debug, Clone, Default)]
pub struct AccumulationCache {
    buckets: HashMap<(String, RunTime, u32), BucketTotal>,
}

impl AccumulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forecast hours at which a model's precipitation accumulation resets.
    pub fn bucket_boundaries(model: &ModelConfig, through_fh: u32) -> Vec<u32> {
        let step = model.accumulation_bucket_hours.max(1);
        (step..=through_fh).step_by(step as usize).collect()
    }

    fn bucket_total(
        &mut self,
        model: &ModelConfig,
        run_time: RunTime,
        bucket_end_fh: u32,
        bucket_mm: impl FnOnce() -> Option<Vec<f32>>,
    ) -> DerivedFieldResult<&BucketTotal> {
        let key = (model.id.clone(), run_time, bucket_end_fh);
        if !self.buckets.contains_key(&key) {
            let mm = bucket_mm().ok_or(MissingFieldError::MissingBucket {
                bucket_fh: bucket_end_fh,
                through_fh: bucket_end_fh,
            })?;
            self.buckets.insert(key.clone(), BucketTotal { mm });
        }
        Ok(self.buckets.get(&key).expect("just inserted"))
    }

    /// Sum of all bucket totals covering `[0, through.value()]`.
    ///
    /// `fetch_bucket_mm(bucket_end_fh) -> Option<Vec<f32>>` supplies the
    /// already-unit-normalized (mm) total for one bucket ending at
    /// `bucket_end_fh`, or `None` if that bucket's upstream data has not
    /// appeared yet.
    pub fn tp_total_mm(
        &mut self,
        model: &ModelConfig,
        run_time: RunTime,
        through: ForecastHour,
        mut fetch_bucket_mm: impl FnMut(u32) -> Option<Vec<f32>>,
    ) -> DerivedFieldResult<Vec<f32>> {
        let boundaries = Self::bucket_boundaries(model, through.value());
        let mut total: Option<Vec<f32>> = None;

        for bucket_end_fh in boundaries {
            let bucket = self.bucket_total(model, run_time, bucket_end_fh, || {
                fetch_bucket_mm(bucket_end_fh)
            })?;
            total = Some(match total {
                None => bucket.mm.clone(),
                Some(mut acc) => {
                    for (a, b) in acc.iter_mut().zip(bucket.mm.iter()) {
                        *a += b;
                    }
                    acc
                }
            });
        }

        Ok(total.unwrap_or_default())
    }
}

/// Integrate an instantaneous precipitation rate (`prate`, kg m⁻² s⁻¹) over
/// a bucket's duration using the trapezoidal rule, producing millimeters.
pub fn integrate_prate_mm(rate_samples: &[Vec<f32>], sample_spacing_hours: f64) -> Vec<f32> {
    if rate_samples.is_empty() {
        return Vec::new();
    }
    let n = rate_samples[0].len();
    let mut total = vec![0.0f32; n];
    let dt_seconds = (sample_spacing_hours * 3600.0) as f32;

    for window in rate_samples.windows(2) {
        let (a, b) = (&window[0], &window[1]);
        for i in 0..n {
            // kg/m^2/s * s = kg/m^2 = mm of liquid water.
            total[i] += 0.5 * (a[i] + b[i]) * dt_seconds;
        }
    }
    total
}

/// Snow-mask fraction normalization (spec heuristic: percent vs. fraction).
pub fn normalize_snow_fraction(value: f32, unit: Option<&str>) -> f32 {
    let is_percent = unit.map(|u| u.eq_ignore_ascii_case("percent") || u == "%").unwrap_or(false);
    let fraction = if is_percent || value > 1.0 { value / 100.0 } else { value };
    fraction.clamp(0.0, 1.0)
}

/// Total snowfall-equivalent in millimeters: `sum(tp_mm * snow_fraction) * 10`.
pub fn tp_snow_total_mm(tp_total_mm: &[f32], csnow_fraction: &[f32], csnow_unit: Option<&str>) -> Vec<f32> {
    tp_total_mm
        .iter()
        .zip(csnow_fraction.iter())
        .map(|(tp, frac)| tp * normalize_snow_fraction(*frac, csnow_unit) * 10.0)
        .collect()
}

pub const MM_PER_INCH: f32 = 25.4;

pub fn mm_to_inches(mm: &[f32]) -> Vec<f32> {
    mm.iter().map(|v| v / MM_PER_INCH).collect()
}
