//! Data Fetcher (spec `4.4`): given a model/run/forecast-hour and a set of
//! canonical raw field names, materializes a `GridDataset` covering the
//! configured region, fetching through the GRIB cache and falling back
//! across the provider priority list on failure.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use bytes::Bytes;
use tracing::{debug, info, warn};

use derived_fields::fields::{product_for_field, products_for_fields};
use derived_fields::model_registry::ModelConfig;
use derived_fields::{align_onto, DerivedFieldError};
use grib_reader::Grib2Reader;
use pipeline_storage::{filter_signature, CacheKey, GribCache};
use pnw_common::{BoundingBox, Coordinates, GridDataset, RunTime};

use crate::error::FetchError;
use crate::providers::ProviderClient;

/// Maps a canonical field name to the GRIB2 parameter/level substrings a
/// decoded message must carry to be selected for it. Matching is
/// case-insensitive substring containment against
/// `Grib2Message::parameter()`/`level()`.
struct FieldMatcher {
    canonical: &'static str,
    parameter: &'static str,
    level: Option<&'static str>,
}

const FIELD_MATCHERS: &[FieldMatcher] = &[
    FieldMatcher { canonical: "tmp2m", parameter: "TMP", level: Some("2") },
    FieldMatcher { canonical: "tmp_850", parameter: "TMP", level: Some("850") },
    FieldMatcher { canonical: "ugrd_850", parameter: "UGRD", level: Some("850") },
    FieldMatcher { canonical: "vgrd_850", parameter: "VGRD", level: Some("850") },
    FieldMatcher { canonical: "ugrd10m", parameter: "UGRD", level: Some("10") },
    FieldMatcher { canonical: "vgrd10m", parameter: "VGRD", level: Some("10") },
    FieldMatcher { canonical: "prmsl", parameter: "PRMSL", level: None },
    FieldMatcher { canonical: "tp", parameter: "APCP", level: None },
    FieldMatcher { canonical: "prate", parameter: "PRATE", level: None },
    FieldMatcher { canonical: "csnow", parameter: "CSNOW", level: None },
    FieldMatcher { canonical: "refc", parameter: "REFC", level: None },
];

fn matcher_for(canonical: &str) -> Option<&'static FieldMatcher> {
    FIELD_MATCHERS.iter().find(|m| m.canonical == canonical)
}

/// A decode failure is presumed to mean the cache file is corrupt; it is
/// invalidated and the fetch retried once within this call before the
/// failure is surfaced to the caller (spec `4.4`/`7`).
const DECODE_ATTEMPTS: u32 = 2;

/// Upstream object path for one `(model, run_time, product, forecast_hour)`,
/// shared by both the availability probe and the actual download so they
/// always agree on what they're looking for.
fn object_path_for(model: &ModelConfig, run_time: RunTime, product: &str, forecast_hour: u32) -> String {
    format!(
        "{model}.{date}/{hour}/{model}.t{hour}z.{product}.f{fh:03}.grib2",
        model = model.id,
        date = run_time.date_tag(),
        hour = run_time.hour_tag(),
        product = product,
        fh = forecast_hour,
    )
}

/// Fetches and assembles the raw fields requested, one product at a time,
/// merging across products when more than one is implicated (spec `4.4`
/// steps 1-4).
pub struct Fetcher<'a> {
    pub cache: &'a GribCache,
    pub providers: &'a [ProviderClient],
    pub region: BoundingBox,
}

impl<'a> Fetcher<'a> {
    pub async fn fetch_raw_data(
        &self,
        model: &ModelConfig,
        run_time: RunTime,
        forecast_hour: u32,
        raw_fields: &HashSet<String>,
        subset_region: bool,
    ) -> Result<GridDataset, FetchError> {
        let products = products_for_fields(raw_fields);
        if products.is_empty() {
            return Err(FetchError::MissingField(
                "no product classification for requested fields".to_string(),
            ));
        }

        let mut per_product = Vec::with_capacity(products.len());
        for product in &products {
            let fields_for_product: HashSet<String> = raw_fields
                .iter()
                .filter(|f| product_for_field(f) == *product)
                .cloned()
                .collect();
            let dataset = self
                .fetch_one_product(model, run_time, forecast_hour, product, &fields_for_product)
                .await?;
            per_product.push(dataset);
        }

        let mut merged = if per_product.len() == 1 {
            per_product.remove(0)
        } else {
            merge_datasets(per_product)?
        };

        if subset_region {
            merged = subset_to_region(&merged, &self.region)?;
        }

        for field in raw_fields {
            if !merged.has_variable(field) {
                return Err(FetchError::MissingField(field.clone()));
            }
        }

        Ok(merged)
    }

    /// HEAD-probes the pending forecast hour's object path across providers
    /// in priority order, without downloading it. Used by the scheduler to
    /// gate dispatch so only forecast hours upstream already has published
    /// get a fetch task (spec `4.8`'s `newly_available` computation).
    ///
    /// Probes against the model's first product tier; a model's product
    /// tiers are published together by upstream providers, so one tier's
    /// availability is representative of the run's availability overall.
    pub async fn probe_available(&self, model: &ModelConfig, run_time: RunTime, forecast_hour: u32) -> bool {
        let Some(product) = model.products.first() else {
            return false;
        };
        let object_path = object_path_for(model, run_time, &product.name, forecast_hour);
        for provider in self.providers {
            let url = provider.request_url(&object_path, None);
            if provider.probe(&url).await {
                return true;
            }
        }
        false
    }

    async fn fetch_one_product(
        &self,
        model: &ModelConfig,
        run_time: RunTime,
        forecast_hour: u32,
        product: &str,
        fields: &HashSet<String>,
    ) -> Result<GridDataset, FetchError> {
        let filter_sig = if model.filter_support {
            filter_signature(
                &fields.iter().cloned().collect::<Vec<_>>(),
                Some(&self.region),
            )
        } else {
            "full".to_string()
        };

        let key = CacheKey::new(
            model.id.clone(),
            run_time,
            pnw_common::ForecastHour::new(forecast_hour),
            product.to_string(),
            filter_sig,
        );

        let object_path = object_path_for(model, run_time, product, forecast_hour);

        let mut last_err = None;
        for attempt in 1..=DECODE_ATTEMPTS {
            let providers: Vec<ProviderClient> = self.providers.to_vec();
            let fields_owned = fields.clone();
            let model_filter_support = model.filter_support;
            let object_path_clone = object_path.clone();
            let model_id = model.id.clone();
            let served_by: Arc<StdMutex<Option<String>>> = Arc::new(StdMutex::new(None));
            let served_by_clone = served_by.clone();

            let path = self
                .cache
                .acquire_or_download(&key, move |partial_path| {
                    let providers = providers.clone();
                    let object_path = object_path_clone.clone();
                    let fields = fields_owned.clone();
                    let partial_path = partial_path.to_path_buf();
                    let model_id = model_id.clone();
                    let served_by = served_by_clone.clone();
                    async move {
                        download_with_fallback(
                            &providers,
                            &model_id,
                            &object_path,
                            model_filter_support,
                            &fields,
                            &partial_path,
                            &served_by,
                        )
                        .await
                    }
                })
                .await
                .map_err(FetchError::Cache)?;

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| FetchError::MissingField(format!("cache file unreadable: {e}")))?;

            match decode_grib(bytes, fields) {
                Ok(mut dataset) => {
                    dataset.source_provider = served_by.lock().unwrap().clone();
                    return Ok(dataset);
                }
                Err(e @ FetchError::Decode(_)) if attempt < DECODE_ATTEMPTS => {
                    warn!(
                        model = %model.id,
                        forecast_hour,
                        product,
                        error = %e,
                        "grib decode failed, invalidating cache entry and retrying"
                    );
                    if let Err(cache_err) = self.cache.invalidate(&key).await {
                        warn!(error = %cache_err, "failed to invalidate corrupt cache entry");
                    }
                    last_err = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(FetchError::MissingField("decode retries exhausted".to_string())))
    }
}

/// Tries each provider in priority order; a provider that exhausts its own
/// retry budget falls through to the next one (spec `4.4`/`6`).
async fn download_with_fallback(
    providers: &[ProviderClient],
    model_id: &str,
    object_path: &str,
    model_filter_support: bool,
    fields: &HashSet<String>,
    partial_path: &std::path::Path,
    served_by: &Arc<StdMutex<Option<String>>>,
) -> pipeline_storage::CacheResult<()> {
    let filter_query = model_filter_support.then(|| build_filter_query(fields));

    let mut last_message = String::new();
    for provider in providers {
        let url = provider.request_url(object_path, filter_query.as_deref());
        match provider.get_with_retry(&url).await {
            Ok(bytes) => {
                tokio::fs::write(partial_path, &bytes)
                    .await
                    .map_err(|e| pipeline_storage::CacheError::Io {
                        path: partial_path.display().to_string(),
                        source: e,
                    })?;
                info!(provider = %provider.config.name, url, bytes = bytes.len(), "fetched grib product");
                metrics::counter!(
                    "downloads_bytes",
                    "model" => model_id.to_string(),
                    "provider" => provider.config.name.clone()
                )
                .increment(bytes.len() as u64);
                *served_by.lock().unwrap() = Some(provider.config.name.clone());
                return Ok(());
            }
            Err(e) => {
                warn!(provider = %provider.config.name, url, error = %e, "provider failed, trying next");
                last_message = e.to_string();
            }
        }
    }

    Err(pipeline_storage::CacheError::DownloadFailed {
        key: object_path.to_string(),
        message: if last_message.is_empty() {
            "no providers configured".to_string()
        } else {
            last_message
        },
    })
}

fn build_filter_query(fields: &HashSet<String>) -> String {
    let mut sorted: Vec<&String> = fields.iter().collect();
    sorted.sort();
    let vars: String = sorted
        .iter()
        .map(|f| format!("var_{}=on", f.to_uppercase()))
        .collect::<Vec<_>>()
        .join("&");
    vars
}

fn decode_grib(bytes: Bytes, fields: &HashSet<String>) -> Result<GridDataset, FetchError> {
    let mut reader = Grib2Reader::new(bytes);
    let mut dataset: Option<GridDataset> = None;

    for message in reader.iter_messages() {
        let message = message.map_err(|e| {
            FetchError::Decode(crate::error::DataDecodeError::Grib2Parse {
                path: "<cache>".to_string(),
                reason: e.to_string(),
            })
        })?;

        let parameter = message.parameter().to_uppercase();
        let level = message.level().to_string();

        for field in fields {
            let Some(matcher) = matcher_for(field) else {
                continue;
            };
            if !parameter.contains(matcher.parameter) {
                continue;
            }
            if let Some(level_match) = matcher.level {
                if !level.contains(level_match) {
                    continue;
                }
            }

            let mut grid = message.to_grid_dataset(field).map_err(|e| {
                FetchError::Decode(crate::error::DataDecodeError::Grib2Parse {
                    path: "<cache>".to_string(),
                    reason: e.to_string(),
                })
            })?;
            grid.coordinates.normalize_longitudes();

            match &mut dataset {
                None => dataset = Some(grid),
                Some(existing) => {
                    let values = grid.variables.remove(field).unwrap_or_default();
                    let unit = grid.unit_of(field).map(|s| s.to_string());
                    if existing.coordinates.dims() == grid.coordinates.dims() {
                        existing
                            .insert_variable(field.clone(), values, unit)
                            .map_err(FetchError::Grid)?;
                    } else {
                        debug!(field, "mismatched grid shape within one product, aligning");
                        let aligned = align_onto(&grid, existing)
                            .map_err(|e: DerivedFieldError| FetchError::MissingField(e.to_string()))?;
                        if let Some(values) = aligned.variables.get(field) {
                            existing
                                .insert_variable(field.clone(), values.clone(), unit)
                                .map_err(FetchError::Grid)?;
                        }
                    }
                }
            }
            break;
        }
    }

    dataset.ok_or_else(|| FetchError::MissingField("no matching messages decoded".to_string()))
}

fn merge_datasets(mut datasets: Vec<GridDataset>) -> Result<GridDataset, FetchError> {
    let dominant_idx = datasets
        .iter()
        .enumerate()
        .max_by_key(|(_, d)| d.coordinates.len())
        .map(|(i, _)| i)
        .unwrap_or(0);
    let mut dominant = datasets.remove(dominant_idx);

    for other in datasets {
        if other.coordinates.dims() == dominant.coordinates.dims() {
            for (name, values) in other.variables {
                let unit = other.units.get(&name).cloned();
                dominant
                    .insert_variable(name, values, unit)
                    .map_err(FetchError::Grid)?;
            }
        } else {
            let aligned = align_onto(&other, &dominant)
                .map_err(|e| FetchError::MissingField(e.to_string()))?;
            for (name, values) in aligned.variables {
                let unit = aligned.units.get(&name).cloned();
                dominant
                    .insert_variable(name, values, unit)
                    .map_err(FetchError::Grid)?;
            }
        }
    }

    Ok(dominant)
}

/// Subsets a dataset to a region bbox. Only regular lat/lon grids are
/// subset directly; projected and curvilinear grids are returned unchanged
/// (the one Lambert regional model this spec targets already natively
/// covers a CONUS-scale tile close to the published region).
fn subset_to_region(dataset: &GridDataset, region: &BoundingBox) -> Result<GridDataset, FetchError> {
    let Coordinates::RegularLatLon { lats, lons } = &dataset.coordinates else {
        return Ok(dataset.clone());
    };

    let lat_idx: Vec<usize> = lats
        .iter()
        .enumerate()
        .filter(|(_, &lat)| lat >= region.min_y && lat <= region.max_y)
        .map(|(i, _)| i)
        .collect();
    let lon_idx: Vec<usize> = lons
        .iter()
        .enumerate()
        .filter(|(_, &lon)| lon >= region.min_x && lon <= region.max_x)
        .map(|(i, _)| i)
        .collect();

    if lat_idx.is_empty() || lon_idx.is_empty() {
        return Err(FetchError::RegionMismatch);
    }

    let new_lats: Vec<f64> = lat_idx.iter().map(|&i| lats[i]).collect();
    let new_lons: Vec<f64> = lon_idx.iter().map(|&i| lons[i]).collect();
    let nx = lons.len();

    let mut subset = GridDataset::new(Coordinates::RegularLatLon {
        lats: new_lats,
        lons: new_lons,
    });

    for (name, values) in &dataset.variables {
        let mut subset_values = Vec::with_capacity(lat_idx.len() * lon_idx.len());
        for &row in &lat_idx {
            for &col in &lon_idx {
                subset_values.push(values[row * nx + col]);
            }
        }
        let unit = dataset.unit_of(name).map(|s| s.to_string());
        subset
            .insert_variable(name.clone(), subset_values, unit)
            .map_err(FetchError::Grid)?;
    }

    Ok(subset)
}

/// Collects the union of raw fields needed for a set of variables against a
/// model, calls `fetch_raw_data`, then hands the result to callers that
/// invoke the Derived-Field Layer (spec `4.4`'s `build_dataset_for_maps`).
pub async fn build_dataset_for_maps(
    fetcher: &Fetcher<'_>,
    model: &ModelConfig,
    run_time: RunTime,
    forecast_hour: u32,
    raw_fields: HashSet<String>,
) -> Result<GridDataset, FetchError> {
    fetcher
        .fetch_raw_data(model, run_time, forecast_hour, &raw_fields, true)
        .await
}
