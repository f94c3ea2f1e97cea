// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Transferring the flux scale of reference fields to transfer fields.
//!
//! If a reference field's flux density is known (and was in its model), its
//! gain amplitudes are "correct". A transfer field solved against a unit model
//! has gain amplitudes scaled by the square root of its unknown flux density.
//! Comparing the mean squared gain amplitudes of the two fields gives that
//! flux density; scaling the transfer field's gains by `sqrt(1/scale)` then
//! corrects them.

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use super::FluxscaleError;
use crate::{
    cal_type::{MatrixForm, ParType},
    diagnostics::Diagnostics,
    solutions::CalSet,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluxscaleParams {
    /// Fields with known flux densities.
    pub reference_fields: Vec<usize>,

    /// Fields to scale. If empty, every non-reference field is used.
    pub transfer_fields: Vec<usize>,

    /// The spw whose reference-field solutions each spw is compared against.
    /// A single value applies to all spws; `None` means the spw itself. If
    /// empty, every spw is compared against itself.
    pub refspwmap: Vec<Option<usize>>,

    /// Names for fields in log messages. Names recorded in the cal table are
    /// used when this doesn't cover a field.
    pub field_names: Vec<String>,
}

/// The flux scale of one transfer field in one spw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluxscaleEntry {
    pub spw: usize,
    pub field: usize,
    pub field_name: String,

    /// The spw of the reference-field solutions used.
    pub ref_spw: usize,

    /// The flux density of the transfer field, relative to the reference
    /// field(s).
    pub scale_factor: f64,
    pub error: f64,
    pub snr: f64,

    /// The number of antennas with solutions in both the transfer field and a
    /// reference field.
    pub num_antennas: usize,

    /// The mean of the per-antenna scale factors, and its error; a cross
    /// check on `scale_factor`.
    pub ratio_mean: f64,
    pub ratio_error: f64,

    /// If false, there wasn't enough information to calculate the scale
    /// factor, and the other fields are meaningless.
    pub ok: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FluxscaleResult {
    pub entries: Vec<FluxscaleEntry>,
}

impl FluxscaleResult {
    pub fn get(&self, spw: usize, field: usize) -> Option<&FluxscaleEntry> {
        self.entries
            .iter()
            .find(|e| e.spw == spw && e.field == field)
    }

    pub fn num_ok(&self) -> usize {
        self.entries.iter().filter(|e| e.ok).count()
    }
}

/// Per-antenna, per-spw statistics of squared gain amplitudes for one field.
struct GainStats {
    /// (antenna, spw)
    ok: Array2<bool>,
    mean: Array2<f64>,
    weight: Array2<f64>,
    variance: Array2<f64>,
}

impl GainStats {
    fn new(num_elements: usize, num_spws: usize) -> GainStats {
        let shape = (num_elements, num_spws);
        GainStats {
            ok: Array2::from_elem(shape, false),
            mean: Array2::zeros(shape),
            weight: Array2::zeros(shape),
            variance: Array2::zeros(shape),
        }
    }
}

/// Gather [`GainStats`] for every field with solutions.
fn gain_stats(cal_set: &CalSet) -> IndexMap<usize, GainStats> {
    let num_elements = cal_set.num_elements();
    let num_spws = cal_set.num_spws();
    let mut sums: IndexMap<usize, (GainStats, Array2<f64>, Array2<usize>)> = IndexMap::new();

    for spw in 0..num_spws {
        for slot in &cal_set.spw(spw).slots {
            if !slot.meta.solution_ok {
                continue;
            }
            let (stats, sum_sq, count) = sums.entry(slot.meta.field_id).or_insert_with(|| {
                (
                    GainStats::new(num_elements, num_spws),
                    Array2::zeros((num_elements, num_spws)),
                    Array2::zeros((num_elements, num_spws)),
                )
            });
            for ant in 0..num_elements {
                let w = slot.meta.elem_fit_weight.get(ant).copied().unwrap_or(1.0);
                let pars = slot.cube.par.slice(s![.., .., ant]);
                let oks = slot.cube.par_ok.slice(s![.., .., ant]);
                for (par, &ok) in pars.iter().zip(oks.iter()) {
                    if !ok {
                        continue;
                    }
                    let g2 = par.norm_sqr();
                    stats.ok[(ant, spw)] = true;
                    stats.mean[(ant, spw)] += w * g2;
                    sum_sq[(ant, spw)] += w * g2 * g2;
                    stats.weight[(ant, spw)] += w;
                    count[(ant, spw)] += 1;
                }
            }
        }
    }

    sums.into_iter()
        .map(|(field, (mut stats, mut sum_sq, count))| {
            for ((ant, spw), ok) in stats.ok.indexed_iter_mut() {
                let w = stats.weight[(ant, spw)];
                if *ok && w > 0.0 {
                    stats.mean[(ant, spw)] /= w;
                    sum_sq[(ant, spw)] /= w;
                    let n = count[(ant, spw)];
                    if n > 2 {
                        stats.variance[(ant, spw)] = (sum_sq[(ant, spw)]
                            - stats.mean[(ant, spw)].powi(2))
                            / (n - 1) as f64;
                    }
                } else {
                    *ok = false;
                    stats.mean[(ant, spw)] = 0.0;
                    stats.weight[(ant, spw)] = 0.0;
                }
            }
            (field, stats)
        })
        .collect()
}

/// Weighted sums over antennas for one side of a ratio.
#[derive(Default)]
struct Accumulated {
    value: f64,
    weight: f64,
    inverse_variance: f64,
    num_with_variance: usize,
}

impl Accumulated {
    fn add(&mut self, mean: f64, weight: f64, variance: f64) {
        self.value += weight * mean;
        self.weight += weight;
        if variance > 0.0 {
            self.inverse_variance += weight / variance;
            self.num_with_variance += 1;
        }
    }

    fn merge(&mut self, other: &Accumulated) {
        self.value += other.value;
        self.weight += other.weight;
        self.inverse_variance += other.inverse_variance;
        self.num_with_variance += other.num_with_variance;
    }

    /// The weighted mean, and the variance of that mean.
    fn finish(&self) -> (f64, f64) {
        if self.weight <= 0.0 {
            return (0.0, 0.0);
        }
        let mean = self.value / self.weight;
        let mut variance = self.inverse_variance / self.weight;
        if variance > 0.0 && self.num_with_variance > 0 {
            variance = 1.0 / (variance * self.num_with_variance as f64);
        }
        (mean, variance)
    }
}

/// Determine the flux density of every transfer field relative to the
/// reference fields, per spw, and scale the transfer fields' gains to match.
pub fn fluxscale(
    cal_set: &mut CalSet,
    params: &FluxscaleParams,
    diagnostics: &mut Diagnostics,
) -> Result<FluxscaleResult, FluxscaleError> {
    let cal_type = cal_set.cal_type();
    if cal_type.form() != MatrixForm::Jones || cal_type.par_type() != ParType::Complex {
        return Err(FluxscaleError::UnsupportedType(cal_type.type_name()));
    }
    if params.reference_fields.is_empty() {
        return Err(FluxscaleError::NoReferenceFieldsGiven);
    }
    let num_spws = cal_set.num_spws();
    let num_elements = cal_set.num_elements();

    let field_name = |field: usize| -> String {
        params
            .field_names
            .get(field)
            .cloned()
            .or_else(|| cal_set.field_name(field).map(|s| s.to_string()))
            .unwrap_or_else(|| format!("Index={field}"))
    };

    let available = cal_set.field_ids();
    let ref_fields: Vec<usize> = params
        .reference_fields
        .iter()
        .copied()
        .sorted()
        .dedup()
        .filter(|f| available.contains(f))
        .collect();
    if ref_fields.is_empty() {
        return Err(FluxscaleError::NoReferenceFields(
            params.reference_fields.clone(),
        ));
    }
    let missing_refs: Vec<usize> = params
        .reference_fields
        .iter()
        .copied()
        .filter(|f| !available.contains(f))
        .collect();
    if !missing_refs.is_empty() {
        diagnostics.warn(format!(
            "The following reference fields have no solutions available: {}",
            missing_refs.iter().map(|&f| field_name(f)).join(" ")
        ));
    }

    let implicit_transfer: Vec<usize> = available
        .iter()
        .copied()
        .filter(|f| !ref_fields.contains(f))
        .collect();
    if implicit_transfer.is_empty() {
        return Err(FluxscaleError::NoTransferFields);
    }
    let transfer_fields: Vec<usize> = if params.transfer_fields.is_empty() {
        info!("Assuming all non-reference fields are transfer fields");
        implicit_transfer
    } else {
        let requested: Vec<usize> = params
            .transfer_fields
            .iter()
            .copied()
            .sorted()
            .dedup()
            .collect();
        let missing: Vec<usize> = requested
            .iter()
            .copied()
            .filter(|f| !implicit_transfer.contains(f))
            .collect();
        if !missing.is_empty() {
            diagnostics.warn(format!(
                "The following transfer fields have no solutions available: {}",
                missing.iter().map(|&f| field_name(f)).join(" ")
            ));
        }
        let present: Vec<usize> = requested
            .into_iter()
            .filter(|f| implicit_transfer.contains(f))
            .collect();
        if present.is_empty() {
            return Err(FluxscaleError::NoTransferFields);
        }
        present
    };
    info!(
        "Found reference field(s): {}",
        ref_fields.iter().map(|&f| field_name(f)).join(" ")
    );
    info!(
        "Found transfer field(s): {}",
        transfer_fields.iter().map(|&f| field_name(f)).join(" ")
    );

    // Reference spws.
    let ref_spw_map: Vec<usize> = (0..num_spws)
        .map(|spw| match params.refspwmap.as_slice() {
            [] => spw,
            [single] => single.unwrap_or(spw),
            map => map.get(spw).copied().flatten().unwrap_or(spw),
        })
        .collect();
    for (spw, &ref_spw) in ref_spw_map.iter().enumerate() {
        if ref_spw >= num_spws {
            return Err(FluxscaleError::BadRefSpwMap {
                spw,
                ref_spw,
                num_spws,
            });
        }
        if ref_spw != spw {
            info!("Spw {spw} will be referenced to spw {ref_spw}");
        }
    }

    let stats = gain_stats(cal_set);
    let mut result = FluxscaleResult::default();
    for &tran in &transfer_fields {
        let tran_stats = match stats.get(&tran) {
            Some(s) => s,
            None => continue,
        };
        for spw in 0..num_spws {
            if !tran_stats.ok.column(spw).iter().any(|&ok| ok) {
                continue;
            }
            let ref_spw = ref_spw_map[spw];

            let mut sum_tran = Accumulated::default();
            let mut sum_ref = Accumulated::default();
            let mut ratio_sum = 0.0;
            let mut ratio_sum_sq = 0.0;
            let mut num_antennas = 0;
            for ant in 0..num_elements {
                if !tran_stats.ok[(ant, spw)] {
                    continue;
                }
                let mut ant_ref = Accumulated::default();
                let mut ref_ok = false;
                for ref_field in &ref_fields {
                    let r = match stats.get(ref_field) {
                        Some(r) => r,
                        None => continue,
                    };
                    if r.ok[(ant, ref_spw)] {
                        ref_ok = true;
                        ant_ref.add(
                            r.mean[(ant, ref_spw)],
                            r.weight[(ant, ref_spw)],
                            r.variance[(ant, ref_spw)],
                        );
                    }
                }
                if !ref_ok {
                    continue;
                }
                num_antennas += 1;
                sum_tran.add(
                    tran_stats.mean[(ant, spw)],
                    tran_stats.weight[(ant, spw)],
                    tran_stats.variance[(ant, spw)],
                );
                sum_ref.merge(&ant_ref);

                let ratio = tran_stats.mean[(ant, spw)] / (ant_ref.value / ant_ref.weight);
                ratio_sum += ratio;
                ratio_sum_sq += ratio * ratio;
            }

            let (mean_tran, var_tran) = sum_tran.finish();
            let (mean_ref, var_ref) = sum_ref.finish();
            let mut entry = FluxscaleEntry {
                spw,
                field: tran,
                field_name: field_name(tran),
                ref_spw,
                scale_factor: -1.0,
                error: -1.0,
                snr: 0.0,
                num_antennas,
                ratio_mean: 0.0,
                ratio_error: 0.0,
                ok: false,
            };
            if mean_tran > 0.0 && mean_ref > 0.0 {
                let scale = mean_tran / mean_ref;
                let error = (var_tran / (mean_tran * mean_tran) + var_ref / (mean_ref * mean_ref)).sqrt()
                    * scale;
                let n = num_antennas as f64;
                let ratio_mean = ratio_sum / n;
                let ratio_error = if num_antennas > 1 {
                    ((ratio_sum_sq / n - ratio_mean * ratio_mean) / (n - 1.0))
                        .max(0.0)
                        .sqrt()
                } else {
                    0.0
                };
                entry.scale_factor = scale;
                entry.error = error;
                entry.snr = if error > 0.0 { scale / error } else { f64::INFINITY };
                entry.ratio_mean = ratio_mean;
                entry.ratio_error = ratio_error;
                entry.ok = true;

                let ref_spw_str = if ref_spw != spw {
                    format!(" (ref spw {ref_spw})")
                } else {
                    String::new()
                };
                info!(
                    "Flux density for {} in spw {spw}{ref_spw_str} is: {scale} +/- {error} (SNR = {}, nAnt = {num_antennas})",
                    entry.field_name, entry.snr
                );
                debug!(
                    "Mean of per-antenna ratios for {} in spw {spw}: {ratio_mean} +/- {ratio_error}",
                    entry.field_name
                );
            } else {
                diagnostics.insufficient_fluxscale += 1;
                diagnostics.warn(format!(
                    "Insufficient information to calculate a scale factor for {} in spw {spw}",
                    entry.field_name
                ));
            }
            result.entries.push(entry);
        }
    }

    if result.num_ok() == 0 {
        return Err(FluxscaleError::NoScaleFactors);
    }

    // Scale the transfer fields' gains.
    for entry in result.entries.iter().filter(|e| e.ok) {
        let gain_scale = (1.0 / entry.scale_factor).sqrt();
        for i_slot in 0..cal_set.num_slots(entry.spw) {
            let slot = cal_set.slot_mut(entry.spw, i_slot);
            if slot.meta.field_id != entry.field {
                continue;
            }
            let cube = &mut slot.cube;
            cube.par
                .iter_mut()
                .zip(cube.par_ok.iter())
                .filter(|(_, ok)| **ok)
                .for_each(|(par, _)| *par *= gain_scale);
        }
    }

    Ok(result)
}
