// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Print the contents of a cal table.

use std::path::PathBuf;

use clap::Parser;
use log::debug;

use super::common::{parse_enum, CAL_TABLE_HELP, CAL_TYPE_HELP};
use crate::{cal_type::ParType, CalSet, CalType, ViscalError};

#[derive(Parser, Debug, Clone, Default)]
pub(super) struct SolutionsListArgs {
    #[clap(name = "CALTABLE", help = CAL_TABLE_HELP.as_str(), parse(from_os_str))]
    caltable: PathBuf,

    #[clap(short = 't', long, help = CAL_TYPE_HELP.as_str())]
    cal_type: Option<String>,

    /// Only list solutions from these fields.
    #[clap(long, multiple_values(true))]
    fields: Option<Vec<usize>>,

    /// Only list this many parameter channels of each spw.
    #[clap(long)]
    max_chans: Option<usize>,
}

impl SolutionsListArgs {
    pub(super) fn run(self) -> Result<(), ViscalError> {
        debug!("{:#?}", self);

        let cal_type = parse_enum::<CalType>(self.cal_type.as_deref(), "calibration type")?;
        let cal_set = CalSet::load(
            &self.caltable,
            cal_type,
            &self.fields.unwrap_or_default(),
            0,
        )?;
        let real = cal_set.cal_type().par_type() == ParType::Real;

        println!(
            "{} solutions for {} elements in {} spws",
            cal_set.cal_type().type_name(),
            cal_set.num_elements(),
            cal_set.num_spws()
        );
        for spw in 0..cal_set.num_spws() {
            let spw_sols = cal_set.spw(spw);
            if spw_sols.slots.is_empty() {
                continue;
            }
            println!(
                "Spw {spw}: {} slots, {} channels starting at data channel {}",
                spw_sols.slots.len(),
                spw_sols.num_chans,
                spw_sols.start_chan
            );
            for i_slot in cal_set.time_order(spw) {
                let slot = &spw_sols.slots[i_slot];
                println!(
                    "  time {:.3} ({:.1}s span), field {} '{}'",
                    slot.meta.time,
                    slot.meta.stop_time - slot.meta.start_time,
                    slot.meta.field_id,
                    slot.meta.field_name
                );
                let (num_params, num_chans, num_elements) = slot.cube.dim();
                let num_chans = self.max_chans.map_or(num_chans, |m| m.min(num_chans));
                for i_elem in 0..num_elements {
                    for i_chan in 0..num_chans {
                        let values = (0..num_params)
                            .map(|i_par| {
                                let p = slot.cube.par[(i_par, i_chan, i_elem)];
                                let flag = if slot.cube.par_ok[(i_par, i_chan, i_elem)] {
                                    " "
                                } else {
                                    "F"
                                };
                                if real {
                                    format!("{:>12.6}{flag}", p.re)
                                } else {
                                    format!(
                                        "{:>10.6} {:>8.3}°{flag}",
                                        p.norm(),
                                        p.arg().to_degrees()
                                    )
                                }
                            })
                            .collect::<Vec<_>>()
                            .join(" ");
                        println!("    {i_elem:>4} {i_chan:>5} {values}");
                    }
                }
            }
        }
        Ok(())
    }
}
