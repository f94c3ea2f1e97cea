// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, parse_enum, read_dataset, require_path, InfoPrinter, APPLY_MODE_HELP,
    ARG_FILE_HELP, CAL_TABLE_HELP, CAL_TYPE_HELP, DATA_HELP, FREQ_INTERP_HELP, TIME_INTERP_HELP,
};
use crate::{
    apply::{ApplyDriver, ApplyMode},
    params::ApplyParams,
    solutions::{FreqInterp, TimeInterp},
    vis_io::{write_vis_dataset, VisIterator},
    CalType, ViscalError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct ApplyArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(short, long, help = DATA_HELP.as_str(), help_heading = "INPUT FILES")]
    pub(super) data: Option<PathBuf>,

    #[clap(short, long, help = CAL_TABLE_HELP.as_str(), help_heading = "INPUT FILES")]
    pub(super) caltable: Option<PathBuf>,

    /// Only accept a cal table of this type. If not given, the type is read
    /// from the table.
    #[clap(short = 't', long, help_heading = "INPUT FILES")]
    pub(super) cal_type: Option<String>,

    /// Only use solutions from these fields. The default is to use all fields.
    #[clap(long, multiple_values(true), help_heading = "SOLUTIONS")]
    pub(super) fields: Option<Vec<usize>>,

    /// The cal table spw to use for each dataset spw, in dataset spw order.
    /// Dataset spws not given here use the table spw with the same index.
    #[clap(long, multiple_values(true), help_heading = "SOLUTIONS")]
    pub(super) spw_map: Option<Vec<usize>>,

    #[clap(long, help = TIME_INTERP_HELP.as_str(), help_heading = "SOLUTIONS")]
    pub(super) time_interp: Option<String>,

    #[clap(long, help = FREQ_INTERP_HELP.as_str(), help_heading = "SOLUTIONS")]
    pub(super) freq_interp: Option<String>,

    #[clap(long, help = APPLY_MODE_HELP.as_str(), help_heading = "SOLUTIONS")]
    pub(super) mode: Option<String>,

    /// Where to write the calibrated dataset. The default is to overwrite the
    /// input dataset.
    #[clap(short, long, help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,
}

struct ApplyJob {
    data: PathBuf,
    output: PathBuf,
    cal_type: Option<CalType>,
    params: ApplyParams,
}

impl ApplyArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    pub(super) fn merge(self) -> Result<ApplyArgs, ViscalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let ApplyArgs {
                args_file: _,
                data,
                caltable,
                cal_type,
                fields,
                spw_map,
                time_interp,
                freq_interp,
                mode,
                output,
            } = unpack_arg_file!(arg_file);

            Ok(ApplyArgs {
                args_file: None,
                data: cli_args.data.or(data),
                caltable: cli_args.caltable.or(caltable),
                cal_type: cli_args.cal_type.or(cal_type),
                fields: cli_args.fields.or(fields),
                spw_map: cli_args.spw_map.or(spw_map),
                time_interp: cli_args.time_interp.or(time_interp),
                freq_interp: cli_args.freq_interp.or(freq_interp),
                mode: cli_args.mode.or(mode),
                output: cli_args.output.or(output),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<ApplyJob, ViscalError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            data,
            caltable,
            cal_type,
            fields,
            spw_map,
            time_interp,
            freq_interp,
            mode,
            output,
        } = self;

        let data = require_path(data, "dataset")?;
        let mut params = ApplyParams::new(require_path(caltable, "cal table")?);
        let cal_type = parse_enum::<CalType>(cal_type.as_deref(), "calibration type")?;
        params.fields = fields.unwrap_or_default();
        params.spw_map = spw_map.unwrap_or_default();
        if let Some(t) = parse_enum::<TimeInterp>(time_interp.as_deref(), "time interpolation")? {
            params.time_interp = t;
        }
        if let Some(f) = parse_enum::<FreqInterp>(freq_interp.as_deref(), "frequency interpolation")? {
            params.freq_interp = f;
        }
        if let Some(m) = parse_enum::<ApplyMode>(mode.as_deref(), "apply mode")? {
            params.mode = m;
        }
        let output = output.unwrap_or_else(|| data.clone());

        let mut printer = InfoPrinter::new("Applying solutions".into());
        printer.push_block(vec![
            format!("Dataset: {}", data.display()).into(),
            format!("Cal table: {}", params.table.display()).into(),
            format!("Output: {}", output.display()).into(),
        ]);
        let mut block = vec![
            format!("Mode: {}", params.mode).into(),
            format!("Time interpolation: {}", params.time_interp).into(),
            format!("Frequency interpolation: {}", params.freq_interp).into(),
        ];
        if !params.fields.is_empty() {
            block.push(format!("Fields: {:?}", params.fields).into());
        }
        if !params.spw_map.is_empty() {
            block.push(format!("Spw map: {:?}", params.spw_map).into());
        }
        printer.push_block(block);
        printer.display();
        display_warnings();

        Ok(ApplyJob {
            data,
            output,
            cal_type,
            params,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), ViscalError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let ApplyJob {
            data,
            output,
            cal_type,
            params,
        } = self.parse()?;

        let mut vis = read_dataset(&data, &[])?;
        let mut driver = ApplyDriver::set_apply(&params, cal_type, vis.metadata())?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        driver.apply_dataset(&mut vis)?;
        write_vis_dataset(&output, &vis)?;
        info!("Wrote {}", output.display());
        Ok(())
    }
}
