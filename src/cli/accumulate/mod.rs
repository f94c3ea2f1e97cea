// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, parse_enum, require_path, InfoPrinter, ARG_FILE_HELP, TIME_INTERP_HELP,
};
use crate::{
    solutions::{accumulate, TimeInterp},
    CalSet, ViscalError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct AccumulateArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The cal table that the increment is composed onto.
    #[clap(short, long, help_heading = "INPUT FILES")]
    pub(super) cumulative: Option<PathBuf>,

    /// The cal table of incremental solutions. It must have the same type as
    /// the cumulative table.
    #[clap(short, long, help_heading = "INPUT FILES")]
    pub(super) increment: Option<PathBuf>,

    /// Only update cumulative solutions from these fields. The default is to
    /// update all of them.
    #[clap(long, multiple_values(true), help_heading = "SOLUTIONS")]
    pub(super) fields: Option<Vec<usize>>,

    #[clap(long, help = TIME_INTERP_HELP.as_str(), help_heading = "SOLUTIONS")]
    pub(super) time_interp: Option<String>,

    /// Where to write the composed cal table. The default is to overwrite the
    /// cumulative table.
    #[clap(short, long, help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,
}

impl AccumulateArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    pub(super) fn merge(self) -> Result<AccumulateArgs, ViscalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let AccumulateArgs {
                args_file: _,
                cumulative,
                increment,
                fields,
                time_interp,
                output,
            } = unpack_arg_file!(arg_file);

            Ok(AccumulateArgs {
                args_file: None,
                cumulative: cli_args.cumulative.or(cumulative),
                increment: cli_args.increment.or(increment),
                fields: cli_args.fields.or(fields),
                time_interp: cli_args.time_interp.or(time_interp),
                output: cli_args.output.or(output),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), ViscalError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);

        let Self {
            args_file: _,
            cumulative,
            increment,
            fields,
            time_interp,
            output,
        } = self;
        let cumulative = require_path(cumulative, "cumulative cal table")?;
        let increment = require_path(increment, "incremental cal table")?;
        let output = output.unwrap_or_else(|| cumulative.clone());
        let fields = fields.unwrap_or_default();
        let time_interp = parse_enum::<TimeInterp>(time_interp.as_deref(), "time interpolation")?
            .unwrap_or_default();

        let mut printer = InfoPrinter::new("Accumulating solutions".into());
        printer.push_block(vec![
            format!("Cumulative: {}", cumulative.display()).into(),
            format!("Increment: {}", increment.display()).into(),
            format!("Output: {}", output.display()).into(),
        ]);
        printer.push_line(format!("Time interpolation: {time_interp}").into());
        if !fields.is_empty() {
            printer.push_line(format!("Fields: {fields:?}").into());
        }
        printer.display();
        display_warnings();

        let mut cum_set = CalSet::load(&cumulative, None, &[], 0)?;
        let inc_set = CalSet::load(&increment, Some(cum_set.cal_type()), &[], 0)?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let num_updated = accumulate(&mut cum_set, &inc_set, &fields, time_interp)?;
        info!("Updated {num_updated} solution slots");
        cum_set.store(&output, &cumulative.display().to_string(), false)?;
        info!("Wrote {}", output.display());
        Ok(())
    }
}
