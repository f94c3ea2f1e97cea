// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::path::PathBuf;

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{
    display_warnings, parse_cal_type, parse_enum, read_dataset, report_diagnostics, require_path,
    InfoPrinter, ARG_FILE_HELP, CAL_TABLE_HELP, CAL_TYPE_HELP, DATA_HELP,
};
use crate::{
    iteration::{Combine, SolutionInterval},
    params::{Apmode, SolveParams},
    solve::SolvableVisCal,
    vis_io::VisIterator,
    CalType, ViscalError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct SolveArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    #[clap(short, long, help = DATA_HELP.as_str(), help_heading = "INPUT DATA")]
    pub(super) data: Option<PathBuf>,

    /// Only use these channels of a spw. Given as SPW:START:COUNT, e.g. 0:4:56
    /// uses channels 4 to 59 of spw 0. May be given multiple times.
    #[clap(long, multiple_values(true), help_heading = "INPUT DATA")]
    pub(super) channels: Option<Vec<String>>,

    #[clap(short = 't', long, help = CAL_TYPE_HELP.as_str(), help_heading = "CALIBRATION")]
    pub(super) cal_type: Option<String>,

    /// The solution interval. "inf" (the default) gives one solution per scan,
    /// "int" one per integration, and a duration (e.g. 60s, 2min) one per
    /// span of that length.
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) solint: Option<String>,

    /// Let solutions span these boundaries. Any of "scan", "spw" and "field",
    /// separated by commas.
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) combine: Option<String>,

    /// The index of the preferred reference antenna. Solution phases are made
    /// relative to this antenna. A negative value means no reference antenna.
    #[clap(long, allow_hyphen_values(true), help_heading = "CALIBRATION")]
    pub(super) refant: Option<i64>,

    /// Solve for amplitude and phase ("AP", the default), phase only ("P") or
    /// amplitude only ("A").
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) apmode: Option<String>,

    /// Normalise the amplitudes of solutions in each spw.
    #[clap(long, help_heading = "CALIBRATION")]
    #[serde(default)]
    pub(super) solnorm: bool,

    /// Solutions with a signal-to-noise ratio below this are flagged.
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) min_snr: Option<f64>,

    /// The maximum number of solver iterations for each solution.
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) max_iterations: Option<u32>,

    /// The solver stops iterating when the largest parameter change is less
    /// than this.
    #[clap(long, help_heading = "CALIBRATION")]
    pub(super) stop_threshold: Option<f64>,

    #[clap(short = 'o', long, help = CAL_TABLE_HELP.as_str(), help_heading = "OUTPUT FILES")]
    pub(super) caltable: Option<PathBuf>,

    /// Add the new solutions to an existing cal table instead of overwriting
    /// it.
    #[clap(long, help_heading = "OUTPUT FILES")]
    #[serde(default)]
    pub(super) append: bool,
}

/// Parsed solve arguments.
struct SolveJob {
    data: PathBuf,
    channels: Vec<String>,
    cal_type: CalType,
    params: SolveParams,
}

impl SolveArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<SolveArgs, ViscalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let SolveArgs {
                args_file: _,
                data,
                channels,
                cal_type,
                solint,
                combine,
                refant,
                apmode,
                solnorm,
                min_snr,
                max_iterations,
                stop_threshold,
                caltable,
                append,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(SolveArgs {
                args_file: None,
                data: cli_args.data.or(data),
                channels: cli_args.channels.or(channels),
                cal_type: cli_args.cal_type.or(cal_type),
                solint: cli_args.solint.or(solint),
                combine: cli_args.combine.or(combine),
                refant: cli_args.refant.or(refant),
                apmode: cli_args.apmode.or(apmode),
                solnorm: cli_args.solnorm || solnorm,
                min_snr: cli_args.min_snr.or(min_snr),
                max_iterations: cli_args.max_iterations.or(max_iterations),
                stop_threshold: cli_args.stop_threshold.or(stop_threshold),
                caltable: cli_args.caltable.or(caltable),
                append: cli_args.append || append,
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<SolveJob, ViscalError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            data,
            channels,
            cal_type,
            solint,
            combine,
            refant,
            apmode,
            solnorm,
            min_snr,
            max_iterations,
            stop_threshold,
            caltable,
            append,
        } = self;

        let data = require_path(data, "dataset")?;
        let cal_type = parse_cal_type(cal_type.as_deref())?;
        let mut params = SolveParams::new(require_path(caltable, "output cal table")?)?;
        if let Some(solint) = solint {
            params.solint = SolutionInterval::parse(&solint)?;
        }
        if let Some(combine) = combine {
            params.combine = Combine::parse(&combine)?;
        }
        params.refant = refant.and_then(|r| usize::try_from(r).ok());
        if let Some(apmode) = parse_enum::<Apmode>(apmode.as_deref(), "apmode")? {
            params.apmode = apmode;
        }
        params.solnorm = solnorm;
        if let Some(min_snr) = min_snr {
            params.min_snr = min_snr;
        }
        if let Some(max_iterations) = max_iterations {
            params.max_iterations = max_iterations;
        }
        if let Some(stop_threshold) = stop_threshold {
            params.stop_threshold = stop_threshold;
        }
        params.append = append;
        params.validate()?;

        let mut printer = InfoPrinter::new(format!("Solving for {}", cal_type.type_name()).into());
        printer.push_block(vec![
            format!("Dataset: {}", data.display()).into(),
            format!("Cal table: {}", params.table.display()).into(),
        ]);
        let combine_str = if params.combine.is_empty() {
            "none".to_string()
        } else {
            params.combine.to_string()
        };
        printer.push_block(vec![
            format!("solint: {}", params.solint).into(),
            format!("combine: {combine_str}").into(),
            format!("apmode: {}", params.apmode).into(),
            match params.refant {
                Some(r) => format!("refant: {r}").into(),
                None => "refant: none".into(),
            },
        ]);
        printer.push_line(
            format!(
                "Minimum SNR: {}, {} iterations max., stop threshold {:e}",
                params.min_snr, params.max_iterations, params.stop_threshold
            )
            .into(),
        );
        if params.solnorm {
            printer.push_line("Normalising solution amplitudes".into());
        }
        if params.append {
            printer.push_line("Appending to the cal table".into());
        }
        printer.display();
        display_warnings();

        Ok(SolveJob {
            data,
            channels: channels.unwrap_or_default(),
            cal_type,
            params,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), ViscalError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let SolveJob {
            data,
            channels,
            cal_type,
            params,
        } = self.parse()?;

        let mut vis = read_dataset(&data, &channels)?;
        let mut svc = SolvableVisCal::set_solve(cal_type, params, vis.metadata())?;

        if dry_run {
            svc.set_solve_channelization(&vis);
            svc.size_up_solve(&mut vis)?;
            if let Some(layout) = svc.layout() {
                info!(
                    "{} solution intervals over {} spws",
                    layout.chunks_per_solution.len(),
                    layout.solution_spws.len()
                );
            }
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        svc.solve(&mut vis)?;
        svc.store()?;
        report_diagnostics(svc.diagnostics());
        Ok(())
    }
}
