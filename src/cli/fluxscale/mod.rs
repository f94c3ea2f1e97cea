// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests;

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use super::common::{display_warnings, report_diagnostics, require_path, InfoPrinter, ARG_FILE_HELP};
use crate::{
    post_solve::{fluxscale, FluxscaleParams, FluxscaleResult},
    CalSet, Diagnostics, ViscalError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct FluxscaleArgs {
    #[clap(name = "ARGUMENTS_FILE", help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The gain table to read. Its solutions must have been derived with the
    /// reference fields' true flux densities in their models.
    #[clap(short, long, help_heading = "INPUT FILES")]
    pub(super) caltable: Option<PathBuf>,

    /// The fields whose flux densities are known.
    #[clap(short, long, multiple_values(true), help_heading = "FLUX SCALING")]
    pub(super) reference: Option<Vec<usize>>,

    /// The fields to scale. The default is every field that isn't a reference
    /// field.
    #[clap(long, multiple_values(true), help_heading = "FLUX SCALING")]
    pub(super) transfer: Option<Vec<usize>>,

    /// For each spw, the spw whose reference-field solutions it is compared
    /// against. A single value applies to every spw, and -1 means the spw
    /// itself.
    #[clap(long, multiple_values(true), allow_hyphen_values(true), help_heading = "FLUX SCALING")]
    pub(super) refspwmap: Option<Vec<i64>>,

    /// Where to write the scaled gain table.
    #[clap(short, long, help_heading = "OUTPUT FILES")]
    pub(super) output: Option<PathBuf>,

    /// Also write the derived flux densities to this JSON file.
    #[clap(long, help_heading = "OUTPUT FILES")]
    pub(super) results: Option<PathBuf>,
}

struct FluxscaleJob {
    caltable: PathBuf,
    output: PathBuf,
    results: Option<PathBuf>,
    params: FluxscaleParams,
}

impl FluxscaleArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    pub(super) fn merge(self) -> Result<FluxscaleArgs, ViscalError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            let FluxscaleArgs {
                args_file: _,
                caltable,
                reference,
                transfer,
                refspwmap,
                output,
                results,
            } = unpack_arg_file!(arg_file);

            Ok(FluxscaleArgs {
                args_file: None,
                caltable: cli_args.caltable.or(caltable),
                reference: cli_args.reference.or(reference),
                transfer: cli_args.transfer.or(transfer),
                refspwmap: cli_args.refspwmap.or(refspwmap),
                output: cli_args.output.or(output),
                results: cli_args.results.or(results),
            })
        } else {
            Ok(cli_args)
        }
    }

    fn parse(self) -> Result<FluxscaleJob, ViscalError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            caltable,
            reference,
            transfer,
            refspwmap,
            output,
            results,
        } = self;

        let caltable = require_path(caltable, "cal table")?;
        let output = require_path(output, "output cal table")?;
        let refspwmap = refspwmap
            .unwrap_or_default()
            .into_iter()
            .map(|s| if s < 0 { None } else { Some(s as usize) })
            .collect();
        let params = FluxscaleParams {
            reference_fields: reference.unwrap_or_default(),
            transfer_fields: transfer.unwrap_or_default(),
            refspwmap,
            field_names: vec![],
        };

        let mut printer = InfoPrinter::new("Transferring flux scales".into());
        printer.push_block(vec![
            format!("Cal table: {}", caltable.display()).into(),
            format!("Output: {}", output.display()).into(),
        ]);
        let mut block = vec![format!("Reference fields: {:?}", params.reference_fields).into()];
        if params.transfer_fields.is_empty() {
            block.push("Transfer fields: all others".into());
        } else {
            block.push(format!("Transfer fields: {:?}", params.transfer_fields).into());
        }
        if !params.refspwmap.is_empty() {
            block.push(format!("Reference spw map: {:?}", params.refspwmap).into());
        }
        printer.push_block(block);
        printer.display();
        display_warnings();

        Ok(FluxscaleJob {
            caltable,
            output,
            results,
            params,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), ViscalError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let FluxscaleJob {
            caltable,
            output,
            results,
            params,
        } = self.parse()?;

        let mut cal_set = CalSet::load(&caltable, None, &[], 0)?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let mut diagnostics = Diagnostics::new();
        let result = fluxscale(&mut cal_set, &params, &mut diagnostics)?;
        cal_set.store(&output, &caltable.display().to_string(), false)?;
        info!("Wrote {}", output.display());
        if let Some(results) = results {
            write_results(&results, &result)?;
        }
        report_diagnostics(&diagnostics);
        Ok(())
    }
}

fn write_results(file: &Path, result: &FluxscaleResult) -> Result<(), ViscalError> {
    let f = BufWriter::new(File::create(file)?);
    serde_json::to_writer_pretty(f, result)?;
    info!("Wrote flux densities to {}", file.display());
    Ok(())
}
