// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Pretty printers for reporting information.
use std::{borrow::Cow, sync::Mutex};

use crate::Diagnostics;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

lazy_static::lazy_static! {
    static ref WARNING_PRINTER: Mutex<WarningPrinter> = Mutex::new(WarningPrinter::new());
}

/// The tree-drawing symbol for a line within a block.
fn symbol(i_line: usize, num_lines: usize, i_block: usize, num_blocks: usize) -> char {
    match (i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks) {
        (0, false, _) => VERTICAL_AND_RIGHT,
        (0, _, false) => VERTICAL_AND_RIGHT,
        (0, true, true) => UP_AND_RIGHT,
        _ => VERTICAL,
    }
}

pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        log::info!("{}", console::style(self.title).bold());
        let num_blocks = self.blocks.len();
        for (i_block, block) in self.blocks.into_iter().enumerate() {
            let num_lines = block.len();
            for (i_line, line) in block.into_iter().enumerate() {
                log::info!("{} {line}", symbol(i_line, num_lines, i_block, num_blocks));
            }
        }
        log::info!("");
    }
}

struct WarningPrinter {
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl WarningPrinter {
    fn new() -> Self {
        Self { blocks: vec![] }
    }

    fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    fn display(&mut self) {
        log::debug!("Displaying warnings");
        if self.blocks.is_empty() {
            return;
        }

        log::warn!("{}", console::style("Warnings").bold());
        let num_blocks = self.blocks.len();
        for (i_block, block) in self.blocks.iter().enumerate() {
            let num_lines = block.len();
            for (i_line, line) in block.iter().enumerate() {
                log::warn!("{} {line}", symbol(i_line, num_lines, i_block, num_blocks));
            }
        }
        log::warn!("");
        self.blocks.clear();
    }
}

pub(crate) trait Warn {
    fn warn(self);
}

impl Warn for &'static str {
    fn warn(self) {
        WARNING_PRINTER.lock().unwrap().push_line(self.into());
    }
}

impl Warn for String {
    fn warn(self) {
        WARNING_PRINTER.lock().unwrap().push_line(self.into());
    }
}

impl Warn for Vec<Cow<'static, str>> {
    fn warn(self) {
        WARNING_PRINTER.lock().unwrap().push_block(self);
    }
}

/// Print out any warnings that have been collected. This should be called
/// once arguments have been parsed, and again at the end of a run.
pub(crate) fn display_warnings() {
    WARNING_PRINTER.lock().unwrap().display();
}

/// Summarise the recoverable problems of a run, then print its warnings.
pub(crate) fn report_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_clean() {
        log::info!("No problems were encountered");
        return;
    }

    let mut printer = InfoPrinter::new("Diagnostics".into());
    let counts = [
        (diagnostics.rejected_elements, "elements rejected for lack of data"),
        (diagnostics.snr_rejections, "solutions flagged for low SNR"),
        (diagnostics.skipped_intervals, "solution intervals without data"),
        (diagnostics.failed_intervals, "solution intervals that failed"),
        (diagnostics.alternate_refants, "solutions referenced to an alternate antenna"),
        (diagnostics.broken_phase_continuity, "breaks in phase continuity"),
        (diagnostics.insufficient_fluxscale, "flux scales that couldn't be determined"),
        (diagnostics.empty_spws, "spws without good solutions"),
        (diagnostics.flagged_vis, "visibilities flagged"),
    ];
    for (count, what) in counts.into_iter().filter(|(c, _)| *c > 0) {
        printer.push_line(format!("{count} {what}").into());
    }
    printer.display();

    if !diagnostics.warnings.is_empty() {
        diagnostics
            .warnings
            .iter()
            .map(|w| Cow::from(w.clone()))
            .collect::<Vec<_>>()
            .warn();
    }
    display_warnings();
}
