// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use benchwright::{BenchwrightError, SystemVerilogTarget, TargetConfig};
use clap::ArgMatches;
use colored::Colorize;

use crate::report_cli_error::report_cli_error_and_exit;
use crate::test_description::TestDescription;

/// Generates the collateral for a test description, runs the simulator and
/// exits non-zero if it fails.
pub fn handle_run(matches: &ArgMatches, config: TargetConfig) -> anyhow::Result<()> {
    let input = matches
        .get_one::<String>("TEST_JSON")
        .ok_or_else(|| anyhow::anyhow!("missing test description path"))?;
    let desc = TestDescription::from_path(Path::new(input))?;
    let target = SystemVerilogTarget::new(desc.circuit, config)?;

    match target.run(&desc.actions, &desc.power_args) {
        Ok(result) => {
            log::info!(
                "handle_run; compile exit: {}; run exit: {:?}",
                result.compile.returncode,
                result.run.as_ref().map(|r| r.returncode)
            );
            println!(
                "{}: {}",
                target.circuit_name(),
                "simulation passed".green().bold()
            );
            Ok(())
        }
        Err(e) => {
            if let Some(details) = e.subprocess_error() {
                let exit_code = details.exit_code.to_string();
                let stage = match &e {
                    BenchwrightError::CompilationFailed(_) => "compilation failed",
                    _ => "simulation failed",
                };
                let mut report = vec![
                    ("command", details.command.as_str()),
                    ("exit code", exit_code.as_str()),
                ];
                for reason in details.reasons.iter() {
                    report.push(("reason", reason.as_str()));
                }
                report_cli_error_and_exit(stage, Some("run"), report);
            }
            Err(e.into())
        }
    }
}
