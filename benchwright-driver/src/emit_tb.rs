// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use benchwright::{SystemVerilogTarget, TargetConfig};
use clap::ArgMatches;

use crate::test_description::TestDescription;

/// Prints the generated testbench, or writes it to `--output`.
pub fn handle_emit_tb(matches: &ArgMatches, config: TargetConfig) -> anyhow::Result<()> {
    let input = matches
        .get_one::<String>("TEST_JSON")
        .ok_or_else(|| anyhow::anyhow!("missing test description path"))?;
    let desc = TestDescription::from_path(Path::new(input))?;
    let target = SystemVerilogTarget::new(desc.circuit, config)?;
    let src = target.generate_code(&desc.actions, &desc.power_args)?;

    match matches.get_one::<String>("output") {
        Some(output) => {
            benchwright::persist(Path::new(output), &src)?;
            log::info!("handle_emit_tb; wrote {}", output);
        }
        None => print!("{}", src),
    }
    Ok(())
}
