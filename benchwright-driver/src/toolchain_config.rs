// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use anyhow::Context;
use benchwright::{DisplayMode, Simulator, TargetConfig, Timescale};
use clap::ArgMatches;
use serde::Deserialize;

/// Contents of a `benchwright-toolchain.toml` file.
#[derive(Debug, Default, Deserialize)]
pub struct BenchwrightToolchain {
    /// Options for the testbench target; anything omitted takes its default.
    #[serde(default)]
    pub target: TargetConfig,
}

pub fn parse_toolchain(text: &str) -> anyhow::Result<TargetConfig> {
    let toolchain: BenchwrightToolchain =
        toml::from_str(text).context("parse toolchain toml")?;
    Ok(toolchain.target)
}

pub fn load_toolchain(path: &Path) -> anyhow::Result<TargetConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read toolchain toml file {}", path.display()))?;
    parse_toolchain(&text)
}

fn get_bool(matches: &ArgMatches, name: &str) -> Option<bool> {
    matches
        .get_one::<String>(name)
        .map(|value| value == "true")
}

/// Applies command line flags on top of the toolchain configuration; a flag
/// that is present wins over the file.
pub fn apply_overrides(matches: &ArgMatches, config: &mut TargetConfig) -> anyhow::Result<()> {
    if let Some(simulator) = matches.get_one::<String>("simulator") {
        config.simulator = Some(simulator.parse::<Simulator>()?);
    }
    if let Some(directory) = matches.get_one::<String>("directory") {
        config.directory = PathBuf::from(directory);
    }
    if let Some(timescale) = matches.get_one::<String>("timescale") {
        config.timescale = timescale.parse::<Timescale>()?;
    }
    if let Some(disp_type) = matches.get_one::<String>("disp_type") {
        config.disp_type = disp_type.parse::<DisplayMode>()?;
    }
    if let Some(dump_waveforms) = get_bool(matches, "dump_waveforms") {
        config.dump_waveforms = dump_waveforms;
    }
    if let Some(use_input_wires) = get_bool(matches, "use_input_wires") {
        config.use_input_wires = use_input_wires;
    }
    if let Some(defines) = matches.get_many::<String>("define") {
        for define in defines {
            match define.split_once('=') {
                Some((key, value)) => config
                    .defines
                    .insert(key.to_string(), Some(value.to_string())),
                None => config.defines.insert(define.to_string(), None),
            };
        }
    }
    log::debug!("apply_overrides; config: {:?}", config);
    Ok(())
}
