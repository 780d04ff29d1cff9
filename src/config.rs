// SPDX-License-Identifier: Apache-2.0

//! Structured configuration for the SystemVerilog testbench target.
//!
//! Every recognized option is a field of [`TargetConfig`] with a default; the
//! record is validated once when a target is constructed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::BenchwrightError;

/// External simulators the target knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Simulator {
    Ncsim,
    Vcs,
    Iverilog,
    Vivado,
}

impl Simulator {
    pub const ALL: [Simulator; 4] = [
        Simulator::Ncsim,
        Simulator::Vcs,
        Simulator::Iverilog,
        Simulator::Vivado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Simulator::Ncsim => "ncsim",
            Simulator::Vcs => "vcs",
            Simulator::Iverilog => "iverilog",
            Simulator::Vivado => "vivado",
        }
    }

    /// Waveform file written when dumping is enabled and no name is given.
    pub fn default_waveform_file(&self) -> &'static str {
        match self {
            Simulator::Vcs => "waveforms.vpd",
            Simulator::Ncsim | Simulator::Iverilog | Simulator::Vivado => "waveforms.vcd",
        }
    }
}

impl std::fmt::Display for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Simulator {
    type Err = BenchwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Simulator::ALL
            .iter()
            .find(|sim| sim.as_str() == s)
            .copied()
            .ok_or_else(|| BenchwrightError::Configuration(format!("Unsupported simulator {}", s)))
    }
}

/// How subprocess output is shown on the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Stream stdout as it is produced; stderr after the process exits.
    Realtime,
    /// Buffer everything and only print it if an error is detected.
    #[default]
    OnError,
}

impl FromStr for DisplayMode {
    type Err = BenchwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime" => Ok(DisplayMode::Realtime),
            "on_error" => Ok(DisplayMode::OnError),
            _ => Err(BenchwrightError::Configuration(format!(
                "Invalid display mode {}; expected realtime or on_error",
                s
            ))),
        }
    }
}

const TIME_UNITS: [&str; 6] = ["s", "ms", "us", "ns", "ps", "fs"];

fn check_time_literal(text: &str) -> Result<(), BenchwrightError> {
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (magnitude, unit) = text.split_at(digits_end);
    if matches!(magnitude, "1" | "10" | "100") && TIME_UNITS.contains(&unit) {
        Ok(())
    } else {
        Err(BenchwrightError::Configuration(format!(
            "Invalid time literal `{}` in timescale",
            text
        )))
    }
}

/// Simulation time unit and precision, e.g. `1ns/1ps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timescale {
    pub unit: String,
    pub precision: String,
}

impl Default for Timescale {
    fn default() -> Self {
        Timescale {
            unit: "1ns".to_string(),
            precision: "1ns".to_string(),
        }
    }
}

impl FromStr for Timescale {
    type Err = BenchwrightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (unit, precision) = s.split_once('/').ok_or_else(|| {
            BenchwrightError::Configuration(format!("Timescale `{}` must be <unit>/<precision>", s))
        })?;
        let unit = unit.trim();
        let precision = precision.trim();
        check_time_literal(unit)?;
        check_time_literal(precision)?;
        Ok(Timescale {
            unit: unit.to_string(),
            precision: precision.to_string(),
        })
    }
}

impl TryFrom<String> for Timescale {
    type Error = BenchwrightError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timescale> for String {
    fn from(t: Timescale) -> Self {
        t.to_string()
    }
}

impl std::fmt::Display for Timescale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.unit, self.precision)
    }
}

/// All options recognized by [`crate::SystemVerilogTarget`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Required; construction fails without it.
    pub simulator: Option<Simulator>,
    /// Overrides the circuit's own name for the generated files and module.
    pub circuit_name: Option<String>,
    /// Where collateral is generated and the simulator runs.
    pub directory: PathBuf,
    pub timescale: Timescale,
    /// Time units between clock edges for `Step`.
    pub clock_step_delay: u64,
    /// Length of the ncsim run, in ns.
    pub num_cycles: u64,
    pub dump_waveforms: bool,
    pub waveform_file: Option<String>,
    pub no_warning: bool,
    /// Drive inputs through a wire assigned from a reg.
    pub use_input_wires: bool,
    /// The caller provides the model of the circuit under test; defaults to
    /// the value of `ext_test_bench`.
    pub ext_model_file: Option<bool>,
    /// Run a caller-provided testbench instead of generating one.
    pub ext_test_bench: bool,
    /// Files the simulator searches for module definitions only.
    pub ext_libs: Vec<PathBuf>,
    /// Additional sources compiled after the model file.
    pub ext_srcs: Vec<PathBuf>,
    /// Preprocessor defines; a `None` value defines the name without a value.
    pub defines: BTreeMap<String, Option<String>>,
    /// Raw arguments appended to the compile command.
    pub flags: Vec<String>,
    pub inc_dirs: Vec<PathBuf>,
    pub top_module: Option<String>,
    /// Parameter overrides for the instantiated circuit.
    pub parameters: BTreeMap<String, String>,
    /// Environment variables set for every simulator process, on top of the
    /// inherited environment.
    pub sim_env: BTreeMap<String, String>,
    pub disp_type: DisplayMode,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            simulator: None,
            circuit_name: None,
            directory: PathBuf::from("build"),
            timescale: Timescale::default(),
            clock_step_delay: 5,
            num_cycles: 10000,
            dump_waveforms: true,
            waveform_file: None,
            no_warning: false,
            use_input_wires: false,
            ext_model_file: None,
            ext_test_bench: false,
            ext_libs: vec![],
            ext_srcs: vec![],
            defines: BTreeMap::new(),
            flags: vec![],
            inc_dirs: vec![],
            top_module: None,
            parameters: BTreeMap::new(),
            sim_env: BTreeMap::new(),
            disp_type: DisplayMode::default(),
        }
    }
}

impl TargetConfig {
    pub fn for_simulator(simulator: Simulator) -> Self {
        TargetConfig {
            simulator: Some(simulator),
            ..Default::default()
        }
    }

    pub fn ext_model_file(&self) -> bool {
        self.ext_model_file.unwrap_or(self.ext_test_bench)
    }
}
