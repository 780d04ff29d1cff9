// SPDX-License-Identifier: Apache-2.0

//! Command line driver that compiles JSON test descriptions into
//! SystemVerilog testbenches and runs them under a simulator.
//!
//! Commands are given like:
//!
//! ```text
//! benchwright-driver <global-options> <command> <command-args-and-options>
//! ```
//!
//! Commands are:
//!
//! - emit-tb: Prints (or writes) the generated testbench.
//! - run: Generates the testbench and runs it with the configured simulator.
//! - version: Prints the driver version.
//!
//! Sample usage:
//!
//! ```shell
//! $ cargo run -- --toolchain=$HOME/benchwright-toolchain.toml \
//!     emit-tb tests/passthrough.json
//! $ cargo run -- run tests/passthrough.json --simulator=iverilog \
//!     --directory=build --disp_type=realtime
//! ```

mod emit_tb;
mod report_cli_error;
mod run;
mod test_description;
mod toolchain_config;

use benchwright::TargetConfig;
use clap::{Arg, ArgAction, ArgMatches};
use report_cli_error::report_cli_error_and_exit;

const TOOLCHAIN_FILE_NAME: &str = "benchwright-toolchain.toml";

trait AppExt {
    fn add_test_input_arg(self) -> Self;
    fn add_target_args(self) -> Self;
    fn add_bool_arg(self, long: &'static str, help: &'static str) -> Self;
}

impl AppExt for clap::Command {
    fn add_test_input_arg(self) -> Self {
        (self as clap::Command).arg(
            Arg::new("TEST_JSON")
                .help("JSON file describing the circuit ports and the actions to apply")
                .required(true)
                .index(1),
        )
    }

    fn add_target_args(self) -> Self {
        (self as clap::Command)
            .arg(
                Arg::new("simulator")
                    .long("simulator")
                    .value_name("SIMULATOR")
                    .help("Simulator to target: ncsim, vcs, iverilog or vivado")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("directory")
                    .long("directory")
                    .value_name("DIR")
                    .help("Directory for generated collateral and simulator runs")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("timescale")
                    .long("timescale")
                    .value_name("UNIT/PRECISION")
                    .help("Simulation timescale, e.g. 1ns/1ps")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("disp_type")
                    .long("disp_type")
                    .value_name("DISP_TYPE")
                    .help("Show simulator output as it arrives, or only on error")
                    .value_parser(["realtime", "on_error"])
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("define")
                    .long("define")
                    .value_name("NAME[=VALUE]")
                    .help("Preprocessor define passed to the simulator; may be repeated")
                    .action(ArgAction::Append),
            )
            .add_bool_arg("dump_waveforms", "Dump waveforms during simulation")
            .add_bool_arg(
                "use_input_wires",
                "Drive inputs through wires assigned from registers",
            )
    }

    fn add_bool_arg(self, long: &'static str, help: &'static str) -> Self {
        (self as clap::Command).arg(
            Arg::new(long)
                .long(long)
                .value_name("BOOL")
                .action(ArgAction::Set)
                .value_parser(["true", "false"])
                .num_args(1)
                .help(help),
        )
    }
}

/// Toolchain file from `--toolchain`, or one in the working directory.
fn base_config(matches: &ArgMatches) -> TargetConfig {
    let mut toml_path = matches
        .get_one::<String>("toolchain")
        .map(std::path::PathBuf::from);
    if toml_path.is_none() {
        let cwd_toml_path = std::path::PathBuf::from(TOOLCHAIN_FILE_NAME);
        if cwd_toml_path.exists() {
            log::info!("Using {} in current directory", TOOLCHAIN_FILE_NAME);
            toml_path = Some(cwd_toml_path);
        }
    }
    let path = match toml_path {
        Some(path) => path,
        None => return TargetConfig::default(),
    };
    if !path.exists() {
        report_cli_error_and_exit(
            "toolchain toml file does not exist",
            None,
            vec![("path", &path.display().to_string())],
        );
    }
    match toolchain_config::load_toolchain(&path) {
        Ok(config) => config,
        Err(e) => report_cli_error_and_exit(
            &format!("{:#}", e),
            None,
            vec![("path", &path.display().to_string())],
        ),
    }
}

fn dispatch(
    subcommand: &str,
    matches: &ArgMatches,
    mut config: TargetConfig,
    handler: fn(&ArgMatches, TargetConfig) -> anyhow::Result<()>,
) {
    let result = toolchain_config::apply_overrides(matches, &mut config)
        .and_then(|()| handler(matches, config));
    if let Err(e) = result {
        report_cli_error_and_exit(&format!("{:#}", e), Some(subcommand), vec![]);
    }
}

fn main() {
    let _ = env_logger::try_init();

    log::info!(
        "benchwright-driver starting; version: {}",
        env!("CARGO_PKG_VERSION")
    );

    let matches = clap::Command::new("benchwright-driver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles testbench actions into SystemVerilog and runs simulators")
        .arg(
            Arg::new("toolchain")
                .long("toolchain")
                .value_name("TOOLCHAIN")
                .help("Path to a benchwright-toolchain.toml file")
                .action(ArgAction::Set),
        )
        .subcommand(clap::Command::new("version").about("Prints the version of the driver"))
        .subcommand(
            clap::Command::new("emit-tb")
                .about("Prints the SystemVerilog testbench for a test description")
                .add_test_input_arg()
                .add_target_args()
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_name("PATH")
                        .help("Write the testbench here instead of to stdout")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            clap::Command::new("run")
                .about("Generates the testbench for a test description and simulates it")
                .add_test_input_arg()
                .add_target_args(),
        )
        .get_matches();

    if let Some(_matches) = matches.subcommand_matches("version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
    } else if let Some(sub_matches) = matches.subcommand_matches("emit-tb") {
        dispatch("emit-tb", sub_matches, base_config(&matches), emit_tb::handle_emit_tb);
    } else if let Some(sub_matches) = matches.subcommand_matches("run") {
        dispatch("run", sub_matches, base_config(&matches), run::handle_run);
    } else {
        report_cli_error_and_exit("No valid subcommand provided.", None, vec![]);
    }
}
