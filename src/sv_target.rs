// SPDX-License-Identifier: Apache-2.0

//! SystemVerilog testbench target: renders a testbench around the circuit
//! under test, writes the simulator collateral, and drives the simulator
//! through its compile and run stages.

use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::actions::Action;
use crate::compiler::ActionCompiler;
use crate::config::{Simulator, TargetConfig};
use crate::port_layout::{PortWalker, PowerArgs};
use crate::port_type::Circuit;
use crate::subprocess_run::{subprocess_run, CommandSpec, CompletedProcess};
use crate::BenchwrightError;

const TAB: &str = "    ";

/// Writes `text` to `path`, making sure the file's timestamps move forward
/// if it already existed.
///
/// Some simulators decide whether to recompile by comparing timestamps at
/// one-second granularity, so a rewrite inside the same second must still
/// look newer than the previous contents.
pub fn persist(path: &Path, text: &str) -> Result<(), BenchwrightError> {
    let old_times = match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Some((meta.accessed()?, meta.modified()?)),
        _ => None,
    };
    std::fs::write(path, text)?;
    log::info!("persist; wrote {}", path.display());

    if let Some((old_atime, old_mtime)) = old_times {
        let new_mtime = std::fs::metadata(path)?.modified()?;
        if new_mtime <= old_mtime {
            let one_unit = Duration::from_secs(1);
            let times = FileTimes::new()
                .set_accessed(old_atime + one_unit)
                .set_modified(old_mtime + one_unit);
            std::fs::File::options()
                .write(true)
                .open(path)?
                .set_times(times)?;
            log::info!(
                "persist; advanced timestamps of {} past the previous version",
                path.display()
            );
        }
    }
    Ok(())
}

/// The commands for one simulation. Simulators that compile and run in one
/// invocation have no separate run stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SimCommands {
    pub compile: CommandSpec,
    pub run: Option<CommandSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub compile: CompletedProcess,
    pub run: Option<CompletedProcess>,
}

pub struct SystemVerilogTarget {
    circuit: Circuit,
    config: TargetConfig,
    simulator: Simulator,
    circuit_name: String,
    waveform_file: String,
}

impl SystemVerilogTarget {
    pub fn new(circuit: Circuit, config: TargetConfig) -> Result<Self, BenchwrightError> {
        let simulator = config.simulator.ok_or_else(|| {
            BenchwrightError::Configuration(
                "Must specify a simulator when using the system-verilog target".to_string(),
            )
        })?;
        let circuit_name = config
            .circuit_name
            .clone()
            .unwrap_or_else(|| circuit.name.clone());
        let waveform_file = config
            .waveform_file
            .clone()
            .unwrap_or_else(|| simulator.default_waveform_file().to_string());
        log::debug!(
            "SystemVerilogTarget::new; circuit: {}; simulator: {}",
            circuit_name,
            simulator
        );
        Ok(SystemVerilogTarget {
            circuit,
            config,
            simulator,
            circuit_name,
            waveform_file,
        })
    }

    pub fn simulator(&self) -> Simulator {
        self.simulator
    }

    pub fn circuit_name(&self) -> &str {
        &self.circuit_name
    }

    pub fn config(&self) -> &TargetConfig {
        &self.config
    }

    /// The work directory as an absolute path; the simulator runs there.
    pub fn directory(&self) -> Result<PathBuf, BenchwrightError> {
        if self.config.directory.is_absolute() {
            Ok(self.config.directory.clone())
        } else {
            Ok(std::env::current_dir()?.join(&self.config.directory))
        }
    }

    pub fn test_bench_file(&self) -> Result<PathBuf, BenchwrightError> {
        Ok(self.directory()?.join(format!("{}_tb.sv", self.circuit_name)))
    }

    /// The circuit's own source, expected in the work directory.
    pub fn model_file(&self) -> Result<PathBuf, BenchwrightError> {
        Ok(self.directory()?.join(format!("{}.v", self.circuit_name)))
    }

    fn cmd_file_name(&self) -> String {
        format!("{}_cmd.tcl", self.circuit_name)
    }

    fn top(&self) -> Option<String> {
        match &self.config.top_module {
            Some(top) => Some(top.clone()),
            None if !self.config.ext_test_bench => Some(format!("{}_tb", self.circuit_name)),
            None => None,
        }
    }

    /// Renders the complete testbench source for `actions`.
    pub fn generate_code(
        &self,
        actions: &[Action],
        power_args: &PowerArgs,
    ) -> Result<String, BenchwrightError> {
        let walker = PortWalker::new(power_args, self.config.use_input_wires);
        let mut compiler = ActionCompiler::new(
            &self.circuit,
            self.simulator,
            self.config.clock_step_delay,
        );

        let mut port_list = vec![];
        for port in self.circuit.ports.iter() {
            for wiring in walker.layout(&port.name, &port.ty)? {
                for decl in wiring.declarations {
                    compiler.declare(decl);
                }
                port_list.push(wiring.connection);
            }
        }

        let mut initial_body = vec![];
        if self.config.dump_waveforms {
            match self.simulator {
                Simulator::Vcs => {
                    initial_body.push(format!("$vcdplusfile(\"{}\");", self.waveform_file));
                    initial_body.push("$vcdpluson();".to_string());
                    initial_body.push("$vcdplusmemon();".to_string());
                }
                Simulator::Iverilog | Simulator::Vivado => {
                    initial_body.push(format!("$dumpfile(\"{}\");", self.waveform_file));
                    initial_body.push("$dumpvars(0, dut);".to_string());
                }
                // Dumped through the TCL command file.
                Simulator::Ncsim => {}
            }
        }
        initial_body.extend(compiler.compile(actions)?);
        let declarations = compiler.into_declarations();

        let mut src = format!("module {}_tb;\n", self.circuit_name);
        for decl in declarations.iter() {
            src.push_str(&format!("{}{}\n", TAB, decl));
        }
        src.push('\n');

        if self.config.parameters.is_empty() {
            src.push_str(&format!("{}{} dut (\n", TAB, self.circuit_name));
        } else {
            let param_list: Vec<String> = self
                .config
                .parameters
                .iter()
                .map(|(name, value)| format!(".{}({})", name, value))
                .collect();
            src.push_str(&format!("{}{} #(\n", TAB, self.circuit_name));
            src.push_str(&format!(
                "{}{}\n",
                TAB.repeat(2),
                param_list.join(&format!(",\n{}", TAB.repeat(2)))
            ));
            src.push_str(&format!("{}) dut (\n", TAB));
        }
        if !port_list.is_empty() {
            src.push_str(&format!(
                "{}{}\n",
                TAB.repeat(2),
                port_list.join(&format!(",\n{}", TAB.repeat(2)))
            ));
        }
        src.push_str(&format!("{});\n\n", TAB));

        src.push_str(&format!("{}initial begin\n", TAB));
        for line in initial_body.iter() {
            src.push_str(&format!("{}{}\n", TAB.repeat(2), line));
        }
        src.push_str(&format!("{}#20 $finish;\n", TAB.repeat(2)));
        src.push_str(&format!("{}end\n\nendmodule\n", TAB));
        Ok(src)
    }

    /// Generates the testbench and writes it to the work directory.
    pub fn write_test_bench(
        &self,
        actions: &[Action],
        power_args: &PowerArgs,
    ) -> Result<PathBuf, BenchwrightError> {
        let tb_file = self.test_bench_file()?;
        let src = self.generate_code(actions, power_args)?;
        persist(&tb_file, &src)?;
        Ok(tb_file)
    }

    pub fn render_ncsim_tcl(&self) -> String {
        let mut tcl_cmds = vec![];
        if self.config.dump_waveforms {
            tcl_cmds.push(format!(
                "database -open -vcd vcddb -into {} -default -timescale ps",
                self.waveform_file
            ));
            tcl_cmds.push("probe -create -all -vcd -depth all".to_string());
        }
        tcl_cmds.push(format!("run {}ns", self.config.num_cycles));
        tcl_cmds.push("quit".to_string());
        tcl_cmds.join("\n")
    }

    pub fn render_vivado_tcl(&self, sources: &[PathBuf]) -> String {
        let mut tcl_cmds = vec!["create_project -force project project".to_string()];

        let add_files: Vec<String> = sources
            .iter()
            .chain(self.config.ext_libs.iter())
            .map(|p| p.display().to_string())
            .collect();
        if !add_files.is_empty() {
            tcl_cmds.push(format!("add_files \"{}\"", add_files.join(" ")));
        }

        if !self.config.inc_dirs.is_empty() {
            let inc_dirs: Vec<String> = self
                .config
                .inc_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect();
            tcl_cmds.push(format!(
                "set_property include_dirs \"{}\" [get_fileset sim_1]",
                inc_dirs.join(" ")
            ));
        }

        let defines = self.def_args("");
        if !defines.is_empty() {
            tcl_cmds.push(format!(
                "set_property -name \"verilog_define\" -value {{{}}} -objects [get_fileset sim_1]",
                defines.join(" ")
            ));
        }

        match self.top() {
            Some(top) => tcl_cmds.push(format!(
                "set_property -name top -value {} -objects [get_fileset sim_1]",
                top
            )),
            None => tcl_cmds.push("update_compile_order -fileset sim_1".to_string()),
        }
        tcl_cmds.push(
            "set_property -name \"xsim.simulate.runtime\" -value \"-all\" -objects [get_fileset sim_1]"
                .to_string(),
        );
        tcl_cmds.push("launch_simulation".to_string());
        tcl_cmds.join("\n")
    }

    fn def_args(&self, prefix: &str) -> Vec<String> {
        self.config
            .defines
            .iter()
            .map(|(key, val)| match val {
                Some(val) => format!("{}{}={}", prefix, key, val),
                None => format!("{}{}", prefix, key),
            })
            .collect()
    }

    fn source_args(sources: &[PathBuf]) -> impl Iterator<Item = String> + '_ {
        sources.iter().map(|s| s.display().to_string())
    }

    pub fn ncsim_cmd(&self, sources: &[PathBuf]) -> Vec<String> {
        let mut cmd = vec!["irun".to_string()];
        if let Some(top) = self.top() {
            cmd.extend(["-top".to_string(), top]);
        }
        cmd.extend(["-timescale".to_string(), self.config.timescale.to_string()]);
        cmd.extend(["-input".to_string(), self.cmd_file_name()]);
        cmd.extend(Self::source_args(sources));
        for lib in self.config.ext_libs.iter() {
            cmd.extend(["-v".to_string(), lib.display().to_string()]);
        }
        for dir in self.config.inc_dirs.iter() {
            cmd.extend(["-incdir".to_string(), dir.display().to_string()]);
        }
        cmd.extend(self.def_args("+define+"));
        cmd.extend(["-access".to_string(), "+rwc".to_string()]);
        cmd.push("-notimingchecks".to_string());
        if self.config.no_warning {
            cmd.push("-neverwarn".to_string());
        }
        cmd
    }

    pub fn vivado_cmd(&self) -> Vec<String> {
        vec![
            "vivado".to_string(),
            "-mode".to_string(),
            "batch".to_string(),
            "-source".to_string(),
            self.cmd_file_name(),
            "-nolog".to_string(),
            "-nojournal".to_string(),
        ]
    }

    /// Returns the compile command and the binary it produces.
    pub fn vcs_cmd(&self, sources: &[PathBuf]) -> (Vec<String>, String) {
        let mut cmd = vec![
            "vcs".to_string(),
            format!("-timescale={}", self.config.timescale),
        ];
        cmd.extend(Self::source_args(sources));
        for lib in self.config.ext_libs.iter() {
            cmd.extend(["-v".to_string(), lib.display().to_string()]);
        }
        for dir in self.config.inc_dirs.iter() {
            cmd.push(format!("+incdir+{}", dir.display()));
        }
        cmd.extend(self.def_args("+define+"));
        for arg in ["-sverilog", "-full64", "+v2k", "-LDFLAGS", "-Wl,--no-as-needed"] {
            cmd.push(arg.to_string());
        }
        if self.config.dump_waveforms {
            cmd.extend(["+vcs+vcdpluson".to_string(), "-debug_pp".to_string()]);
        }
        (cmd, "./simv".to_string())
    }

    /// Returns the compile command and the binary it produces.
    pub fn iverilog_cmd(&self, sources: &[PathBuf]) -> (Vec<String>, String) {
        let bin_file = format!("{}_tb", self.circuit_name);
        let mut cmd = vec!["iverilog".to_string(), format!("-o{}", bin_file)];

        if !self.config.ext_libs.is_empty() {
            cmd.extend(["-Y.v".to_string(), "-Y.sv".to_string()]);
        }
        let mut lib_dirs: Vec<PathBuf> = vec![];
        for lib in self.config.ext_libs.iter() {
            let parent = match lib.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            if !lib_dirs.contains(&parent) {
                lib_dirs.push(parent);
            }
        }
        cmd.extend(lib_dirs.iter().map(|d| format!("-y{}", d.display())));

        for dir in self.config.inc_dirs.iter() {
            cmd.push(format!("-I{}", dir.display()));
        }
        cmd.extend(self.def_args("-D"));
        cmd.push("-g2012".to_string());
        cmd.extend(Self::source_args(sources));
        (cmd, bin_file)
    }

    fn command_spec(&self, args: &[String], err_strs: &[&str]) -> Result<CommandSpec, BenchwrightError> {
        Ok(CommandSpec::new(args)
            .cwd(self.directory()?)
            .env(&self.config.sim_env)
            .disp_type(self.config.disp_type)
            .err_strs(err_strs))
    }

    /// Builds the simulator invocations for `sources`. Extra flags go to the
    /// compile stage only.
    pub fn build_commands(&self, sources: &[PathBuf]) -> Result<SimCommands, BenchwrightError> {
        let (mut compile_args, compile_err_strs, run) = match self.simulator {
            Simulator::Ncsim => (self.ncsim_cmd(sources), vec![], None),
            Simulator::Vivado => (
                self.vivado_cmd(),
                vec!["CRITICAL WARNING", "ERROR", "Fatal", "Error"],
                None,
            ),
            Simulator::Vcs => {
                let (cmd, bin_file) = self.vcs_cmd(sources);
                (cmd, vec![], Some((vec![bin_file], vec!["Error"])))
            }
            Simulator::Iverilog => {
                let (cmd, bin_file) = self.iverilog_cmd(sources);
                (
                    cmd,
                    vec!["syntax error", "I give up."],
                    Some((
                        vec!["vvp".to_string(), "-N".to_string(), bin_file],
                        vec!["ERROR"],
                    )),
                )
            }
        };
        compile_args.extend(self.config.flags.iter().cloned());

        let compile = self.command_spec(&compile_args, &compile_err_strs)?;
        let run = match run {
            Some((args, err_strs)) => Some(self.command_spec(&args, &err_strs)?),
            None => None,
        };
        Ok(SimCommands { compile, run })
    }

    /// Runs the compile stage and then, if it passed, the run stage.
    pub fn sequence_run(&self, commands: &SimCommands) -> Result<RunResult, BenchwrightError> {
        let single_stage = commands.run.is_none();
        log::info!(
            "sequence_run; simulator: {}; stages: {}",
            self.simulator,
            if single_stage { 1 } else { 2 }
        );
        let compile = subprocess_run(&commands.compile).map_err(|e| match e {
            BenchwrightError::Subprocess(details) if single_stage => {
                BenchwrightError::SimulationFailed(details)
            }
            BenchwrightError::Subprocess(details) => BenchwrightError::CompilationFailed(details),
            other => other,
        })?;
        let run = match &commands.run {
            Some(spec) => Some(subprocess_run(spec).map_err(|e| match e {
                BenchwrightError::Subprocess(details) => {
                    BenchwrightError::SimulationFailed(details)
                }
                other => other,
            })?),
            None => None,
        };
        Ok(RunResult { compile, run })
    }

    /// Source files handed to the simulator, in compile order. Writes the
    /// generated testbench unless an external one is used.
    pub fn prepare_sources(
        &self,
        actions: &[Action],
        power_args: &PowerArgs,
    ) -> Result<Vec<PathBuf>, BenchwrightError> {
        let mut sources = vec![];
        if !self.config.ext_test_bench {
            sources.push(self.write_test_bench(actions, power_args)?);
        }
        if !self.config.ext_model_file() {
            sources.push(self.model_file()?);
        }
        sources.extend(self.config.ext_srcs.iter().cloned());
        Ok(sources)
    }

    /// Generates all collateral for `actions` and runs the simulator.
    pub fn run(
        &self,
        actions: &[Action],
        power_args: &PowerArgs,
    ) -> Result<RunResult, BenchwrightError> {
        let directory = self.directory()?;
        std::fs::create_dir_all(&directory)?;

        let sources = self.prepare_sources(actions, power_args)?;
        let cmd_file = directory.join(self.cmd_file_name());
        match self.simulator {
            Simulator::Ncsim => persist(&cmd_file, &self.render_ncsim_tcl())?,
            Simulator::Vivado => persist(&cmd_file, &self.render_vivado_tcl(&sources))?,
            Simulator::Vcs | Simulator::Iverilog => {}
        }

        let commands = self.build_commands(&sources)?;
        self.sequence_run(&commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port_type::{Direction, TypeNode};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::time::{SystemTime, UNIX_EPOCH};
    use test_case::test_case;

    fn passthrough() -> Circuit {
        Circuit::new("passthrough")
            .with_port("I", TypeNode::bit(Direction::Input))
            .with_port("O", TypeNode::bit(Direction::Output))
    }

    fn target(simulator: Simulator, edit: impl FnOnce(&mut TargetConfig)) -> SystemVerilogTarget {
        let mut config = TargetConfig::for_simulator(simulator);
        config.directory = PathBuf::from("/work");
        edit(&mut config);
        SystemVerilogTarget::new(passthrough(), config).unwrap()
    }

    fn strs(args: &[String]) -> Vec<&str> {
        args.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_missing_simulator_is_configuration_error() {
        let result = SystemVerilogTarget::new(passthrough(), TargetConfig::default());
        assert!(matches!(result, Err(BenchwrightError::Configuration(_))));
    }

    #[test]
    fn test_generate_code_passthrough() {
        let target = target(Simulator::Iverilog, |c| c.dump_waveforms = false);
        let src = target
            .generate_code(
                &[Action::poke("I", 0), Action::Eval, Action::expect("O", 0)],
                &PowerArgs::default(),
            )
            .unwrap();
        let want = "\
module passthrough_tb;
    reg I;
    wire O;

    passthrough dut (
        .I(I),
        .O(O)
    );

    initial begin
        I = 0;
        #1;
        if (!(O == 0)) begin
            $error(\"Failed on action=2 checking port O.  Expected %x, got %x.\",0,O);
        end
        #20 $finish;
    end

endmodule
";
        assert_eq!(src, want);
    }

    #[test]
    fn test_generate_code_parameters_and_waveforms() {
        let target = target(Simulator::Vcs, |c| {
            c.parameters.insert("DEPTH".to_string(), "4".to_string());
            c.parameters.insert("WIDTH".to_string(), "8".to_string());
        });
        let src = target.generate_code(&[], &PowerArgs::default()).unwrap();
        assert!(src.contains(
            "    passthrough #(\n        .DEPTH(4),\n        .WIDTH(8)\n    ) dut (\n"
        ));
        assert!(src.contains(
            "        $vcdplusfile(\"waveforms.vpd\");\n        $vcdpluson();\n        $vcdplusmemon();\n"
        ));
    }

    #[test_case(Simulator::Iverilog, true; "iverilog dumps vcd")]
    #[test_case(Simulator::Vivado, true; "vivado dumps vcd")]
    #[test_case(Simulator::Ncsim, false; "ncsim dumps through tcl")]
    fn test_dumpvars(simulator: Simulator, in_body: bool) {
        let target = target(simulator, |_| {});
        let src = target.generate_code(&[], &PowerArgs::default()).unwrap();
        assert_eq!(src.contains("$dumpfile(\"waveforms.vcd\");"), in_body);
        assert_eq!(src.contains("$dumpvars(0, dut);"), in_body);
    }

    #[test]
    fn test_loop_declaration_precedes_body() {
        let circuit = Circuit::new("counter").with_port("X", TypeNode::bits(8, Direction::Input));
        let mut config = TargetConfig::for_simulator(Simulator::Iverilog);
        config.dump_waveforms = false;
        let target = SystemVerilogTarget::new(circuit, config).unwrap();
        let body = vec![Action::poke("X", crate::actions::Value::var("counter"))];
        let src = target
            .generate_code(
                &[Action::repeat("counter", 3, body.clone()), Action::repeat("counter", 3, body)],
                &PowerArgs::default(),
            )
            .unwrap();
        assert_eq!(src.matches("integer counter;").count(), 1);
        assert!(src.starts_with("module counter_tb;\n    reg [7:0] X;\n    integer counter;\n"));
        assert!(src.contains("            X = counter;\n"));
    }

    #[test]
    fn test_iverilog_commands() {
        let target = target(Simulator::Iverilog, |c| {
            c.ext_libs = vec![PathBuf::from("/lib/a.v"), PathBuf::from("/lib/b.v"), PathBuf::from("/other/c.sv")];
            c.inc_dirs = vec![PathBuf::from("/inc")];
            c.defines.insert("FOO".to_string(), None);
            c.defines.insert("BAR".to_string(), Some("2".to_string()));
            c.flags = vec!["-Wall".to_string()];
        });
        let sources = vec![PathBuf::from("/work/passthrough_tb.sv"), PathBuf::from("/work/passthrough.v")];
        let commands = target.build_commands(&sources).unwrap();
        assert_eq!(
            strs(&commands.compile.args),
            vec![
                "iverilog",
                "-opassthrough_tb",
                "-Y.v",
                "-Y.sv",
                "-y/lib",
                "-y/other",
                "-I/inc",
                "-DBAR=2",
                "-DFOO",
                "-g2012",
                "/work/passthrough_tb.sv",
                "/work/passthrough.v",
                "-Wall",
            ]
        );
        assert_eq!(commands.compile.err_strs, vec!["syntax error", "I give up."]);
        assert_eq!(commands.compile.cwd, Some(PathBuf::from("/work")));
        let run = commands.run.unwrap();
        assert_eq!(strs(&run.args), vec!["vvp", "-N", "passthrough_tb"]);
        assert_eq!(run.err_strs, vec!["ERROR"]);
    }

    #[test]
    fn test_vcs_commands() {
        let target = target(Simulator::Vcs, |c| {
            c.inc_dirs = vec![PathBuf::from("/inc")];
            c.ext_libs = vec![PathBuf::from("/lib/a.v")];
            c.defines.insert("FOO".to_string(), Some("1".to_string()));
        });
        let commands = target
            .build_commands(&[PathBuf::from("/work/passthrough_tb.sv")])
            .unwrap();
        assert_eq!(
            strs(&commands.compile.args),
            vec![
                "vcs",
                "-timescale=1ns/1ns",
                "/work/passthrough_tb.sv",
                "-v",
                "/lib/a.v",
                "+incdir+/inc",
                "+define+FOO=1",
                "-sverilog",
                "-full64",
                "+v2k",
                "-LDFLAGS",
                "-Wl,--no-as-needed",
                "+vcs+vcdpluson",
                "-debug_pp",
            ]
        );
        assert!(commands.compile.err_strs.is_empty());
        let run = commands.run.unwrap();
        assert_eq!(strs(&run.args), vec!["./simv"]);
        assert_eq!(run.err_strs, vec!["Error"]);
    }

    #[test]
    fn test_ncsim_command_and_tcl() {
        let target = target(Simulator::Ncsim, |c| {
            c.no_warning = true;
            c.num_cycles = 500;
            c.timescale = "1ns/1ps".parse().unwrap();
        });
        let commands = target
            .build_commands(&[PathBuf::from("/work/passthrough_tb.sv")])
            .unwrap();
        assert_eq!(
            strs(&commands.compile.args),
            vec![
                "irun",
                "-top",
                "passthrough_tb",
                "-timescale",
                "1ns/1ps",
                "-input",
                "passthrough_cmd.tcl",
                "/work/passthrough_tb.sv",
                "-access",
                "+rwc",
                "-notimingchecks",
                "-neverwarn",
            ]
        );
        assert!(commands.run.is_none());
        assert_eq!(
            target.render_ncsim_tcl(),
            "database -open -vcd vcddb -into waveforms.vcd -default -timescale ps\n\
             probe -create -all -vcd -depth all\n\
             run 500ns\n\
             quit"
        );
    }

    #[test]
    fn test_vivado_command_and_tcl() {
        let target = target(Simulator::Vivado, |c| {
            c.ext_test_bench = true;
            c.inc_dirs = vec![PathBuf::from("/inc")];
            c.defines.insert("A".to_string(), None);
            c.defines.insert("B".to_string(), Some("3".to_string()));
        });
        let commands = target.build_commands(&[]).unwrap();
        assert_eq!(
            strs(&commands.compile.args),
            vec!["vivado", "-mode", "batch", "-source", "passthrough_cmd.tcl", "-nolog", "-nojournal"]
        );
        assert_eq!(
            commands.compile.err_strs,
            vec!["CRITICAL WARNING", "ERROR", "Fatal", "Error"]
        );
        let tcl = target.render_vivado_tcl(&[PathBuf::from("/src/top_tb.sv")]);
        assert_eq!(
            tcl.lines().collect::<Vec<_>>(),
            vec![
                "create_project -force project project",
                "add_files \"/src/top_tb.sv\"",
                "set_property include_dirs \"/inc\" [get_fileset sim_1]",
                "set_property -name \"verilog_define\" -value {A B=3} -objects [get_fileset sim_1]",
                "update_compile_order -fileset sim_1",
                "set_property -name \"xsim.simulate.runtime\" -value \"-all\" -objects [get_fileset sim_1]",
                "launch_simulation",
            ]
        );
    }

    #[test]
    fn test_top_module_override() {
        let target = target(Simulator::Vivado, |c| c.top_module = Some("my_top".to_string()));
        assert!(target
            .render_vivado_tcl(&[])
            .contains("set_property -name top -value my_top -objects [get_fileset sim_1]"));
    }

    #[test]
    fn test_prepare_sources_order() {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let mut config = TargetConfig::for_simulator(Simulator::Iverilog);
        config.directory = dir.path().to_path_buf();
        config.ext_srcs = vec![PathBuf::from("extra.sv")];
        let target = SystemVerilogTarget::new(passthrough(), config).unwrap();
        let sources = target
            .prepare_sources(&[Action::poke("I", 1)], &PowerArgs::default())
            .unwrap();
        assert_eq!(
            sources,
            vec![
                dir.path().join("passthrough_tb.sv"),
                dir.path().join("passthrough.v"),
                PathBuf::from("extra.sv"),
            ]
        );
        let written = std::fs::read_to_string(&sources[0]).unwrap();
        assert!(written.contains("        I = 1;\n"));
    }

    #[test]
    fn test_prepare_sources_external_test_bench() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TargetConfig::for_simulator(Simulator::Iverilog);
        config.directory = dir.path().to_path_buf();
        config.ext_test_bench = true;
        config.ext_srcs = vec![PathBuf::from("my_tb.sv")];
        let target = SystemVerilogTarget::new(passthrough(), config).unwrap();
        let sources = target.prepare_sources(&[], &PowerArgs::default()).unwrap();
        assert_eq!(sources, vec![PathBuf::from("my_tb.sv")]);
        assert!(!dir.path().join("passthrough_tb.sv").exists());
    }

    #[test]
    fn test_persist_advances_stale_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tb.sv");
        persist(&path, "first").unwrap();

        // Pretend the previous version was written in the future, as a coarse
        // clock would make it look.
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let future = UNIX_EPOCH + Duration::from_secs(now_secs + 1000);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_times(FileTimes::new().set_accessed(future).set_modified(future))
            .unwrap();

        persist(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(modified >= future + Duration::from_secs(1));
    }

    #[test]
    fn test_persist_twice_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tb.sv");
        persist(&path, "same").unwrap();
        let first = std::fs::metadata(&path).unwrap().modified().unwrap();
        persist(&path, "same").unwrap();
        let second = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_sim_env_reaches_commands() {
        let mut env = BTreeMap::new();
        env.insert("LM_LICENSE_FILE".to_string(), "1234@license".to_string());
        let target = target(Simulator::Vcs, |c| c.sim_env = env.clone());
        let commands = target.build_commands(&[]).unwrap();
        assert_eq!(commands.compile.env, env);
        assert_eq!(commands.run.unwrap().env, env);
    }
}
