// SPDX-License-Identifier: Apache-2.0

//! Compiles sequences of testbench actions (poke a port, step a clock,
//! expect a value, file I/O, loops and branches) into SystemVerilog
//! testbenches, and drives external simulators to run them.
//!
//! ```no_run
//! use benchwright::{
//!     Action, Circuit, Direction, PowerArgs, Simulator, SystemVerilogTarget, TargetConfig,
//!     TypeNode,
//! };
//!
//! let circuit = Circuit::new("passthrough")
//!     .with_port("I", TypeNode::bit(Direction::Input))
//!     .with_port("O", TypeNode::bit(Direction::Output));
//! let target = SystemVerilogTarget::new(circuit, TargetConfig::for_simulator(Simulator::Iverilog))?;
//! target.run(
//!     &[Action::poke("I", 1), Action::Eval, Action::expect("O", 1)],
//!     &PowerArgs::default(),
//! )?;
//! # Ok::<(), benchwright::BenchwrightError>(())
//! ```

pub mod actions;
pub mod benchwright_error;
pub mod compiler;
pub mod config;
pub mod port_layout;
pub mod port_type;
pub mod spice;
pub mod subprocess_run;
pub mod sv_target;

pub use actions::{
    Action, BinaryOp, BitVector, Endianness, Expr, File, PortName, PortRef, PrintArg, Selector,
    UnaryOp, Value,
};
pub use benchwright_error::{BenchwrightError, SubprocessError};
pub use compiler::{ActionCompiler, Declarations};
pub use config::{DisplayMode, Simulator, TargetConfig, Timescale};
pub use port_layout::{PortWalker, PortWiring, PowerArgs};
pub use port_type::{Circuit, Direction, Port, TypeNode};
pub use spice::SpiceNetlist;
pub use subprocess_run::{subprocess_run, CommandSpec, CompletedProcess};
pub use sv_target::{persist, RunResult, SimCommands, SystemVerilogTarget};
