// SPDX-License-Identifier: Apache-2.0

//! The closed set of testbench operations consumed by the action compiler,
//! together with the port references and value expressions they carry.
//!
//! Actions are plain data: they are built by a test-authoring layer and are
//! never mutated by compilation. The order of a `Vec<Action>` is the
//! execution order of the generated program.

use serde::{Deserialize, Serialize};

use crate::BenchwrightError;

/// One step into a composite port: an array element or a tuple field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Index(usize),
    Field(String),
}

/// A top-level port, optionally narrowed to one element of a composite type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortName {
    pub root: String,
    #[serde(default)]
    pub selectors: Vec<Selector>,
}

impl PortName {
    pub fn new(root: &str) -> Self {
        PortName {
            root: root.to_string(),
            selectors: vec![],
        }
    }

    pub fn index(mut self, i: usize) -> Self {
        self.selectors.push(Selector::Index(i));
        self
    }

    pub fn field(mut self, name: &str) -> Self {
        self.selectors.push(Selector::Field(name.to_string()));
        self
    }

    /// Flattened identifier of the testbench signal, e.g. `I_0_a` for
    /// `I[0].a`; matches the leaf names produced by the port walker.
    pub fn verilog_name(&self) -> String {
        let mut name = self.root.clone();
        for selector in self.selectors.iter() {
            name.push('_');
            match selector {
                Selector::Index(i) => name.push_str(&i.to_string()),
                Selector::Field(f) => name.push_str(f),
            }
        }
        name
    }
}

/// Identifies a signal the generated testbench reads or writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortRef {
    /// A port of the circuit under test, driven/observed through the
    /// testbench signal of the same (flattened) name.
    Top(PortName),
    /// A path through the instance hierarchy, starting at the circuit under
    /// test: `[top, inst, ..., port]`.
    Select(Vec<String>),
    /// A dotted path to a signal internal to the circuit under test.
    Internal(String),
}

impl PortRef {
    pub fn top(name: &str) -> Self {
        PortRef::Top(PortName::new(name))
    }

    pub fn select(path: &[&str]) -> Self {
        PortRef::Select(path.iter().map(|s| s.to_string()).collect())
    }

    pub fn internal(path: &str) -> Self {
        PortRef::Internal(path.to_string())
    }

    /// Name of the signal as referenced from inside the testbench module.
    ///
    /// Top-level ports (including select paths of depth two or less) refer to
    /// the testbench's own signal; deeper paths reach into the instantiated
    /// circuit through `dut.`.
    pub fn resolved_path(&self) -> String {
        match self {
            PortRef::Top(name) => name.verilog_name(),
            PortRef::Select(path) if path.len() > 2 => format!("dut.{}", path[1..].join(".")),
            PortRef::Select(path) => path.last().cloned().unwrap_or_default(),
            PortRef::Internal(path) => format!("dut.{}", path),
        }
    }

    /// Short name used in assertion messages.
    pub fn debug_name(&self) -> String {
        match self {
            PortRef::Top(name) => name.verilog_name(),
            PortRef::Select(path) => path.last().cloned().unwrap_or_default(),
            PortRef::Internal(_) => self.resolved_path(),
        }
    }

    /// The top-level port this reference names, when it names one.
    pub fn top_level_name(&self) -> Option<PortName> {
        match self {
            PortRef::Top(name) => Some(name.clone()),
            PortRef::Select(path) if path.len() <= 2 => path.last().map(|s| PortName::new(s)),
            _ => None,
        }
    }
}

impl PartialEq for PortRef {
    fn eq(&self, other: &Self) -> bool {
        self.resolved_path() == other.resolved_path()
    }
}

impl Eq for PortRef {}

impl From<&str> for PortRef {
    fn from(name: &str) -> Self {
        PortRef::top(name)
    }
}

impl From<PortName> for PortRef {
    fn from(name: PortName) -> Self {
        PortRef::Top(name)
    }
}

fn width_mask(width: usize) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// A fixed-width unsigned literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVector {
    pub width: usize,
    pub value: u128,
}

impl BitVector {
    pub const MAX_WIDTH: usize = 128;

    pub fn new(width: usize, value: u128) -> Result<Self, BenchwrightError> {
        if width == 0 || width > Self::MAX_WIDTH {
            return Err(BenchwrightError::Configuration(format!(
                "bit-vector width must be in 1..={}; got {}",
                Self::MAX_WIDTH,
                width
            )));
        }
        if value & !width_mask(width) != 0 {
            return Err(BenchwrightError::Configuration(format!(
                "value {} does not fit in {} bits",
                value, width
            )));
        }
        Ok(BitVector { width, value })
    }

    /// Two's-complement encoding of `value` at `width` bits.
    pub fn from_signed(width: usize, value: i128) -> Result<Self, BenchwrightError> {
        if width == 0 || width > Self::MAX_WIDTH {
            return Err(BenchwrightError::Configuration(format!(
                "bit-vector width must be in 1..={}; got {}",
                Self::MAX_WIDTH,
                width
            )));
        }
        if width < Self::MAX_WIDTH {
            let min = -(1i128 << (width - 1));
            let max = (1i128 << (width - 1)) - 1;
            if value < min || value > max {
                return Err(BenchwrightError::Configuration(format!(
                    "value {} is out of range for a signed {}-bit port",
                    value, width
                )));
            }
        }
        Ok(BitVector {
            width,
            value: (value as u128) & width_mask(width),
        })
    }

    pub fn as_uint(&self) -> u128 {
        self.value
    }

    /// Sized decimal literal, e.g. `4'd11`.
    pub fn to_sv_literal(&self) -> String {
        format!("{}'d{}", self.width, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// A file opened by the generated program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    /// `"r"` or `"w"`; other modes are rejected at compile time.
    pub mode: String,
    /// Bytes transferred per read/write action.
    #[serde(default = "File::default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub endianness: Endianness,
}

impl File {
    fn default_chunk_size() -> usize {
        1
    }

    pub fn new(name: &str, mode: &str, chunk_size: usize, endianness: Endianness) -> Self {
        File {
            name: name.to_string(),
            mode: mode.to_string(),
            chunk_size,
            endianness,
        }
    }

    /// File name stem, used to derive the handle and buffer identifiers.
    pub fn name_without_ext(&self) -> String {
        std::path::Path::new(&self.name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinaryOp {
    pub fn op_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Invert,
    Neg,
}

impl UnaryOp {
    pub fn op_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Invert => "~",
            UnaryOp::Neg => "-",
        }
    }
}

/// Operator tree over values, used for conditions and computed pokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Value(Value),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs.into()),
            rhs: Box::new(rhs.into()),
        }
    }

    pub fn unary(op: UnaryOp, operand: impl Into<Expr>) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand.into()),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Value(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Int(i128),
    Bits(BitVector),
    Real(f64),
    /// All bits unknown (`'X`).
    Unknown,
    /// High impedance (`'Z`).
    HiZ,
    /// Matches anything; an expectation against it checks nothing.
    Any,
    /// The live value of another signal.
    Peek(PortRef),
    /// A signal inside the circuit under test, always reached through `dut.`.
    Port(PortRef),
    /// The buffer filled by the most recent read of the given file.
    FileRead(File),
    /// A loop or program variable.
    Var(String),
    Expr(Box<Expr>),
}

impl Value {
    pub fn peek(port: impl Into<PortRef>) -> Self {
        Value::Peek(port.into())
    }

    pub fn var(name: &str) -> Self {
        Value::Var(name.to_string())
    }

    pub fn expr(expr: Expr) -> Self {
        Value::Expr(Box::new(expr))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Value::Any)
    }
}

macro_rules! impl_value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i128)
                }
            }
        )*
    };
}

impl_value_from_int!(i32, i64, i128, u8, u32, u64);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<BitVector> for Value {
    fn from(v: BitVector) -> Self {
        Value::Bits(v)
    }
}

/// An argument to a formatted print.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintArg {
    /// Rendered as a literal.
    Literal(Value),
    /// Rendered as the signal name.
    Port(PortRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Poke {
        port: PortRef,
        value: Value,
        /// Seconds to wait after the assignment.
        #[serde(default)]
        delay: Option<f64>,
    },
    Expect {
        port: PortRef,
        value: Value,
        /// Exact comparison including unknown and high-impedance bits.
        #[serde(default)]
        strict: bool,
        #[serde(default)]
        above: Option<f64>,
        #[serde(default)]
        below: Option<f64>,
        /// Where the expectation was authored, echoed in the failure message.
        #[serde(default)]
        traceback: Option<String>,
    },
    Eval,
    Step {
        clock: PortRef,
        steps: usize,
    },
    Delay {
        /// Seconds.
        time: f64,
    },
    Print {
        format: String,
        #[serde(default)]
        args: Vec<PrintArg>,
    },
    Peek(PortRef),
    FileOpen(File),
    FileRead(File),
    FileWrite {
        file: File,
        value: PortRef,
    },
    FileClose(File),
    FileScanFormat {
        file: File,
        format: String,
        args: Vec<String>,
    },
    Loop {
        loop_var: String,
        n_iter: usize,
        actions: Vec<Action>,
    },
    While {
        cond: Expr,
        actions: Vec<Action>,
    },
    If {
        cond: Expr,
        actions: Vec<Action>,
        #[serde(default)]
        else_actions: Vec<Action>,
    },
    Var {
        name: String,
        width: usize,
    },
}

impl Action {
    pub fn poke(port: impl Into<PortRef>, value: impl Into<Value>) -> Self {
        Action::Poke {
            port: port.into(),
            value: value.into(),
            delay: None,
        }
    }

    pub fn expect(port: impl Into<PortRef>, value: impl Into<Value>) -> Self {
        Action::Expect {
            port: port.into(),
            value: value.into(),
            strict: false,
            above: None,
            below: None,
            traceback: None,
        }
    }

    pub fn expect_strict(port: impl Into<PortRef>, value: impl Into<Value>) -> Self {
        Action::Expect {
            port: port.into(),
            value: value.into(),
            strict: true,
            above: None,
            below: None,
            traceback: None,
        }
    }

    pub fn step(clock: impl Into<PortRef>, steps: usize) -> Self {
        Action::Step {
            clock: clock.into(),
            steps,
        }
    }

    pub fn print(format: &str, args: Vec<PrintArg>) -> Self {
        Action::Print {
            format: format.to_string(),
            args,
        }
    }

    pub fn repeat(loop_var: &str, n_iter: usize, actions: Vec<Action>) -> Self {
        Action::Loop {
            loop_var: loop_var.to_string(),
            n_iter,
            actions,
        }
    }
}
