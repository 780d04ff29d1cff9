// SPDX-License-Identifier: Apache-2.0

//! Translates actions into SystemVerilog statements for the body of a
//! testbench `initial` block.
//!
//! Compilation also accumulates the declarations those statements rely on
//! (loop counters, file handles, read buffers, program variables). The
//! declaration set is owned by the compiler for one pass and handed back to
//! the caller to be rendered ahead of the body.

use std::collections::HashSet;

use crate::actions::{
    Action, BitVector, Endianness, Expr, File, PortRef, PrintArg, Value,
};
use crate::config::Simulator;
use crate::port_layout::input_wire;
use crate::port_type::{Circuit, Direction, TypeNode};
use crate::BenchwrightError;

const INDENT: &str = "    ";

/// Declarations in discovery order, deduplicated by exact text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    lines: Vec<String>,
    defined: HashSet<String>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `decl` unless an identical declaration is already present;
    /// returns whether it was added.
    pub fn add(&mut self, decl: impl Into<String>) -> bool {
        let decl = decl.into();
        if self.defined.insert(decl.clone()) {
            self.lines.push(decl);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, decl: &str) -> bool {
        self.defined.contains(decl)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Makes a string safe to place between double quotes in generated source.
fn sv_string_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}

fn indent_lines(lines: Vec<String>) -> impl Iterator<Item = String> {
    lines.into_iter().map(|line| format!("{}{}", INDENT, line))
}

fn dut_path(port: &PortRef) -> String {
    match port {
        PortRef::Top(name) => format!("dut.{}", name.verilog_name()),
        PortRef::Select(path) => {
            format!("dut.{}", path.iter().skip(1).cloned().collect::<Vec<_>>().join("."))
        }
        PortRef::Internal(path) => format!("dut.{}", path),
    }
}

fn byte_loop_expr(file: &File) -> String {
    match file.endianness {
        Endianness::Big => format!("__i = {}; __i >= 0; __i--", file.chunk_size - 1),
        Endianness::Little => format!("__i = 0; __i < {}; __i++", file.chunk_size),
    }
}

pub struct ActionCompiler<'a> {
    circuit: &'a Circuit,
    simulator: Simulator,
    clock_step_delay: u64,
    declarations: Declarations,
}

impl<'a> ActionCompiler<'a> {
    pub fn new(circuit: &'a Circuit, simulator: Simulator, clock_step_delay: u64) -> Self {
        ActionCompiler {
            circuit,
            simulator,
            clock_step_delay,
            declarations: Declarations::new(),
        }
    }

    /// Adds a declaration ahead of compilation, e.g. for port signals.
    pub fn declare(&mut self, decl: impl Into<String>) -> bool {
        self.declarations.add(decl)
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn into_declarations(self) -> Declarations {
        self.declarations
    }

    /// Compiles a top-level action sequence; each action's index is used in
    /// the failure messages of the assertions it generates.
    pub fn compile(&mut self, actions: &[Action]) -> Result<Vec<String>, BenchwrightError> {
        let mut lines = vec![];
        for (i, action) in actions.iter().enumerate() {
            lines.extend(self.generate_action_code(i, action)?);
        }
        log::debug!(
            "ActionCompiler::compile; simulator: {}; actions: {}; lines: {}; declarations: {}",
            self.simulator,
            actions.len(),
            lines.len(),
            self.declarations.len()
        );
        Ok(lines)
    }

    pub fn generate_action_code(
        &mut self,
        i: usize,
        action: &Action,
    ) -> Result<Vec<String>, BenchwrightError> {
        match action {
            Action::Poke { port, value, delay } => self.make_poke(port, value, *delay),
            Action::Expect {
                port,
                value,
                strict,
                above,
                below,
                traceback,
            } => self.make_expect(
                i,
                port,
                value,
                *strict,
                *above,
                *below,
                traceback.as_deref(),
            ),
            Action::Eval => Ok(self.make_eval()),
            Action::Step { clock, steps } => Ok(self.make_step(clock, *steps)),
            Action::Delay { time } => Ok(vec![format!("#({}*1s);", time)]),
            Action::Print { format, args } => self.make_print(format, args),
            // A peek only has meaning as a value inside another action.
            Action::Peek(_) => Ok(vec![]),
            Action::FileOpen(file) => self.make_file_open(file),
            Action::FileRead(file) => Ok(self.make_file_read(file)),
            Action::FileWrite { file, value } => Ok(self.make_file_write(file, value)),
            Action::FileClose(file) => Ok(vec![format!(
                "$fclose({}_file);",
                file.name_without_ext()
            )]),
            Action::FileScanFormat { file, format, args } => Ok(vec![format!(
                "$fscanf({}_file, \"{}\", {});",
                file.name_without_ext(),
                sv_string_escape(format),
                args.join(", ")
            )]),
            Action::Loop {
                loop_var,
                n_iter,
                actions,
            } => self.make_loop(i, loop_var, *n_iter, actions),
            Action::While { cond, actions } => self.make_while(i, cond, actions),
            Action::If {
                cond,
                actions,
                else_actions,
            } => self.make_if(i, cond, actions, else_actions),
            Action::Var { name, width } => self.make_var(name, *width),
        }
    }

    fn compile_nested(
        &mut self,
        i: usize,
        actions: &[Action],
    ) -> Result<Vec<String>, BenchwrightError> {
        let mut lines = vec![];
        for action in actions.iter() {
            lines.extend(indent_lines(self.generate_action_code(i, action)?));
        }
        Ok(lines)
    }

    fn port_type(&self, port: &PortRef) -> Option<&'a TypeNode> {
        let circuit: &'a Circuit = self.circuit;
        port.top_level_name()
            .and_then(|name| circuit.port_type(&name))
    }

    fn make_name(&self, port: &PortRef) -> String {
        port.resolved_path()
    }

    /// Renders a value as a SystemVerilog expression. When `port` is given,
    /// literals are checked against (and integers encoded for) its type.
    pub fn process_value(
        &self,
        port: Option<&PortRef>,
        value: &Value,
    ) -> Result<String, BenchwrightError> {
        match value {
            Value::Bits(bv) => self.process_bits(port, bv),
            Value::Int(v) => self.process_int(port, *v),
            Value::Real(r) => Ok(format!("{:?}", r)),
            Value::Unknown => Ok("'X".to_string()),
            Value::HiZ => Ok("'Z".to_string()),
            Value::Any => Err(BenchwrightError::NotSupported(
                "a don't-care value cannot be driven onto a signal".to_string(),
            )),
            Value::Peek(p) => Ok(self.make_name(p)),
            Value::Port(p) => Ok(dut_path(p)),
            Value::FileRead(file) => Ok(format!("{}_in", file.name_without_ext())),
            Value::Var(name) => Ok(name.clone()),
            Value::Expr(expr) => Ok(format!("({})", self.compile_expression(expr)?)),
        }
    }

    /// A literal may be narrower than its port, but its value must fit.
    fn process_bits(
        &self,
        port: Option<&PortRef>,
        bv: &BitVector,
    ) -> Result<String, BenchwrightError> {
        let width = port
            .and_then(|p| self.port_type(p))
            .and_then(|ty| ty.bit_width());
        if let Some(width) = width {
            if width < BitVector::MAX_WIDTH && bv.value >> width != 0 {
                return Err(BenchwrightError::Configuration(format!(
                    "value {} does not fit in {}-bit port {}",
                    bv.to_sv_literal(),
                    width,
                    port.map(|p| p.debug_name()).unwrap_or_default()
                )));
            }
        }
        Ok(bv.to_sv_literal())
    }

    fn process_int(&self, port: Option<&PortRef>, v: i128) -> Result<String, BenchwrightError> {
        let ty = match port.and_then(|p| self.port_type(p)) {
            Some(ty) => ty,
            None => return Ok(v.to_string()),
        };
        let width = match ty.bit_width() {
            Some(width) => width,
            None => return Ok(v.to_string()),
        };
        if v < 0 {
            if ty.is_signed() {
                return Ok(BitVector::from_signed(width, v)?.to_sv_literal());
            }
            return Ok(v.to_string());
        }
        if width < BitVector::MAX_WIDTH && (v as u128) >> width != 0 {
            return Err(BenchwrightError::Configuration(format!(
                "value {} does not fit in {}-bit port {}",
                v,
                width,
                port.map(|p| p.debug_name()).unwrap_or_default()
            )));
        }
        Ok(v.to_string())
    }

    pub fn compile_expression(&self, expr: &Expr) -> Result<String, BenchwrightError> {
        match expr {
            Expr::Binary { op, lhs, rhs } => Ok(format!(
                "{} {} {}",
                self.compile_operand(lhs)?,
                op.op_str(),
                self.compile_operand(rhs)?
            )),
            Expr::Unary { op, operand } => Ok(format!(
                "{} {}",
                op.op_str(),
                self.compile_operand(operand)?
            )),
            Expr::Value(value) => self.process_value(None, value),
        }
    }

    /// Nested binary operations are parenthesized so the tree's grouping
    /// survives operator precedence.
    fn compile_operand(&self, expr: &Expr) -> Result<String, BenchwrightError> {
        let text = self.compile_expression(expr)?;
        match expr {
            Expr::Binary { .. } => Ok(format!("({})", text)),
            _ => Ok(text),
        }
    }

    fn make_poke(
        &mut self,
        port: &PortRef,
        value: &Value,
        delay: Option<f64>,
    ) -> Result<Vec<String>, BenchwrightError> {
        let name = self.make_name(port);
        let value = self.process_value(Some(port), value)?;
        let mut retval = vec![format!("{} = {};", name, value)];
        if let Some(delay) = delay {
            retval.push(format!("#({}*1s);", delay));
        }
        Ok(retval)
    }

    #[allow(clippy::too_many_arguments)]
    fn make_expect(
        &mut self,
        i: usize,
        port: &PortRef,
        value: &Value,
        strict: bool,
        above: Option<f64>,
        below: Option<f64>,
        traceback: Option<&str>,
    ) -> Result<Vec<String>, BenchwrightError> {
        if value.is_any() {
            return Ok(vec![]);
        }

        let mut name = self.make_name(port);
        if self.port_type(port).and_then(|ty| ty.direction()) == Some(Direction::InOut) {
            name = input_wire(&name);
        }
        let debug_name = port.debug_name();

        let mut err_hdr = format!("Failed on action={} checking port {}", i, debug_name);
        if let Some(traceback) = traceback {
            err_hdr.push_str(&format!(" with traceback {}", sv_string_escape(traceback)));
        }

        let (cond, err_msg, err_args) = match (above, below) {
            (Some(above), Some(below)) => (
                format!("({} <= {}) && ({} <= {})", above, name, name, below),
                "Expected %0f to %0f, got %0f",
                vec![above.to_string(), below.to_string(), name.clone()],
            ),
            (Some(above), None) => (
                format!("{} <= {}", above, name),
                "Expected above %0f, got %0f",
                vec![above.to_string(), name.clone()],
            ),
            (None, Some(below)) => (
                format!("{} <= {}", name, below),
                "Expected below %0f, got %0f",
                vec![below.to_string(), name.clone()],
            ),
            (None, None) => {
                let value = self.process_value(Some(port), value)?;
                let op = if strict { "===" } else { "==" };
                (
                    format!("{} {} {}", name, op, value),
                    "Expected %x, got %x",
                    vec![value, name.clone()],
                )
            }
        };

        let mut err_body = vec![format!("\"{}.  {}.\"", err_hdr, err_msg)];
        err_body.extend(err_args);
        Ok(vec![
            format!("if (!({})) begin", cond),
            format!("{}$error({});", INDENT, err_body.join(",")),
            "end".to_string(),
        ])
    }

    /// Lets combinational logic settle.
    fn make_eval(&self) -> Vec<String> {
        vec!["#1;".to_string()]
    }

    fn make_step(&self, clock: &PortRef, steps: usize) -> Vec<String> {
        let name = self.make_name(clock);
        (0..steps)
            .map(|_| format!("#{} {} ^= 1;", self.clock_step_delay, name))
            .collect()
    }

    fn make_print(&self, format: &str, args: &[PrintArg]) -> Result<Vec<String>, BenchwrightError> {
        let mut parts = vec![format!("\"{}\"", sv_string_escape(format))];
        for arg in args.iter() {
            parts.push(match arg {
                PrintArg::Literal(value) => self.process_value(None, value)?,
                PrintArg::Port(port) => self.make_name(port),
            });
        }
        Ok(vec![format!("$write({});", parts.join(", "))])
    }

    fn make_loop(
        &mut self,
        i: usize,
        loop_var: &str,
        n_iter: usize,
        actions: &[Action],
    ) -> Result<Vec<String>, BenchwrightError> {
        self.declarations.add(format!("integer {};", loop_var));
        let mut code = vec![format!(
            "for ({v} = 0; {v} < {n}; {v}++) begin",
            v = loop_var,
            n = n_iter
        )];
        code.extend(self.compile_nested(i, actions)?);
        code.push("end".to_string());
        Ok(code)
    }

    fn make_while(
        &mut self,
        i: usize,
        cond: &Expr,
        actions: &[Action],
    ) -> Result<Vec<String>, BenchwrightError> {
        let cond = self.compile_expression(cond)?;
        let mut code = vec![format!("while ({}) begin", cond)];
        code.extend(self.compile_nested(i, actions)?);
        code.push("end".to_string());
        Ok(code)
    }

    fn make_if(
        &mut self,
        i: usize,
        cond: &Expr,
        actions: &[Action],
        else_actions: &[Action],
    ) -> Result<Vec<String>, BenchwrightError> {
        let cond = self.compile_expression(cond)?;
        let mut code = vec![format!("if ({}) begin", cond)];
        code.extend(self.compile_nested(i, actions)?);
        if else_actions.is_empty() {
            code.push("end".to_string());
        } else {
            code.push("end else begin".to_string());
            code.extend(self.compile_nested(i, else_actions)?);
            code.push("end".to_string());
        }
        Ok(code)
    }

    fn make_var(&mut self, name: &str, width: usize) -> Result<Vec<String>, BenchwrightError> {
        if width == 0 {
            return Err(BenchwrightError::Configuration(format!(
                "variable `{}` must be at least one bit wide",
                name
            )));
        }
        self.declarations
            .add(format!("reg [{}:0] {};", width - 1, name));
        Ok(vec![])
    }

    fn make_file_open(&mut self, file: &File) -> Result<Vec<String>, BenchwrightError> {
        if file.mode != "r" && file.mode != "w" {
            return Err(BenchwrightError::NotSupported(format!(
                "file mode `{}` for {}; only \"r\" and \"w\" are supported",
                file.mode, file.name
            )));
        }
        if file.chunk_size == 0 {
            return Err(BenchwrightError::Configuration(format!(
                "chunk size of file {} must be at least one byte",
                file.name
            )));
        }
        let name = file.name_without_ext();
        if file.mode == "r" {
            self.declarations
                .add(format!("reg [{}:0] {}_in;", file.chunk_size * 8 - 1, name));
        }
        self.declarations.add(format!("integer {}_file;", name));
        Ok(vec![
            format!(
                "{}_file = $fopen(\"{}\", \"{}\");",
                name, file.name, file.mode
            ),
            format!(
                "if (!{n}_file) $error(\"Could not open file {f}: %0d\", {n}_file);",
                n = name,
                f = file.name
            ),
        ])
    }

    fn make_file_read(&mut self, file: &File) -> Vec<String> {
        self.declarations.add("integer __i;");
        let name = file.name_without_ext();
        vec![
            format!("{}_in = 0;", name),
            format!("for ({}) begin", byte_loop_expr(file)),
            format!(
                "{}{n}_in |= $fgetc({n}_file) << (8 * __i);",
                INDENT,
                n = name
            ),
            "end".to_string(),
        ]
    }

    fn make_file_write(&mut self, file: &File, value: &PortRef) -> Vec<String> {
        self.declarations.add("integer __i;");
        let value = self.make_name(value);
        let file_fd = format!("{}_file", file.name_without_ext());
        let byte_expr = format!("({} >> (8 * __i)) & {}'hFF", value, file.chunk_size * 8);
        let write = match self.simulator {
            Simulator::Iverilog => format!("$fputc({}, {});", byte_expr, file_fd),
            _ => format!("$fwrite({}, \"%c\", {});", file_fd, byte_expr),
        };
        vec![
            format!("for ({}) begin", byte_loop_expr(file)),
            format!("{}{}", INDENT, write),
            "end".to_string(),
        ]
    }
}
