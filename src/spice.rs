// SPDX-License-Identifier: Apache-2.0

//! Line-oriented writer for SPICE decks.

use std::fmt::Display;
use std::path::Path;

use crate::sv_target::persist;
use crate::BenchwrightError;

const TAB: &str = "    ";

fn join_displays<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Default)]
pub struct SpiceNetlist {
    lines: Vec<String>,
    indent: usize,
    inst_count: usize,
}

impl SpiceNetlist {
    pub fn new() -> Self {
        Self::default()
    }

    fn println(&mut self, line: &str) {
        self.lines.push(format!("{}{}", TAB.repeat(self.indent), line));
    }

    /// Uses `inst_name` if given, otherwise the next auto-assigned number.
    fn inst_name(&mut self, inst_name: Option<&str>) -> String {
        match inst_name {
            Some(name) => name.to_string(),
            None => {
                let n = self.inst_count;
                self.inst_count += 1;
                n.to_string()
            }
        }
    }

    pub fn comment(&mut self, text: &str) {
        self.println(&format!("* {}", text));
    }

    /// `.ic` initial conditions on node voltages.
    pub fn ic<V: Display>(&mut self, cond: &[(&str, V)]) {
        let mut line = vec![".ic".to_string()];
        line.extend(cond.iter().map(|(node, val)| format!("v({})={}", node, val)));
        self.println(&line.join(" "));
    }

    pub fn probe(&mut self, probes: &[&str]) {
        self.println(&format!(".probe {}", probes.join(" ")).trim_end().to_string());
    }

    pub fn include(&mut self, file: &str) {
        self.println(&format!(".include {}", file));
    }

    pub fn options(&mut self, args: &[&str]) {
        self.println(&format!(".options {}", args.join(" ")).trim_end().to_string());
    }

    pub fn model<V: Display>(&mut self, mod_name: &str, mod_type: &str, params: &[(&str, V)]) {
        let mut line = vec![".model".to_string(), mod_name.to_string(), mod_type.to_string()];
        line.extend(params.iter().map(|(key, val)| format!("{}={}", key, val)));
        self.println(&line.join(" "));
    }

    pub fn instantiate(&mut self, name: &str, ports: &[&str], inst_name: Option<&str>) {
        let inst_name = self.inst_name(inst_name);
        self.println(&format!("X{} {} {}", inst_name, ports.join(" "), name));
    }

    /// Voltage source; the DC value defaults to the first PWL point.
    pub fn voltage(
        &mut self,
        p: &str,
        n: &str,
        dc: Option<f64>,
        pwl: Option<&[(f64, f64)]>,
        inst_name: Option<&str>,
    ) {
        let inst_name = self.inst_name(inst_name);
        let dc = dc.or_else(|| pwl.and_then(|points| points.first()).map(|(_, v)| *v));

        let mut line = vec![format!("V{}", inst_name), p.to_string(), n.to_string()];
        if let Some(dc) = dc {
            line.push("DC".to_string());
            line.push(dc.to_string());
        }
        if let Some(points) = pwl {
            let pwl_str: Vec<String> = points.iter().map(|(t, v)| format!("{} {}", t, v)).collect();
            line.push(format!("PWL({})", pwl_str.join(" ")));
        }
        self.println(&line.join(" "));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn switch(
        &mut self,
        sw_p: &str,
        sw_n: &str,
        ctl_p: &str,
        ctl_n: &str,
        mod_name: &str,
        inst_name: Option<&str>,
        default: Option<&str>,
    ) {
        let inst_name = self.inst_name(inst_name);
        let mut line = vec![format!("S{}", inst_name)];
        line.extend([sw_p, sw_n, ctl_p, ctl_n, mod_name].iter().map(|s| s.to_string()));
        if let Some(default) = default {
            line.push(default.to_string());
        }
        self.println(&line.join(" "));
    }

    /// Voltage-controlled resistor defined by (voltage, resistance) points.
    pub fn vcr(
        &mut self,
        p: &str,
        n: &str,
        ctl_p: &str,
        ctl_n: &str,
        pwl: &[(f64, f64)],
        inst_name: Option<&str>,
    ) {
        let inst_name = self.inst_name(inst_name);
        let mut line = vec![
            format!("G{}", inst_name),
            p.to_string(),
            n.to_string(),
            "VCR".to_string(),
            "PWL(1)".to_string(),
            ctl_p.to_string(),
            ctl_n.to_string(),
        ];
        line.extend(pwl.iter().map(|(v, r)| format!("{}v,{}", v, r)));
        self.println(&line.join(" "));
    }

    pub fn tran<T: Display>(&mut self, t_step: T, t_stop: T, uic: bool) {
        let mut line = format!(".tran {} {}", t_step, t_stop);
        if uic {
            line.push_str(" uic");
        }
        self.println(&line);
    }

    pub fn start_subckt(&mut self, name: &str, ports: &[&str]) {
        self.println(&format!(".subckt {} {}", name, join_displays(ports)));
        self.indent += 1;
    }

    pub fn end_subckt(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.println(".ends");
    }

    pub fn start_control(&mut self) {
        self.println(".control");
    }

    pub fn end_control(&mut self) {
        self.println(".endc");
    }

    pub fn end_file(&mut self) {
        self.println(".end");
    }

    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }

    pub fn write_to_file(&self, path: &Path) -> Result<(), BenchwrightError> {
        persist(path, &self.text())
    }
}
