// SPDX-License-Identifier: Apache-2.0

//! Decomposes hierarchical port types into the flat signals a testbench
//! declares, and the connections that wire those signals to the instance of
//! the circuit under test.

use serde::{Deserialize, Serialize};

use crate::port_type::{Direction, TypeNode};
use crate::BenchwrightError;

/// Names of leaf signals that are power rails or tri-state nets rather than
/// plain inputs and outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerArgs {
    pub supply0s: Vec<String>,
    pub supply1s: Vec<String>,
    pub tris: Vec<String>,
}

/// Declarations and the instance connection for one leaf signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortWiring {
    pub declarations: Vec<String>,
    /// E.g. `.I(I)`.
    pub connection: String,
}

/// Name of the wire that carries a reg-driven signal to the instance.
pub fn input_wire(name: &str) -> String {
    format!("__{}_wire", name)
}

fn width_prefix(ty: &TypeNode) -> String {
    match ty.vector_width() {
        Some(width) if width > 1 => format!("[{}:0] ", width - 1),
        _ => String::new(),
    }
}

pub struct PortWalker<'a> {
    power_args: &'a PowerArgs,
    use_input_wires: bool,
}

impl<'a> PortWalker<'a> {
    pub fn new(power_args: &'a PowerArgs, use_input_wires: bool) -> Self {
        PortWalker {
            power_args,
            use_input_wires,
        }
    }

    /// Returns one entry per leaf signal under `ty`, in declaration order.
    pub fn layout(&self, name: &str, ty: &TypeNode) -> Result<Vec<PortWiring>, BenchwrightError> {
        if ty.is_leaf() {
            return Ok(vec![self.layout_leaf(name, ty)?]);
        }
        let mut port_list = vec![];
        match ty {
            TypeNode::Array { len, elem } => {
                for j in 0..*len {
                    port_list.extend(self.layout(&format!("{}_{}", name, j), elem)?);
                }
            }
            TypeNode::Tuple { fields } => {
                for (k, t) in fields.iter() {
                    port_list.extend(self.layout(&format!("{}_{}", name, k), t)?);
                }
            }
            _ => unreachable!("leaf types are handled above"),
        }
        Ok(port_list)
    }

    fn layout_leaf(&self, name: &str, ty: &TypeNode) -> Result<PortWiring, BenchwrightError> {
        let width_str = width_prefix(ty);
        let is_named = |names: &[String]| names.iter().any(|n| n == name);
        let direction = ty.direction();

        let kind = if ty.is_real() {
            "real"
        } else if is_named(&self.power_args.supply0s) {
            "supply0"
        } else if is_named(&self.power_args.supply1s) {
            "supply1"
        } else if is_named(&self.power_args.tris) {
            "tri"
        } else if direction == Some(Direction::Output) {
            "wire"
        } else if direction == Some(Direction::InOut)
            || (direction == Some(Direction::Input) && self.use_input_wires)
        {
            // The reg is what actions assign; the instance sees the wire.
            let connect_to = input_wire(name);
            return Ok(PortWiring {
                declarations: vec![
                    format!("reg {}{};", width_str, name),
                    format!("wire {}{};", width_str, connect_to),
                    format!("assign {}={};", connect_to, name),
                ],
                connection: format!(".{}({})", name, connect_to),
            });
        } else if direction == Some(Direction::Input) {
            "reg"
        } else {
            return Err(BenchwrightError::Configuration(format!(
                "cannot classify port `{}` with direction {:?}",
                name, direction
            )));
        };

        Ok(PortWiring {
            declarations: vec![format!("{} {}{};", kind, width_str, name)],
            connection: format!(".{}({})", name, name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn walk(name: &str, ty: &TypeNode) -> Vec<PortWiring> {
        PortWalker::new(&PowerArgs::default(), false)
            .layout(name, ty)
            .unwrap()
    }

    fn count_leaves(ty: &TypeNode) -> usize {
        match ty {
            _ if ty.is_leaf() => 1,
            TypeNode::Array { len, elem } => len * count_leaves(elem),
            TypeNode::Tuple { fields } => fields.iter().map(|(_, t)| count_leaves(t)).sum(),
            _ => unreachable!(),
        }
    }

    #[test_case(TypeNode::bit(Direction::Input); "bit")]
    #[test_case(TypeNode::bits(7, Direction::Output); "bits")]
    #[test_case(TypeNode::real(Direction::Input); "real")]
    #[test_case(TypeNode::array(3, TypeNode::bits(4, Direction::Input)); "array of bits")]
    #[test_case(TypeNode::array(2, TypeNode::array(3, TypeNode::bits(4, Direction::Output))); "nested arrays")]
    #[test_case(TypeNode::tuple(vec![
        ("a", TypeNode::bits(4, Direction::Input)),
        ("b", TypeNode::array(2, TypeNode::bit(Direction::Input))),
        ("c", TypeNode::array(2, TypeNode::tuple(vec![("x", TypeNode::bit(Direction::Output))]))),
    ]); "tuple")]
    fn test_one_entry_per_leaf(ty: TypeNode) {
        let got = walk("p", &ty);
        assert_eq!(got.len(), count_leaves(&ty));
        for entry in got.iter() {
            assert_eq!(entry.declarations.len(), 1);
        }
    }

    #[test_case(1, "reg I;"; "width one has no range")]
    #[test_case(2, "reg [1:0] I;"; "width two")]
    #[test_case(32, "reg [31:0] I;"; "width thirty two")]
    fn test_width_prefix(width: usize, want: &str) {
        let got = walk("I", &TypeNode::bits(width, Direction::Input));
        assert_eq!(got[0].declarations, vec![want.to_string()]);
        assert_eq!(got[0].connection, ".I(I)");
    }

    #[test]
    fn test_array_of_bit_collapses() {
        let got = walk("I", &TypeNode::array(8, TypeNode::bit(Direction::Input)));
        assert_eq!(
            got,
            vec![PortWiring {
                declarations: vec!["reg [7:0] I;".to_string()],
                connection: ".I(I)".to_string(),
            }]
        );
    }

    #[test]
    fn test_nested_names() {
        let ty = TypeNode::array(2, TypeNode::array(3, TypeNode::bits(4, Direction::Output)));
        let got: Vec<String> = walk("O", &ty).into_iter().map(|w| w.connection).collect();
        assert_eq!(
            got,
            vec![
                ".O_0_0(O_0_0)",
                ".O_0_1(O_0_1)",
                ".O_0_2(O_0_2)",
                ".O_1_0(O_1_0)",
                ".O_1_1(O_1_1)",
                ".O_1_2(O_1_2)",
            ]
        );
        let tuple = TypeNode::tuple(vec![
            ("a", TypeNode::bits(4, Direction::Input)),
            ("b", TypeNode::bits(4, Direction::Input)),
        ]);
        let got = walk("I", &tuple);
        assert_eq!(got[0].declarations, vec!["reg [3:0] I_a;".to_string()]);
        assert_eq!(got[1].connection, ".I_b(I_b)");
    }

    #[test]
    fn test_classification_priority() {
        let power_args = PowerArgs {
            supply0s: vec!["vss".to_string()],
            supply1s: vec!["vdd".to_string()],
            tris: vec!["bus".to_string()],
        };
        let walker = PortWalker::new(&power_args, false);
        let decl = |name: &str, ty: TypeNode| walker.layout(name, &ty).unwrap()[0].declarations[0].clone();
        assert_eq!(decl("vss", TypeNode::bit(Direction::Input)), "supply0 vss;");
        assert_eq!(decl("vdd", TypeNode::bit(Direction::Input)), "supply1 vdd;");
        assert_eq!(decl("bus", TypeNode::bits(8, Direction::InOut)), "tri [7:0] bus;");
        // Real wins over every name hint.
        assert_eq!(decl("vdd", TypeNode::real(Direction::Input)), "real vdd;");
        assert_eq!(decl("O", TypeNode::bit(Direction::Output)), "wire O;");
        assert_eq!(decl("I", TypeNode::bit(Direction::Input)), "reg I;");
    }

    #[test]
    fn test_inout_drives_through_wire() {
        let got = walk("a", &TypeNode::bits(4, Direction::InOut));
        assert_eq!(
            got,
            vec![PortWiring {
                declarations: vec![
                    "reg [3:0] a;".to_string(),
                    "wire [3:0] __a_wire;".to_string(),
                    "assign __a_wire=a;".to_string(),
                ],
                connection: ".a(__a_wire)".to_string(),
            }]
        );
    }

    #[test]
    fn test_use_input_wires() {
        let power_args = PowerArgs::default();
        let walker = PortWalker::new(&power_args, true);
        let got = walker.layout("I", &TypeNode::bit(Direction::Input)).unwrap();
        assert_eq!(got[0].connection, ".I(__I_wire)");
        assert_eq!(got[0].declarations.len(), 3);
        let got = walker.layout("O", &TypeNode::bit(Direction::Output)).unwrap();
        assert_eq!(got[0].connection, ".O(O)");
    }

    #[test]
    fn test_undirected_leaf_is_configuration_error() {
        let power_args = PowerArgs::default();
        let walker = PortWalker::new(&power_args, false);
        let err = walker
            .layout("x", &TypeNode::bit(Direction::Undirected))
            .unwrap_err();
        assert!(matches!(err, BenchwrightError::Configuration(_)));
    }
}
