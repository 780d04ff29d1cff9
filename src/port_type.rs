// SPDX-License-Identifier: Apache-2.0

//! Shapes and directions of the ports on the circuit under test, as supplied
//! by the circuit description layer.

use serde::{Deserialize, Serialize};

use crate::actions::{PortName, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
    InOut,
    /// No direction was assigned; such a leaf cannot be wired to a testbench.
    Undirected,
}

/// The shape of a port.
///
/// An array whose element is a scalar `Bit` is a bit-vector and is declared
/// as a single flat signal; every other array, and every tuple, is expanded
/// into one signal per element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeNode {
    Bit {
        direction: Direction,
    },
    Bits {
        width: usize,
        #[serde(default)]
        signed: bool,
        direction: Direction,
    },
    Real {
        direction: Direction,
    },
    Array {
        len: usize,
        elem: Box<TypeNode>,
    },
    Tuple {
        fields: Vec<(String, TypeNode)>,
    },
}

impl TypeNode {
    pub fn bit(direction: Direction) -> Self {
        TypeNode::Bit { direction }
    }

    pub fn bits(width: usize, direction: Direction) -> Self {
        TypeNode::Bits {
            width,
            signed: false,
            direction,
        }
    }

    pub fn sint(width: usize, direction: Direction) -> Self {
        TypeNode::Bits {
            width,
            signed: true,
            direction,
        }
    }

    pub fn real(direction: Direction) -> Self {
        TypeNode::Real { direction }
    }

    pub fn array(len: usize, elem: TypeNode) -> Self {
        TypeNode::Array {
            len,
            elem: Box::new(elem),
        }
    }

    pub fn tuple(fields: Vec<(&str, TypeNode)>) -> Self {
        TypeNode::Tuple {
            fields: fields
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
        }
    }

    /// True for an array of scalar bits, i.e. a bit-vector spelled as an
    /// array.
    fn is_array_of_bit(&self) -> bool {
        matches!(self, TypeNode::Array { elem, .. } if matches!(**elem, TypeNode::Bit { .. }))
    }

    /// True when this node is declared as a single testbench signal.
    pub fn is_leaf(&self) -> bool {
        match self {
            TypeNode::Bit { .. } | TypeNode::Bits { .. } | TypeNode::Real { .. } => true,
            TypeNode::Array { .. } => self.is_array_of_bit(),
            TypeNode::Tuple { .. } => false,
        }
    }

    /// Width of a leaf in bits when it carries an explicit bit range; `None`
    /// for scalar bits, reals and composite nodes.
    pub fn vector_width(&self) -> Option<usize> {
        match self {
            TypeNode::Bits { width, .. } => Some(*width),
            TypeNode::Array { len, .. } if self.is_array_of_bit() => Some(*len),
            _ => None,
        }
    }

    /// Number of bits carried by a leaf, or `None` for reals and composites.
    pub fn bit_width(&self) -> Option<usize> {
        match self {
            TypeNode::Bit { .. } => Some(1),
            _ => self.vector_width(),
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, TypeNode::Bits { signed: true, .. })
    }

    pub fn is_real(&self) -> bool {
        matches!(self, TypeNode::Real { .. })
    }

    /// Direction of a leaf node; composite nodes have none.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            TypeNode::Bit { direction }
            | TypeNode::Bits { direction, .. }
            | TypeNode::Real { direction } => Some(*direction),
            TypeNode::Array { elem, .. } if self.is_array_of_bit() => elem.direction(),
            _ => None,
        }
    }

    /// Steps into one element of a composite node.
    pub fn select(&self, selector: &Selector) -> Option<&TypeNode> {
        match (self, selector) {
            (TypeNode::Array { len, elem }, Selector::Index(i))
                if !self.is_array_of_bit() && *i < *len =>
            {
                Some(elem)
            }
            (TypeNode::Tuple { fields }, Selector::Field(name)) => fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, ty)| ty),
            (TypeNode::Tuple { fields }, Selector::Index(i)) => fields.get(*i).map(|(_, ty)| ty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeNode,
}

/// Port-level description of the circuit under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    pub name: String,
    pub ports: Vec<Port>,
}

impl Circuit {
    pub fn new(name: &str) -> Self {
        Circuit {
            name: name.to_string(),
            ports: vec![],
        }
    }

    /// Builder-style helper for adding a port.
    pub fn with_port(mut self, name: &str, ty: TypeNode) -> Self {
        self.ports.push(Port {
            name: name.to_string(),
            ty,
        });
        self
    }

    /// Resolves a (possibly element-selecting) top-level port name to its
    /// type, if the circuit knows it.
    pub fn port_type(&self, name: &PortName) -> Option<&TypeNode> {
        let mut ty = &self.ports.iter().find(|p| p.name == name.root)?.ty;
        for selector in name.selectors.iter() {
            ty = ty.select(selector)?;
        }
        Some(ty)
    }
}
