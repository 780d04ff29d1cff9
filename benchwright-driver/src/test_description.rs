// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use anyhow::Context;
use benchwright::{Action, Circuit, PowerArgs};
use serde::Deserialize;

/// A test as given to the driver: the circuit's ports and the actions to
/// apply to it.
#[derive(Debug, Deserialize)]
pub struct TestDescription {
    pub circuit: Circuit,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub power_args: PowerArgs,
}

impl TestDescription {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read test description {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parse test description {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchwright::{Direction, TypeNode};

    #[test]
    fn test_parse_description() {
        let json = r#"{
            "circuit": {
                "name": "bus",
                "ports": [
                    {"name": "vdd", "type": {"bit": {"direction": "input"}}},
                    {"name": "D", "type": {"array": {"len": 2, "elem": {"bits": {"width": 4, "direction": "input"}}}}},
                    {"name": "Q", "type": {"bits": {"width": 4, "signed": true, "direction": "output"}}}
                ]
            },
            "actions": [
                {"poke": {"port": {"top": {"root": "D", "selectors": [{"index": 1}]}}, "value": {"int": 3}}},
                {"step": {"clock": {"internal": "u0.clk"}, "steps": 2}},
                {"expect": {"port": {"select": ["bus", "Q"]}, "value": {"int": -1}}}
            ],
            "power_args": {"supply1s": ["vdd"]}
        }"#;
        let desc: TestDescription = serde_json::from_str(json).unwrap();
        assert_eq!(desc.circuit.name, "bus");
        assert_eq!(desc.circuit.ports[2].ty, TypeNode::sint(4, Direction::Output));
        assert_eq!(desc.actions.len(), 3);
        assert_eq!(desc.power_args.supply1s, vec!["vdd"]);
    }
}
