//! Port identity and selection.
//!
//! A port is chosen by index, by name, or (neither given) as the first
//! enumerated port of the requested direction.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "in"),
            Direction::Output => write!(f, "out"),
        }
    }
}

/// A resolved MIDI endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub number: usize,
    pub name: String,
}

impl PortInfo {
    pub fn new(number: usize, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.number, self.name)
    }
}

/// The structured listing: a JSON object mapping port number to port name,
/// e.g. `{"0":"Synth A","1":"Synth B"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortListing(BTreeMap<usize, String>);

impl PortListing {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ordered by port number.
    pub fn into_ports(self) -> Vec<PortInfo> {
        self.0
            .into_iter()
            .map(|(number, name)| PortInfo { number, name })
            .collect()
    }
}

impl From<&[PortInfo]> for PortListing {
    fn from(ports: &[PortInfo]) -> Self {
        Self(
            ports
                .iter()
                .map(|p| (p.number, p.name.clone()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSelector {
    pub index: Option<usize>,
    pub name: Option<String>,
}

impl PortSelector {
    pub fn first() -> Self {
        Self::default()
    }

    pub fn by_index(index: usize) -> Self {
        Self {
            index: Some(index),
            name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            index: None,
            name: Some(name.into()),
        }
    }

    pub fn new(index: Option<usize>, name: Option<String>) -> Self {
        // An empty name is the same as no name.
        let name = name.filter(|n| !n.is_empty());
        Self { index, name }
    }

    pub fn resolve<'a>(&self, ports: &'a [PortInfo], direction: Direction) -> Result<&'a PortInfo> {
        match (self.index, self.name.as_deref()) {
            (None, None) => ports.first().ok_or(Error::NoPorts(direction)),
            (Some(index), None) => Self::find_number(ports, index, direction),
            (None, Some(name)) => Self::find_name(ports, name, direction),
            (Some(index), Some(name)) => {
                let port = Self::find_number(ports, index, direction)?;
                if port.name != name {
                    return Err(Error::AmbiguousPort {
                        direction,
                        reason: format!(
                            "index {} names \"{}\", not \"{}\"",
                            index, port.name, name
                        ),
                    });
                }
                Ok(port)
            }
        }
    }

    fn find_number(ports: &[PortInfo], index: usize, direction: Direction) -> Result<&PortInfo> {
        ports
            .iter()
            .find(|p| p.number == index)
            .ok_or_else(|| Error::PortNotFound {
                direction,
                selector: format!("index {}", index),
            })
    }

    fn find_name<'a>(
        ports: &'a [PortInfo],
        name: &str,
        direction: Direction,
    ) -> Result<&'a PortInfo> {
        if let Some(port) = ports.iter().find(|p| p.name == name) {
            return Ok(port);
        }

        let needle = name.to_lowercase();
        let matches: Vec<&PortInfo> = ports
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect();

        match matches.as_slice() {
            [port] => Ok(port),
            [] => Err(Error::PortNotFound {
                direction,
                selector: format!("name \"{}\"", name),
            }),
            several => Err(Error::AmbiguousPort {
                direction,
                reason: format!(
                    "\"{}\" matches {}",
                    name,
                    several
                        .iter()
                        .map(|p| format!("\"{}\"", p.name))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            }),
        }
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.index, self.name.as_deref()) {
            (None, None) => write!(f, "first port"),
            (Some(index), None) => write!(f, "index {}", index),
            (None, Some(name)) => write!(f, "name \"{}\"", name),
            (Some(index), Some(name)) => write!(f, "index {} / name \"{}\"", index, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> Vec<PortInfo> {
        vec![
            PortInfo::new(0, "Midi Through Port-0"),
            PortInfo::new(1, "Synth A"),
            PortInfo::new(2, "Synth B"),
        ]
    }

    #[test]
    fn test_first_port_fallback() {
        let ports = ports();
        let port = PortSelector::first()
            .resolve(&ports, Direction::Output)
            .unwrap();
        assert_eq!(port.number, 0);
    }

    #[test]
    fn test_no_ports() {
        let err = PortSelector::first()
            .resolve(&[], Direction::Input)
            .unwrap_err();
        assert!(matches!(err, Error::NoPorts(Direction::Input)));
    }

    #[test]
    fn test_by_index() {
        let ports = ports();
        let port = PortSelector::by_index(2)
            .resolve(&ports, Direction::Output)
            .unwrap();
        assert_eq!(port.name, "Synth B");

        let err = PortSelector::by_index(7)
            .resolve(&ports, Direction::Output)
            .unwrap_err();
        assert!(matches!(err, Error::PortNotFound { .. }));
    }

    #[test]
    fn test_by_name_exact_and_substring() {
        let ports = ports();
        let port = PortSelector::by_name("Synth A")
            .resolve(&ports, Direction::Output)
            .unwrap();
        assert_eq!(port.number, 1);

        let port = PortSelector::by_name("through")
            .resolve(&ports, Direction::Output)
            .unwrap();
        assert_eq!(port.number, 0);
    }

    #[test]
    fn test_ambiguous_name() {
        let ports = ports();
        let err = PortSelector::by_name("synth")
            .resolve(&ports, Direction::Output)
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousPort { .. }));
    }

    #[test]
    fn test_index_and_name_must_agree() {
        let ports = ports();
        let port = PortSelector::new(Some(1), Some("Synth A".into()))
            .resolve(&ports, Direction::Output)
            .unwrap();
        assert_eq!(port.number, 1);

        let err = PortSelector::new(Some(1), Some("Synth B".into()))
            .resolve(&ports, Direction::Output)
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousPort { .. }));
    }

    #[test]
    fn test_empty_name_is_ignored() {
        let selector = PortSelector::new(None, Some(String::new()));
        assert_eq!(selector, PortSelector::first());
    }

    #[test]
    fn test_listing_json_shape() {
        let listing = PortListing::from(&ports()[1..]);
        assert_eq!(
            serde_json::to_string(&listing).unwrap(),
            r#"{"1":"Synth A","2":"Synth B"}"#
        );
    }

    #[test]
    fn test_listing_keeps_port_numbers() {
        let listing: PortListing =
            serde_json::from_str(r#"{"2":"Synth B","0":"Midi Through Port-0"}"#).unwrap();
        assert_eq!(listing.len(), 2);
        assert_eq!(
            listing.into_ports(),
            vec![
                PortInfo::new(0, "Midi Through Port-0"),
                PortInfo::new(2, "Synth B")
            ]
        );
    }
}
