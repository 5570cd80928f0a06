use crate::core::{Dimensions, Network, UnsupportedDimensions};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while reading a scenario description
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: expected {expected}")]
    Malformed { line: usize, expected: &'static str },

    #[error("line {line}: invalid number '{token}'")]
    InvalidNumber { line: usize, token: String },

    #[error("line {line}: {source}")]
    Dimensions {
        line: usize,
        source: UnsupportedDimensions,
    },

    #[error("line {line}: {message}")]
    InvalidValue { line: usize, message: String },

    #[error("line {line}: duplicate node ID {id}")]
    DuplicateId { line: usize, id: u32 },

    #[error("line {line}: unknown node ID {id}")]
    UnknownId { line: usize, id: u32 },

    #[error("unexpected end of input, missing {expected}")]
    UnexpectedEof { expected: &'static str },

    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
}

/// Reader for the plain-text scenario format.
///
/// Comment lines start with `#`; on data lines everything after `#` is an
/// annotation and ignored. Sections in order: `dims bound range`,
/// `nr_nodes nr_anchors`, one `ID x y [z]` line per node, the anchor ID line
/// (absent without anchors), then `src dst measured-range` connections.
#[derive(Debug, Clone)]
pub struct ScenarioParser {
    /// Reject connections naming unknown nodes instead of skipping them
    strict: bool,
}

impl Default for ScenarioParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioParser {
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Parser that skips, with a warning, connections to unknown nodes
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Network, ParseError> {
        let text = fs::read_to_string(path)?;
        self.parse(&text)
    }

    pub fn parse(&self, text: &str) -> Result<Network, ParseError> {
        let mut lines = data_lines(text);

        let (line, fields) = lines.next().ok_or(ParseError::UnexpectedEof {
            expected: "dimensions, bound and range",
        })?;
        expect_fields(line, &fields, 3, "dimensions, bound and range")?;
        let dims = Dimensions::try_from(parse_number::<usize>(line, fields[0])?)
            .map_err(|source| ParseError::Dimensions { line, source })?;
        let bound: f64 = parse_number(line, fields[1])?;
        let range: f64 = parse_number(line, fields[2])?;
        if !(range > 0.0 && range.is_finite()) {
            return Err(ParseError::InvalidValue {
                line,
                message: format!("radio range must be positive, got {range}"),
            });
        }

        let (line, fields) = lines.next().ok_or(ParseError::UnexpectedEof {
            expected: "node and anchor counts",
        })?;
        expect_fields(line, &fields, 2, "node and anchor counts")?;
        let nr_nodes: usize = parse_number(line, fields[0])?;
        let nr_anchors: usize = parse_number(line, fields[1])?;
        if nr_anchors > nr_nodes {
            return Err(ParseError::InvalidValue {
                line,
                message: format!("{nr_anchors} anchors but only {nr_nodes} nodes"),
            });
        }

        let mut positions = Vec::with_capacity(nr_nodes);
        let mut index = HashMap::with_capacity(nr_nodes);
        for n in 0..nr_nodes {
            let (line, fields) = lines.next().ok_or(ParseError::UnexpectedEof {
                expected: "node position",
            })?;
            expect_fields(line, &fields, 1 + dims.count(), "node ID and coordinates")?;
            let id: u32 = parse_number(line, fields[0])?;
            if index.insert(id, n).is_some() {
                return Err(ParseError::DuplicateId { line, id });
            }
            let coords = fields[1..]
                .iter()
                .map(|token| parse_number::<f64>(line, token))
                .collect::<Result<Vec<f64>, ParseError>>()?;
            positions.push((id, dims.point(&coords)));
        }

        let mut anchors = HashSet::with_capacity(nr_anchors);
        if nr_anchors > 0 {
            let (line, fields) = lines.next().ok_or(ParseError::UnexpectedEof {
                expected: "anchor list",
            })?;
            expect_fields(line, &fields, nr_anchors, "one ID per anchor")?;
            for token in fields {
                let id: u32 = parse_number(line, token)?;
                if !index.contains_key(&id) {
                    return Err(ParseError::UnknownId { line, id });
                }
                anchors.insert(id);
            }
        }

        let mut network = Network::new(dims, range, bound);
        for (id, position) in positions {
            network.add_node(id, anchors.contains(&id), position);
        }

        let mut connections = 0;
        for (line, fields) in lines {
            expect_fields(line, &fields, 3, "source, destination and range")?;
            let src: u32 = parse_number(line, fields[0])?;
            let dst: u32 = parse_number(line, fields[1])?;
            let measured: f64 = parse_number(line, fields[2])?;

            let (Some(&node), Some(&neighbor)) = (index.get(&src), index.get(&dst)) else {
                let id = if index.contains_key(&src) { dst } else { src };
                if self.strict {
                    return Err(ParseError::UnknownId { line, id });
                }
                warn!(line, id, "skipping connection to unknown node");
                continue;
            };

            let true_distance = network.true_distance(node, neighbor);
            if network.add_neighbor(node, neighbor, true_distance, measured) {
                network.record_reception(node);
                connections += 1;
            }
        }

        debug!(
            nodes = network.len(),
            anchors = network.anchor_count(),
            connections,
            "parsed scenario"
        );
        Ok(network)
    }
}

/// Non-empty data lines with their 1-based line numbers, annotations removed
fn data_lines(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(|(i, raw)| {
        let content = raw.split('#').next().unwrap_or("");
        let fields: Vec<&str> = content.split_whitespace().collect();
        (!fields.is_empty()).then_some((i + 1, fields))
    })
}

fn expect_fields(
    line: usize,
    fields: &[&str],
    count: usize,
    expected: &'static str,
) -> Result<(), ParseError> {
    if fields.len() == count {
        Ok(())
    } else {
        Err(ParseError::Malformed { line, expected })
    }
}

fn parse_number<T: FromStr>(line: usize, token: &str) -> Result<T, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}
