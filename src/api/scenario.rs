//! Scenario description writer
//!
//! Produces the plain-text format read back by
//! [`ScenarioParser`](crate::processing::ScenarioParser), optionally
//! annotated with the results of a topology analysis.

use crate::api::session::TopologyAnalysis;
use crate::api::statistics::RunningStats;
use crate::core::Network;
use std::io::{self, Write};

const FORMAT_NOTES: &[&str] = &[
    "# Topology description:",
    "#   'nr-dimensions'     are we describing a 2-D or a 3-D topology?",
    "#   'grid-bound'        the network is contained in a box of size",
    "#                           [0:grid-bound] x [0:grid-bound] (x [0:grid-bound])",
    "#   'radio-range'       the maximum length of a connection between two nodes",
    "#   'connection'        a radio link between a source and destination node.",
    "#                           Connections are directed, there need not be a",
    "#                           reverse connection.",
    "#   'measured-range'    (noisy) distance estimate obtained by the receiver",
    "#   'nr-nodes'          the number of nodes in the network",
    "#   'nr-anchors'        the number of nodes that know their true position",
    "#   'ID'                node identification (unsigned int), may be outside",
    "#                           range [0:'nr-nodes'-1]",
    "#   'position'          2 (or 3) floating point numbers",
];

/// Comment lines summarising a topology analysis
pub fn topology_prelude(network: &Network, analysis: &TopologyAnalysis) -> Vec<String> {
    let total = network.len().max(1) as f64;
    let mut connectivity = RunningStats::new();
    let mut twins = 0;
    let mut dependents = 0;
    for (n, node) in network.nodes().iter().enumerate() {
        if node.anchor || analysis.undetermined[n] {
            continue;
        }
        if analysis.twins[n].is_some() {
            twins += 1;
        } else if analysis.states[n].bad {
            dependents += 1;
        }
        connectivity.push(f64::from(node.received_count()));
    }
    let anchors = network.anchor_count();
    let undetermined = network.len() - anchors - connectivity.count();
    let pct = |count: usize| 100.0 * count as f64 / total;

    vec![
        format!("#\t#nodes         : {:4}", network.len()),
        format!("#\t  #anchors     : {:4} ({:.2}%)", anchors, pct(anchors)),
        format!("#\t  #undetermined: {:4} ({:.2}%)", undetermined, pct(undetermined)),
        format!(
            "#\t  #unknowns    : {:4} ({:.2}%), connectivity: {:.2} +/- {:.2}",
            connectivity.count(),
            pct(connectivity.count()),
            connectivity.mean(),
            connectivity.stddev()
        ),
        format!("#\t    #twins     : {:4} ({:.2}%)", twins, pct(twins)),
        format!("#\t    #dependents: {:4} ({:.2}%)", dependents, pct(dependents)),
    ]
}

/// Write the scenario of `network`, annotated when an analysis is given
pub fn write_scenario<W: Write + ?Sized>(
    out: &mut W,
    network: &Network,
    analysis: Option<&TopologyAnalysis>,
) -> io::Result<()> {
    let dims = network.dims();

    if let Some(analysis) = analysis {
        for line in topology_prelude(network, analysis) {
            writeln!(out, "{line}")?;
        }
        writeln!(out)?;
    }
    for line in FORMAT_NOTES {
        writeln!(out, "{line}")?;
    }
    writeln!(out)?;

    writeln!(out, "# nr-dimensions grid-bound radio-range")?;
    writeln!(out, "{} {} {}\n", dims.count(), network.bound(), network.range())?;
    writeln!(out, "# nr-nodes nr-anchors")?;
    writeln!(out, "{} {}\n", network.len(), network.anchor_count())?;
    writeln!(
        out,
        "# positions: 'nr-nodes' lines with <ID> <x-coord> <y-coord> [<z-coord>]"
    )?;

    for (n, node) in network.nodes().iter().enumerate() {
        write!(out, "{}", node.id)?;
        for d in 0..dims.count() {
            write!(out, " {}", node.true_position[d])?;
        }
        if node.anchor {
            write!(out, " # ANCHOR")?;
        } else if let Some(analysis) = analysis {
            write_annotation(out, network, analysis, n)?;
        }
        writeln!(out)?;
    }

    if network.anchor_count() > 0 {
        writeln!(out, "\n# anchor-list: 'nr-anchors' IDs")?;
        let ids: Vec<String> = network
            .anchors()
            .map(|a| network.node(a).id.to_string())
            .collect();
        writeln!(out, "{}", ids.join(" "))?;
    }

    writeln!(out, "\n# connections: src dst measured-range")?;
    for node in network.nodes() {
        for edge in node.neighbors() {
            writeln!(
                out,
                "{} {} {}",
                node.id,
                network.node(edge.target).id,
                edge.estimated_distance
            )?;
        }
    }
    Ok(())
}

fn write_annotation<W: Write + ?Sized>(
    out: &mut W,
    network: &Network,
    analysis: &TopologyAnalysis,
    n: usize,
) -> io::Result<()> {
    let mut annotated = true;
    if analysis.undetermined[n] {
        write!(out, " # UNDETERMINED")?;
    } else if let Some(twin) = analysis.twins[n] {
        write!(out, " # TWIN {}", network.node(twin).id)?;
    } else if analysis.bad[n] {
        write!(out, " # DEPENDENT")?;
    } else {
        annotated = false;
    }

    let (mut ok, mut bad, mut undetermined) = (0, 0, 0);
    for edge in network.neighbors(n) {
        let m = edge.target;
        if analysis.undetermined[m] {
            undetermined += 1;
        } else if analysis.bad[m] {
            bad += 1;
        } else {
            ok += 1;
        }
    }
    if ok <= network.dims().count() {
        write!(out, "{}", if annotated { " (nghbrs:" } else { " # (nghbrs:" })?;
        if ok > 0 {
            write!(out, " {ok} ok")?;
        }
        if bad > 0 {
            write!(out, " {bad} bad")?;
        }
        if undetermined > 0 {
            write!(out, " {undetermined} undetermined")?;
        }
        write!(out, ")")?;
    }
    Ok(())
}

/// Render the scenario into a string
pub fn render_scenario(network: &Network, analysis: Option<&TopologyAnalysis>) -> String {
    let mut buffer = Vec::new();
    // writing into a Vec cannot fail
    let _ = write_scenario(&mut buffer, network, analysis);
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::session::Localizer;
    use crate::core::{Dimensions, Point};
    use crate::processing::ScenarioParser;

    fn sample() -> Network {
        let mut net = Network::new(Dimensions::Two, 10.0, 10.0);
        for (i, (x, y)) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0), (10.0, 10.0)]
            .into_iter()
            .enumerate()
        {
            net.add_node(100 + i as u32, true, Point::new(x, y, 0.0));
        }
        let centre = net.add_node(7, false, Point::new(5.0, 5.0, 0.0));
        let tail = net.add_node(8, false, Point::new(6.5, 6.0, 0.0));
        for a in 0..4 {
            let d = net.true_distance(a, centre);
            net.add_neighbor(centre, a, d, d * 1.01);
            net.record_reception(centre);
            net.add_neighbor(a, centre, d, d);
        }
        let d = net.true_distance(tail, centre);
        net.add_neighbor(tail, centre, d, 1.9);
        net.add_neighbor(centre, tail, d, 1.7);
        net
    }

    #[test]
    fn test_plain_scenario_round_trips() {
        let net = sample();
        let text = render_scenario(&net, None);
        assert!(text.contains("# nr-dimensions grid-bound radio-range\n2 10 10\n"));
        assert!(text.contains("100 0 0 # ANCHOR"));
        assert!(text.contains("\n100 101 102 103\n"));

        let parsed = ScenarioParser::new().parse(&text).unwrap();
        assert_eq!(parsed.len(), net.len());
        assert_eq!(parsed.anchor_count(), 4);
        for (a, b) in net.nodes().iter().zip(parsed.nodes()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.true_position, b.true_position);
            assert_eq!(a.neighbors(), b.neighbors());
        }
    }

    #[test]
    fn test_annotated_scenario() {
        let net = sample();
        let analysis = Localizer::new().analyze_topology(&net);
        let text = render_scenario(&net, Some(&analysis));

        assert!(text.starts_with("#\t#nodes         :    6"));
        assert!(text.contains("#\t  #undetermined:    1"));
        assert!(text.contains("8 6.5 6 # UNDETERMINED (nghbrs: 1 ok)"));
        // the centre is fine and only gets annotated on a neighbor shortage
        assert!(text.contains("\n7 5 5\n"));

        // annotations are comments to the parser
        let parsed = ScenarioParser::new().parse(&text).unwrap();
        assert_eq!(parsed.len(), 6);
    }
}
