//! Weather report assembly: sibling-run extraction plus the
//! observation table summary.
//!
//! The forecast page is a flat run of `<h2>` headings and `<p>`
//! paragraphs; [`extract`] walks such a run forward from a starting
//! node, accumulating text while the tag stays inside an allowed set
//! and stopping at the first node that breaks the run.

use crate::html::{NodeTag, ReportNode};

/// Walks the sibling run from `start`, appending each node's text
/// behind a line break while its tag is in `allowed`. Stops at the
/// first tag outside the set or at the end of the run. Nodes with no
/// text contribute an empty line, not an error.
#[must_use]
pub fn extract(nodes: &[ReportNode], start: usize, allowed: &[NodeTag]) -> String {
    let mut out = String::new();
    for node in nodes.iter().skip(start) {
        if !allowed.contains(&node.tag) {
            break;
        }
        out.push('\n');
        out.push_str(&node.text);
    }
    out
}

/// Which slice of the forecast report a reply contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastMode {
    /// The first summary paragraph only.
    Short,
    /// The paragraphs following the third section heading.
    Long,
    /// Every heading and paragraph from the first heading onward.
    Full,
}

impl ForecastMode {
    /// Parses a command argument; `None` for anything unrecognized.
    #[must_use]
    pub fn parse(arg: &str) -> Option<Self> {
        match arg {
            "short" => Some(Self::Short),
            "long" => Some(Self::Long),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Extracts the forecast text for `mode` from a scanned report page.
/// Returns an empty string when the page does not have the expected
/// structure (missing headings, no paragraphs).
#[must_use]
pub fn forecast_text(nodes: &[ReportNode], mode: ForecastMode) -> String {
    match mode {
        ForecastMode::Short => nodes
            .iter()
            .find(|n| n.tag == NodeTag::Paragraph)
            .map(|n| n.text.clone())
            .unwrap_or_default(),
        ForecastMode::Long => nth_heading(nodes, 3)
            .map(|at| extract(nodes, at + 1, &[NodeTag::Paragraph]))
            .unwrap_or_default(),
        ForecastMode::Full => nth_heading(nodes, 1)
            .map(|at| extract(nodes, at, &[NodeTag::Heading, NodeTag::Paragraph]))
            .unwrap_or_default(),
    }
}

fn nth_heading(nodes: &[ReportNode], n: usize) -> Option<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.tag == NodeTag::Heading)
        .nth(n.checked_sub(1)?)
        .map(|(at, _)| at)
}

/// Formats the latest observations for the configured stations.
///
/// The observation page is one large table; for every station name the
/// condition sits two cells after the name and the temperature three
/// cells after it. Missing stations or empty cells fall back to
/// `neznano` / `??` so one broken row never sinks the whole reply.
#[must_use]
pub fn observations(cells: &[String], locations: &[String]) -> String {
    let mut out = String::from("\n");
    for location in locations {
        let found = cells.iter().position(|cell| cell == location);
        let condition = found
            .and_then(|at| cells.get(at + 2))
            .filter(|s| !s.is_empty())
            .map_or("neznano", String::as_str);
        let degrees = found
            .and_then(|at| cells.get(at + 3))
            .filter(|s| !s.is_empty())
            .map_or("??", String::as_str);
        let name = location.split_whitespace().last().unwrap_or(location);
        out.push_str(&format!("{name}, {condition}, {degrees}°C\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> ReportNode {
        ReportNode {
            tag: NodeTag::Paragraph,
            text: text.to_string(),
        }
    }

    fn h(text: &str) -> ReportNode {
        ReportNode {
            tag: NodeTag::Heading,
            text: text.to_string(),
        }
    }

    #[test]
    fn run_stops_before_first_disallowed_tag() {
        let nodes = vec![p("prvi"), p("drugi"), h("Jutri")];
        let text = extract(&nodes, 0, &[NodeTag::Paragraph]);
        assert_eq!(text, "\nprvi\ndrugi");
    }

    #[test]
    fn run_handles_empty_text_and_exhausted_siblings() {
        let nodes = vec![p("prvi"), p(""), p("tretji")];
        assert_eq!(extract(&nodes, 0, &[NodeTag::Paragraph]), "\nprvi\n\ntretji");
        assert_eq!(extract(&nodes, 3, &[NodeTag::Paragraph]), "");
    }

    fn sample_report() -> Vec<ReportNode> {
        vec![
            p("Povzetek."),
            h("Napoved za Slovenijo"),
            p("Danes bo jasno."),
            h("Napoved za sosednje pokrajine"),
            p("Podobno vreme."),
            h("Vremenska slika"),
            p("Nad Evropo je anticiklon."),
            p("Od zahoda se bliza front."),
            h("Obeti"),
            p("V sredo deloma sončno."),
        ]
    }

    #[test]
    fn short_mode_is_first_paragraph_only() {
        assert_eq!(forecast_text(&sample_report(), ForecastMode::Short), "Povzetek.");
    }

    #[test]
    fn long_mode_takes_paragraphs_after_third_heading() {
        assert_eq!(
            forecast_text(&sample_report(), ForecastMode::Long),
            "\nNad Evropo je anticiklon.\nOd zahoda se bliza front."
        );
    }

    #[test]
    fn full_mode_runs_from_first_heading_over_headings_and_paragraphs() {
        let text = forecast_text(&sample_report(), ForecastMode::Full);
        assert!(text.starts_with("\nNapoved za Slovenijo"));
        assert!(text.ends_with("V sredo deloma sončno."));
    }

    #[test]
    fn modes_degrade_to_empty_on_malformed_pages() {
        let nodes = vec![p("samo odstavek")];
        assert_eq!(forecast_text(&nodes, ForecastMode::Long), "");
        assert_eq!(forecast_text(&nodes, ForecastMode::Full), "");
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(ForecastMode::parse("short"), Some(ForecastMode::Short));
        assert_eq!(ForecastMode::parse("full"), Some(ForecastMode::Full));
        assert_eq!(ForecastMode::parse("jutri"), None);
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn observations_read_condition_and_temperature_cells() {
        let cells = cells(&["Ljubljana", "10:00", "jasno", "21", "Novo mesto", "10:00", "megla", "14"]);
        let locations = vec!["Ljubljana".to_string(), "Novo mesto".to_string()];
        assert_eq!(
            observations(&cells, &locations),
            "\nLjubljana, jasno, 21°C\nmesto, megla, 14°C\n"
        );
    }

    #[test]
    fn observations_fall_back_on_missing_station_or_cells() {
        let cells = cells(&["Ljubljana", "10:00", "", "21"]);
        let locations = vec!["Ljubljana".to_string(), "Kredarica".to_string()];
        assert_eq!(
            observations(&cells, &locations),
            "\nLjubljana, neznano, 21°C\nKredarica, neznano, ??°C\n"
        );
    }
}
