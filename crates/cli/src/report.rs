//! Stdout formatting: the `TP:` line and the two port-usage tables
//! (`SPEC_FULL.md` §6). Pure formatting over an already-computed
//! [`uica_core::SimulationReport`] — no simulation semantics live here.

use std::fmt::Write as _;

use uica_core::{Port, SimulationReport};

/// Row label the reference tool uses for instructions with no matching
/// metadata entry.
const UNKNOWN_LABEL: &str = "X";

#[must_use]
pub fn format_report(report: &SimulationReport) -> String {
    let ports = report.arch.ports();
    let mut out = String::new();
    let _ = writeln!(out, "TP: {:.2}", report.stats.tp);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", total_table(ports, report));
    let _ = writeln!(out);
    let _ = write!(out, "{}", per_instruction_table(ports, report));
    out
}

fn total_table(ports: &[Port], report: &SimulationReport) -> String {
    let mut out = String::new();
    let _ = write!(out, "Port usage:");
    for port in ports {
        let _ = write!(out, "\t{port}");
    }
    let _ = writeln!(out);
    let _ = write!(out, "           ");
    for port in ports {
        let count = report.stats.port_usage_total.get(port).copied().unwrap_or(0);
        let _ = write!(out, "\t{count}");
    }
    out
}

fn per_instruction_table(ports: &[Port], report: &SimulationReport) -> String {
    let mut rows: Vec<&String> = report.stats.port_usage_by_instr.keys().collect();
    rows.sort();

    let mut out = String::new();
    let _ = write!(out, "Instruction");
    for port in ports {
        let _ = write!(out, "\t{port}");
    }
    let _ = writeln!(out);

    for instr_str in rows {
        let label = if instr_str == "UNKNOWN" { UNKNOWN_LABEL } else { instr_str.as_str() };
        let _ = write!(out, "{label}");
        let usage = &report.stats.port_usage_by_instr[instr_str];
        for port in ports {
            let count = usage.get(port).copied().unwrap_or(0);
            let _ = write!(out, "\t{count}");
        }
        let _ = writeln!(out);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use uica_core::{Arch, SimStats};

    use super::*;

    #[test]
    fn tp_line_is_two_decimal_places() {
        let report = SimulationReport {
            arch: Arch::Cfl,
            stats: SimStats { tp: 1.0, ..SimStats::default() },
        };
        assert!(format_report(&report).starts_with("TP: 1.00\n"));
    }

    #[test]
    fn unknown_instr_str_is_displayed_as_x() {
        let mut by_instr = HashMap::new();
        by_instr.insert("UNKNOWN".to_string(), HashMap::from([(Port::P0, 3u64)]));
        let report = SimulationReport {
            arch: Arch::Cfl,
            stats: SimStats { port_usage_by_instr: by_instr, ..SimStats::default() },
        };
        assert!(format_report(&report).contains("\nX\t"));
    }
}
