//! Command-line front end: argument parsing, `ProgramFile` loading, and
//! stdout/HTML reporting (`SPEC_FULL.md` §6, §10.5).
//!
//! `uica-core` never touches the filesystem or the process environment;
//! every concern here (reading the input file, writing the trace, choosing
//! exit codes) is a formatting/IO shell around it.

mod report;
mod trace;

use std::fs;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use uica_core::{Arch, Mode, Program, Simulator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPERCASE")]
enum ArchArg {
    Con,
    Wol,
    Nhm,
    Wsm,
    Snb,
    Ivb,
    Hsw,
    Bdw,
    Skl,
    Skx,
    Kbl,
    Cfl,
    Cnl,
    Icl,
}

impl From<ArchArg> for Arch {
    fn from(value: ArchArg) -> Self {
        match value {
            ArchArg::Con => Self::Con,
            ArchArg::Wol => Self::Wol,
            ArchArg::Nhm => Self::Nhm,
            ArchArg::Wsm => Self::Wsm,
            ArchArg::Snb => Self::Snb,
            ArchArg::Ivb => Self::Ivb,
            ArchArg::Hsw => Self::Hsw,
            ArchArg::Bdw => Self::Bdw,
            ArchArg::Skl => Self::Skl,
            ArchArg::Skx => Self::Skx,
            ArchArg::Kbl => Self::Kbl,
            ArchArg::Cfl => Self::Cfl,
            ArchArg::Cnl => Self::Cnl,
            ArchArg::Icl => Self::Icl,
        }
    }
}

/// Cycle-accurate out-of-order pipeline throughput estimator.
#[derive(Parser, Debug)]
#[command(
    name = "uica",
    author,
    version,
    about = "Estimate steady-state throughput of an x86-64 instruction block",
    long_about = "Reads a pre-disassembled ProgramFile (JSON) and simulates the out-of-order\n\
                  pipeline of the chosen microarchitecture, reporting steady-state cycles\n\
                  per iteration and per-port utilization.\n\n\
                  Example:\n  uica block.json --arch skl --trace"
)]
struct Cli {
    /// `ProgramFile` JSON to simulate.
    file: String,

    /// Restrict simulation to the region between IACA markers.
    ///
    /// Accepted for interface completeness; this crate takes pre-resolved
    /// `ProgramFile` input rather than disassembling raw binaries, so there
    /// is no marker search to perform here. Logged and otherwise a no-op.
    #[arg(long = "iaca-markers", visible_alias = "iacaMarkers")]
    iaca_markers: bool,

    /// Treat the input as raw bytes rather than a `ProgramFile`.
    ///
    /// Same no-op caveat as `--iaca-markers`: disassembly is out of scope.
    #[arg(long)]
    raw: bool,

    /// Target microarchitecture.
    #[arg(long, value_enum, default_value_t = ArchArg::Cfl)]
    arch: ArchArg,

    /// Write an HTML per-uop lifecycle trace. Defaults to `trace.html` when
    /// given with no path.
    #[arg(long, num_args = 0..=1, default_missing_value = "trace.html")]
    trace: Option<String>,

    /// Simulate in non-unrolling (per-round) mode rather than unrolled.
    #[arg(long)]
    r#loop: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.iaca_markers {
        tracing::warn!("-iacaMarkers has no effect: this build takes pre-disassembled ProgramFile input");
    }
    if cli.raw {
        tracing::warn!("-raw has no effect: this build takes pre-disassembled ProgramFile input");
    }

    let arch: Arch = cli.arch.into();
    let mode = if cli.r#loop { Mode::Loop } else { Mode::Unroll };

    let json = match fs::read_to_string(&cli.file) {
        Ok(json) => json,
        Err(err) => {
            tracing::error!(file = %cli.file, %err, "failed to read input file");
            eprintln!("error: failed to read {}: {err}", cli.file);
            return ExitCode::FAILURE;
        }
    };

    let program = match Program::from_json(&json) {
        Ok(program) => program,
        Err(err) => {
            tracing::error!(%err, "failed to parse ProgramFile");
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut sim = Simulator::new(program, arch, mode);
    let result = sim.run();

    println!("{}", report::format_report(&result));

    if let Some(path) = &cli.trace {
        if let Err(err) = trace::write_html(path, &sim, &result) {
            tracing::error!(%err, path, "failed to write trace");
            eprintln!("error: failed to write trace to {path}: {err}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
