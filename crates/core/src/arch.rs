//! Per-microarchitecture constants (`SPEC_FULL.md` §6).

use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// One of the fourteen microarchitectures the simulator models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Arch {
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

impl Arch {
    /// Parses the CLI `-arch` value (case-insensitive), matching `SPEC_FULL.md` §6's accepted set.
    pub fn parse(s: &str) -> Result<Self, SimError> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "CON" => Self::Con,
            "WOL" => Self::Wol,
            "NHM" => Self::Nhm,
            "WSM" => Self::Wsm,
            "SNB" => Self::Snb,
            "IVB" => Self::Ivb,
            "HSW" => Self::Hsw,
            "BDW" => Self::Bdw,
            "SKL" => Self::Skl,
            "SKX" => Self::Skx,
            "KBL" => Self::Kbl,
            "CFL" => Self::Cfl,
            "CNL" => Self::Cnl,
            "ICL" => Self::Icl,
            other => return Err(SimError::UnknownArch(other.to_string())),
        })
    }

    /// Whether this architecture was released at or after Sandy Bridge.
    ///
    /// Gates the extra -1 mem-load latency decrement in `adjustLatencies`
    /// (see DESIGN.md, Open Question 5).
    #[must_use]
    pub fn is_snb_or_later(self) -> bool {
        !matches!(self, Self::Con | Self::Wol | Self::Nhm | Self::Wsm)
    }

    /// The execution ports available on this architecture, in ascending order.
    #[must_use]
    pub fn ports(self) -> &'static [Port] {
        use Port::*;
        match self {
            Self::Con | Self::Wol | Self::Nhm | Self::Wsm | Self::Snb | Self::Ivb => {
                &[P0, P1, P2, P3, P4, P5]
            }
            Self::Hsw | Self::Bdw | Self::Skl | Self::Skx | Self::Kbl | Self::Cfl | Self::Cnl => {
                &[P0, P1, P2, P3, P4, P5, P6, P7]
            }
            Self::Icl => &[P0, P1, P2, P3, P4, P5, P6, P7, P8, P9],
        }
    }

    /// Builds the full constant table for this architecture, applying the
    /// HSW/BDW overrides of `SPEC_FULL.md` §6.
    #[must_use]
    pub fn profile(self) -> ArchProfile {
        let mut profile = ArchProfile::default();
        profile.arch = self;
        if matches!(self, Self::Hsw | Self::Bdw) {
            profile.macro_fusible_instr_can_be_decoded_as_last_instr = false;
            profile.idq_width = 20;
            profile.mite_width = 4;
            profile.instr_with_more_than_2_uops_decoded_alone = true;
            profile.pop5c_requires_complex_decoder = true;
        }
        profile
    }
}

/// An execution port identifier, e.g. port 0.
///
/// Kept as a small enum (rather than a bare `u8`) so port-keyed maps read as
/// `Port::P2` instead of a magic number, matching the reference tool's
/// string-keyed port identifiers ('0'..'9').
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Port {
    P0,
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
    P7,
    P8,
    P9,
}

impl Port {
    /// The port's numeric index, used for tie-breaking in the admission
    /// balancing heuristic (`SPEC_FULL.md` §4.5 step 2).
    #[must_use]
    pub fn index(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// The full set of per-architecture constants from `SPEC_FULL.md` §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchProfile {
    pub arch: Arch,
    pub retire_width: usize,
    pub rb_width: usize,
    pub rs_width: usize,
    pub predecode_width: usize,
    pub predecode_decode_delay: u64,
    pub idq_width: usize,
    pub n_decoders: usize,
    pub mite_width: usize,
    pub dsb_width: usize,
    pub issue_width: usize,
    pub issue_dispatch_delay: u64,
    pub macro_fusible_instr_can_be_decoded_as_last_instr: bool,
    pub instr_with_more_than_2_uops_decoded_alone: bool,
    pub pop5c_ends_decode_group: bool,
    pub pop5c_requires_complex_decoder: bool,
}

impl Default for ArchProfile {
    fn default() -> Self {
        Self {
            arch: Arch::Cfl,
            retire_width: 4,
            rb_width: 224,
            rs_width: 97,
            predecode_width: 5,
            predecode_decode_delay: 3,
            idq_width: 64,
            n_decoders: 4,
            mite_width: 5,
            dsb_width: 6,
            issue_width: 4,
            issue_dispatch_delay: 5,
            macro_fusible_instr_can_be_decoded_as_last_instr: true,
            instr_with_more_than_2_uops_decoded_alone: false,
            pop5c_ends_decode_group: true,
            pop5c_requires_complex_decoder: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cfl_defaults_match_spec_constants() {
        let p = Arch::Cfl.profile();
        assert_eq!(p.idq_width, 64);
        assert_eq!(p.mite_width, 5);
        assert_eq!(p.rb_width, 224);
        assert_eq!(p.rs_width, 97);
        assert!(p.macro_fusible_instr_can_be_decoded_as_last_instr);
    }

    #[test]
    fn hsw_bdw_overrides_apply() {
        for arch in [Arch::Hsw, Arch::Bdw] {
            let p = arch.profile();
            assert!(!p.macro_fusible_instr_can_be_decoded_as_last_instr);
            assert_eq!(p.idq_width, 20);
            assert_eq!(p.mite_width, 4);
            assert!(p.instr_with_more_than_2_uops_decoded_alone);
            assert!(p.pop5c_requires_complex_decoder);
        }
    }

    #[test]
    fn port_counts_match_generations() {
        assert_eq!(Arch::Con.ports().len(), 6);
        assert_eq!(Arch::Cfl.ports().len(), 8);
        assert_eq!(Arch::Icl.ports().len(), 10);
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(Arch::parse("cfl").unwrap(), Arch::Cfl);
        assert_eq!(Arch::parse("ICL").unwrap(), Arch::Icl);
        assert!(Arch::parse("ZEN4").is_err());
    }
}
