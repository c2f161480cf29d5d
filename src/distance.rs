//! Distance providers: pluggable edge weights for the reachable matrix.
//!
//! A provider maps an axiom to a non-negative edge weight, or to "no
//! edge". The chosen provider is part of the knowledge base's identity —
//! its tag and parameters are written into the `.conf` file so the
//! matrix's numerical semantics survive re-open.

use serde::{Deserialize, Serialize};

use crate::codec::{self, ByteReader};
use crate::error::{KbError, KbResult};
use crate::logic::Axiom;

/// Tagged set of known distance providers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceProvider {
    /// Every axiom is infeasible; the matrix degenerates to the diagonal.
    Null,
    /// Every axiom costs 1.0: distance = chain length.
    Basic,
    /// Weight parsed from the axiom's parameter string (`:<float>`);
    /// axioms without a parameter cost `fallback`.
    CostBased { fallback: f32 },
}

impl DistanceProvider {
    const TAG_NULL: u8 = 0;
    const TAG_BASIC: u8 = 1;
    const TAG_COST: u8 = 2;

    /// Look up a provider by registry key.
    pub fn by_name(key: &str) -> KbResult<Self> {
        match key {
            "null" => Ok(Self::Null),
            "basic" => Ok(Self::Basic),
            "cost" => Ok(Self::CostBased { fallback: -1.0 }),
            _ => Err(KbError::UnknownProvider { key: key.into() }),
        }
    }

    /// The registry key of this provider.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Basic => "basic",
            Self::CostBased { .. } => "cost",
        }
    }

    /// The config tag byte.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Null => Self::TAG_NULL,
            Self::Basic => Self::TAG_BASIC,
            Self::CostBased { .. } => Self::TAG_COST,
        }
    }

    /// Append the tag byte and provider-specific parameters.
    pub fn write_config(&self, buf: &mut Vec<u8>) {
        codec::put_u8(buf, self.tag());
        if let Self::CostBased { fallback } = self {
            codec::put_f32(buf, *fallback);
        }
    }

    /// Decode a provider written by [`write_config`](Self::write_config).
    pub fn read_config(r: &mut ByteReader<'_>) -> KbResult<Self> {
        let tag = r.u8().map_err(KbError::Codec)?;
        match tag {
            Self::TAG_NULL => Ok(Self::Null),
            Self::TAG_BASIC => Ok(Self::Basic),
            Self::TAG_COST => {
                let fallback = r.f32().map_err(KbError::Codec)?;
                Ok(Self::CostBased { fallback })
            }
            _ => Err(KbError::UnknownProviderTag { tag }),
        }
    }

    /// The edge weight this axiom contributes, or `None` when the axiom
    /// yields no edge.
    pub fn distance(&self, axiom: &Axiom) -> Option<f32> {
        let raw = match self {
            Self::Null => return None,
            Self::Basic => 1.0,
            Self::CostBased { fallback } => {
                let param = axiom.func.param();
                if param.is_empty() {
                    *fallback
                } else {
                    param
                        .trim()
                        .trim_start_matches(':')
                        .parse::<f32>()
                        .unwrap_or(-1.0)
                }
            }
        };
        (raw >= 0.0 && raw.is_finite()).then_some(raw)
    }
}
