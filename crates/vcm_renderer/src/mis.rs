//! Multiple importance sampling heuristics and the per-renderer MIS
//! constants shared by the path vertex recursion and the estimators.

use serde::{Deserialize, Serialize};

/// Heuristic applied to every pdf ratio entering a MIS weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisHeuristic {
    #[default]
    Balance,
    Power,
    /// Every strategy with a non-zero pdf counts the same.
    Disabled,
}

impl MisHeuristic {
    #[inline]
    pub fn weight(self, pdf: f32) -> f32 {
        match self {
            MisHeuristic::Balance => pdf,
            MisHeuristic::Power => pdf * pdf,
            MisHeuristic::Disabled => {
                if pdf > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Constants of the recursive MIS formulation.
///
/// `path_count` is the number of sub-paths a single vertex is combined
/// with by the strategy being weighted. It differs between the eye root
/// (one light path per pixel splats to the sensor) and the rest of the
/// path (one resampled or owned light path per eye sample).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MisContext {
    pub heuristic: MisHeuristic,
    pub path_count: f32,
    pub vc_weight_factor: f32,
    pub vm_weight_factor: f32,
    pub merging: bool,
}

impl MisContext {
    /// Connections only.
    pub fn connection(heuristic: MisHeuristic, path_count: usize) -> Self {
        Self {
            heuristic,
            path_count: path_count as f32,
            vc_weight_factor: 0.0,
            vm_weight_factor: 0.0,
            merging: false,
        }
    }

    /// Connections and merging combined. A disabled technique gets a zero
    /// weight factor.
    pub fn vertex_merging(
        heuristic: MisHeuristic,
        path_count: usize,
        vc_weight_factor: f32,
        vm_weight_factor: f32,
    ) -> Self {
        Self {
            heuristic,
            path_count: path_count as f32,
            vc_weight_factor,
            vm_weight_factor,
            merging: true,
        }
    }

    pub fn with_path_count(self, path_count: usize) -> Self {
        Self {
            path_count: path_count as f32,
            ..self
        }
    }

    #[inline]
    pub fn mis(&self, pdf: f32) -> f32 {
        self.heuristic.weight(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristics() {
        assert_eq!(MisHeuristic::Balance.weight(3.0), 3.0);
        assert_eq!(MisHeuristic::Power.weight(3.0), 9.0);
        assert_eq!(MisHeuristic::Disabled.weight(3.0), 1.0);
        assert_eq!(MisHeuristic::Disabled.weight(0.0), 0.0);
    }

    #[test]
    fn test_with_path_count_keeps_factors() {
        let ctx = MisContext::vertex_merging(MisHeuristic::Balance, 4, 0.5, 2.0);
        let other = ctx.with_path_count(16);
        assert_eq!(other.path_count, 16.0);
        assert_eq!(other.vc_weight_factor, 0.5);
        assert_eq!(other.vm_weight_factor, 2.0);
        assert!(other.merging);
    }

    #[test]
    fn test_heuristic_serde_names() {
        let json = serde_json::to_string(&MisHeuristic::Power).expect("serializes");
        assert_eq!(json, "\"power\"");
    }
}
