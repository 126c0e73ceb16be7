//! Mote topology generation
//!
//! Places the root at the origin, sensors uniformly inside the deployment
//! square within the configured distance band, and the malicious mote last.
//! The generated list is ordered: first the root, then the sensors, then the
//! malicious mote.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::params::ParameterSet;

/// A deployed mote: stable identifier plus planar coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mote {
    pub id: u64,
    pub x: f64,
    pub y: f64,
}

impl Mote {
    /// Distance from the root at the origin.
    pub fn distance_from_origin(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Produces the ordered mote list for an experiment
///
/// The first mote is the root, the last one is the malicious mote.
pub trait TopologyGenerator {
    fn generate(&self, params: &ParameterSet) -> Vec<Mote>;
}

/// Uniform random placement inside the deployment square
#[derive(Debug, Clone, Copy, Default)]
pub struct QuasiRandomTopology {
    /// Seed for reproducible placement; entropy-seeded when unset
    pub seed: Option<u64>,
}

impl QuasiRandomTopology {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl TopologyGenerator for QuasiRandomTopology {
    fn generate(&self, params: &ParameterSet) -> Vec<Mote> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut motes = vec![Mote {
            id: 1,
            x: 0.0,
            y: 0.0,
        }];
        for id in 2..=params.mote_count + 2 {
            motes.push(place(&mut rng, params, id));
        }
        motes
    }
}

/// Rejection-sample a position inside the square, within the distance band
/// from the root. Falls back to the diagonal at minimum distance when the
/// band is degenerate (area barely covering the minimum distance).
fn place(rng: &mut StdRng, params: &ParameterSet, id: u64) -> Mote {
    let half = params.area_side / 2.0;
    for _ in 0..1000 {
        let x = rng.gen_range(-half..=half);
        let y = rng.gen_range(-half..=half);
        let distance = (x * x + y * y).sqrt();
        if distance >= params.minimum_distance && distance <= params.max_range {
            return Mote {
                id,
                x: round2(x),
                y: round2(y),
            };
        }
    }
    let pinned = params.minimum_distance / std::f64::consts::SQRT_2;
    Mote {
        id,
        x: round2(pinned),
        y: round2(pinned),
    }
}

/// Coordinates are kept at centimeter precision so position indexes diff
/// cleanly across runs.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
