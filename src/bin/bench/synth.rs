// Synthetic Network Generator: seedable downlines for timing and invariant checks
// Sponsors are drawn from a sliding window of recent joiners so trees grow deep
// as well as wide, which is where generation cuts and dilution show up.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use compensation_engine::{DistributorId, DistributorRecord, Points};

/// Plan names a synthetic Plata+ distributor can hold, most common first.
const PLATA_PLUS: [&str; 4] = ["Plata", "Oro", "Platino", "Diamante"];
const BELOW_PLATA: [&str; 2] = ["Distribuidor", "Bronce"];

pub struct NetworkShape {
    pub nodes: u32,
    /// How far back (in join order) a new distributor's sponsor may be.
    pub sponsor_window: u32,
    /// Probability a distributor holds a Plata+ rank.
    pub plata_ratio: f64,
    pub max_points: u64,
}

impl NetworkShape {
    pub fn with_nodes(nodes: u32) -> Self {
        Self { nodes: nodes.max(1), sponsor_window: 64, plata_ratio: 0.12, max_points: 2_000 }
    }
}

pub struct NetworkGenerator {
    rng: ChaCha8Rng,
}

impl NetworkGenerator {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self { rng }
    }

    /// Rows for one period; the root has id 1.
    pub fn generate(&mut self, shape: &NetworkShape) -> Vec<DistributorRecord> {
        let mut rows = Vec::with_capacity(shape.nodes as usize);
        rows.push(DistributorRecord {
            id_customers: DistributorId(1),
            full_name: "Root".to_string(),
            id_sponsor: None,
            name_plan: Some("Oro".to_string()),
            point_current_customers: Points::new(self.rng.gen_range(0..=shape.max_points)),
            point_business_customers: Points::new(self.rng.gen_range(0..=shape.max_points)),
        });

        for id in 2..=shape.nodes as u64 {
            let lowest = id.saturating_sub(shape.sponsor_window as u64).max(1);
            let sponsor = self.rng.gen_range(lowest..id);
            let plan = if self.rng.gen::<f64>() < shape.plata_ratio {
                PLATA_PLUS[select_weighted(&mut self.rng, &[0.6, 0.25, 0.1, 0.05])]
            } else {
                BELOW_PLATA[self.rng.gen_range(0..BELOW_PLATA.len())]
            };
            let personal = self.rng.gen_range(0..=shape.max_points);
            let group = personal + self.rng.gen_range(0..=shape.max_points);
            rows.push(DistributorRecord {
                id_customers: DistributorId(id),
                full_name: format!("Distributor {id}"),
                id_sponsor: Some(DistributorId(sponsor)),
                name_plan: Some(plan.to_string()),
                point_current_customers: Points::new(personal),
                point_business_customers: Points::new(group),
            });
        }
        rows
    }
}

fn select_weighted(rng: &mut ChaCha8Rng, weights: &[f64]) -> usize {
    let r: f64 = rng.gen();
    let mut acc = 0.0;
    for (i, w) in weights.iter().enumerate() {
        acc += w;
        if r < acc {
            return i;
        }
    }
    weights.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn same_seed_same_network() {
        let shape = NetworkShape::with_nodes(200);
        let a = NetworkGenerator::new(ChaCha8Rng::seed_from_u64(7)).generate(&shape);
        let b = NetworkGenerator::new(ChaCha8Rng::seed_from_u64(7)).generate(&shape);
        assert_eq!(a, b);
        assert_eq!(a.len(), 200);
    }

    #[test]
    fn every_sponsor_joined_earlier() {
        let rows = NetworkGenerator::new(ChaCha8Rng::seed_from_u64(1)).generate(&NetworkShape::with_nodes(500));
        for row in &rows[1..] {
            let sponsor = row.id_sponsor.expect("test: non-root has sponsor");
            assert!(sponsor < row.id_customers);
        }
    }
}
