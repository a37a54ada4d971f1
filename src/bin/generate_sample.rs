use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use rankscope::data::loader;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);

    let lineages = [
        "Bacteria;Firmicutes;Bacilli;Lactobacillales;Streptococcaceae;Streptococcus",
        "Bacteria;Firmicutes;Bacilli;Bacillales;Staphylococcaceae;Staphylococcus",
        "Bacteria;Bacteroidetes;Bacteroidia;Bacteroidales;Bacteroidaceae;Bacteroides",
        "Bacteria;Proteobacteria;Gammaproteobacteria;Enterobacterales;Enterobacteriaceae;Escherichia",
        "Archaea;Euryarchaeota;Methanobacteria;Methanobacteriales;Methanobacteriaceae;Methanobrevibacter",
        "Viruses;Caudovirales;Myoviridae;Twortlikevirus;Staphylococcus_phage_Twort",
    ];
    let species = ["alpha", "beta", "gamma", "delta", "epsilon"];
    let sites = ["gut", "skin", "soil", "reef"];
    let n_samples = 8;

    // ---- feature ranking table ----
    let mut feature_rows = Vec::new();
    let mut feature_ids = Vec::new();
    for (i, lineage) in lineages.iter().enumerate() {
        for (j, sp) in species.iter().enumerate() {
            let id = format!("T{:02}", i * species.len() + j);
            feature_rows.push(json!({
                "Feature ID": id,
                "Intercept": round3(rng.gauss(0.0, 1.0)),
                "Rank 1": round3(rng.gauss(0.0, 2.0)),
                "Rank 2": round3(rng.gauss(0.0, 0.5)),
                "Taxonomy": format!("{lineage};{sp}"),
            }));
            feature_ids.push(id);
        }
    }

    let mut rank_datasets = Map::new();
    rank_datasets.insert("data-rank-demo".to_string(), Value::Array(feature_rows));
    rank_datasets.insert(
        "rankscope_rank_ordering".to_string(),
        json!(["Intercept", "Rank 1", "Rank 2"]),
    );
    rank_datasets.insert(
        "rankscope_feature_metadata_ordering".to_string(),
        json!(["Taxonomy"]),
    );
    let rank_plot = json!({
        "data": { "name": "data-rank-demo" },
        "datasets": Value::Object(rank_datasets),
    });

    // ---- sample metadata + counts ----
    let sample_ids: Vec<String> = (1..=n_samples).map(|i| format!("Sample{i}")).collect();
    let sample_rows: Vec<Value> = sample_ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            json!({
                "Sample ID": id,
                "pH": round3(rng.gauss(7.0, 0.8)),
                "Site": sites[i % sites.len()],
            })
        })
        .collect();

    let mut col_ids = Map::new();
    let mut counts = Map::new();
    for (col, fid) in feature_ids.iter().enumerate() {
        let col = col.to_string();
        col_ids.insert(fid.clone(), Value::String(col.clone()));
        let mut per_sample = Map::new();
        for sid in &sample_ids {
            // zero-inflated log-normal-ish abundances
            let count = if rng.next_f64() < 0.3 {
                0.0
            } else {
                rng.gauss(1.5, 1.0).exp().round()
            };
            per_sample.insert(sid.clone(), json!(count));
        }
        counts.insert(col, Value::Object(per_sample));
    }

    let mut sample_datasets = Map::new();
    sample_datasets.insert("data-sample-demo".to_string(), Value::Array(sample_rows));
    sample_datasets.insert(
        "rankscope_feature_col_ids".to_string(),
        Value::Object(col_ids),
    );
    sample_datasets.insert(
        "rankscope_feature_counts".to_string(),
        Value::Object(counts),
    );
    let sample_plot = json!({
        "data": { "name": "data-sample-demo" },
        "datasets": Value::Object(sample_datasets),
    });

    // ---- write and verify ----
    let rank_path = Path::new("demo_rank_plot.json");
    let sample_path = Path::new("demo_sample_plot.json");
    std::fs::write(rank_path, serde_json::to_string_pretty(&rank_plot)?)
        .context("writing rank plot JSON")?;
    std::fs::write(sample_path, serde_json::to_string_pretty(&sample_plot)?)
        .context("writing sample plot JSON")?;

    // Round-trip through the loaders so a broken generator fails loudly.
    let table = loader::load_rank_plot(rank_path)?;
    let (samples, matrix) = loader::load_sample_plot(sample_path)?;
    log::info!(
        "generated {} features, {} samples, {} matrix columns",
        table.len(),
        samples.len(),
        matrix.n_features()
    );

    println!(
        "Wrote {} features / {} samples to {} and {}",
        table.len(),
        samples.len(),
        rank_path.display(),
        sample_path.display()
    );
    Ok(())
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}
