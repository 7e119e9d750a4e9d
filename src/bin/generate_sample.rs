use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use emi_dataset::data::model::{
    frequency_axis, AGE, CON_SENSOR_I, CON_SENSOR_IB, CON_SENSOR_R, CON_SENSOR_RB, LABEL, TEMP,
};
use emi_dataset::data::store::{write_json_store, write_parquet_store, MemoryStore};

const N_FREQUENCIES: usize = 100;
const CURING_DAYS: [f64; 6] = [1.0, 3.0, 7.0, 14.0, 21.0, 28.0];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Conductance/susceptance-like sweep with one resonance at `peak_khz`.
fn sweep(
    freqs: &Array1<f64>,
    peak_khz: f64,
    amplitude: f64,
    noise: f64,
    rng: &mut ChaCha8Rng,
) -> (Vec<f64>, Vec<f64>) {
    let real = freqs
        .iter()
        .map(|&f| gaussian(f, peak_khz, 60.0, amplitude) + 0.2 + rng.gen_range(-noise..noise))
        .collect();
    let imag = freqs
        .iter()
        .map(|&f| {
            1e-3 * f + 0.5 * gaussian(f, peak_khz + 40.0, 80.0, amplitude) + rng.gen_range(-noise..noise)
        })
        .collect();
    (real, imag)
}

/// Strength gain with curing age (MPa), saturating towards `ultimate`.
fn strength(age_days: f64, ultimate: f64) -> f64 {
    ultimate * age_days / (4.0 + 0.85 * age_days)
}

fn main() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let freqs = frequency_axis(N_FREQUENCIES);

    // (specimen, ultimate strength, baseline resonance in kHz)
    let specimens = [
        ("350 Slag-1", 38.0, 420.0),
        ("350 Slag-2", 36.5, 430.0),
        ("450 OPC-1", 52.0, 380.0),
        ("450 OPC-2", 49.0, 390.0),
    ];

    let mut store = MemoryStore::new();
    for (name, ultimate, base_peak) in specimens {
        let n = CURING_DAYS.len();
        let mut real = Array2::zeros((n, N_FREQUENCIES));
        let mut imag = Array2::zeros((n, N_FREQUENCIES));
        let mut real_b = Array2::zeros((n, N_FREQUENCIES));
        let mut imag_b = Array2::zeros((n, N_FREQUENCIES));
        let mut labels = Vec::with_capacity(n);
        let mut temps = Vec::with_capacity(n);

        for (row, &age) in CURING_DAYS.iter().enumerate() {
            let mpa = strength(age, ultimate);
            // Stiffer concrete pushes the resonance up and damps it.
            let peak = base_peak + 4.0 * mpa;
            let (r, i) = sweep(&freqs, peak, 2.0 - mpa / 60.0, 0.01, &mut rng);
            let (rb, ib) = sweep(&freqs, base_peak, 2.0, 0.01, &mut rng);

            real.row_mut(row).assign(&Array1::from(r));
            imag.row_mut(row).assign(&Array1::from(i));
            real_b.row_mut(row).assign(&Array1::from(rb));
            imag_b.row_mut(row).assign(&Array1::from(ib));
            labels.push(mpa);
            temps.push(20.0 + rng.gen_range(-2.0..2.0));
        }

        store.insert(name, AGE, Array1::from(CURING_DAYS.to_vec()).into_dyn());
        store.insert(name, LABEL, Array1::from(labels).into_dyn());
        store.insert(name, TEMP, Array1::from(temps).into_dyn());
        store.insert(name, CON_SENSOR_I, imag.into_dyn());
        store.insert(name, CON_SENSOR_IB, imag_b.into_dyn());
        store.insert(name, CON_SENSOR_R, real.into_dyn());
        store.insert(name, CON_SENSOR_RB, real_b.into_dyn());
    }

    let json_path = Path::new("sample_emi.json");
    write_json_store(&store, json_path).context("writing JSON store")?;
    let parquet_path = Path::new("sample_emi.parquet");
    write_parquet_store(&store, parquet_path).context("writing Parquet store")?;

    println!(
        "Wrote {} specimens × {} curing ages ({} frequencies each) to {} and {}",
        store.len(),
        CURING_DAYS.len(),
        N_FREQUENCIES,
        json_path.display(),
        parquet_path.display()
    );
    Ok(())
}
