use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ndarray::{Array1, Array2};

use emi_dataset::analysis::{normalize_labels, train_test_split, Pca};
use emi_dataset::config::PipelineConfig;
use emi_dataset::data::store::open_store;
use emi_dataset::data::summary::summarize;
use emi_dataset::{layout_features, load_dataset, FeatureLayout, ReadMode};

#[derive(Parser)]
#[command(name = "emi-dataset")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with pipeline settings; flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List groups, dataset shapes and the age/strength/temperature series
    Inspect {
        path: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Project the feature matrix onto its principal components
    Pca {
        path: PathBuf,
        #[arg(long, value_enum)]
        layout: Option<FeatureLayout>,
        #[arg(long)]
        components: Option<usize>,
        /// CSV destination (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Split features and labels into train/test sets and report their shapes
    Split {
        path: PathBuf,
        #[arg(long, value_enum)]
        layout: Option<FeatureLayout>,
        #[arg(long)]
        test_fraction: Option<f64>,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Inspect { path, json } => inspect(&path, json),
        Commands::Pca {
            path,
            layout,
            components,
            out,
        } => {
            config.layout = layout.unwrap_or(config.layout);
            config.n_components = components.unwrap_or(config.n_components);
            config.projection_out = out.or(config.projection_out);
            pca(&path, &config)
        }
        Commands::Split {
            path,
            layout,
            test_fraction,
            seed,
        } => {
            config.layout = layout.unwrap_or(config.layout);
            config.test_fraction = test_fraction.unwrap_or(config.test_fraction);
            config.seed = seed.unwrap_or(config.seed);
            split(&path, &config)
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn inspect(path: &Path, json: bool) -> Result<()> {
    let summary = {
        let store = open_store(path).with_context(|| format!("opening {}", path.display()))?;
        summarize(store.as_ref()).context("inspecting store")?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

fn pca(path: &Path, config: &PipelineConfig) -> Result<()> {
    let mode = ReadMode::Selective(config.layout.required_names());
    let loaded = load_dataset(path, &mode)
        .with_context(|| format!("loading {} for layout {}", path.display(), config.layout))?;

    let x = layout_features(&loaded.merged, config.layout)?;
    let y = loaded.merged.labels()?;
    log::info!("Feature matrix {:?}, {} labels", x.dim(), y.len());

    let mut pca = Pca::new(config.n_components);
    let projected = pca.fit_transform(&x).context("fitting PCA")?;
    if let Some(ratio) = &pca.explained_variance_ratio {
        log::info!("Explained variance ratio: {ratio}");
    }

    match &config.projection_out {
        Some(out) => {
            let file = std::fs::File::create(out)
                .with_context(|| format!("creating {}", out.display()))?;
            write_projection(file, &projected, y)?;
            log::info!("Wrote {} projected samples to {}", projected.nrows(), out.display());
        }
        None => write_projection(std::io::stdout().lock(), &projected, y)?,
    }
    Ok(())
}

fn split(path: &Path, config: &PipelineConfig) -> Result<()> {
    let loaded = load_dataset(path, &ReadMode::Full)
        .with_context(|| format!("loading {}", path.display()))?;

    let x = layout_features(&loaded.merged, config.layout)?;
    let y = loaded.merged.labels()?;
    let parts = train_test_split(&x, y, config.test_fraction, config.seed)?;

    println!("Training Features Shape: {:?}", parts.x_train.dim());
    println!("Training Labels Shape: ({},)", parts.y_train.len());
    println!("Testing Features Shape: {:?}", parts.x_test.dim());
    println!("Testing Labels Shape: ({},)", parts.y_test.len());
    Ok(())
}

/// CSV with one row per sample: `pc1..pcN,label,label_norm`.
fn write_projection<W: Write>(out: W, projected: &Array2<f64>, labels: &Array1<f64>) -> Result<()> {
    if projected.nrows() != labels.len() {
        bail!(
            "{} projected rows but {} labels",
            projected.nrows(),
            labels.len()
        );
    }

    let mut writer = csv::Writer::from_writer(out);
    let mut header: Vec<String> = (1..=projected.ncols()).map(|k| format!("pc{k}")).collect();
    header.push("label".to_string());
    header.push("label_norm".to_string());
    writer.write_record(&header).context("writing CSV header")?;

    let normalized = normalize_labels(labels);
    for ((row, label), norm) in projected.rows().into_iter().zip(labels).zip(&normalized) {
        let mut record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        record.push(label.to_string());
        record.push(norm.to_string());
        writer.write_record(&record).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}
