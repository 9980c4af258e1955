use std::{
    fs::File,
    io::{self, BufReader, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use keystone_core::FeatureTable;
use keystone_evaluator::{
    classifier::SoftmaxClassifier,
    engine::{EngineBuilder, EngineConfig, InferenceEngine},
};

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }

    /// Writes one CSV row per item, with a header row.
    pub fn write_csv<I, T>(&mut self, rows: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: serde::Serialize,
    {
        let display_path = self.display_path();
        let mut writer = csv::Writer::from_writer(&mut *self);
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("Failed to write CSV row to {display_path}"))?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush output to {display_path}"))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Reads a feature table. Files ending in `.json` are parsed as JSON, anything else as CSV.
pub fn read_feature_table<P>(path: P) -> anyhow::Result<FeatureTable>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open feature table: {}", path.display()))?;
    let reader = BufReader::new(file);

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let table = if is_json {
        FeatureTable::from_json_reader(reader)
    } else {
        FeatureTable::from_csv_reader(reader)
    }
    .with_context(|| format!("Failed to parse feature table: {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        seasons = table.len(),
        columns = table.columns().len(),
        "loaded feature table"
    );
    Ok(table)
}

pub fn read_model<P>(path: P) -> anyhow::Result<SoftmaxClassifier>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open model: {}", path.display()))?;
    let model = SoftmaxClassifier::from_json_reader(BufReader::new(file))
        .with_context(|| format!("Failed to load model: {}", path.display()))?;
    Ok(model)
}

/// The configuration file if given, the defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => read_json_file("engine config", path),
        None => Ok(EngineConfig::default()),
    }
}

/// Parses a usage rate argument. Only positive finite numbers are accepted.
pub fn parse_usage(s: &str) -> Result<f32, String> {
    let usage = s
        .parse::<f32>()
        .map_err(|e| format!("`{s}` is not a number: {e}"))?;
    if !usage.is_finite() || usage <= 0.0 {
        return Err(format!("usage must be a positive finite number, got `{s}`"));
    }
    Ok(usage)
}

/// Inputs shared by every command that builds an engine.
#[derive(Debug, Clone, clap::Args)]
pub struct EngineArgs {
    /// Feature table of the reference population (CSV, or JSON for `.json`)
    #[arg(long)]
    pub features: PathBuf,
    /// Trained classifier artifact (JSON)
    #[arg(long)]
    pub model: PathBuf,
    /// Engine configuration (JSON); defaults when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl EngineArgs {
    /// Loads every input and builds the engine. Returns the table too so
    /// callers can look seasons up in it.
    pub fn build(&self) -> anyhow::Result<(InferenceEngine, FeatureTable)> {
        let config = load_config(self.config.as_deref())?;
        let table = read_feature_table(&self.features)?;
        let model = read_model(&self.model)?;
        let engine = EngineBuilder::new(config, Arc::new(model))
            .build(&table)
            .context("Failed to build inference engine")?;
        Ok((engine, table))
    }
}
