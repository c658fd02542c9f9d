// src/output.rs
use crate::types::{CertFinderError, LogDescriptor, OutputConfig, OutputFormat, ResolutionResult};
use csv::Writer as CsvWriter;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Default CSV destination
pub const DEFAULT_CSV_FILE: &str = "result.csv";

pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn format(&self) -> OutputFormat {
        self.config.format
    }

    /// Where results go: the configured file, `result.csv` for CSV output,
    /// stdout otherwise.
    pub fn target_path(&self) -> Option<PathBuf> {
        match (&self.config.file, self.config.format) {
            (Some(path), _) => Some(path.clone()),
            (None, OutputFormat::Csv) => Some(PathBuf::from(DEFAULT_CSV_FILE)),
            (None, OutputFormat::Text) => None,
        }
    }

    pub fn open_target(&self) -> Result<Box<dyn Write + Send>, CertFinderError> {
        match self.target_path() {
            Some(path) => {
                if let Some(parent) = Path::new(&path).parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| CertFinderError::OutputError(format!("Failed to create directory: {}", e)))?;
                }
                let file = File::create(&path)
                    .map_err(|e| CertFinderError::OutputError(format!("Failed to create {}: {}", path.display(), e)))?;
                Ok(Box::new(BufWriter::new(file)))
            }
            None => Ok(Box::new(io::stdout())),
        }
    }

    /// Unresolved output: one name per line, or a one column CSV.
    pub fn write_names<W: Write>(&self, writer: &mut W, names: &[String]) -> Result<(), CertFinderError> {
        if self.config.format == OutputFormat::Csv {
            let mut csv = CsvWriter::from_writer(&mut *writer);
            csv.write_record(["subdomain"]).map_err(csv_error)?;
            for name in names {
                csv.write_record([name]).map_err(csv_error)?;
            }
            csv.flush().map_err(output_error)?;
        } else {
            for name in names {
                writeln!(writer, "{}", name).map_err(output_error)?;
            }
        }
        writer.flush().map_err(output_error)
    }

    /// Drain a resolver stream, writing each result as it arrives. Returns
    /// `(results written, results with an address)`.
    pub async fn write_results<W: Write>(
        &self,
        writer: &mut W,
        mut results: mpsc::Receiver<ResolutionResult>,
    ) -> Result<(usize, usize), CertFinderError> {
        let mut written = 0;
        let mut resolved = 0;

        if self.config.format == OutputFormat::Csv {
            let mut csv = CsvWriter::from_writer(&mut *writer);
            csv.write_record(["subdomain", "a_record"]).map_err(csv_error)?;
            while let Some(result) = results.recv().await {
                if result.address.is_some() {
                    resolved += 1;
                }
                csv.write_record([result.subdomain.as_str(), result.address_string().as_str()])
                    .map_err(csv_error)?;
                written += 1;
            }
            csv.flush().map_err(output_error)?;
        } else {
            // Stream results to the terminal as they complete
            while let Some(result) = results.recv().await {
                if result.address.is_some() {
                    resolved += 1;
                }
                writeln!(writer, "{:<16}{}", result.address_string(), result.subdomain).map_err(output_error)?;
                writer.flush().map_err(output_error)?;
                written += 1;
            }
        }

        writer.flush().map_err(output_error)?;
        Ok((written, resolved))
    }
}

/// Table of the known CT logs shown before the selection prompt.
pub fn write_catalog<W: Write>(writer: &mut W, logs: &[LogDescriptor]) -> Result<(), CertFinderError> {
    writeln!(writer, "{:>9}  {:>12}  {:<11}  Log URL", "Selection", "Log size", "Status").map_err(output_error)?;
    writeln!(writer, "{:>9}  {:>12}  {:<11}  -------", "---------", "--------", "------").map_err(output_error)?;
    for log in logs {
        writeln!(
            writer,
            "{:>9}  {:>12}  {:<11}  {}",
            log.index,
            log.tree_size,
            log.status.to_string(),
            log.url
        )
        .map_err(output_error)?;
    }
    writer.flush().map_err(output_error)
}

fn output_error(e: io::Error) -> CertFinderError {
    CertFinderError::OutputError(e.to_string())
}

fn csv_error(e: csv::Error) -> CertFinderError {
    CertFinderError::OutputError(e.to_string())
}
