use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use storage::{
    BsonCodec, DocumentCodec, ExtentWalker, MappedFileSet, NamespaceCatalog, RecordWalker,
    RecoveryScanner, RecoverySummary, ScanEvent, ScanOptions,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mdbundo")]
#[command(about = "Recover documents from an offline storage directory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write documents to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum, default_value_t = Format::Raw)]
    format: Format,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover deleted documents of a collection from its free lists
    Undo {
        dbpath: PathBuf,
        dbname: String,
        colname: String,
        /// Print a JSON summary of the scan to stderr
        #[arg(long)]
        summary: bool,
        #[arg(long)]
        max_chain_hops: Option<usize>,
    },
    /// Write the live documents of a collection
    Dump {
        dbpath: PathBuf,
        dbname: String,
        colname: String,
    },
    /// List the namespaces and data files of a database
    Namespaces { dbpath: PathBuf, dbname: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Concatenated BSON documents
    Raw,
    /// One relaxed extended JSON document per line
    Json,
}

#[derive(Debug, thiserror::Error)]
enum Fatal {
    #[error("failed to load database")]
    OpenDatabase,
    #[error("failed to locate namespaces")]
    EnumerateNamespaces,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Undo {
            dbpath,
            dbname,
            colname,
            summary,
            max_chain_hops,
        } => undo(
            &dbpath,
            &dbname,
            &colname,
            cli.output.as_deref(),
            cli.format,
            summary,
            ScanOptions { max_chain_hops },
        ),
        Commands::Dump {
            dbpath,
            dbname,
            colname,
        } => dump(&dbpath, &dbname, &colname, cli.output.as_deref(), cli.format),
        Commands::Namespaces { dbpath, dbname } => list_namespaces(&dbpath, &dbname),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(exit_status(&err))
        }
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Fatal>() {
        Some(Fatal::OpenDatabase) => 2,
        Some(Fatal::EnumerateNamespaces) => 3,
        None => 1,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("MDBUNDO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_database(dbpath: &Path, dbname: &str) -> anyhow::Result<MappedFileSet> {
    let files = MappedFileSet::open(dbpath, dbname).context(Fatal::OpenDatabase)?;
    if NamespaceCatalog::new(&files).iter().next().is_none() {
        return Err(anyhow::anyhow!(
            "no namespaces in {:?}",
            files.namespace_file().path()
        ))
        .context(Fatal::EnumerateNamespaces);
    }
    info!(
        dbpath = %dbpath.display(),
        data_files = files.data_files().len(),
        "opened database {}",
        dbname
    );
    Ok(files)
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating output {:?}", path))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    })
}

fn write_document(out: &mut dyn Write, format: Format, bytes: &[u8]) -> anyhow::Result<()> {
    match format {
        Format::Raw => out.write_all(bytes)?,
        Format::Json => {
            let document = match bson::Document::from_reader_utf8_lossy(bytes) {
                Ok(document) => document,
                Err(err) => {
                    warn!(len = bytes.len(), "skipping document with no JSON form: {}", err);
                    return Ok(());
                }
            };
            let value = bson::Bson::Document(document).into_relaxed_extjson();
            serde_json::to_writer(&mut *out, &value)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn undo(
    dbpath: &Path,
    dbname: &str,
    colname: &str,
    output: Option<&Path>,
    format: Format,
    print_summary: bool,
    options: ScanOptions,
) -> anyhow::Result<()> {
    let namespace = format!("{}.{}", dbname, colname);
    let files = open_database(dbpath, dbname)?;
    let scanner = RecoveryScanner::new(&files).with_options(options);
    let mut out = open_output(output)?;

    let mut summary = RecoverySummary::new(&namespace);
    let mut recovery = scanner.recover(&namespace)?;
    for event in recovery.by_ref() {
        summary.record(&event);
        match event {
            ScanEvent::Recovered { document, .. } => {
                write_document(&mut out, format, document.as_bytes())?;
            }
            ScanEvent::Failed {
                bucket,
                location,
                kind,
                reason,
            } => {
                warn!(bucket, %location, ?kind, "failed to load document: {}", reason);
            }
            ScanEvent::Truncated {
                bucket,
                location,
                cause,
            } => {
                warn!(bucket, %location, ?cause, "free-list chain truncated");
            }
        }
    }
    out.flush()?;
    summary.namespaces_matched = recovery.namespaces_matched();

    if summary.namespaces_matched == 0 {
        warn!("no namespace named {}", namespace);
    }
    info!(
        documents = summary.documents,
        failures = summary.failures,
        truncations = summary.truncations,
        "recovery finished"
    );
    if print_summary {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn dump(
    dbpath: &Path,
    dbname: &str,
    colname: &str,
    output: Option<&Path>,
    format: Format,
) -> anyhow::Result<()> {
    let namespace = format!("{}.{}", dbname, colname);
    let files = open_database(dbpath, dbname)?;
    let extents = ExtentWalker::new(&files);
    let records = RecordWalker::new(&files);
    let mut out = open_output(output)?;

    let mut count = 0usize;
    for entry in NamespaceCatalog::new(&files).find(&namespace)? {
        let details = entry.details()?;
        for extent in extents.extents(&details) {
            let extent = extent.with_context(|| format!("walking extents of {}", namespace))?;
            if extent.namespace() != namespace.as_bytes() {
                warn!(
                    location = %extent.location(),
                    owner = %String::from_utf8_lossy(extent.namespace()),
                    "extent belongs to another namespace"
                );
            }
            for record in records.records(&extent) {
                let record = record
                    .with_context(|| format!("walking records of {:?}", extent.location()))?;
                let document = record.document()?;
                BsonCodec
                    .validate(document)
                    .with_context(|| format!("invalid document at {}", record.location()))?;
                write_document(&mut out, format, document)?;
                count += 1;
            }
        }
    }
    out.flush()?;
    info!(documents = count, "dumped {}", namespace);
    Ok(())
}

fn list_namespaces(dbpath: &Path, dbname: &str) -> anyhow::Result<()> {
    let files = open_database(dbpath, dbname)?;

    let mut rows = Vec::new();
    for entry in NamespaceCatalog::new(&files).iter() {
        let details = entry.details()?;
        rows.push([
            entry.name_lossy().into_owned(),
            details.record_count.to_string(),
            details.data_size.to_string(),
            details.index_count.to_string(),
            details.occupied_buckets().count().to_string(),
            format!("{:?}", details.first_extent),
        ]);
    }
    print_table(
        &["namespace", "records", "bytes", "indexes", "free buckets", "first extent"],
        &rows,
    );

    println!();
    for file in files.data_files() {
        match files.data_file_header(file.file_number()) {
            Ok(header) => println!(
                "{:?}: version {}.{}, {} bytes",
                file.path(),
                header.version,
                header.version_minor,
                file.len()
            ),
            Err(err) => println!("{:?}: {}", file.path(), err),
        }
    }
    Ok(())
}

fn print_table<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("{}", line(headers.to_vec()));
    println!(
        "{}",
        widths
            .iter()
            .map(|&width| "-".repeat(width))
            .collect::<Vec<_>>()
            .join("-|-")
    );
    for row in rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    println!("\n({} namespaces)", rows.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_namespace_file_exits_2() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("test.0"), vec![0u8; 8192])?;

        let err = open_database(temp_dir.path(), "test").unwrap_err();
        assert_eq!(exit_status(&err), 2);

        Ok(())
    }

    #[test]
    fn empty_catalog_exits_3() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("test.ns"), vec![0u8; 628 * 4])?;
        fs::write(temp_dir.path().join("test.0"), vec![0u8; 8192])?;

        let err = open_database(temp_dir.path(), "test").unwrap_err();
        assert_eq!(exit_status(&err), 3);

        fs::write(temp_dir.path().join("test.ns"), b"")?;
        let err = open_database(temp_dir.path(), "test").unwrap_err();
        assert_eq!(exit_status(&err), 3);

        Ok(())
    }

    #[test]
    fn other_failures_exit_1() {
        let err = anyhow::anyhow!("disk full").context("writing output");
        assert_eq!(exit_status(&err), 1);
    }

    #[test]
    fn json_output_replaces_invalid_utf8() -> anyhow::Result<()> {
        let mut bytes = Vec::new();
        doc! { "s": "AB", "n": 2i32 }.to_writer(&mut bytes)?;
        let at = bytes.windows(3).position(|w| w == b"AB\0").unwrap();
        bytes[at] = 0xFF;

        let mut out = Vec::new();
        write_document(&mut out, Format::Json, &bytes)?;
        let line: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(line["s"], "\u{FFFD}B");
        assert_eq!(line["n"], 2);

        Ok(())
    }

    #[test]
    fn json_output_skips_undecodable_documents() -> anyhow::Result<()> {
        let mut bytes = Vec::new();
        doc! { "b": true }.to_writer(&mut bytes)?;
        bytes[4] = 0x42;

        let mut out = Vec::new();
        write_document(&mut out, Format::Json, &bytes)?;
        assert!(out.is_empty());

        Ok(())
    }
}
