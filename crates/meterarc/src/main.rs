use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use meterarc_core::timeutils::{format_timestamp, now_utc, parse_range, parse_timestamp};
use meterarc_core::{
    Archive, ArchiveKind, Config, FieldKind, Group, Interval, Quantity, RowSource, RowsQuery,
    SqliteStore, StoreMode, SyntheticArchive,
};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use time::OffsetDateTime;
use tracing::info;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "meterarc: measurement archive query tool")]
struct Args {
    /// Path to config TOML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the SQLite store path
    #[arg(long)]
    db: Option<PathBuf>,
    /// Use the synthetic generator regardless of the configured mode
    #[arg(long)]
    synthetic: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List known groups
    Groups,
    /// Print the overall data interval of a group's archive
    Interval {
        #[arg(long)]
        group: String,
        #[arg(long, default_value = "main")]
        arch: String,
    },
    /// List the quantities a group's archive carries
    Quantities {
        #[arg(long)]
        group: String,
        #[arg(long, default_value = "main")]
        arch: String,
    },
    /// Export decoded rows
    Rows {
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        arch: Option<String>,
        /// Comma separated property names
        #[arg(long)]
        quantities: Option<String>,
        /// RFC 3339 timestamp, or a duration back from now (e.g. 2h)
        #[arg(long)]
        since: Option<String>,
        /// RFC 3339 timestamp, or a duration back from now
        #[arg(long)]
        until: Option<String>,
        /// Saved query from the config to use as defaults
        #[arg(long)]
        preset: Option<String>,
        /// table, csv or json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Load rows from a CSV file into the SQLite store
    Ingest {
        #[arg(long)]
        group: String,
        #[arg(long, default_value = "main")]
        arch: String,
        /// Group display name, used when the group is created
        #[arg(long)]
        name: Option<String>,
        /// CSV with a `timestamp` column followed by one column per property
        file: PathBuf,
    },
}

enum Source {
    Sqlite(SqliteStore),
    Synthetic(SyntheticArchive),
}

impl Source {
    fn as_row_source(&self) -> &dyn RowSource {
        match self {
            Source::Sqlite(store) => store,
            Source::Synthetic(generator) => generator,
        }
    }

    fn groups(&self) -> Result<Vec<Group>> {
        match self {
            Source::Sqlite(store) => Ok(store.groups()?),
            Source::Synthetic(generator) => Ok(generator.groups().to_vec()),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(db) = &args.db {
        config.store.path = db.clone();
    }
    if args.synthetic {
        config.store.mode = StoreMode::Synthetic;
    }

    init_logging(&config)?;

    let source = open_source(&config)?;
    match &args.command {
        Command::Groups => cmd_groups(&source),
        Command::Interval { group, arch } => cmd_interval(&source, group, arch),
        Command::Quantities { group, arch } => cmd_quantities(&source, group, arch),
        Command::Rows {
            group,
            arch,
            quantities,
            since,
            until,
            preset,
            format,
        } => cmd_rows(
            &config, &source, group, arch, quantities, since, until, preset, format,
        ),
        Command::Ingest {
            group,
            arch,
            name,
            file,
        } => cmd_ingest(&source, group, arch, name.as_deref(), file),
    }
}

fn open_source(config: &Config) -> Result<Source> {
    match config.store.mode {
        StoreMode::Sqlite => {
            info!("opening archive store at {:?}", config.store.path);
            Ok(Source::Sqlite(SqliteStore::connect(&config.store.path)?))
        }
        StoreMode::Synthetic => {
            info!("using synthetic archive, seed {}", config.synthetic.seed);
            Ok(Source::Synthetic(config.synthetic.build()?))
        }
    }
}

fn cmd_groups(source: &Source) -> Result<()> {
    for group in source.groups()? {
        println!("{}  {}", group.id, group.name);
    }
    Ok(())
}

fn cmd_interval(source: &Source, group: &str, arch: &str) -> Result<()> {
    let (group, arch) = parse_target(group, arch)?;
    let archive = Archive::new(source.as_row_source(), group, arch);
    match archive.fetch_interval()? {
        Some(interval) => {
            let start = interval.start.map(format_timestamp).unwrap_or_default();
            let end = interval.end.map(format_timestamp).unwrap_or_default();
            println!("{start} .. {end}");
        }
        None => println!("no data"),
    }
    Ok(())
}

fn cmd_quantities(source: &Source, group: &str, arch: &str) -> Result<()> {
    let (group, arch) = parse_target(group, arch)?;
    let archive = Archive::new(source.as_row_source(), group, arch);
    let range = match archive.fetch_interval()? {
        Some(interval) => interval.to_date_range()?,
        None => {
            println!("no data");
            return Ok(());
        }
    };
    for quantity in archive.fetch_quantities(range)? {
        match &quantity.unit {
            Some(unit) => println!("{} [{unit}]", quantity.property),
            None => println!("{}", quantity.property),
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_rows(
    config: &Config,
    source: &Source,
    group: &Option<String>,
    arch: &Option<String>,
    quantities: &Option<String>,
    since: &Option<String>,
    until: &Option<String>,
    preset: &Option<String>,
    format: &str,
) -> Result<()> {
    let preset = match preset {
        Some(name) => Some(
            config
                .presets
                .get(name)
                .with_context(|| format!("no preset named {name}"))?,
        ),
        None => None,
    };

    let group_str = group
        .clone()
        .or_else(|| preset.and_then(|p| p.group.clone()))
        .or_else(|| default_group(source))
        .context("no group given and none available")?;
    let arch_str = arch
        .clone()
        .or_else(|| preset.map(|p| p.arch.clone()))
        .unwrap_or_else(|| "main".into());
    let (group, arch) = parse_target(&group_str, &arch_str)?;

    let names: Vec<String> = match quantities {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => preset.map(|p| p.quantities.clone()).unwrap_or_default(),
    };
    if names.is_empty() {
        bail!("no quantities requested");
    }
    let requested: Vec<Quantity> = names
        .iter()
        .map(|n| Quantity::new(n.clone(), None))
        .collect();

    let start = match since {
        Some(s) => Some(parse_bound(s)?),
        None => match preset.map(|p| p.range()).transpose()?.flatten() {
            Some(back) => Some(now_utc() - back),
            None => None,
        },
    };
    let end = until.as_deref().map(parse_bound).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            bail!("--since is after --until");
        }
    }
    let interval = Interval::new(start, end);

    let archive = Archive::new(source.as_row_source(), group, arch);
    let rows = archive.fetch_rows(&RowsQuery::new(requested, interval))?;

    match format {
        "table" => {
            println!("timestamp\t{}", names.iter().join("\t"));
            for (ts, values) in rows {
                println!(
                    "{}\t{}",
                    format_timestamp(ts),
                    values.iter().map(|v| v.to_string()).join("\t")
                );
            }
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            let mut header = vec!["timestamp".to_string()];
            header.extend(names.iter().cloned());
            writer.write_record(&header)?;
            for (ts, values) in rows {
                let mut record = vec![format_timestamp(ts)];
                record.extend(values.iter().map(|v| v.to_string()));
                writer.write_record(&record)?;
            }
            writer.flush()?;
        }
        "json" => {
            let entries: Vec<serde_json::Value> = rows
                .map(|(ts, values)| {
                    serde_json::json!({
                        "timestamp": format_timestamp(ts),
                        "values": values,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        other => bail!("unknown output format: {other}"),
    }
    Ok(())
}

fn default_group(source: &Source) -> Option<String> {
    source
        .groups()
        .ok()
        .and_then(|groups| groups.first().map(|g| g.id.to_string()))
}

fn cmd_ingest(
    source: &Source,
    group: &str,
    arch: &str,
    name: Option<&str>,
    file: &PathBuf,
) -> Result<()> {
    let store = match source {
        Source::Sqlite(store) => store,
        Source::Synthetic(_) => bail!("ingest requires the sqlite store"),
    };
    let (group_id, arch) = parse_target(group, arch)?;

    let mut reader = csv::Reader::from_path(file).with_context(|| format!("opening {file:?}"))?;
    let headers = reader.headers()?.clone();
    if headers.is_empty() || &headers[0] != "timestamp" {
        bail!("first CSV column must be `timestamp`");
    }
    let properties: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();
    if properties.is_empty() {
        bail!("no quantity columns in {file:?}");
    }

    store.put_group(&Group::new(group_id, name.unwrap_or("imported")))?;
    let defs: Vec<(Quantity, FieldKind)> = properties
        .iter()
        .map(|p| (Quantity::new(p.clone(), None), FieldKind::Float32))
        .collect();
    store.define_quantities(group_id, arch, &defs)?;

    let mut count = 0usize;
    for record in reader.records() {
        let record = record?;
        let ts = parse_timestamp(&record[0])?;
        let values: Vec<f32> = record
            .iter()
            .skip(1)
            .map(|v| v.parse::<f32>().with_context(|| format!("bad value {v}")))
            .collect::<Result<_>>()?;
        store.append_row(group_id, arch, ts, &values)?;
        count += 1;
    }
    info!("ingested {count} rows into {group_id}");
    println!("{count} rows");
    Ok(())
}

fn parse_target(group: &str, arch: &str) -> Result<(Uuid, ArchiveKind)> {
    let group = Uuid::parse_str(group).with_context(|| format!("invalid group id: {group}"))?;
    let arch: ArchiveKind = arch.parse()?;
    Ok((group, arch))
}

/// Accepts an RFC 3339 timestamp or a duration back from now ("2h").
fn parse_bound(s: &str) -> Result<OffsetDateTime> {
    if let Ok(ts) = parse_timestamp(s) {
        return Ok(ts);
    }
    let back = parse_range(s).with_context(|| format!("invalid time bound: {s}"))?;
    Ok(now_utc() - back)
}

fn init_logging(config: &Config) -> Result<()> {
    let writer: BoxMakeWriter = if let Some(path) = &config.logging.file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening log file at {:?}", path))?;
        let (writer, guard) = tracing_appender::non_blocking(file);
        static LOG_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
        let _ = LOG_GUARD.set(guard);
        BoxMakeWriter::new(writer)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.clone())
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_writer(writer)
        .finish()
        .try_init()
        .ok();
    Ok(())
}
