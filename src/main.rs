//! Command-line shell over the catalog: one command per invocation,
//! tab-separated output on stdout.

use std::path::PathBuf;

use checksummer::{
    catalog::{Catalog, CatalogError, FileRecord, Listing},
    config::{self, AppConfig},
    logging,
    scanner::{Pipeline, set_base_path},
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let app_config = config::load_or_default().map_err(|err| err.to_string())?;
    let catalog_path = match options.catalog_path {
        Some(path) => path,
        None => app_config
            .resolved_catalog_path()
            .map_err(|err| err.to_string())?,
    };
    let mut catalog = Catalog::open(&catalog_path).map_err(|err| err.to_string())?;
    execute(&mut catalog, &app_config, options.command).map_err(|err| err.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    SetBasePath(PathBuf),
    BasePath,
    Summary,
    Collect,
    Check,
    MakeChecksums,
    ReindexCheck,
    RankSize,
    RankMtime,
    Duplicates,
    Deleted,
    Changed,
    Search(String),
    PruneDeleted,
    PruneChanged,
}

#[derive(Debug, Clone)]
struct CliOptions {
    catalog_path: Option<PathBuf>,
    command: Command,
}

fn execute(
    catalog: &mut Catalog,
    app_config: &AppConfig,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = app_config.pipeline_settings();
    match command {
        Command::SetBasePath(path) => {
            let stored = set_base_path(catalog, &path)?;
            println!("{}", stored.display());
        }
        Command::BasePath => match catalog.base_path()? {
            Some(path) => println!("{}", path.display()),
            None => return Err("No base path set; run `checksummer set-basepath <dir>`".into()),
        },
        Command::Summary => {
            let summary = catalog.summary()?;
            let base = summary
                .base_path
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            println!("catalog\t{}", catalog.path().display());
            println!("basepath\t{base}");
            println!("records\t{}", summary.records);
            println!("bytes\t{}", summary.total_size);
            println!("deleted\t{}", summary.deleted);
            println!("changed\t{}", summary.changed);
            println!("verified\t{}", summary.verified);
            println!("pending_checksums\t{}", summary.pending_checksums);
        }
        Command::Collect => {
            let stats = Pipeline::new(catalog, settings).collect()?;
            println!("inserted\t{}", stats.inserted);
            println!("already_cataloged\t{}", stats.already_cataloged);
            println!("skipped\t{}", stats.skipped);
        }
        Command::Check => {
            let stats = Pipeline::new(catalog, settings).check()?;
            println!("found\t{}", stats.found);
            println!("missing\t{}", stats.missing);
        }
        Command::MakeChecksums => {
            let stats = Pipeline::new(catalog, settings).make_checksums()?;
            println!("hashed\t{}", stats.hashed);
            println!("missing\t{}", stats.missing);
        }
        Command::ReindexCheck => {
            let stats = Pipeline::new(catalog, settings).reindex_check()?;
            println!("inserted\t{}", stats.collect.inserted);
            println!("missing\t{}", stats.reconcile.missing + stats.missing);
            println!("ok\t{}", stats.ok);
            println!("changed\t{}", stats.changed);
        }
        Command::RankSize => print_records(catalog.rank_by_size())?,
        Command::RankMtime => print_records(catalog.rank_by_mtime())?,
        Command::Deleted => print_records(catalog.show_deleted())?,
        Command::Changed => print_records(catalog.show_changed())?,
        Command::Search(term) => print_records(catalog.search(&term))?,
        Command::Duplicates => {
            for group in catalog.list_duplicates() {
                let group = group?;
                println!("{}\t{}\t{}", group.checksum, group.count, group.total_size);
                for path in group.paths {
                    println!("\t{path}");
                }
            }
        }
        Command::PruneDeleted => println!("removed\t{}", catalog.prune_deleted()?),
        Command::PruneChanged => println!("reset\t{}", catalog.prune_changed()?),
    }
    Ok(())
}

fn print_records(records: Listing<'_, FileRecord>) -> Result<(), CatalogError> {
    for record in records {
        let record = record?;
        println!(
            "{}\t{}\t{}\t{}",
            record.size.map(|size| size.to_string()).unwrap_or_default(),
            record.mtime.map(|mtime| mtime.to_string()).unwrap_or_default(),
            record.checksum.unwrap_or_default(),
            record.path
        );
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut catalog_path: Option<PathBuf> = None;
    let mut positional = Vec::new();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--catalog" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--catalog requires a value".to_string())?;
                catalog_path = Some(PathBuf::from(value));
            }
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            value => positional.push(value.to_string()),
        }
        idx += 1;
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        return Err(help_text());
    };
    let mut operand = |what: &str| {
        positional
            .next()
            .ok_or_else(|| format!("{name} requires {what}"))
    };
    let command = match name.as_str() {
        "set-basepath" => Command::SetBasePath(PathBuf::from(operand("a directory")?)),
        "basepath" => Command::BasePath,
        "summary" => Command::Summary,
        "collect" => Command::Collect,
        "check" => Command::Check,
        "make-checksums" => Command::MakeChecksums,
        "reindex-check" => Command::ReindexCheck,
        "rank-size" => Command::RankSize,
        "rank-mtime" => Command::RankMtime,
        "duplicates" => Command::Duplicates,
        "deleted" => Command::Deleted,
        "changed" => Command::Changed,
        "search" => Command::Search(operand("a search term")?),
        "prune-deleted" => Command::PruneDeleted,
        "prune-changed" => Command::PruneChanged,
        unknown => return Err(format!("Unknown command: {unknown}\n\n{}", help_text())),
    };
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {extra}"));
    }
    Ok(Some(CliOptions {
        catalog_path,
        command,
    }))
}

fn help_text() -> String {
    [
        "checksummer",
        "",
        "Usage:",
        "  checksummer [--catalog <path>] <command>",
        "",
        "Commands:",
        "  set-basepath <dir>  store the directory the catalog tracks",
        "  basepath            print the stored base directory",
        "  summary             catalog location and record, byte and status counts",
        "  collect             walk the base directory and add new files",
        "  check               re-stat cataloged files and flag missing ones",
        "  make-checksums      hash files that have no checksum yet",
        "  reindex-check       collect, check, hash, then verify every checksum",
        "  rank-size           files by size, largest first",
        "  rank-mtime          present files, newest first",
        "  duplicates          checksums shared by several files",
        "  deleted             files missing on disk",
        "  changed             files whose content no longer matches",
        "  search <term>       files whose path contains <term>",
        "  prune-deleted       forget missing files",
        "  prune-changed       clear results for changed files so they are rehashed",
    ]
    .join("\n")
}
