use std::env;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use sidfp::{
    Backend, BatchOptions, ContentId, ContentStore, Policy, SidfpConfig, compute_missing,
    pair_distances, rank,
};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: sidfp <config.yaml> <command>

commands:
  ingest <file>...          store each file as a new content record
  compute <bitshred|histogram|tlsh|ssdeep>
                            fill in missing fingerprints
  rank <bitshred|tlsh|ssdeep> <id> [k]
                            closest records to <id> in that backend
  distance <id> <id>...     histogram distance of every pair of ids";

fn init_logging(config: &SidfpConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.logging.level)
        .with_context(|| format!("invalid log level '{}'", config.logging.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn parse_id(raw: &str) -> Result<ContentId> {
    raw.parse()
        .with_context(|| format!("'{raw}' is not a content id"))
}

fn backend_named(name: &str, config: &SidfpConfig) -> Result<Backend> {
    let bitshred = config.bitshred.to_config()?;
    Ok(Backend::named(name, bitshred)?)
}

fn ingest(store: &dyn ContentStore, files: &[String]) -> Result<()> {
    if files.is_empty() {
        bail!("ingest needs at least one file");
    }
    for path in files {
        let payload = fs::read(path).with_context(|| format!("reading {path}"))?;
        let id = store.next_content_id()?;
        store.put_content(id, Some(&payload))?;
        println!("{id}\t{}\t{path}", payload.len());
    }
    Ok(())
}

fn run(args: &[String]) -> Result<()> {
    let [config_path, command, rest @ ..] = args else {
        bail!("{USAGE}");
    };

    let config = SidfpConfig::from_file(config_path)
        .with_context(|| format!("loading {config_path}"))?;
    init_logging(&config)?;
    let store = config.store.persistent_store_config()?.build()?;

    match (command.as_str(), rest) {
        ("ingest", files) => ingest(store.as_ref(), files)?,
        ("compute", [backend]) => {
            let backend = backend_named(backend, &config)?;
            let options: BatchOptions = config.batch.to_options();
            let report = compute_missing(store.as_ref(), &backend, &options)?;
            println!(
                "computed {} persisted {} skipped {} in {} pages",
                report.computed, report.persisted, report.skipped, report.pages
            );
        }
        ("rank", [backend, id, tail @ ..]) if tail.len() <= 1 => {
            let backend = backend_named(backend, &config)?;
            let query = parse_id(id)?;
            let policy = match tail.first() {
                Some(k) => Policy::top_k(k.parse().with_context(|| format!("'{k}' is not a count"))?),
                None => config.ranker.policy(),
            };
            let ranking = rank(
                store.as_ref(),
                &backend,
                query,
                policy,
                &config.ranker.to_options(),
            )?;
            if ranking.is_empty() {
                println!("no matches among {} candidates", ranking.scanned);
            }
            for hit in &ranking.matches {
                println!("{}\t{:.6}", hit.content_id, hit.score);
            }
        }
        ("distance", ids) if ids.len() >= 2 => {
            let ids = ids.iter().map(|raw| parse_id(raw)).collect::<Result<Vec<_>>>()?;
            for pair in pair_distances(store.as_ref(), &ids)? {
                println!("{}\t{}\t{:.6}", pair.lesser, pair.greater, pair.score);
            }
        }
        _ => bail!("{USAGE}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
