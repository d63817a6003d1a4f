use clap::Parser;
use fewshot::{
    Corpus,
    Retriever,
    cli::{Cli, Command, StoreKind},
    error,
    fingerprint::fingerprint,
    index_cache,
    ranker::RankedExemplar,
    store::CacheStore,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("FEWSHOT_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let corpus = || match &cli.corpus {
        Some(path) => Corpus::from_json_file(path),
        None => Ok(Corpus::builtin()),
    };
    let store = || cli.store.open(cli.cache_dir.as_deref());

    match &cli.command {
        Command::Retrieve(args) => {
            let store = store();
            let retriever = Retriever::with_store(corpus()?, store.as_ref())?;
            let ranked = retriever.rank(&args.query, args.count)?;
            if args.json {
                format_json(&ranked, &args.query)?;
            } else {
                format_human(&ranked);
            }
        }
        Command::Corpus(args) => {
            cmd_corpus(&corpus()?, args.json)?;
        }
        Command::Fingerprint => {
            println!("{}", fingerprint(&corpus()?));
        }
        Command::Status(args) => {
            let store = store();
            cmd_status(store.as_ref(), &corpus()?, cli.store, args.json)?;
        }
        Command::Rebuild => {
            let store = store();
            let retriever = Retriever::rebuild(corpus()?, store.as_ref())?;
            eprintln!(
                "Rebuilt {} exemplars, {} terms ({:?})",
                retriever.corpus().len(),
                retriever.vocabulary_size(),
                retriever.source()
            );
        }
        Command::Mcp => {
            let store = store();
            let retriever = Retriever::with_store(corpus()?, store.as_ref())?;
            fewshot::mcp::run_mcp(retriever)?;
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

fn format_human(ranked: &[RankedExemplar<'_>]) {
    for r in ranked {
        println!(
            "{:>3}. [{:.3}] #{} {}",
            r.rank, r.score, r.index, r.exemplar.intent
        );
        println!("     Question: {}", r.exemplar.question);
        println!("     Answer: {}", r.exemplar.answer);
    }
    println!("\n{} example(s)", ranked.len());
}

fn format_json(
    ranked: &[RankedExemplar<'_>],
    query: &str,
) -> error::Result<()> {
    let out = json!({
        "query": query,
        "result_count": ranked.len(),
        "results": serde_json::to_value(ranked)?,
    });
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_corpus(corpus: &Corpus, json: bool) -> error::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(corpus.as_slice())?);
    } else {
        for (i, e) in corpus.iter().enumerate() {
            println!("{i:>3}. [{}] {}", e.intent, e.question);
        }
        println!("\n{} exemplar(s)", corpus.len());
    }
    Ok(())
}

fn cmd_status(
    store: &dyn CacheStore,
    corpus: &Corpus,
    kind: StoreKind,
    json: bool,
) -> error::Result<()> {
    let status = index_cache::inspect(store, corpus);
    let backend = kind.name();

    if json {
        let out = json!({
            "location": status.location,
            "backend": backend,
            "exemplars": corpus.len(),
            "fingerprint": status.current.to_hex(),
            "stored_fingerprint": status.stored,
            "fresh": status.fresh,
        });
        println!("{}", serde_json::to_string(&out)?);
    } else {
        println!("Cache: {} ({backend})", status.location);
        println!("Exemplars: {}", corpus.len());
        println!("Fingerprint: {}", status.current);
        println!(
            "Stored: {}",
            status.stored.as_deref().unwrap_or("(none)")
        );
        println!("Fresh: {}", if status.fresh { "yes" } else { "no" });
    }
    Ok(())
}
