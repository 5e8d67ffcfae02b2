use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use folio_search::config::CONFIG;
use folio_search::{InMemoryDocument, SearchEngine, SearchOutcome, SearchResultSet, SearchSession};

/// Search a paged text dump (pages separated by form feeds, as written by
/// `pdftotext`) for every occurrence of a query.
#[derive(Parser, Debug)]
#[command(name = "folio-search", version)]
struct Args {
    /// Text dump of the document
    file: PathBuf,

    /// Text to look for (case-insensitive)
    query: String,

    /// Match to select, 0-based
    #[arg(long, default_value_t = 0)]
    select: usize,

    /// Characters of context on each side of a match
    #[arg(long)]
    radius: Option<usize>,

    /// Print the result set as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Also picks up `log` records emitted by the library.
    tracing_subscriber::fmt()
        .with_max_level(CONFIG.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let start = Instant::now();

    let document = InMemoryDocument::open(&args.file)
        .await
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    tracing::info!(pages = document.len(), "loaded {}", args.file.display());

    let mut engine = SearchEngine::from_config();
    if let Some(radius) = args.radius {
        engine = engine.with_snippet_radius(radius);
    }
    let session = SearchSession::new(Arc::new(document), engine);

    let outcome = session.search(&args.query).await;
    if let Some(summary) = outcome.summary(&args.query) {
        tracing::info!("{summary} in {}ms", start.elapsed().as_millis());
    }

    match outcome {
        SearchOutcome::Populated { results, .. } => {
            session.jump_to(args.select)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            let selected = session.cursor().map(|c| c.index());
            for (i, m) in results.iter().enumerate() {
                let marker = if Some(i) == selected { '>' } else { ' ' };
                println!(
                    "{marker}[{i}] page {} @ {}: {}",
                    m.page_number, m.char_offset, m.snippet
                );
            }
        }
        SearchOutcome::Empty { .. } => {
            if args.json {
                let empty = SearchResultSet::empty(args.query.as_str());
                println!("{}", serde_json::to_string_pretty(&empty)?);
            }
        }
        SearchOutcome::Cancelled { .. } => bail!("search was cancelled"),
        SearchOutcome::Failed {
            page_number, cause, ..
        } => match page_number {
            Some(page) => bail!("search failed on page {page}: {cause}"),
            None => bail!("search failed: {cause}"),
        },
    }
    Ok(())
}
