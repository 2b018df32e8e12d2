//! One-shot command line client: builds the index in-process and answers a single query.
//!
//! Usage: `rag [--top-k N] [--no-index] <query...>`

use anyhow::{anyhow, Result};
use dotenv::dotenv;

use product_rag::{AppState, Config};

struct Args {
    top_k: Option<usize>,
    build_index: bool,
    query: String,
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Args> {
    let mut top_k = None;
    let mut build_index = true;
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--top-k" | "-k" => {
                let value = args.next().ok_or_else(|| anyhow!("--top-k needs a value"))?;
                let k: usize = value
                    .parse()
                    .map_err(|_| anyhow!("invalid --top-k value: {}", value))?;
                if k == 0 {
                    return Err(anyhow!("--top-k must be at least 1"));
                }
                top_k = Some(k);
            }
            "--no-index" => build_index = false,
            _ => words.push(arg),
        }
    }

    if words.is_empty() {
        return Err(anyhow!("usage: rag [--top-k N] [--no-index] <query...>"));
    }

    Ok(Args {
        top_k,
        build_index,
        query: words.join(" "),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = parse_args(std::env::args().skip(1))?;
    let config = Config::load()?;
    let mut state = AppState::from_config(&config)?;
    if let Some(top_k) = args.top_k {
        state = state.with_top_k(top_k);
    }

    if args.build_index {
        let count = state.index().initialize(state.catalog.products()).await?;
        println!("Added {} documents to knowledge base", count);
    }

    let outcome = match state.queries.handle_search(&args.query).await {
        Ok(outcome) => outcome,
        Err(failure) => return Err(anyhow!("Search failed: {}", failure.error)),
    };

    println!("Query: {}", args.query);
    println!("Answer: {}", outcome.response);

    if outcome.rag_ready {
        println!("\nMatched products:");
        for matched in &outcome.products {
            println!(
                "Score: {:.3}, Product: {} (${})",
                matched.similarity, matched.product.name, matched.product.price
            );
        }
    } else {
        println!("\n(answered without product context)");
    }

    Ok(())
}
