use std::fs;
use std::path::Path;
use std::time::Instant;

use showdown::prelude::*;
use showdown::streaming::progress::LOAD_PROGRESS_EVENT;
use tokio::runtime::Builder;

/// Ingestion hotpath profiling
///
/// Profiles a full load into in-memory stores so the time split between CSV
/// parsing, batching and document encoding is visible without network noise.
///
/// Run with: cargo run --release --bin hotpath_ingest --features profiling
#[hotpath::main]
fn main() {
    println!("=== Ingestion Hotpath Profile ===");
    println!("Workload: 5K users, 10K cards, 500K transactions");
    println!("Destinations: in-memory stand-ins for MongoDB and Elasticsearch");
    println!();

    let runtime = Builder::new_multi_thread().enable_all().build().unwrap();
    let dir = std::env::temp_dir().join(format!("showdown-hotpath-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    generate(&dir, 5_000, 2, 500_000).unwrap();

    println!("Starting profiled execution...");
    println!();

    let started = Instant::now();
    let result = runtime.block_on(run_load(&dir));
    let _ = fs::remove_dir_all(&dir);

    match result {
        Ok(summary) => println!(
            "Loaded {} users, {} cards, {} transactions in {:.2?}",
            summary.total_users,
            summary.total_cards,
            summary.total_transactions,
            started.elapsed()
        ),
        Err(e) => eprintln!("Load failed: {e}"),
    }

    println!();
    println!("Profiling complete. Results above show function-level breakdown.");
}

#[hotpath::measure]
async fn run_load(data_dir: &Path) -> Result<LoadSummary, LoadFailure> {
    let notifier = LogNotifier;
    let writer = DualSinkWriter::new(InMemorySink::mongodb(), InMemorySink::elasticsearch());
    let mut pipeline = IngestionPipeline::new(writer, LoadOptions::default())
        .with_progress(ProgressReporter::new(Notifications::new(notifier)));

    println!("Progress notifications are logged as `{LOAD_PROGRESS_EVENT}`");
    pipeline.run(data_dir).await
}

#[hotpath::measure]
fn generate(
    dir: &Path,
    num_users: usize,
    cards_per_user: usize,
    num_transactions: usize,
) -> csv::Result<()> {
    let mut users = csv::Writer::from_path(dir.join("users_data.csv"))?;
    users.write_record(["id", "current_age", "gender", "per_capita_income"])?;
    for i in 0..num_users {
        users.write_record([
            i.to_string(),
            (20 + i % 60).to_string(),
            "Female".to_string(),
            format!("${}", 20_000 + i % 50_000),
        ])?;
    }
    users.flush()?;

    let mut cards = csv::Writer::from_path(dir.join("cards_data.csv"))?;
    cards.write_record(["id", "client_id", "card_brand", "has_chip", "num_cards_issued", "credit_limit"])?;
    for i in 0..num_users * cards_per_user {
        cards.write_record([
            i.to_string(),
            (i / cards_per_user).to_string(),
            "Visa".to_string(),
            "YES".to_string(),
            "2".to_string(),
            format!("${}", 5_000 + i % 20_000),
        ])?;
    }
    cards.flush()?;

    let mut transactions = csv::Writer::from_path(dir.join("transactions_data.csv"))?;
    transactions.write_record([
        "id",
        "date",
        "client_id",
        "card_id",
        "amount",
        "use_chip",
        "merchant_city",
        "merchant_state",
    ])?;
    for i in 0..num_transactions {
        transactions.write_record([
            (7_475_327 + i).to_string(),
            format!("2010-01-{:02} {:02}:00:00", 1 + i % 28, i % 24),
            (i % num_users).to_string(),
            (i % (num_users * cards_per_user)).to_string(),
            format!("${}.{:02}", i % 1_200, i % 100),
            "Swipe Transaction".to_string(),
            if i % 3 == 0 { "San Jose" } else { "Beulah" }.to_string(),
            "CA".to_string(),
        ])?;
    }
    transactions.flush()?;

    Ok(())
}
