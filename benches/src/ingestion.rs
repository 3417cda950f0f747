mod common;

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use futures::StreamExt;
use showdown::engine::OperationResult;
use showdown::io::RawTransactionRow;
use showdown::prelude::*;
use tokio::runtime::Runtime;

use common::generate_dataset;

/// Full load into in-memory stores across dataset sizes
fn bench_load_dataset_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_dataset_sizes");
    let runtime = Runtime::new().unwrap();

    for (size_name, num_users, num_transactions) in [
        ("small_1k", 100, 1_000),
        ("medium_10k", 1_000, 10_000),
        ("large_100k", 2_000, 100_000),
    ] {
        let data = generate_dataset(num_users, 2, num_transactions);
        group.throughput(Throughput::Elements(num_transactions as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size_name), &data, |b, data| {
            b.to_async(&runtime).iter_batched(
                || {
                    DualSinkWriter::new(InMemorySink::mongodb(), InMemorySink::elasticsearch())
                },
                |writer| async move {
                    let mut pipeline = IngestionPipeline::new(writer, LoadOptions::default());
                    black_box(pipeline.run(data.path()).await.unwrap());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

/// Same dataset, varying how many records go into each bulk write
fn bench_load_batch_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_batch_sizes");
    let runtime = Runtime::new().unwrap();
    let data = generate_dataset(500, 2, 20_000);

    for batch_size in [100, 1_000, 10_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &batch_size| {
                b.to_async(&runtime).iter_batched(
                    || {
                        DualSinkWriter::new(
                            InMemorySink::mongodb(),
                            InMemorySink::elasticsearch(),
                        )
                    },
                    |writer| {
                        let data = &data;
                        async move {
                            let options = LoadOptions {
                                batch_size,
                                ..LoadOptions::default()
                            };
                            let mut pipeline = IngestionPipeline::new(writer, options);
                            black_box(pipeline.run(data.path()).await.unwrap());
                        }
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

/// CSV read and coercion alone, without any destination
fn bench_transaction_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("transaction_parsing");
    let runtime = Runtime::new().unwrap();
    let data = generate_dataset(100, 1, 50_000);
    let path = data.path().join("transactions_data.csv");
    let path = &path;

    group.throughput(Throughput::Elements(50_000));
    group.bench_function("csv_record_stream_50k", |b| {
        b.to_async(&runtime).iter(|| async move {
            let stream = CsvRecordStream::<RawTransactionRow>::from_file(path, RowDialect::Loader)
                .await
                .unwrap();
            black_box(stream.filter(|r| futures::future::ready(r.is_ok())).count().await);
        });
    });

    group.finish();
}

/// Statistics over a benchmark pass
fn bench_database_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("database_stats");

    for operations in [100, 10_000] {
        let results: Vec<OperationResult> = (0..operations)
            .map(|i| OperationResult {
                database: "mongodb".to_string(),
                operation: QueryShape::AllTransactions.label().to_string(),
                operation_number: i + 1,
                response_time: (i * 37 % 1_500) as u64,
                success: i % 20 != 0,
                error: (i % 20 == 0).then(|| "Timeout: query took too long".to_string()),
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(operations),
            &results,
            |b, results| {
                b.iter(|| black_box(DatabaseStats::from_results(results)));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_load_dataset_sizes,
    bench_load_batch_sizes,
    bench_transaction_parsing,
    bench_database_stats
);
criterion_main!(benches);
