use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use orderbook::{NewOrder, OrderBook, OrderId, Side};

fn limit(side: Side, px: i64, qty: u64) -> NewOrder {
    NewOrder {
        symbol: "AAPL".to_string(),
        side,
        px_ticks: px,
        qty,
    }
}

fn bench_order_admission(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_admission");

    for &num_orders in [100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("non_crossing_orders", num_orders),
            &num_orders,
            |b, &num_orders| {
                b.iter(|| {
                    let mut book = OrderBook::new("AAPL");
                    for i in 0..num_orders {
                        let order = if i % 2 == 0 {
                            limit(Side::Buy, 100_000 - i as i64, 100)
                        } else {
                            limit(Side::Sell, 101_000 + i as i64, 100)
                        };
                        black_box(book.admit(order));
                    }
                })
            },
        );
    }

    group.finish();
}

fn bench_order_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_matching");

    for &depth in [10, 100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("crossing_sweep", depth),
            &depth,
            |b, &depth| {
                b.iter_batched(
                    || {
                        let mut book = OrderBook::new("AAPL");
                        for i in 0..depth {
                            book.admit(limit(Side::Sell, 100_000 + i as i64, 100));
                            book.admit(limit(Side::Buy, 99_999 - i as i64, 100));
                        }
                        book
                    },
                    |mut book| {
                        // One large aggressor walking the whole ask side.
                        let crossing = limit(Side::Buy, 100_000 + depth as i64, depth as u64 * 50);
                        black_box(book.admit(crossing))
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_market_data_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("market_data");

    let mut book = OrderBook::new("AAPL");
    for i in 0..1000 {
        book.admit(limit(Side::Sell, 100_000 + i, 100));
        book.admit(limit(Side::Buy, 99_999 - i, 100));
    }

    group.bench_function("best_bid", |b| b.iter(|| black_box(book.best_bid())));
    group.bench_function("best_ask", |b| b.iter(|| black_box(book.best_ask())));
    group.bench_function("snapshot", |b| b.iter(|| black_box(book.snapshot())));

    group.finish();
}

fn bench_cancellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancellation");

    for &num_orders in [100, 1000].iter() {
        group.bench_with_input(
            BenchmarkId::new("cancel_every_other", num_orders),
            &num_orders,
            |b, &num_orders| {
                b.iter_batched(
                    || {
                        let mut book = OrderBook::new("AAPL");
                        let mut ids = Vec::new();
                        for i in 0..num_orders {
                            let outcome = book.admit(limit(Side::Buy, 99_000 - (i % 50) as i64, 100));
                            ids.push(outcome.order_id().unwrap_or(OrderId(0)));
                        }
                        (book, ids)
                    },
                    |(mut book, ids)| {
                        for (i, &id) in ids.iter().enumerate() {
                            if i % 2 == 0 {
                                black_box(book.cancel(id));
                            }
                        }
                    },
                    criterion::BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

fn bench_rapid_order_flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_flow");

    group.bench_function("rapid_order_flow", |b| {
        b.iter(|| {
            let mut book = OrderBook::new("AAPL");

            // Repeated rest-then-sweep pattern with market data checks.
            for _ in 0..100 {
                for i in 0..5 {
                    book.admit(limit(Side::Sell, 100_000 + i, 100));
                    book.admit(limit(Side::Buy, 99_999 - i, 100));
                }
                black_box(book.admit(limit(Side::Buy, 100_002, 300)));
                black_box(book.best_bid());
                black_box(book.best_ask());
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_order_admission,
    bench_order_matching,
    bench_market_data_access,
    bench_cancellation,
    bench_rapid_order_flow
);

criterion_main!(benches);
