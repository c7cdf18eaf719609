use bazaar_core::{
    Country, IdType, Marketplace, Offer, OfferDetail, OfferList, Result, SearchQuery,
};
use bazaar_server::server::{
    engine::{Job, JobValue, merge},
    module::{EngineConfig, Module},
    providers::{Provider, ProviderRegistry},
    service::OfferService,
};
use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::{
    StreamExt,
    future::{self, BoxFuture, FutureExt},
    stream::FuturesUnordered,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::runtime::Builder;

#[derive(Clone, Copy, Debug)]
struct FanOutParams {
    jobs_per_request: usize,
    concurrency: usize,
}

/// Provider answering immediately, so the numbers reflect engine overhead.
struct Immediate(Marketplace);

impl Provider for Immediate {
    fn marketplace(&self) -> Marketplace {
        self.0
    }

    fn search(&self, _query: &SearchQuery) -> BoxFuture<'static, Result<OfferList>> {
        let offer = Offer {
            party_name: self.0.to_string(),
            ..Offer::default()
        };
        future::ready(Ok(OfferList {
            list: vec![offer; 10],
            page: 1,
            page_count: 1,
            total_count: 10,
        }))
        .boxed()
    }

    fn detail(
        &self,
        _id: &str,
        _id_type: IdType,
        _country: Country,
    ) -> BoxFuture<'static, Result<OfferDetail>> {
        future::ready(Ok(OfferDetail::default())).boxed()
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        max_workers: 64,
        job_timeout: Duration::from_secs(10),
        shutdown_timeout: Duration::from_secs(11),
    }
}

fn engine_bench(c: &mut Criterion) {
    let jobs_cases = [4, 16, 64];
    let concurrency_cases = [1, 8, 32];

    let mut cases = Vec::new();
    for &jobs_per_request in &jobs_cases {
        for &concurrency in &concurrency_cases {
            cases.push(FanOutParams {
                jobs_per_request,
                concurrency,
            });
        }
    }

    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let module = rt.block_on(async { Module::start(&config()) });

    for params in cases {
        let mut group = c.benchmark_group("engine/fan_out");
        group.throughput(Throughput::Elements(
            (params.jobs_per_request * params.concurrency) as u64,
        ));

        group.bench_function(
            format!(
                "jobs/{}/conc/{}",
                params.jobs_per_request, params.concurrency
            ),
            |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let module = Arc::clone(&module);
                    async move {
                        let start = Instant::now();
                        for _ in 0..iters {
                            run_fan_out(&module, params).await;
                        }
                        start.elapsed()
                    }
                });
            },
        );

        group.finish();
    }

    rt.block_on(module.stop());
}

async fn run_fan_out(module: &Arc<Module>, params: FanOutParams) {
    let mut tasks = FuturesUnordered::new();

    for _ in 0..params.concurrency {
        let module = Arc::clone(module);
        tasks.push(tokio::spawn(async move {
            let mut outputs = Vec::with_capacity(params.jobs_per_request);
            for i in 0..params.jobs_per_request {
                let (job, output) = Job::new("bench", move || async move {
                    Ok(OfferList {
                        total_count: i as u64,
                        ..OfferList::default()
                    })
                });
                module.submit(job).await.unwrap();
                outputs.push(output);
            }

            let mut merged = merge(outputs);
            let mut received = 0;
            while let Some(result) = merged.recv().await {
                black_box(result.and_then(JobValue::into_offers).unwrap());
                received += 1;
            }
            assert_eq!(received, params.jobs_per_request);
        }));
    }

    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

fn search_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();

    let mut registry = ProviderRegistry::new(Marketplace::ALL.to_vec(), Vec::new());
    for marketplace in Marketplace::ALL {
        registry.register(Arc::new(Immediate(marketplace)));
    }
    let module = rt.block_on(async { Module::start(&config()) });
    let service = OfferService::new(Arc::clone(&module), Arc::new(registry), 100);

    for concurrency in [1_usize, 8, 32] {
        let mut group = c.benchmark_group("service/search_offers");
        group.throughput(Throughput::Elements(concurrency as u64));

        group.bench_function(format!("conc/{concurrency}"), |b| {
            b.to_async(&rt).iter_custom(|iters| {
                let service = service.clone();
                async move {
                    let start = Instant::now();
                    for _ in 0..iters {
                        let mut tasks = FuturesUnordered::new();
                        for _ in 0..concurrency {
                            let service = service.clone();
                            tasks.push(tokio::spawn(async move {
                                service.search_offers(SearchQuery::default()).await
                            }));
                        }
                        while let Some(res) = tasks.next().await {
                            let offers = res.unwrap().unwrap();
                            assert_eq!(offers.total_count, 40);
                            black_box(offers);
                        }
                    }
                    start.elapsed()
                }
            });
        });

        group.finish();
    }

    rt.block_on(module.stop());
}

criterion_group!(benches, engine_bench, search_bench);
criterion_main!(benches);
