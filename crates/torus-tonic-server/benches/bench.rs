use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tokio::{net::TcpListener, runtime::Builder};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, transport::Channel};
use torus_tonic_core::{
    proto::{TurnsRequest, broker_client::BrokerClient},
    torus::{Cell, Grid},
    types::grid_to_wire,
};
use torus_tonic_server::server::{
    broker::run_broker_with_incoming, config::BrokerConfig, worker::run_worker_with_incoming,
};

const SIZE: usize = 16;
const TURNS: u64 = 1_000;
const MAX_WORKERS: usize = 8;

/// Starts `MAX_WORKERS` workers and a broker in-process and returns a broker
/// client. Everything stops when `shutdown` is cancelled.
async fn spawn_cluster(shutdown: &CancellationToken) -> BrokerClient<Channel> {
    let mut worker_addrs = Vec::with_capacity(MAX_WORKERS);
    for _ in 0..MAX_WORKERS {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        worker_addrs.push(listener.local_addr().unwrap().to_string());
        tokio::spawn(run_worker_with_incoming(
            TcpListenerStream::new(listener),
            shutdown.clone(),
        ));
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let broker_addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(run_broker_with_incoming(
        TcpListenerStream::new(listener),
        BrokerConfig::with_workers(broker_addr.clone(), worker_addrs),
        shutdown.clone(),
    ));

    BrokerClient::connect(format!("http://{broker_addr}"))
        .await
        .unwrap()
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd)
}

fn glider() -> Grid {
    Grid::with_alive(
        SIZE,
        SIZE,
        [
            Cell::new(1, 0),
            Cell::new(2, 1),
            Cell::new(0, 2),
            Cell::new(1, 2),
            Cell::new(2, 2),
        ],
    )
    .unwrap()
}

/// Full `ComputeTurns` runs through the broker at increasing worker counts.
fn bench_compute_turns(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let shutdown = CancellationToken::new();
    let client = rt.block_on(spawn_cluster(&shutdown));

    let (grid, width, height) = grid_to_wire(&glider()).unwrap();

    let mut group = c.benchmark_group("cluster/compute_turns");
    group.sample_size(10);
    for threads in [1, 2, 4, 8] {
        let req = TurnsRequest {
            grid: grid.clone(),
            width,
            height,
            turns: TURNS,
            threads,
        };
        group.throughput(Throughput::Elements(TURNS));
        group.bench_function(format!("{SIZE}x{SIZE}x{TURNS}/workers/{threads}"), |b| {
            b.to_async(&rt).iter(|| {
                let mut client = client.clone();
                let req = req.clone();
                async move { black_box(client.compute_turns(req).await.unwrap()) }
            });
        });
    }
    group.finish();

    shutdown.cancel();
}

criterion_group!(benches, bench_compute_turns);
criterion_main!(benches);
