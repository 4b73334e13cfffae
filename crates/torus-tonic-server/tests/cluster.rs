//! End-to-end tests: real workers and a real broker on ephemeral localhost
//! ports, driven through the generated clients.

use bytes::Bytes;
use core::time::Duration;
use futures::StreamExt;
use tokio::{net::TcpListener, task::JoinHandle, time::timeout};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::{Code, transport::Channel};
use torus_tonic_core::{
    proto::{
        AliveRequest, PauseRequest, ShutdownRequest, SnapshotRequest, TurnsRequest,
        WatchRequest, broker_client::BrokerClient, worker_client::WorkerClient,
    },
    torus::{ALIVE, Cell, Grid},
    types::grid_to_wire,
};
use torus_tonic_server::server::{
    broker::run_broker_with_incoming, config::BrokerConfig, worker::run_worker_with_incoming,
};

type ServerHandle = JoinHandle<anyhow::Result<()>>;

struct Cluster {
    broker_addr: String,
    worker_addrs: Vec<String>,
    broker: ServerHandle,
    workers: Vec<ServerHandle>,
    shutdown: CancellationToken,
}

impl Cluster {
    async fn client(&self) -> BrokerClient<Channel> {
        BrokerClient::connect(format!("http://{}", self.broker_addr))
            .await
            .unwrap()
    }
}

async fn spawn_worker() -> (String, ServerHandle) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(run_worker_with_incoming(
        TcpListenerStream::new(listener),
        CancellationToken::new(),
    ));
    (addr, handle)
}

async fn spawn_broker(config: BrokerConfig) -> (String, ServerHandle, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(run_broker_with_incoming(
        TcpListenerStream::new(listener),
        config,
        shutdown.clone(),
    ));
    (addr, handle, shutdown)
}

async fn spawn_cluster(worker_count: usize) -> Cluster {
    let mut worker_addrs = Vec::with_capacity(worker_count);
    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let (addr, handle) = spawn_worker().await;
        worker_addrs.push(addr);
        workers.push(handle);
    }

    let config = BrokerConfig::with_workers("127.0.0.1:0", worker_addrs.clone());
    let (broker_addr, broker, shutdown) = spawn_broker(config).await;

    Cluster {
        broker_addr,
        worker_addrs,
        broker,
        workers,
        shutdown,
    }
}

fn turns_request(grid: &Grid, turns: u64, threads: u32) -> TurnsRequest {
    let (grid, width, height) = grid_to_wire(grid).unwrap();
    TurnsRequest {
        grid,
        width,
        height,
        turns,
        threads,
    }
}

fn simulate(grid: &Grid, turns: u64) -> Grid {
    (0..turns).fold(grid.clone(), |g, _| g.step())
}

fn glider(width: usize, height: usize) -> Grid {
    Grid::with_alive(
        width,
        height,
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

/// Deterministic pseudo-random soup with roughly a third of the cells alive.
fn soup(width: usize, height: usize, seed: u64) -> Grid {
    let mut x = seed;
    let alive = (0..width * height).filter_map(|i| {
        x = x
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((x >> 33) % 3 == 0).then(|| Cell::new(i % width, i / width))
    });
    Grid::with_alive(width, height, alive.collect::<Vec<_>>()).unwrap()
}

/// Polls until the broker reports at least `turn` completed generations.
async fn wait_for_turn(client: &mut BrokerClient<Channel>, turn: u64) {
    timeout(Duration::from_secs(10), async {
        loop {
            let alive = client.query_alive(AliveRequest {}).await.unwrap().into_inner();
            if alive.turn >= turn {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("broker never reached the turn");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn glider_moves_one_cell_diagonally_every_four_turns() {
    let cluster = spawn_cluster(1).await;
    let mut client = cluster.client().await;

    let resp = client
        .compute_turns(turns_request(&glider(5, 5), 4, 1))
        .await
        .unwrap()
        .into_inner();

    let moved = Grid::with_alive(
        5,
        5,
        [
            Cell::new(2, 1),
            Cell::new(3, 2),
            Cell::new(1, 3),
            Cell::new(2, 3),
            Cell::new(3, 3),
        ],
    )
    .unwrap();

    assert_eq!(resp.turn, 4);
    assert_eq!(resp.alive_count, 5);
    assert_eq!(&resp.grid[..], moved.cells());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_counts_agree_over_a_thousand_turns() {
    let cluster = spawn_cluster(8).await;
    let mut client = cluster.client().await;
    let grid = soup(16, 16, 7);
    let expected = simulate(&grid, 1000);

    for threads in [1, 2, 4, 8] {
        let resp = client
            .compute_turns(turns_request(&grid, 1000, threads))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(resp.turn, 1000, "threads = {threads}");
        assert_eq!(&resp.grid[..], expected.cells(), "threads = {threads}");
        assert_eq!(resp.alive_count, expected.alive_count() as u64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn threads_beyond_pool_size_are_clamped() {
    let cluster = spawn_cluster(2).await;
    let mut client = cluster.client().await;
    let grid = soup(9, 3, 11);

    let resp = client
        .compute_turns(turns_request(&grid, 25, 8))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(&resp.grid[..], simulate(&grid, 25).cells());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn control_plane_reads_are_consistent_mid_run() {
    let cluster = spawn_cluster(4).await;
    let grid = soup(48, 48, 3);
    let turns = 300;

    let history: Vec<Grid> = (0..=turns)
        .scan(grid.clone(), |g, _| {
            let current = g.clone();
            *g = g.step();
            Some(current)
        })
        .collect();

    let mut runner = cluster.client().await;
    let request = turns_request(&grid, turns, 4);
    let run = tokio::spawn(async move { runner.compute_turns(request).await });

    let mut client = cluster.client().await;
    while !run.is_finished() {
        let snap = client.snapshot(SnapshotRequest {}).await.unwrap().into_inner();
        if snap.grid.is_empty() {
            // The run has not started yet.
            continue;
        }
        assert_eq!((snap.width, snap.height), (48, 48));
        assert_eq!(&snap.grid[..], history[snap.turn as usize].cells());

        let alive = client.query_alive(AliveRequest {}).await.unwrap().into_inner();
        assert!(alive.turn >= snap.turn);
        let expected = &history[alive.turn as usize];
        assert_eq!(alive.alive_count, expected.alive_count() as u64);
    }

    let resp = run.await.unwrap().unwrap().into_inner();
    assert_eq!(&resp.grid[..], history[turns as usize].cells());

    let snap = client.snapshot(SnapshotRequest {}).await.unwrap().into_inner();
    assert_eq!(snap.turn, turns);
    assert_eq!(snap.grid, resp.grid);

    let alive = client.query_alive(AliveRequest {}).await.unwrap().into_inner();
    assert_eq!(alive.turn, turns);
    assert_eq!(alive.alive_count, resp.alive_count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pause_holds_the_turn_loop_until_resumed() {
    let cluster = spawn_cluster(2).await;
    let mut client = cluster.client().await;

    let mut runner = cluster.client().await;
    let request = turns_request(&soup(16, 16, 5), 1_000_000, 2);
    let run = tokio::spawn(async move { runner.compute_turns(request).await });

    wait_for_turn(&mut client, 1).await;

    let paused = client
        .pause(PauseRequest { paused: true })
        .await
        .unwrap()
        .into_inner();
    assert!(paused.paused);

    // At most the generation in flight at pause time still commits.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let held = client.query_alive(AliveRequest {}).await.unwrap().into_inner().turn;
    assert!(held <= paused.turn + 1);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let still = client.query_alive(AliveRequest {}).await.unwrap().into_inner().turn;
    assert_eq!(held, still);

    let resumed = client
        .pause(PauseRequest { paused: false })
        .await
        .unwrap()
        .into_inner();
    assert!(!resumed.paused);
    wait_for_turn(&mut client, held + 5).await;

    client.shutdown(ShutdownRequest {}).await.unwrap();
    let status = run.await.unwrap().unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_run_is_rejected_while_busy() {
    let cluster = spawn_cluster(1).await;
    let mut client = cluster.client().await;
    let grid = soup(16, 16, 9);

    let mut runner = cluster.client().await;
    let request = turns_request(&grid, 1_000_000, 1);
    let run = tokio::spawn(async move { runner.compute_turns(request).await });

    wait_for_turn(&mut client, 1).await;

    let status = client
        .compute_turns(turns_request(&grid, 1, 1))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::FailedPrecondition);

    run.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_stops_broker_and_workers() {
    let cluster = spawn_cluster(3).await;
    let mut client = cluster.client().await;

    client
        .compute_turns(turns_request(&glider(8, 8), 10, 3))
        .await
        .unwrap();

    client.shutdown(ShutdownRequest {}).await.unwrap();
    drop(client);

    let broker = timeout(Duration::from_secs(5), cluster.broker)
        .await
        .expect("broker did not stop");
    broker.unwrap().unwrap();

    for worker in cluster.workers {
        let worker = timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker did not stop");
        worker.unwrap().unwrap();
    }

    assert!(
        BrokerClient::connect(format!("http://{}", cluster.broker_addr))
            .await
            .is_err()
    );
    for addr in cluster.worker_addrs {
        assert!(WorkerClient::connect(format!("http://{addr}")).await.is_err());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stalled_worker_fails_the_generation() {
    // Accepts TCP connections but never speaks HTTP/2.
    let stalled = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let stalled_addr = stalled.local_addr().unwrap().to_string();
    let (good_addr, _good) = spawn_worker().await;

    let mut config = BrokerConfig::with_workers("127.0.0.1:0", vec![good_addr, stalled_addr]);
    config.band_timeout = Duration::from_millis(200);
    let (broker_addr, _broker, _shutdown) = spawn_broker(config).await;
    let mut client = BrokerClient::connect(format!("http://{broker_addr}"))
        .await
        .unwrap();

    let grid = glider(6, 6);
    let status = client
        .compute_turns(turns_request(&grid, 3, 2))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);

    // Nothing was committed and the broker accepts new runs.
    let alive = client.query_alive(AliveRequest {}).await.unwrap().into_inner();
    assert_eq!((alive.turn, alive.alive_count), (0, 5));

    let resp = client
        .compute_turns(turns_request(&grid, 3, 1))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(&resp.grid[..], simulate(&grid, 3).cells());

    drop(stalled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreachable_worker_is_unavailable() {
    let gone = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gone_addr = gone.local_addr().unwrap().to_string();
    drop(gone);

    let config = BrokerConfig::with_workers("127.0.0.1:0", vec![gone_addr]);
    let (broker_addr, _broker, _shutdown) = spawn_broker(config).await;
    let mut client = BrokerClient::connect(format!("http://{broker_addr}"))
        .await
        .unwrap();

    let status = client
        .compute_turns(turns_request(&glider(5, 5), 1, 1))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn watchers_see_every_turn_in_order() {
    let cluster = spawn_cluster(2).await;
    let mut client = cluster.client().await;
    let mut events = client
        .watch_turns(WatchRequest {})
        .await
        .unwrap()
        .into_inner();

    let grid = soup(12, 12, 1);
    client
        .compute_turns(turns_request(&grid, 20, 2))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while seen.len() < 20 {
        let event = timeout(Duration::from_secs(5), events.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        seen.push(event);
    }

    let turns: Vec<u64> = seen.iter().map(|e| e.turn).collect();
    assert_eq!(turns, (1..=20).collect::<Vec<_>>());
    for event in seen {
        assert_eq!(
            event.alive_count,
            simulate(&grid, event.turn).alive_count() as u64
        );
    }

    cluster.shutdown.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_runs_are_invalid_arguments() {
    let cluster = spawn_cluster(1).await;
    let mut client = cluster.client().await;
    let grid = glider(5, 5);

    let no_threads = turns_request(&grid, 1, 0);
    let mut short = turns_request(&grid, 1, 1);
    short.grid = short.grid.slice(..20);
    let mut huge = turns_request(&grid, 1, 1);
    huge.width = 1 << 16;
    huge.height = 1 << 16;
    let empty = TurnsRequest {
        grid: Bytes::new(),
        width: 0,
        height: 0,
        turns: 1,
        threads: 1,
    };

    for req in [no_threads, short, huge, empty] {
        let status = client.compute_turns(req).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn zero_turns_returns_the_input() {
    let cluster = spawn_cluster(1).await;
    let mut client = cluster.client().await;
    let grid = glider(5, 5);

    let resp = client
        .compute_turns(turns_request(&grid, 0, 1))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.turn, 0);
    assert_eq!(&resp.grid[..], grid.cells());

    let snap = client.snapshot(SnapshotRequest {}).await.unwrap().into_inner();
    assert_eq!(snap.turn, 0);
    assert_eq!(snap.grid.iter().filter(|&&b| b == ALIVE).count(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_snapshot_reports_last_grid() {
    let cluster = spawn_cluster(1).await;
    let mut client = cluster.client().await;
    let grid = glider(5, 5);

    client
        .compute_turns(turns_request(&grid, 2, 1))
        .await
        .unwrap();

    let mut worker = WorkerClient::connect(format!("http://{}", cluster.worker_addrs[0]))
        .await
        .unwrap();
    let snap = worker.snapshot(SnapshotRequest {}).await.unwrap().into_inner();

    // The second band request carried the grid after one generation.
    assert_eq!(snap.turn, 2);
    assert_eq!(&snap.grid[..], grid.step().cells());
}
