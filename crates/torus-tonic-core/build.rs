/// Generates the tonic client and server stubs for the `Worker` and `Broker`
/// services.
///
/// Messages are declared in Rust (`src/common/proto/messages.rs`) with
/// `prost::Message` derives, so the services are described here with
/// `tonic_build::manual` instead of being compiled from a `.proto` file. This
/// keeps `protoc` out of the build.
///
/// # Output
///
/// One file per service in `OUT_DIR`, named `<package>.<Service>.rs`:
///
/// - `torus.Worker.rs`
/// - `torus.Broker.rs`
///
/// Both are included from `crate::proto`, which is also where the message
/// types live, so the generated code refers to them as `crate::proto::*`.
///
/// # Panics
///
/// Panics if code generation fails.
use tonic_build::manual::{Builder, Method, Service};

const PACKAGE: &str = "torus";
const CODEC: &str = "tonic_prost::ProstCodec";

fn unary(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let worker = Service::builder()
        .name("Worker")
        .package(PACKAGE)
        .method(unary("compute_band", "ComputeBand", "BandRequest", "BandResponse"))
        .method(unary("snapshot", "Snapshot", "SnapshotRequest", "SnapshotResponse"))
        .build();

    let broker = Service::builder()
        .name("Broker")
        .package(PACKAGE)
        .method(unary("compute_turns", "ComputeTurns", "TurnsRequest", "TurnsResponse"))
        .method(unary("query_alive", "QueryAlive", "AliveRequest", "AliveResponse"))
        .method(unary("snapshot", "Snapshot", "SnapshotRequest", "SnapshotResponse"))
        .method(unary("pause", "Pause", "PauseRequest", "PauseResponse"))
        .method(unary("shutdown", "Shutdown", "ShutdownRequest", "ShutdownResponse"))
        .method(
            Method::builder()
                .name("watch_turns")
                .route_name("WatchTurns")
                .input_type("crate::proto::WatchRequest")
                .output_type("crate::proto::TurnEvent")
                .codec_path(CODEC)
                .server_streaming()
                .build(),
        )
        .build();

    Builder::new().compile(&[worker, broker]);
}
