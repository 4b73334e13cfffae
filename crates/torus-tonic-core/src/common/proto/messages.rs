use bytes::Bytes;

/// Broker → worker: advance the rows `[start_row, end_row)` of `grid` by one
/// generation.
///
/// With `kill` set the worker acknowledges and then shuts down; the band
/// fields are ignored.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BandRequest {
    #[prost(bytes = "bytes", tag = "1")]
    pub grid: Bytes,
    #[prost(uint32, tag = "2")]
    pub width: u32,
    #[prost(uint32, tag = "3")]
    pub height: u32,
    #[prost(uint32, tag = "4")]
    pub start_row: u32,
    #[prost(uint32, tag = "5")]
    pub end_row: u32,
    #[prost(bool, tag = "6")]
    pub kill: bool,
}

/// The computed band, `(end_row - start_row) * width` bytes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BandResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub band: Bytes,
}

/// Client → broker: run `turns` generations of `grid` spread over up to
/// `threads` workers.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TurnsRequest {
    #[prost(bytes = "bytes", tag = "1")]
    pub grid: Bytes,
    #[prost(uint32, tag = "2")]
    pub width: u32,
    #[prost(uint32, tag = "3")]
    pub height: u32,
    #[prost(uint64, tag = "4")]
    pub turns: u64,
    #[prost(uint32, tag = "5")]
    pub threads: u32,
}

/// Final grid of a `ComputeTurns` run together with the turn it belongs to.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TurnsResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub grid: Bytes,
    #[prost(uint64, tag = "2")]
    pub turn: u64,
    #[prost(uint64, tag = "3")]
    pub alive_count: u64,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct AliveRequest {}

/// Alive-cell count as of `turn`; the pair is always taken together.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct AliveResponse {
    #[prost(uint64, tag = "1")]
    pub turn: u64,
    #[prost(uint64, tag = "2")]
    pub alive_count: u64,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct SnapshotRequest {}

/// Point-in-time grid. For the broker `turn` is the last completed
/// generation; for a worker it counts the bands it has computed.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SnapshotResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub grid: Bytes,
    #[prost(uint32, tag = "2")]
    pub width: u32,
    #[prost(uint32, tag = "3")]
    pub height: u32,
    #[prost(uint64, tag = "4")]
    pub turn: u64,
}

/// Suspend (`paused = true`) or resume the broker's turn loop.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct PauseRequest {
    #[prost(bool, tag = "1")]
    pub paused: bool,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct PauseResponse {
    #[prost(uint64, tag = "1")]
    pub turn: u64,
    #[prost(bool, tag = "2")]
    pub paused: bool,
}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ShutdownRequest {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct ShutdownResponse {}

#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct WatchRequest {}

/// Published once per committed generation.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct TurnEvent {
    #[prost(uint64, tag = "1")]
    pub turn: u64,
    #[prost(uint64, tag = "2")]
    pub alive_count: u64,
}
