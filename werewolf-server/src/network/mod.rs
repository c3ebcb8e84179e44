//! Network Layer
//!
//! Room registry plus the HTTP and WebSocket surfaces in front of it.
//! Nothing here runs game rules; the host's engine does.

pub mod room_code;
pub mod room;
pub mod registry;
pub mod protocol;
pub mod dispatch;
pub mod http;
pub mod server;

pub use room_code::RoomCode;
pub use room::{
    DeviceId, NightActionKind, Progress, RoomError, RoomEvent, RoomPhase, RoomPlayer,
    RoomStateView, SkipVoteSummary, TrackingType,
};
pub use registry::{RoomRegistry, RoomSummary, Seat};
pub use protocol::{
    ClientMessage, ServerMessage, RoomAction, RoomRequest, RoomReply, ErrorCode, Failure,
    ProtocolError,
};
pub use dispatch::{dispatch, handle_value};
pub use http::{router, AppState};
pub use server::{GameServer, ServerError};
