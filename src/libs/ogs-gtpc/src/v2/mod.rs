//! GTPv2 Protocol Implementation
//!
//! This module implements GTPv2-C (Control Plane) as specified in 3GPP TS 29.274.

pub mod conn;
pub mod handler;
pub mod header;
pub mod ie;
pub mod message;
pub mod session;
pub mod types;

pub use conn::Conn;
pub use handler::{handler_fn, HandlerFn, HandlerFuture};
pub use header::{
    Gtp2Header, Gtp2MessageType, GTP2_TEID_LEN, GTP2_VERSION, GTPV2C_HEADER_LEN,
    GTPV2C_HEADER_LEN_NO_TEID,
};
pub use ie::{GroupedIeTable, Gtp2Ie, Gtp2IeType};
pub use message::{
    required, CreateBearerRequest, CreateBearerResponse, CreateSessionRequest,
    CreateSessionResponse, DeleteBearerRequest, DeleteBearerResponse, DeleteSessionRequest,
    DeleteSessionResponse, DownlinkDataNotification, DownlinkDataNotificationAcknowledge,
    EchoRequest, EchoResponse, GenericBody, Gtp2Body, Gtp2Message, MessageBody,
    ModifyBearerRequest, ModifyBearerResponse, ReleaseAccessBearersRequest,
    ReleaseAccessBearersResponse, UpdateBearerRequest, UpdateBearerResponse,
    VersionNotSupportedIndication,
};
pub use session::{deliver, Bearer, Location, Session, Subscriber, DEFAULT_BEARER};
pub use types::{Gtp2Cause, Gtp2FTeidInterfaceType, Gtp2PdnType, Gtp2PlmnId, Gtp2RatType};
