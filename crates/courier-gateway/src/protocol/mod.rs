//! Gateway wire protocol
//!
//! Op-coded JSON frames, close codes, and the payloads the producer sends.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, RequestGuildMembersPayload,
    ResumePayload, StatusUpdate,
};
