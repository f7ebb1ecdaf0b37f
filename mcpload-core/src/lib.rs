mod transport;

pub mod runner;

pub use transport::{
    Error as TransportError, HttpTransport, Result as TransportResult, Session, ToolReply,
    Transport, TransportDescriptor, TransportKind,
};
