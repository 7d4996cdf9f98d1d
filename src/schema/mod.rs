mod inbound;
mod outbound;
mod registry;

pub use inbound::{FieldMapping, InboundSchema};
pub use outbound::{FieldBinding, OutboundSchema};
pub use registry::ShapeRegistry;
