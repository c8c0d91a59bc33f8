//! B3 header names, shared by HTTP, AMQP, and task-row propagation.

pub const HEADER_TRACE_ID: &str = "x-b3-traceid";
pub const HEADER_SPAN_ID: &str = "x-b3-spanid";
pub const HEADER_PARENT_SPAN_ID: &str = "x-b3-parentspanid";
pub const HEADER_SAMPLED: &str = "x-b3-sampled";
pub const HEADER_FLAGS: &str = "x-b3-flags";
