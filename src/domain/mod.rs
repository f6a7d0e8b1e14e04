// Domain layer: wire models and the transport port.

pub mod model;
pub mod ports;
