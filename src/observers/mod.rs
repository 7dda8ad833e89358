// Consumers of the simulation state between ticks

pub mod imgstream;
pub mod palette;
