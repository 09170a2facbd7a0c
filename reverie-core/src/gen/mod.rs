//! Generation components built on the slot dispatcher.
//!
//! Each generator owns its prompt construction and its own failure
//! policy; none of them lets an error escape. The worst case is always
//! templated text, never a crash or a stall.

pub mod narrator;
pub mod observation;
pub mod oracle;
pub mod thinking;

pub use narrator::OutcomeNarrator;
pub use observation::ObservationGenerator;
pub use oracle::CoherenceOracle;
pub use thinking::{NarrativeAction, ThinkingGenerator, ThinkingOutput};
