pub mod lock;
pub mod orchestrator;
pub mod promo;
pub mod registry;
