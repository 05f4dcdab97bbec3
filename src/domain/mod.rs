pub mod calculator;
pub mod composer;
pub mod errors;
pub mod invoice;
pub mod money;
pub mod payment_link;
pub mod ports;
