pub mod invoice_repo;
pub mod mailer;
pub mod models;
pub mod payments;
pub mod webhook;
