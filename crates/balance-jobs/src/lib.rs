pub mod scheduler;

pub use scheduler::{LedgerVerificationJob, ReservationExpiryJob};
