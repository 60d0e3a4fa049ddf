//! External delivery channels for monitor notifications.

pub mod email;
