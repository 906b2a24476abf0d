// Storefront
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;

// Orders and payments
pub mod orders;
pub mod payments;

// Customer accounts
pub mod customers;
pub mod reviews;

// Content and back office
pub mod content;
pub mod csv_io;
pub mod notifications;
