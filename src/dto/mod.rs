pub mod auth;
pub mod cart;
pub mod catalog;
pub mod contacts;
pub mod orders;
pub mod shops;
