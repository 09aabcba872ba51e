pub mod admin;
pub mod events;
pub mod fests;
pub mod registrations;
pub mod users;
