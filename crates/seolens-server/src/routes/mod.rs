pub mod auth;
pub mod health;
pub mod issues;
pub mod sites;
pub mod validate;
