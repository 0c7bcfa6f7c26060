pub mod activity;
pub mod department;
pub mod member;
pub mod permission;
pub mod role;
