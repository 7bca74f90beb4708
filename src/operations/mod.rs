pub mod add;
pub mod amount;
pub mod budget;
pub mod dashboard;
pub mod edit;
pub mod evaluate;
pub mod extract;
pub mod import;
pub mod list;
pub mod remove;
pub mod seed;
pub mod summary;
pub mod tax;
