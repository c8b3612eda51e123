//! Core business logic, independent of the command-line surface.
//!
//! Pure computations (`payroll`, `buy_order::compute_buy_order`, `ytd`,
//! `order_form`) take their rate tables explicitly. Persistence helpers take
//! a `SeaORM` connection.

pub mod buy_order;
pub mod client;
pub mod dashboard;
pub mod form_template;
pub mod insurance;
pub mod live;
pub mod money;
pub mod order_form;
pub mod payroll;
pub mod paystub;
pub mod rates;
pub mod settings;
pub mod ytd;
