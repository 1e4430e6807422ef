pub mod capabilities;
pub mod dispatcher;
pub mod errors;
pub mod handler;
pub mod handlers;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod router;
pub mod timeout;
