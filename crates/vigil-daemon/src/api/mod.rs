mod client;
mod handlers;
mod responses;
mod server;

pub use client::SupervisorClient;
pub use handlers::ApiState;
pub use responses::*;
pub use server::ApiServer;
