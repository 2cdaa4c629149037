mod server;

pub use server::CoordinatorServer;
