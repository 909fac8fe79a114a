pub mod advisor;
pub mod credentials;
pub mod dispatcher;
pub mod erp_client;
pub mod logger;
pub mod pagination;
pub mod validation;
