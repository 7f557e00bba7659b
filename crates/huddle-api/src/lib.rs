pub mod access;
pub mod auth;
pub mod channels;
pub mod cleanup;
pub mod conversations;
pub mod error;
pub mod join_code;
pub mod members;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod router;
pub mod storage;
pub mod upload;
pub mod users;
pub mod workspaces;
