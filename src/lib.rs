// CredentialStore は dyn ではなくジェネリック境界でのみ使用する
#![allow(async_fn_in_trait)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
