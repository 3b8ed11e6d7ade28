mod admin;
mod helpers;
mod mocks;
mod webhooks;
