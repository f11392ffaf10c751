//! Storefront chat server binary.
//! Run with: cargo run --bin storefront-chat-server

use std::process::ExitCode;

use storefront_chat::start_storefront_chat;

fn main() -> ExitCode {
    start_storefront_chat::run()
}
