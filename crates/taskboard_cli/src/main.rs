//! Command-line summary of the board store.
//!
//! # Responsibility
//! - Open a store from `TASKBOARD_*` environment configuration.
//! - Print a deterministic summary of the current state.
//! - `--reset` replaces persisted state with fresh sample data.

use std::process::ExitCode;
use std::sync::Arc;
use taskboard_core::{
    generate_sample_data, init_logging, BoardStore, PersistenceGateway, StoreConfig,
    StoreOptions,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let reset = std::env::args().skip(1).any(|arg| arg == "--reset");

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("taskboard: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(log_dir) = &config.log_dir {
        if let Err(err) = init_logging(&config.log_level, log_dir) {
            eprintln!("taskboard: logging disabled: {err}");
        }
    }

    let gateway = match PersistenceGateway::from_config(&config) {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            eprintln!("taskboard: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut store = BoardStore::open_with(
        gateway,
        StoreOptions::from_config(&config),
        generate_sample_data,
    )
    .await;

    if reset {
        store.reset_with(generate_sample_data).await;
        log::info!("event=cli_reset module=cli status=ok");
    }

    println!("taskboard_core version={}", taskboard_core::core_version());
    println!("origin={:?}", store.origin());
    println!(
        "boards={} lists={} tasks={}",
        store.boards().len(),
        store.lists().len(),
        store.tasks().len()
    );
    match store.active_board() {
        Some(board) => {
            println!("active_board={}", board.title);
            for list in store.active_board_lists() {
                println!(
                    "  [{}] {} ({} tasks)",
                    list.position,
                    list.title,
                    store.tasks_for_list(list.id).len()
                );
            }
        }
        None => println!("active_board=none"),
    }

    store.flush().await;
    let status = store.save_status();
    store.shutdown().await;

    match status.last_error {
        Some(err) => {
            eprintln!("taskboard: last save failed: {err}");
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
