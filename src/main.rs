//! Blockdoc command line
//!
//! Builds an engine from configuration, runs a short editing session against
//! it and prints the rendered block tree as JSON.

use blockdoc::core::config::StorageType;
use blockdoc::core::logging::init_logging;
use blockdoc::types::{
    CommitOptions, CreateBlock, CreateDocument, DocId, MoveBlock, UpdateBlock,
};
use blockdoc::{core::Config, DocumentEngine, Error, Result};
use clap::{Arg, Command};
use serde_json::json;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("blockdoc")
        .version(blockdoc::VERSION)
        .about("Versioned block-document engine.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("snapshot-interval")
                .long("snapshot-interval")
                .value_name("N")
                .help("Commits between automatic snapshots (0 disables)"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory path"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("storage-type")
                .long("storage-type")
                .value_name("TYPE")
                .help("Storage backend type (memory, file)"),
        )
        .get_matches();

    // Load configuration
    let mut config = if let Some(config_path) = matches.get_one::<String>("config") {
        let mut config = Config::from_file(config_path)?;
        config.apply_env_overrides()?;
        config
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    apply_cli_overrides(&mut config, &matches)?;
    config.validate()?;

    init_logging(&config.logging)?;
    info!("Starting {} v{}", blockdoc::NAME, blockdoc::VERSION);

    prepare_data_dir(&config)?;

    let engine = blockdoc::core::create_engine(&config)?;
    let doc_id = run_demo(&engine).await?;

    for pending in engine.pending_documents() {
        warn!("Discarding uncommitted edits of {}", pending);
        engine.discard_pending(&pending).await?;
    }

    let tree = engine.get_rendered_tree(&doc_id, None).await?;
    println!("{}", serde_json::to_string_pretty(&tree)?);

    info!("Done");
    Ok(())
}

/// Apply command line argument overrides to configuration
fn apply_cli_overrides(config: &mut Config, matches: &clap::ArgMatches) -> Result<()> {
    if let Some(interval) = matches.get_one::<String>("snapshot-interval") {
        config.engine.snapshot_interval = interval
            .parse()
            .map_err(|e| Error::config(format!("Invalid snapshot interval: {}", e)))?;
    }

    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.storage.data_dir = data_dir.into();
    }

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
    }

    if let Some(storage_type) = matches.get_one::<String>("storage-type") {
        config.storage.storage_type = match storage_type.as_str() {
            "memory" => StorageType::Memory,
            "file" => StorageType::File,
            _ => {
                return Err(Error::config(format!(
                    "Invalid storage type: {}. Valid options: memory, file",
                    storage_type
                )))
            }
        };
    }

    Ok(())
}

/// Create the data directory for the file backend
fn prepare_data_dir(config: &Config) -> Result<()> {
    if config.storage.storage_type == StorageType::File && !config.storage.data_dir.exists() {
        std::fs::create_dir_all(&config.storage.data_dir).map_err(|e| {
            Error::config(format!(
                "Cannot create data directory {:?}: {}",
                config.storage.data_dir, e
            ))
        })?;
        info!("Created data directory: {:?}", config.storage.data_dir);
    }
    Ok(())
}

/// Create a document with a heading and a paragraph, then edit and move the
/// paragraph in one batched commit
async fn run_demo(engine: &DocumentEngine) -> Result<DocId> {
    let doc = engine
        .create_document(CreateDocument {
            title: "Getting started".into(),
            ..Default::default()
        })
        .await?;

    let heading = engine
        .create_block(CreateBlock::new(
            doc.id.clone(),
            "heading",
            json!({ "text": "Getting started", "level": 1 }),
        ))
        .await?;
    let intro = engine
        .create_block(CreateBlock::new(
            doc.id.clone(),
            "paragraph",
            json!({ "text": "Blocks are versioned independently." }),
        ))
        .await?;

    engine
        .update_block_content(UpdateBlock {
            doc_id: doc.id.clone(),
            block_id: intro.block.id.clone(),
            payload: json!({ "text": "Every block is versioned independently." }),
            actor: None,
            create_version: false,
        })
        .await?;
    engine
        .move_block(MoveBlock {
            doc_id: doc.id.clone(),
            block_id: intro.block.id.clone(),
            parent_id: None,
            after: None,
            before: Some(heading.block.id.clone()),
            indent: None,
            actor: None,
            create_version: false,
        })
        .await?;

    if let Some(revision) = engine
        .commit_pending(&doc.id, CommitOptions::message("reorder intro"))
        .await?
    {
        info!(
            "Committed {} patches at version {}",
            revision.patches.len(),
            revision.doc_ver
        );
    }

    Ok(doc.id)
}
