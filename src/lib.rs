//! `btreedb`: an embedded relational storage engine over a paged
//! B-tree, driven by a small SQL dialect (spec §1). The library surface
//! is deliberately thin — `Engine` does the work, this module just
//! wires up storage backends and the SQL front end around it.

pub mod ast;
pub mod block_device;
pub mod btree;
pub mod catalog;
pub mod codec;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod page;
pub mod parser;
pub mod value;
pub mod virtual_disk;

use std::fmt::Write as _;
use std::path::Path;

use block_device::{BlockDevice, FileBlockDevice, InMemoryBlockDevice};
use engine::{CommandResult, Engine};
use error::EngineError;

/// Opens an engine backed by a file at `path`, with its metadata
/// sidecar at `{path}.meta.json`.
pub fn open_file(path: impl AsRef<Path>) -> Result<Engine, EngineError> {
    let pages_path = path.as_ref().to_path_buf();
    let mut meta_path = pages_path.clone();
    meta_path.set_extension("meta.json");
    let device: Box<dyn BlockDevice> = Box::new(FileBlockDevice::open(pages_path, meta_path)?);
    Engine::open(device)
}

/// Opens an engine backed by a throwaway in-memory block device.
pub fn open_in_memory() -> Result<Engine, EngineError> {
    Engine::open(Box::new(InMemoryBlockDevice::new()))
}

/// Tokenizes, parses, and executes one statement against `engine`,
/// rendering the result the way the REPL prints it.
pub fn process_query(engine: &mut Engine, query: &str) -> Result<String, String> {
    let tokens = lexer::tokenize(query)?;
    let command = parser::parse(tokens)?;
    let result = engine.execute(command).map_err(|e| e.to_string())?;
    Ok(render_result(&result))
}

fn render_result(result: &CommandResult) -> String {
    match result {
        CommandResult::Status(message) => message.clone(),
        CommandResult::Rows(rows) => {
            if rows.is_empty() {
                return "(0 rows)".to_string();
            }
            let mut out = String::new();
            for row in rows {
                let rendered: Vec<String> = row.iter().map(|(k, v)| format!("{k}={v}")).collect();
                let _ = writeln!(out, "{}", rendered.join(", "));
            }
            out.trim_end().to_string()
        }
    }
}
