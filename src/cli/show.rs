//! Show command - print decrypted rows.

use std::path::Path;

use serde_json::json;

use crate::cli::{open_session, output};
use crate::core::config::Config;
use crate::core::document::Document;
use crate::core::storage::{Row, RowId};
use crate::error::{Result, StorageError};

pub fn execute(table: &str, json: bool) -> Result<()> {
    let root = Path::new(".");
    let config = Config::load_from(root)?;
    let mut session = open_session(root, &config)?;
    session.schema().require(table)?;

    let batch = config.fieldvault.batch_size;
    let mut rows: Vec<(RowId, Row)> = Vec::new();
    let mut after = None;
    loop {
        let page = session.load_page(table, after, batch)?;
        for id in &page {
            if let Some(doc) = session.get(*id) {
                rows.push((doc.id().unwrap_or_default(), doc.to_row()));
            }
        }
        after = page.last().and_then(|id| session.get(*id)).and_then(Document::id);
        session.clear();
        if page.len() < batch {
            break;
        }
    }

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(id, row)| json!({ "id": id, "values": row }))
            .collect();
        let rendered = serde_json::to_string_pretty(&out).map_err(StorageError::Serialize)?;
        println!("{}", rendered);
        return Ok(());
    }

    output::section(table);
    if rows.is_empty() {
        output::dimmed("no rows");
        return Ok(());
    }
    for (id, row) in &rows {
        output::header(&format!("#{}", id));
        for (column, value) in row {
            output::kv(column, value.as_deref().unwrap_or("null"));
        }
    }
    Ok(())
}
